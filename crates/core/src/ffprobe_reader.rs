use crate::error::ExtractError;
use crate::exif_reader::parse_date;
use crate::metadata::{Coordinates, PartialMetadata};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

pub const DEFAULT_FFPROBE_TIMEOUT_SECS: u64 = 30;

const DATE_TAGS: &[&str] = &["creation_time", "date", "DATE"];
const LOCATION_TAGS: &[&str] = &[
    "location",
    "location-eng",
    "com.apple.quicktime.location.ISO6709",
];

#[derive(Debug, Default, Deserialize)]
struct FfprobeReport {
    #[serde(default)]
    format: ReportSection,
    #[serde(default)]
    streams: Vec<ReportSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportSection {
    #[serde(default)]
    tags: HashMap<String, String>,
}

pub fn read_ffprobe_metadata(
    path: &Path,
    timeout: Duration,
) -> Result<PartialMetadata, ExtractError> {
    let mut command = Command::new("ffprobe");
    command
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path);

    let (status, stdout) = match run_with_timeout(&mut command, timeout) {
        Ok(output) => output,
        Err(ExtractError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            return Err(ExtractError::Ffprobe("ffprobeが見つかりません".to_string()));
        }
        Err(err) => return Err(err),
    };

    if !status.success() {
        return Err(ExtractError::Ffprobe(format!(
            "終了コード {}: {}",
            status,
            path.display()
        )));
    }

    parse_ffprobe_report(&stdout)
}

/// Runs `command` and collects its stdout. A child still running after
/// `timeout` is killed and reported as an error.
fn run_with_timeout(
    command: &mut Command,
    timeout: Duration,
) -> Result<(ExitStatus, Vec<u8>), ExtractError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    // Drained on its own thread so a large report cannot fill the pipe and
    // stall the child before the deadline.
    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| ExtractError::Ffprobe("標準出力を取得できませんでした".to_string()))?;
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf).map(|_| buf)
    });

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            child.kill()?;
            child.wait()?;
            return Err(ExtractError::Ffprobe(format!(
                "タイムアウトしました ({}秒)",
                timeout.as_secs_f64()
            )));
        }
    };

    let stdout = reader
        .join()
        .map_err(|_| ExtractError::Ffprobe("出力を読み取れませんでした".to_string()))??;
    Ok((status, stdout))
}

pub(crate) fn parse_ffprobe_report(raw: &[u8]) -> Result<PartialMetadata, ExtractError> {
    let report: FfprobeReport = serde_json::from_slice(raw)?;

    let created = DATE_TAGS
        .iter()
        .filter_map(|tag| report.format.tags.get(*tag))
        .find_map(|value| parse_date(value));

    let sections = std::iter::once(&report.format).chain(report.streams.iter());
    let coordinates = sections
        .flat_map(|section| {
            LOCATION_TAGS
                .iter()
                .filter_map(move |tag| section.tags.get(*tag))
        })
        .find_map(|value| parse_location(value));

    Ok(PartialMetadata {
        created,
        coordinates,
    })
}

/// Accepts ISO 6709 (`+37.7290-122.4135/`, `+3743.74-12224.81/`,
/// `+374344.4-1222448.6+012.3/`) and plain `lat,lon` strings.
pub(crate) fn parse_location(value: &str) -> Option<Coordinates> {
    let value = value.trim();
    parse_iso6709(value).or_else(|| parse_decimal_pair(value))
}

fn parse_iso6709(value: &str) -> Option<Coordinates> {
    static ISO6709: OnceLock<Option<Regex>> = OnceLock::new();

    let iso = ISO6709
        .get_or_init(|| Regex::new(r"^([+-])(\d+)(\.\d+)?([+-])(\d+)(\.\d+)?").ok())
        .as_ref()?;
    let caps = iso.captures(value)?;
    let latitude = iso6709_component(&caps[1], &caps[2], caps.get(3).map(|m| m.as_str()), 2)?;
    let longitude = iso6709_component(&caps[4], &caps[5], caps.get(6).map(|m| m.as_str()), 3)?;
    Coordinates::new(latitude, longitude)
}

fn parse_decimal_pair(value: &str) -> Option<Coordinates> {
    static DECIMAL_PAIR: OnceLock<Option<Regex>> = OnceLock::new();

    let pair = DECIMAL_PAIR
        .get_or_init(|| Regex::new(r"^(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)").ok())
        .as_ref()?;
    let caps = pair.captures(value)?;
    Coordinates::new(caps[1].parse().ok()?, caps[2].parse().ok()?)
}

/// `degree_digits` is 2 for latitude and 3 for longitude. The integer part
/// length tells whether minutes and seconds are packed in; writers that do
/// not zero-pad (`+5.6037-0.1870/`) produce plain decimal degrees.
fn iso6709_component(
    sign: &str,
    integer: &str,
    fraction: Option<&str>,
    degree_digits: usize,
) -> Option<f64> {
    let fraction: f64 = match fraction {
        Some(f) => format!("0{f}").parse().ok()?,
        None => 0.0,
    };

    let packed_digits = integer.len().saturating_sub(degree_digits);
    let magnitude = match packed_digits {
        0 => integer.parse::<f64>().ok()? + fraction,
        2 => {
            let (deg, min) = integer.split_at(degree_digits);
            deg.parse::<f64>().ok()? + (min.parse::<f64>().ok()? + fraction) / 60.0
        }
        4 => {
            let (deg, rest) = integer.split_at(degree_digits);
            let (min, sec) = rest.split_at(2);
            deg.parse::<f64>().ok()?
                + min.parse::<f64>().ok()? / 60.0
                + (sec.parse::<f64>().ok()? + fraction) / 3600.0
        }
        _ => return None,
    };

    Some(if sign == "-" { -magnitude } else { magnitude })
}

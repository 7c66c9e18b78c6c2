use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use geotag_renamer_core::{
    apply_plan, generate_plan, load_config, LocationSource, MediaExtractor, NominatimGeocoder,
    PlanOptions, RenamePlan, ReverseGeocoder,
};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "geotag-renamer", version)]
#[command(about = "写真・動画を撮影場所と撮影日時でリネームします")]
struct Cli {
    /// 実ファイルを変更せず、リネーム結果だけを表示します
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    /// 設定ファイルのパス (省略時はOS標準の設定ディレクトリ)
    #[arg(long)]
    config: Option<PathBuf>,
    /// 地名の問い合わせを行いません
    #[arg(long, default_value_t = false)]
    no_geocode: bool,
    #[arg(required = true, num_args = 1..)]
    files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    cmd_rename(cli)
}

fn cmd_rename(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    let files: Vec<PathBuf> = cli
        .files
        .into_iter()
        .filter(|path| {
            let exists = path.exists();
            if !exists {
                warn!(path = %path.display(), "ファイルが見つかりません");
            }
            exists
        })
        .collect();
    if files.is_empty() {
        anyhow::bail!("処理できるファイルがありません");
    }

    let mut extractor = MediaExtractor::new(&config.extractor);
    let mut geocoder = if config.geocoder.enabled && !cli.no_geocode {
        Some(NominatimGeocoder::new(&config.geocoder).context("ジオコーダを初期化できませんでした")?)
    } else {
        None
    };

    let plan = generate_plan(
        &files,
        &PlanOptions::from(&config),
        &mut extractor,
        geocoder.as_mut().map(|g| g as &mut dyn ReverseGeocoder),
    )?;

    match cli.output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        OutputFormat::Table => {
            print_table(&plan);
        }
    }

    if cli.dry_run {
        eprintln!("dry-runモード: 実ファイルは変更していません。");
    } else {
        let result = apply_plan(&plan);
        eprintln!(
            "適用完了: {}件 (変更なし {}件, 上書き回避 {}件, 失敗 {}件)",
            result.applied, result.unchanged, result.refused, result.failed
        );
    }

    Ok(())
}

fn print_table(plan: &RenamePlan) {
    println!("元ファイル -> 新ファイル (位置情報)");
    for candidate in &plan.candidates {
        let source = match &candidate.location_source {
            LocationSource::None => "なし".to_string(),
            LocationSource::Gps => "GPS".to_string(),
            LocationSource::Borrowed { from } => format!("推定: {}", from.display()),
        };
        let marker = if candidate.changed { "" } else { " [変更なし]" };
        println!(
            "{} -> {} ({}){}",
            candidate.original_path.display(),
            candidate.target_path.display(),
            source,
            marker
        );
    }

    let stats = &plan.stats;
    println!(
        "\n集計: inputs={} planned={} unchanged={} gps={} borrowed={} geocoded={} geocode_fail={} extract_fail={} missing={} not_file={} unsupported={} duplicate={}",
        stats.inputs,
        stats.planned,
        stats.unchanged,
        stats.with_gps,
        stats.borrowed,
        stats.geocoded,
        stats.geocode_failures,
        stats.extraction_failures,
        stats.skipped_missing,
        stats.skipped_not_file,
        stats.skipped_unsupported,
        stats.skipped_duplicate
    );
}

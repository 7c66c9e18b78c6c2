const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Makes one name segment filesystem-safe. Returns an empty string when
/// nothing usable is left.
pub fn sanitize_part(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if is_disallowed_char(ch) {
            out.push('_');
        } else {
            out.push(ch);
        }
    }
    cleanup_filename(&out)
}

pub fn cleanup_filename(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep: Option<char> = None;

    for ch in value.chars() {
        if is_collapse_separator(ch) {
            if prev_sep == Some(ch) {
                continue;
            }
            prev_sep = Some(ch);
            out.push(ch);
        } else {
            prev_sep = None;
            out.push(ch);
        }
    }

    out.trim_matches(|c: char| c == '_' || c == '-' || c == ' ' || c == '.')
        .to_string()
}

pub fn sanitize_stem(value: &str) -> String {
    let mut out = sanitize_part(value);

    if out.is_empty() {
        out = "untitled".to_string();
    }

    if is_windows_reserved(&out) {
        out.push_str("_file");
    }

    out
}

/// Cuts `value` to at most `max_bytes` UTF-8 bytes without splitting a char.
pub fn truncate_to_bytes(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

pub fn is_disallowed_char(ch: char) -> bool {
    matches!(ch, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
        || ch == '\0'
        || ch.is_control()
}

fn is_collapse_separator(ch: char) -> bool {
    matches!(ch, '_' | '-' | ' ')
}

fn is_windows_reserved(value: &str) -> bool {
    let stem = value
        .split('.')
        .next()
        .unwrap_or(value)
        .to_ascii_uppercase();
    WINDOWS_RESERVED_NAMES
        .iter()
        .any(|reserved| reserved == &stem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_compacts_and_trims() {
        let value = cleanup_filename("__hello___world__");
        assert_eq!(value, "hello_world");
    }

    #[test]
    fn sanitize_part_replaces_unsafe_chars() {
        assert_eq!(sanitize_part("São Paulo: <Centro>"), "São Paulo_ _Centro");
        assert_eq!(sanitize_part("a/b\\c|d?e*f\"g"), "a_b_c_d_e_f_g");
        assert_eq!(sanitize_part("tab\there\n"), "tab_here");
        assert_eq!(sanitize_part("///"), "");
    }

    #[test]
    fn sanitize_stem_handles_reserved_and_empty() {
        assert_eq!(sanitize_stem("AUX"), "AUX_file");
        assert_eq!(sanitize_stem("..."), "untitled");
        assert_eq!(sanitize_stem("IMG_0001"), "IMG_0001");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_to_bytes("東京都", 7), "東京");
        assert_eq!(truncate_to_bytes("abc", 10), "abc");
        assert_eq!(truncate_to_bytes("abc", 0), "");
    }
}

const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

pub const PLACEHOLDER_NAME: &str = "untitled";

/// Makes one path segment safe to create on any common filesystem.
/// Applying it twice gives the same result as applying it once.
pub fn sanitize_segment(value: &str) -> String {
    let stripped: String = value.chars().filter(|ch| !is_disallowed_char(*ch)).collect();

    let mut out = stripped
        .trim_end_matches(|c: char| c == '.' || c.is_whitespace())
        .trim_start()
        .to_string();

    if out.is_empty() {
        out = PLACEHOLDER_NAME.to_string();
    }

    // Windows reserves device names with any extension, so the suffix goes on
    // the part before the first dot.
    let stem_end = out[..out.find('.').unwrap_or(out.len())].trim_end().len();
    if is_windows_reserved(&out[..stem_end]) {
        out.insert_str(stem_end, "_file");
    }

    out
}

/// Shortens `segment` so that it plus `suffix_len` characters fits in `limit`,
/// dropping whole words first.
pub fn truncate_segment(segment: &str, suffix_len: usize, limit: usize) -> String {
    if segment.chars().count() + suffix_len <= limit {
        return segment.to_string();
    }

    let budget = limit.saturating_sub(suffix_len);
    let mut words: Vec<&str> = segment.split(' ').collect();
    while words.len() > 1 {
        words.pop();
        let candidate = words.join(" ");
        if candidate.chars().count() <= budget {
            return sanitize_segment(&candidate);
        }
    }

    let cut: String = segment.chars().take(budget).collect();
    sanitize_segment(&cut)
}

fn is_disallowed_char(ch: char) -> bool {
    matches!(ch, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || ch.is_control()
}

fn is_windows_reserved(stem: &str) -> bool {
    WINDOWS_RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(stem))
}

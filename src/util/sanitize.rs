//! Display name and color sanitization for client-supplied cosmetics

/// Maximum display name length in characters
pub const MAX_NAME_CHARS: usize = 16;

/// Sanitize a display name.
///
/// Keeps Unicode letters and digits, single `'` or `-` directly after a letter
/// or digit, and single spaces between words. Everything else is dropped.
/// Returns `None` when nothing usable remains.
pub fn sanitize_name(raw: &str) -> Option<String> {
    let mut out = String::new();
    let mut count = 0usize;
    let mut last: Option<char> = None;

    for c in raw.trim().chars() {
        if count >= MAX_NAME_CHARS {
            break;
        }

        let accept = if c.is_alphanumeric() {
            true
        } else if c == ' ' {
            matches!(last, Some(prev) if prev.is_alphanumeric() || prev == '\'' || prev == '-')
        } else if c == '\'' || c == '-' {
            matches!(last, Some(prev) if prev.is_alphanumeric())
        } else {
            false
        };

        if accept {
            out.push(c);
            last = Some(c);
            count += 1;
        }
    }

    let trimmed = out.trim_end().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Validate and normalize a hex color to uppercase `#RRGGBB`
pub fn sanitize_color(raw: &str) -> Option<String> {
    let hex = raw.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("#{}", hex.to_ascii_uppercase()))
}

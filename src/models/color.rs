use regex::Regex;
use std::sync::OnceLock;

fn color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$")
            .expect("color pattern is valid")
    })
}

/// Normalizes a hex color code (`#rgb`, `#rrggbb` or `#rrggbbaa`) to lowercase.
/// Returns `None` for anything else.
pub fn normalize_color(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if color_pattern().is_match(trimmed) {
        Some(trimmed.to_ascii_lowercase())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_color_accepts_short_and_long_forms() {
        assert_eq!(normalize_color("#FFF"), Some("#fff".to_string()));
        assert_eq!(normalize_color(" #a1B2c3 "), Some("#a1b2c3".to_string()));
        assert_eq!(normalize_color("#a1b2c3d4"), Some("#a1b2c3d4".to_string()));
    }

    #[test]
    fn normalize_color_rejects_garbage() {
        assert_eq!(normalize_color("red"), None);
        assert_eq!(normalize_color("#12"), None);
        assert_eq!(normalize_color("#ggg"), None);
        assert_eq!(normalize_color(""), None);
    }
}

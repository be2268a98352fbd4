//! Terminal styling and color detection.

/// ANSI escape codes for text styling.
pub mod colors {
    /// Reset all styling.
    pub const RESET: &str = "\x1b[0m";
    /// Gray for secondary elements.
    pub const GRAY: &str = "\x1b[90m";
    /// Green for counts that went as expected.
    pub const GREEN: &str = "\x1b[32m";
    /// Orange (256-color) for counts worth a second look.
    pub const ORANGE: &str = "\x1b[38;5;208m";
}

/// Resolved color codes, or empty strings when color is disabled.
#[derive(Debug, Clone, Copy)]
pub struct ColorPalette {
    pub reset: &'static str,
    pub gray: &'static str,
    pub green: &'static str,
    pub orange: &'static str,
}

impl ColorPalette {
    pub fn detect() -> Self {
        if supports_color() {
            Self {
                reset: colors::RESET,
                gray: colors::GRAY,
                green: colors::GREEN,
                orange: colors::ORANGE,
            }
        } else {
            Self::plain()
        }
    }

    pub fn plain() -> Self {
        Self {
            reset: "",
            gray: "",
            green: "",
            orange: "",
        }
    }
}

/// Check whether ANSI colors should be emitted.
///
/// Respects the `NO_COLOR` and `TERM=dumb` conventions.
pub fn supports_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if let Ok(term) = std::env::var("TERM") {
        if term.eq_ignore_ascii_case("dumb") {
            return false;
        }
    }
    true
}

/// Format an integer with thousands separators.
pub fn format_with_separators(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn separators_group_thousands() {
        assert_eq!(format_with_separators(7), "7");
        assert_eq!(format_with_separators(1000), "1,000");
        assert_eq!(format_with_separators(1234567), "1,234,567");
    }

    #[test]
    fn plain_palette_is_empty() {
        let palette = ColorPalette::plain();
        assert!(palette.reset.is_empty() && palette.green.is_empty());
    }
}

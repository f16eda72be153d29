/// Color parsing utilities
///
/// Display settings carry colors as CSS strings (they are edited in a web
/// form and stored as text). This module turns them into normalized RGBA
/// components the renderer draws with:
/// - `#rgb`, `#rrggbb`, `#rrggbbaa`
/// - `rgb(r, g, b)` and `rgba(r, g, b, a)` with 0-255 channels and 0.0-1.0 alpha

/// A color with all channels normalized to 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const WHITE: Rgba = Rgba { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };

    /// Parse a CSS color string, returning None for anything unsupported
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();

        if let Some(hex) = input.strip_prefix('#') {
            return parse_hex(hex);
        }

        let lower = input.to_ascii_lowercase();
        if let Some(args) = lower.strip_prefix("rgba(").and_then(|s| s.strip_suffix(')')) {
            return parse_functional(args, true);
        }
        if let Some(args) = lower.strip_prefix("rgb(").and_then(|s| s.strip_suffix(')')) {
            return parse_functional(args, false);
        }

        None
    }

    /// Same color with its alpha multiplied by `factor`
    pub fn scale_alpha(self, factor: f32) -> Self {
        Self {
            a: (self.a * factor).clamp(0.0, 1.0),
            ..self
        }
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }

    let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
    // Short form: each digit is doubled (#abc == #aabbcc)
    let short = |i: usize| {
        let digit = &hex[i..i + 1];
        channel(&format!("{digit}{digit}"))
    };

    match hex.len() {
        3 => Some(Rgba { r: short(0)?, g: short(1)?, b: short(2)?, a: 1.0 }),
        6 => Some(Rgba {
            r: channel(&hex[0..2])?,
            g: channel(&hex[2..4])?,
            b: channel(&hex[4..6])?,
            a: 1.0,
        }),
        8 => Some(Rgba {
            r: channel(&hex[0..2])?,
            g: channel(&hex[2..4])?,
            b: channel(&hex[4..6])?,
            a: channel(&hex[6..8])?,
        }),
        _ => None,
    }
}

fn parse_functional(args: &str, with_alpha: bool) -> Option<Rgba> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let expected = if with_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return None;
    }

    let channel = |s: &str| {
        let value: f32 = s.parse().ok()?;
        (0.0..=255.0).contains(&value).then_some(value / 255.0)
    };

    let a = if with_alpha {
        let alpha: f32 = parts[3].parse().ok()?;
        if !(0.0..=1.0).contains(&alpha) {
            return None;
        }
        alpha
    } else {
        1.0
    };

    Some(Rgba {
        r: channel(parts[0])?,
        g: channel(parts[1])?,
        b: channel(parts[2])?,
        a,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.001
    }

    #[test]
    fn test_parse_long_hex() {
        let color = Rgba::parse("#ff8000").unwrap();
        assert!(approx(color.r, 1.0));
        assert!(approx(color.g, 128.0 / 255.0));
        assert!(approx(color.b, 0.0));
        assert!(approx(color.a, 1.0));
    }

    #[test]
    fn test_parse_short_hex_expands_digits() {
        assert_eq!(Rgba::parse("#fff"), Rgba::parse("#ffffff"));
        assert_eq!(Rgba::parse("#000"), Some(Rgba::BLACK));
    }

    #[test]
    fn test_parse_hex_with_alpha() {
        let color = Rgba::parse("#00000080").unwrap();
        assert!(approx(color.a, 128.0 / 255.0));
    }

    #[test]
    fn test_parse_rgba_function() {
        let color = Rgba::parse("rgba(255, 255, 255, 0.1)").unwrap();
        assert!(approx(color.r, 1.0));
        assert!(approx(color.a, 0.1));

        let opaque = Rgba::parse("RGB(0,0,255)").unwrap();
        assert!(approx(opaque.b, 1.0));
        assert!(approx(opaque.a, 1.0));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(Rgba::parse("red"), None);
        assert_eq!(Rgba::parse("#12345"), None);
        assert_eq!(Rgba::parse("#gggggg"), None);
        assert_eq!(Rgba::parse("rgba(255, 255, 255)"), None);
        assert_eq!(Rgba::parse("rgb(300, 0, 0)"), None);
        assert_eq!(Rgba::parse("rgba(0, 0, 0, 1.5)"), None);
    }

    #[test]
    fn test_scale_alpha_clamps() {
        let color = Rgba::BLACK.scale_alpha(0.5);
        assert!(approx(color.a, 0.5));
        assert!(approx(Rgba::BLACK.scale_alpha(3.0).a, 1.0));
    }
}

use derive_more::Display;
use std::str::FromStr;

/// A line color as it appears in a timetable feed: either a `#RRGGBB`
/// code or one of the named fallback colors.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum WebColor {
    #[display(fmt = "{}", _0)]
    RGB(RGBColor),
    #[display(fmt = "{}", _0)]
    Named(NamedColor),
}

impl Default for WebColor {
    fn default() -> Self {
        WebColor::Named(NamedColor::Black)
    }
}

impl FromStr for WebColor {
    type Err = ();

    /// Feeds encode colors as six hex digits with an optional leading `#`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "white" => return Ok(WebColor::Named(NamedColor::White)),
            "black" => return Ok(WebColor::Named(NamedColor::Black)),
            _ => {}
        }

        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(());
        }

        let red = u8::from_str_radix(&hex[0..2], 16).map_err(|_| ())?;
        let green = u8::from_str_radix(&hex[2..4], 16).map_err(|_| ())?;
        let blue = u8::from_str_radix(&hex[4..6], 16).map_err(|_| ())?;

        Ok(WebColor::RGB(RGBColor::new(red, green, blue)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Display)]
#[display(fmt = "#{:02X}{:02X}{:02X}", red, green, blue)]
pub struct RGBColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl RGBColor {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum NamedColor {
    #[display(fmt = "white")]
    White,
    #[display(fmt = "black")]
    Black,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_color() {
        let color = RGBColor::new(255, 255, 255);
        assert_eq!(color.to_string(), "#FFFFFF");

        let color = RGBColor::new(0, 0, 0);
        assert_eq!(color.to_string(), "#000000");

        let color = RGBColor::new(73, 123, 145);
        assert_eq!(color.to_string(), "#497B91");
    }

    #[test]
    fn named_color() {
        assert_eq!(NamedColor::White.to_string(), "white");
        assert_eq!(NamedColor::Black.to_string(), "black");
    }

    #[test]
    fn parse_feed_color() {
        assert_eq!(
            "#E3000F".parse::<WebColor>(),
            Ok(WebColor::RGB(RGBColor::new(0xE3, 0x00, 0x0F)))
        );
        assert_eq!(
            "0078BF".parse::<WebColor>(),
            Ok(WebColor::RGB(RGBColor::new(0x00, 0x78, 0xBF)))
        );
        assert_eq!(
            "white".parse::<WebColor>(),
            Ok(WebColor::Named(NamedColor::White))
        );
        assert!("#12345".parse::<WebColor>().is_err());
        assert!("red-ish".parse::<WebColor>().is_err());
    }
}

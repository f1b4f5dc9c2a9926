//! Standard 14 fonts accepted for text annotations

use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
    Courier,
    CourierBold,
    TimesRoman,
    TimesBold,
}

impl StandardFont {
    pub const ALL: [StandardFont; 6] = [
        StandardFont::Helvetica,
        StandardFont::HelveticaBold,
        StandardFont::Courier,
        StandardFont::CourierBold,
        StandardFont::TimesRoman,
        StandardFont::TimesBold,
    ];

    /// PostScript name written as the font's /BaseFont
    pub fn base_font(self) -> &'static str {
        match self {
            StandardFont::Helvetica => "Helvetica",
            StandardFont::HelveticaBold => "Helvetica-Bold",
            StandardFont::Courier => "Courier",
            StandardFont::CourierBold => "Courier-Bold",
            StandardFont::TimesRoman => "Times-Roman",
            StandardFont::TimesBold => "Times-Bold",
        }
    }
}

impl fmt::Display for StandardFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_font())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedFont(pub String);

impl fmt::Display for UnsupportedFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported font '{}'", self.0)
    }
}

impl std::error::Error for UnsupportedFont {}

impl FromStr for StandardFont {
    type Err = UnsupportedFont;

    /// Names must match a base font exactly
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        StandardFont::ALL
            .into_iter()
            .find(|font| font.base_font() == name)
            .ok_or_else(|| UnsupportedFont(name.to_string()))
    }
}

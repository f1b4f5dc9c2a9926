//! Hex color parsing
//!
//! Annotation records carry colors as the hex strings the client picked
//! ("#FF0000", "ff0000" or the "#F00" shorthand). They are parsed strictly:
//! anything else is a malformed color and rejects the record.

use std::fmt;
use std::str::FromStr;

/// RGB color with components in the PDF 0-1 range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }
}

/// Error returned for a color string that is not valid hex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorParseError(pub String);

impl fmt::Display for ColorParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed color '{}'", self.0)
    }
}

impl std::error::Error for ColorParseError {}

impl FromStr for Rgb {
    type Err = ColorParseError;

    fn from_str(color: &str) -> Result<Self, Self::Err> {
        let err = || ColorParseError(color.to_string());
        let hex = color.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);

        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(err());
        }

        match hex.len() {
            6 => {
                let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
                Ok(Rgb::from_u8(channel(0)?, channel(2)?, channel(4)?))
            }
            3 => {
                // "#F80" is shorthand for "#FF8800"
                let channel = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16)
                        .map(|v| v * 17)
                        .map_err(|_| err())
                };
                Ok(Rgb::from_u8(channel(0)?, channel(1)?, channel(2)?))
            }
            _ => Err(err()),
        }
    }
}

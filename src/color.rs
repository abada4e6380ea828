use std::{fmt, str::FromStr};

use thiserror::Error;

/// A 32-bit ARGB color.
///
/// Parsed from `#RGB`, `#ARGB`, `#RRGGBB` or `#AARRGGBB`; always printed as
/// `#AARRGGBB` with uppercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(u32);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color '{0}': expected #RGB, #ARGB, #RRGGBB or #AARRGGBB")]
pub struct ColorParseError(pub String);

/// One of the four channels of a [`Color`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Alpha,
    Red,
    Green,
    Blue,
}

impl Channel {
    fn shift(self) -> u32 {
        match self {
            Channel::Alpha => 24,
            Channel::Red => 16,
            Channel::Green => 8,
            Channel::Blue => 0,
        }
    }
}

impl Color {
    pub const fn from_argb_u32(argb: u32) -> Self {
        Color(argb)
    }

    pub fn from_argb(alpha: u8, red: u8, green: u8, blue: u8) -> Self {
        Color(u32::from_be_bytes([alpha, red, green, blue]))
    }

    pub fn argb(self) -> u32 {
        self.0
    }

    pub fn channel(self, channel: Channel) -> u8 {
        ((self.0 >> channel.shift()) & 0xFF) as u8
    }

    pub fn with_channel(self, channel: Channel, value: u8) -> Self {
        let shift = channel.shift();
        Color((self.0 & !(0xFF << shift)) | (u32::from(value) << shift))
    }

    pub fn alpha(self) -> u8 {
        self.channel(Channel::Alpha)
    }

    pub fn red(self) -> u8 {
        self.channel(Channel::Red)
    }

    pub fn green(self) -> u8 {
        self.channel(Channel::Green)
    }

    pub fn blue(self) -> u8 {
        self.channel(Channel::Blue)
    }

    pub fn parse(text: &str) -> Result<Self, ColorParseError> {
        let invalid = || ColorParseError(text.to_string());

        let hex = text.strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let value = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;

        // Short forms repeat each digit: #F0A -> #FFFF00AA
        let expand = |digits: u32, count: u32| {
            (0..count).rev().fold(0u32, |acc, i| {
                let digit = (digits >> (i * 4)) & 0xF;
                (acc << 8) | (digit << 4) | digit
            })
        };

        match hex.len() {
            3 => Ok(Color(0xFF00_0000 | expand(value, 3))),
            4 => Ok(Color(expand(value, 4))),
            6 => Ok(Color(0xFF00_0000 | value)),
            8 => Ok(Color(value)),
            _ => Err(invalid()),
        }
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Color::parse(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

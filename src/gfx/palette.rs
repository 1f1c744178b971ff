//! Colour palette for the composite pass
//!
//! A palette is a row of colour stops uploaded as an Nx1 texture and sampled
//! with linear filtering at `u = lenv`.

use crate::error::{EtherError, Result};

const WHITE: [u8; 4] = [255, 255, 255, 255];

#[derive(Clone, Debug, PartialEq)]
pub struct Palette {
    stops: Vec<[u8; 4]>,
}

/// Parse `#rgb` or `#rrggbb` into opaque RGBA8
pub fn parse_hex_color(text: &str) -> Result<[u8; 4]> {
    let invalid = || EtherError::InvalidColor(text.to_string());
    let hex = text.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());

    match hex.len() {
        3 => {
            let mut rgba = WHITE;
            for (i, c) in hex.chars().enumerate() {
                let digit = channel(&c.to_string())?;
                rgba[i] = digit * 17;
            }
            Ok(rgba)
        }
        6 => Ok([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            255,
        ]),
        _ => Err(invalid()),
    }
}

impl Palette {
    /// Build a palette from colour strings.
    ///
    /// Invalid stops are logged and skipped. A single stop is duplicated so
    /// the texture is always at least two texels wide; an empty result is
    /// white to white.
    pub fn from_stops<S: AsRef<str>>(stops: &[S]) -> Self {
        let mut parsed: Vec<[u8; 4]> = stops
            .iter()
            .filter_map(|stop| match parse_hex_color(stop.as_ref()) {
                Ok(rgba) => Some(rgba),
                Err(err) => {
                    log::warn!("Skipping palette stop: {}", err);
                    None
                }
            })
            .collect();

        match parsed.len() {
            0 => parsed = vec![WHITE, WHITE],
            1 => parsed.push(parsed[0]),
            _ => {}
        }
        Self { stops: parsed }
    }

    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn stops(&self) -> &[[u8; 4]] {
        &self.stops
    }

    /// Texel data for an Nx1 RGBA8 texture
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.stops.iter().flatten().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_and_long_hex() {
        assert_eq!(parse_hex_color("#5227FF").unwrap(), [0x52, 0x27, 0xff, 255]);
        assert_eq!(parse_hex_color("#fa0").unwrap(), [255, 170, 0, 255]);
        assert!(parse_hex_color("5227FF").is_err());
        assert!(parse_hex_color("#12345").is_err());
        assert!(parse_hex_color("#gg0000").is_err());
    }

    #[test]
    fn test_single_stop_is_duplicated() {
        let palette = Palette::from_stops(&["#000"]);
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.to_rgba8(), vec![0, 0, 0, 255, 0, 0, 0, 255]);
    }

    #[test]
    fn test_empty_and_invalid_fall_back_to_white() {
        let empty: [&str; 0] = [];
        assert_eq!(Palette::from_stops(&empty).stops(), &[WHITE, WHITE]);
        assert_eq!(
            Palette::from_stops(&["red", "#zzz"]).stops(),
            &[WHITE, WHITE]
        );
        // One valid stop survives among invalid ones
        assert_eq!(
            Palette::from_stops(&["nope", "#000000"]).stops(),
            &[[0, 0, 0, 255], [0, 0, 0, 255]]
        );
    }
}

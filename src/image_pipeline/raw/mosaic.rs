//! Color filter array classification.

use serde::{Deserialize, Serialize};

/// Color channel of a sensor pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Red = 0,
    Green = 1,
    Blue = 2,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// 2x2 Bayer layout, named by the colors of the top-left quad in raster order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BayerPattern {
    #[default]
    Rggb,
    Bggr,
    Grbg,
    Gbrg,
}

impl BayerPattern {
    /// Channel of the pixel at (row, col).
    #[inline]
    pub fn channel_at(self, row: usize, col: usize) -> Channel {
        let (ym, xm) = (row % 2, col % 2);
        match (self, ym, xm) {
            (BayerPattern::Rggb, 0, 0) | (BayerPattern::Bggr, 1, 1) => Channel::Red,
            (BayerPattern::Rggb, 1, 1) | (BayerPattern::Bggr, 0, 0) => Channel::Blue,
            (BayerPattern::Grbg, 0, 1) | (BayerPattern::Gbrg, 1, 0) => Channel::Red,
            (BayerPattern::Grbg, 1, 0) | (BayerPattern::Gbrg, 0, 1) => Channel::Blue,
            _ => Channel::Green,
        }
    }

    #[inline]
    pub fn is_red(self, row: usize, col: usize) -> bool {
        self.channel_at(row, col) == Channel::Red
    }

    #[inline]
    pub fn is_green(self, row: usize, col: usize) -> bool {
        self.channel_at(row, col) == Channel::Green
    }

    pub(crate) fn to_cfa(self) -> bayer::CFA {
        match self {
            BayerPattern::Rggb => bayer::CFA::RGGB,
            BayerPattern::Bggr => bayer::CFA::BGGR,
            BayerPattern::Grbg => bayer::CFA::GRBG,
            BayerPattern::Gbrg => bayer::CFA::GBRG,
        }
    }
}

/// Per-pixel channel classification of a sensor.
pub trait SensorMosaic: Send + Sync {
    fn channel_at(&self, row: usize, col: usize) -> Channel;
}

impl SensorMosaic for BayerPattern {
    fn channel_at(&self, row: usize, col: usize) -> Channel {
        BayerPattern::channel_at(*self, row, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(p: BayerPattern) -> [Channel; 4] {
        [p.channel_at(0, 0), p.channel_at(0, 1), p.channel_at(1, 0), p.channel_at(1, 1)]
    }

    #[test]
    fn test_patterns_match_names() {
        use Channel::*;
        assert_eq!(quad(BayerPattern::Rggb), [Red, Green, Green, Blue]);
        assert_eq!(quad(BayerPattern::Bggr), [Blue, Green, Green, Red]);
        assert_eq!(quad(BayerPattern::Grbg), [Green, Red, Blue, Green]);
        assert_eq!(quad(BayerPattern::Gbrg), [Green, Blue, Red, Green]);
    }

    #[test]
    fn test_pattern_repeats() {
        let p = BayerPattern::Grbg;
        assert_eq!(p.channel_at(6, 9), p.channel_at(0, 1));
        assert!(p.is_red(10, 3));
        assert!(p.is_green(11, 3));
    }

    #[test]
    fn test_pattern_serde_names() {
        let json = serde_json::to_string(&BayerPattern::Gbrg).unwrap();
        assert_eq!(json, "\"GBRG\"");
    }
}

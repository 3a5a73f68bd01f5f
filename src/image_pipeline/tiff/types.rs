//! Output settings for the calibrated 16-bit RGB TIFF

use tiff::encoder::Compression;
use tiff::encoder::compression::DeflateLevel;

/// Compression applied to the calibrated image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffCompression {
    None,
    Lzw,
    DeflateFast,
    /// Default
    DeflateBalanced,
    DeflateBest,
}

impl TiffCompression {
    pub(crate) fn to_encoder(self) -> Compression {
        match self {
            TiffCompression::None => Compression::Uncompressed,
            TiffCompression::Lzw => Compression::Lzw,
            TiffCompression::DeflateFast => Compression::Deflate(DeflateLevel::Fast),
            TiffCompression::DeflateBalanced => Compression::Deflate(DeflateLevel::Balanced),
            TiffCompression::DeflateBest => Compression::Deflate(DeflateLevel::Best),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TiffOutputConfig {
    pub compression: TiffCompression,
    /// Horizontal differencing before compression. Smaller files for smooth
    /// calibrated images, at some encode cost.
    pub horizontal_predictor: bool,
}

impl Default for TiffOutputConfig {
    fn default() -> Self {
        Self {
            compression: TiffCompression::DeflateBalanced,
            horizontal_predictor: false,
        }
    }
}

impl TiffOutputConfig {
    pub fn builder() -> TiffOutputConfigBuilder {
        TiffOutputConfigBuilder::default()
    }
}

#[derive(Default)]
pub struct TiffOutputConfigBuilder {
    compression: Option<TiffCompression>,
    horizontal_predictor: Option<bool>,
}

impl TiffOutputConfigBuilder {
    pub fn compression(mut self, compression: TiffCompression) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn horizontal_predictor(mut self, enabled: bool) -> Self {
        self.horizontal_predictor = Some(enabled);
        self
    }

    pub fn build(self) -> TiffOutputConfig {
        let default = TiffOutputConfig::default();
        TiffOutputConfig {
            compression: self.compression.unwrap_or(default.compression),
            horizontal_predictor: self.horizontal_predictor.unwrap_or(default.horizontal_predictor),
        }
    }
}

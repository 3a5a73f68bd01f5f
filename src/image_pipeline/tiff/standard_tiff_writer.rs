use std::io::{Cursor, Write};

use tiff::encoder::{TiffEncoder, colortype};
use tiff::tags::Predictor;
use tracing::debug;

use crate::image_pipeline::common::error::{Result, CalibrationError};
use crate::image_pipeline::debayer::types::RgbImageData;
use crate::image_pipeline::tiff::types::TiffOutputConfig;
use crate::image_pipeline::tiff::writer::TiffWriter;

/// Writes [0, 1] RGB images as interleaved RGB16 TIFF.
pub struct StandardTiffWriter;

fn to_u16(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * u16::MAX as f32).round() as u16
}

impl TiffWriter for StandardTiffWriter {
    fn write_rgb_tiff(&self, image: &RgbImageData, output: &mut dyn Write, config: &TiffOutputConfig) -> Result<()> {
        debug!(
            "Encoding {}x{} RGB16 TIFF ({:?}, predictor {})",
            image.width, image.height, config.compression, config.horizontal_predictor
        );

        let mut buffer = Vec::new();
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer))
            .map_err(|e| CalibrationError::EncodeError(e.to_string()))?
            .with_compression(config.compression.to_encoder());
        if config.horizontal_predictor {
            encoder = encoder.with_predictor(Predictor::Horizontal);
        }

        let samples: Vec<u16> = image.data.iter().map(|&v| to_u16(v)).collect();
        encoder
            .write_image::<colortype::RGB16>(image.width as u32, image.height as u32, &samples)
            .map_err(|e| CalibrationError::EncodeError(e.to_string()))?;

        output.write_all(&buffer)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_pipeline::tiff::types::TiffCompression;
    use tiff::decoder::{Decoder, DecodingResult};

    #[test]
    fn test_rgb_tiff_decodes_back() {
        let image = RgbImageData::filled(5, 3, [1.0, 0.5, 0.0], 16);
        let mut output = Vec::new();
        StandardTiffWriter
            .write_rgb_tiff(&image, &mut output, &TiffOutputConfig::default())
            .unwrap();

        let mut decoder = Decoder::new(Cursor::new(output)).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (5, 3));
        match decoder.read_image().unwrap() {
            DecodingResult::U16(values) => {
                assert_eq!(values.len(), 45);
                assert_eq!(&values[0..3], &[65535, 32768, 0]);
            }
            _ => panic!("expected 16-bit samples"),
        }
    }

    #[test]
    fn test_lzw_with_horizontal_predictor() {
        let image = RgbImageData::filled(4, 2, [0.25, 0.5, 0.75], 16);
        let config = TiffOutputConfig::builder()
            .compression(TiffCompression::Lzw)
            .horizontal_predictor(true)
            .build();
        let mut output = Vec::new();
        StandardTiffWriter.write_rgb_tiff(&image, &mut output, &config).unwrap();

        let mut decoder = Decoder::new(Cursor::new(output)).unwrap();
        match decoder.read_image().unwrap() {
            DecodingResult::U16(values) => assert!(values.chunks(3).all(|px| px == [16384, 32768, 49151])),
            _ => panic!("expected 16-bit samples"),
        }
    }
}

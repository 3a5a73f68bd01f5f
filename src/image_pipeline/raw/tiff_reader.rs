//! Reader for single-channel mosaic TIFF files (8 or 16 bit).

use std::io::Cursor;

use tiff::ColorType;
use tiff::decoder::{Decoder, DecodingResult};
use tracing::debug;

use crate::image_pipeline::common::error::{CalibrationError, Result};
use crate::image_pipeline::raw::reader::RawImageReader;
use crate::image_pipeline::raw::types::RawImageData;

/// Reads an undemosaiced sensor dump stored as a grayscale TIFF.
pub struct TiffMosaicReader;

impl RawImageReader for TiffMosaicReader {
    fn read_raw(&self, data: &[u8]) -> Result<RawImageData> {
        let decode_err = |e: tiff::TiffError| CalibrationError::DecodeError(e.to_string());

        let mut decoder = Decoder::new(Cursor::new(data)).map_err(decode_err)?;
        let (width, height) = decoder.dimensions().map_err(decode_err)?;
        let color_type = decoder.colortype().map_err(decode_err)?;
        debug!("Decoding mosaic TIFF {}x{} ({:?})", width, height, color_type);

        let (samples, bits_per_sample) = match (color_type, decoder.read_image().map_err(decode_err)?) {
            (ColorType::Gray(8), DecodingResult::U8(values)) => {
                (values.into_iter().map(u16::from).collect(), 8)
            }
            (ColorType::Gray(16), DecodingResult::U16(values)) => (values, 16),
            (other, _) => {
                return Err(CalibrationError::UnsupportedFormat(format!(
                    "mosaic TIFF must be 8 or 16 bit grayscale, got {:?}",
                    other
                )));
            }
        };

        RawImageData::new(width as usize, height as usize, samples, bits_per_sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiff::encoder::{TiffEncoder, colortype};

    fn encode_gray16(width: u32, height: u32, data: &[u16]) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer)).unwrap();
        encoder.write_image::<colortype::Gray16>(width, height, data).unwrap();
        buffer
    }

    #[test]
    fn test_reads_gray16_mosaic() {
        let data: Vec<u16> = (0..12).map(|v| v * 1000).collect();
        let bytes = encode_gray16(4, 3, &data);
        let raw = TiffMosaicReader.read_raw(&bytes).unwrap();
        assert_eq!((raw.width, raw.height, raw.bits_per_sample), (4, 3, 16));
        assert_eq!(raw.data, data);
    }

    #[test]
    fn test_reads_gray8_mosaic() {
        let data: Vec<u8> = (0..6).map(|v| v * 40).collect();
        let mut buffer = Vec::new();
        let mut encoder = TiffEncoder::new(Cursor::new(&mut buffer)).unwrap();
        encoder.write_image::<colortype::Gray8>(3, 2, &data).unwrap();

        let raw = TiffMosaicReader.read_raw(&buffer).unwrap();
        assert_eq!(raw.bits_per_sample, 8);
        assert_eq!(raw.max_pixel_value(), 255);
        assert_eq!(raw.data[5], 200);
    }

    #[test]
    fn test_rejects_garbage() {
        let result = TiffMosaicReader.read_raw(b"not a tiff");
        assert!(matches!(result, Err(CalibrationError::DecodeError(_))));
    }
}

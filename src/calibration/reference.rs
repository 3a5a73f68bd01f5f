//! Ground-truth values of the reference color chart.

use nalgebra::Vector3;

use crate::image_pipeline::common::error::{CalibrationError, Result};

/// Linear RGB of the 24 patch Macbeth ColorChecker, 8-bit scale, raster order.
const MACBETH_LINEAR: [[u8; 3]; 24] = [
    [44, 22, 15],
    [138, 78, 57],
    [31, 50, 86],
    [24, 38, 14],
    [60, 55, 112],
    [35, 130, 103],
    [171, 53, 6],
    [20, 27, 97],
    [136, 26, 32],
    [29, 12, 38],
    [86, 128, 13],
    [190, 93, 7],
    [10, 12, 78],
    [16, 76, 17],
    [109, 9, 12],
    [204, 146, 3],
    [127, 24, 77],
    [1, 60, 91],
    [229, 229, 226],
    [147, 147, 147],
    [90, 90, 90],
    [50, 50, 49],
    [23, 23, 23],
    [9, 9, 9],
];

/// Number of neutral cells closing the chart, brightest first.
pub const GRAY_RAMP_LEN: usize = 6;

/// Position in the darkest-first gray ramp used as the dark response sample.
/// The darkest cell is skipped since it is the one most likely to clip.
const GRAY_DARK_RANK: usize = 1;

/// Position in the darkest-first gray ramp used as the bright response sample.
const GRAY_BRIGHT_RANK: usize = 4;

/// Ordered table of reference patch colors.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceChart {
    patches_wide: usize,
    patches_high: usize,
    values: Vec<[u8; 3]>,
}

impl ReferenceChart {
    /// Builds a chart of `patches_wide * patches_high` cells. The last
    /// [`GRAY_RAMP_LEN`] cells must be the neutral ramp, brightest first.
    pub fn new(patches_wide: usize, patches_high: usize, values: Vec<[u8; 3]>) -> Result<Self> {
        if patches_wide * patches_high != values.len() {
            return Err(CalibrationError::InvalidDimensions(patches_wide, patches_high));
        }
        if values.len() < GRAY_RAMP_LEN {
            return Err(CalibrationError::UnsupportedFormat(format!(
                "reference chart needs at least {} gray cells, got {} cells",
                GRAY_RAMP_LEN,
                values.len()
            )));
        }
        Ok(Self {
            patches_wide,
            patches_high,
            values,
        })
    }

    /// The 6x4 Macbeth ColorChecker in linear RGB.
    pub fn macbeth_linear() -> Self {
        Self {
            patches_wide: 6,
            patches_high: 4,
            values: MACBETH_LINEAR.to_vec(),
        }
    }

    pub fn patches_wide(&self) -> usize {
        self.patches_wide
    }

    pub fn patches_high(&self) -> usize {
        self.patches_high
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reference color on the 8-bit scale.
    pub fn rgb(&self, index: usize) -> Vector3<f32> {
        let [r, g, b] = self.values[index];
        Vector3::new(r as f32, g as f32, b as f32)
    }

    /// Reference color scaled to [0, 1].
    pub fn normalized(&self, index: usize) -> Vector3<f32> {
        self.rgb(index) / 255.0
    }

    /// Chart index of the gray cell at `rank` in darkest-first order.
    pub fn gray_index(&self, rank: usize) -> usize {
        self.values.len() - 1 - rank
    }

    /// Second darkest gray cell.
    pub fn gray_dark_index(&self) -> usize {
        self.gray_index(GRAY_DARK_RANK)
    }

    /// Second brightest gray cell.
    pub fn gray_bright_index(&self) -> usize {
        self.gray_index(GRAY_BRIGHT_RANK)
    }

    /// Gray ramp chart indices, darkest first.
    pub fn gray_ramp(&self) -> impl Iterator<Item = usize> + '_ {
        (0..GRAY_RAMP_LEN).map(|rank| self.gray_index(rank))
    }
}

impl Default for ReferenceChart {
    fn default() -> Self {
        Self::macbeth_linear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_ramp_is_darkest_first() {
        let chart = ReferenceChart::macbeth_linear();
        let grays: Vec<f32> = chart.gray_ramp().map(|i| chart.rgb(i).x).collect();
        assert_eq!(grays, vec![9.0, 23.0, 50.0, 90.0, 147.0, 229.0]);
    }

    #[test]
    fn test_response_samples_skip_extremes() {
        let chart = ReferenceChart::macbeth_linear();
        assert_eq!(chart.gray_dark_index(), 22);
        assert_eq!(chart.gray_bright_index(), 19);
        assert_eq!(chart.rgb(chart.gray_dark_index()), Vector3::new(23.0, 23.0, 23.0));
    }

    #[test]
    fn test_new_rejects_size_mismatch() {
        let result = ReferenceChart::new(6, 4, vec![[0; 3]; 20]);
        assert!(matches!(result, Err(CalibrationError::InvalidDimensions(6, 4))));
    }

    #[test]
    fn test_normalized_scale() {
        let chart = ReferenceChart::macbeth_linear();
        assert!((chart.normalized(18).x - 229.0 / 255.0).abs() < 1e-6);
    }
}

use serde::{Deserialize, Serialize};

/// A single image in channel-major (`C×H×W`) layout.
///
/// Intensities lie in `[0, pixel_max]`, where `pixel_max` is a property of
/// the dataset (`255.0` for 8-bit data, `1.0` for normalized data); see
/// [`Image::normalized_mean`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
    pub pixels: Vec<f32>,
}

impl Image {
    /// Creates an image with every pixel set to `value`.
    #[must_use]
    pub fn filled(channels: usize, height: usize, width: usize, value: f32) -> Self {
        Self {
            channels,
            height,
            width,
            pixels: vec![value; channels * height * width],
        }
    }

    /// Number of values the pixel buffer must hold for the declared shape.
    #[must_use]
    pub fn expected_len(&self) -> usize {
        self.channels * self.height * self.width
    }

    /// Mean intensity over all channels, divided by `pixel_max`.
    ///
    /// `pixel_max` is the top of the dataset's value range. It is never
    /// inferred from the pixels, so a dark 8-bit image stays dark. An image
    /// without pixels has a mean of `0.0`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datalens_batch::Image;
    /// assert_eq!(Image::filled(3, 2, 2, 127.5).normalized_mean(255.0), 0.5);
    /// assert_eq!(Image::filled(1, 2, 2, 0.25).normalized_mean(1.0), 0.25);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn normalized_mean(&self, pixel_max: f64) -> f64 {
        if self.pixels.is_empty() {
            return 0.0;
        }
        let sum = self.pixels.iter().map(|&p| f64::from(p)).sum::<f64>();
        sum / self.pixels.len() as f64 / pixel_max
    }
}

/// A per-pixel class-id mask in row-major layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMask {
    pub height: usize,
    pub width: usize,
    pub values: Vec<u8>,
}

impl LabelMask {
    /// Builds a mask from equally sized rows.
    ///
    /// # Panics
    ///
    /// Panics if the rows have different lengths.
    #[must_use]
    pub fn from_rows(rows: &[Vec<u8>]) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        assert!(
            rows.iter().all(|row| row.len() == width),
            "all rows must have the same length"
        );
        Self {
            height: rows.len(),
            width,
            values: rows.concat(),
        }
    }

    /// Creates a mask of a single class.
    #[must_use]
    pub fn filled(height: usize, width: usize, class_id: u8) -> Self {
        Self {
            height,
            width,
            values: vec![class_id; height * width],
        }
    }

    #[must_use]
    pub fn expected_len(&self) -> usize {
        self.height * self.width
    }

    /// Returns the class id at column `x`, row `y`.
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.values[y * self.width + x]
    }

    /// Returns a row-major mask of the pixels labeled `class_id`.
    #[must_use]
    pub fn binary_mask(&self, class_id: u8) -> Vec<bool> {
        self.values.iter().map(|&v| v == class_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let mask = LabelMask::from_rows(&[vec![0, 1], vec![2, 3], vec![4, 5]]);
        assert_eq!(mask.height, 3);
        assert_eq!(mask.width, 2);
        assert_eq!(mask.get(1, 2), 5);
        assert_eq!(mask.binary_mask(2), vec![false, false, true, false, false, false]);
    }

    #[test]
    fn test_deserialize_image() {
        let json = r#"{"channels":1,"height":1,"width":2,"pixels":[0.0,1.0]}"#;
        let image: Image = serde_json::from_str(json).unwrap();
        assert_eq!(image.expected_len(), 2);
        assert_eq!(image.normalized_mean(1.0), 0.5);
    }

    #[test]
    fn test_empty_image_mean() {
        assert_eq!(Image::filled(3, 0, 0, 1.0).normalized_mean(255.0), 0.0);
    }

    #[test]
    fn test_dark_8bit_image_stays_dark() {
        let dark = Image {
            channels: 1,
            height: 2,
            width: 2,
            pixels: vec![1.0; 4],
        };
        assert!(dark.normalized_mean(255.0) < 0.1);
        assert_eq!(Image::filled(1, 2, 2, 0.0).normalized_mean(255.0), 0.0);
    }
}

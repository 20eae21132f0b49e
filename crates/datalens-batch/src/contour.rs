use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: usize,
    pub y_min: usize,
    pub x_max: usize,
    pub y_max: usize,
}

impl BoundingBox {
    #[must_use]
    pub fn width(&self) -> usize {
        self.x_max - self.x_min + 1
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.y_max - self.y_min + 1
    }
}

/// One detected object: an 8-connected region of a class mask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contour {
    area: usize,
    center: (f64, f64),
    bbox: BoundingBox,
}

impl Contour {
    /// Area in pixels.
    #[must_use]
    pub fn area(&self) -> usize {
        self.area
    }

    /// Center of mass `(x, y)` in pixel coordinates.
    #[must_use]
    pub fn center_of_mass(&self) -> (f64, f64) {
        self.center
    }

    #[must_use]
    pub fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }
}

/// Splits a row-major binary mask into its 8-connected objects.
///
/// Objects are returned in scan order of their first (top-most, then
/// left-most) pixel.
///
/// # Panics
///
/// Panics if `mask.len() != width * height`.
///
/// # Examples
///
/// ```
/// # use datalens_batch::find_contours;
/// let mask = [
///     true, false, false,
///     false, true, false,
///     false, false, true,
/// ];
/// // diagonal neighbours are connected
/// let contours = find_contours(&mask, 3, 3);
/// assert_eq!(contours.len(), 1);
/// assert_eq!(contours[0].area(), 3);
/// assert_eq!(contours[0].center_of_mass(), (1.0, 1.0));
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn find_contours(mask: &[bool], width: usize, height: usize) -> Vec<Contour> {
    assert_eq!(mask.len(), width * height, "mask size mismatch");

    let mut visited = vec![false; mask.len()];
    let mut contours = vec![];
    let mut stack = vec![];

    for start in 0..mask.len() {
        if !mask[start] || visited[start] {
            continue;
        }
        visited[start] = true;
        stack.push(start);

        let mut area = 0;
        let (mut sum_x, mut sum_y) = (0usize, 0usize);
        let mut bbox = BoundingBox {
            x_min: start % width,
            y_min: start / width,
            x_max: start % width,
            y_max: start / width,
        };

        while let Some(idx) = stack.pop() {
            let (x, y) = (idx % width, idx / width);
            area += 1;
            sum_x += x;
            sum_y += y;
            bbox.x_min = bbox.x_min.min(x);
            bbox.x_max = bbox.x_max.max(x);
            bbox.y_min = bbox.y_min.min(y);
            bbox.y_max = bbox.y_max.max(y);

            for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    let n = ny * width + nx;
                    if mask[n] && !visited[n] {
                        visited[n] = true;
                        stack.push(n);
                    }
                }
            }
        }

        contours.push(Contour {
            area,
            center: (sum_x as f64 / area as f64, sum_y as f64 / area as f64),
            bbox,
        });
    }

    contours
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> (Vec<bool>, usize, usize) {
        let width = rows[0].len();
        let mask = rows
            .iter()
            .flat_map(|row| row.chars().map(|c| c == '#'))
            .collect();
        (mask, width, rows.len())
    }

    #[test]
    fn test_empty_mask() {
        let (mask, w, h) = mask_from(&["...", "..."]);
        assert!(find_contours(&mask, w, h).is_empty());
        assert!(find_contours(&[], 0, 0).is_empty());
    }

    #[test]
    fn test_separate_objects() {
        let (mask, w, h) = mask_from(&[
            "##...", //
            "##...", //
            ".....", //
            "...##", //
        ]);
        let contours = find_contours(&mask, w, h);
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].area(), 4);
        assert_eq!(contours[0].center_of_mass(), (0.5, 0.5));
        assert_eq!(contours[1].area(), 2);
        assert_eq!(contours[1].center_of_mass(), (3.5, 3.0));
        let bbox = contours[1].bounding_box();
        assert_eq!((bbox.width(), bbox.height()), (2, 1));
    }

    #[test]
    fn test_u_shape_is_one_object() {
        let (mask, w, h) = mask_from(&[
            "#.#", //
            "#.#", //
            "###", //
        ]);
        let contours = find_contours(&mask, w, h);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area(), 7);
    }
}

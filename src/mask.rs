//! Pixel-level geometry: a box with an optional binary mask.
//!
//! A mask is an `Array2<bool>` with one row per pixel row of the box,
//! anchored at the rounded top-left corner of the box. Without a mask the
//! whole box counts as foreground.

use ndarray::{Array2, ArrayView2};

use crate::bbox::{BBox, Ltwh};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct Region<'a> {
    pub bbox: &'a BBox<Ltwh>,
    pub mask: Option<ArrayView2<'a, bool>>,
}

/// Pixel counts of two overlapping regions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Overlap {
    pub intersecting: f32,
    pub area_a: f32,
    pub area_b: f32,
}

/// Mask shape a box requires, as `(rows, cols)`.
#[inline]
pub fn mask_shape(bbox: &BBox<Ltwh>) -> (usize, usize) {
    (
        bbox.height().round().max(0.0) as usize,
        bbox.width().round().max(0.0) as usize,
    )
}

pub fn check_mask(bbox: &BBox<Ltwh>, mask: &Array2<bool>) -> Result<()> {
    let (rows, cols) = mask_shape(bbox);

    if mask.dim() != (rows, cols) {
        return Err(Error::MaskShape {
            rows: mask.nrows(),
            cols: mask.ncols(),
            width: cols,
            height: rows,
        });
    }

    Ok(())
}

impl<'a> Region<'a> {
    pub fn new(bbox: &'a BBox<Ltwh>, mask: Option<&'a Array2<bool>>) -> Self {
        Self {
            bbox,
            mask: mask.map(|m| m.view()),
        }
    }

    #[inline]
    fn origin(&self) -> (i64, i64) {
        (self.bbox.left().round() as i64, self.bbox.top().round() as i64)
    }

    /// Whether the pixel at absolute coordinates `(x, y)` is foreground.
    pub fn is_set(&self, x: i64, y: i64) -> bool {
        match &self.mask {
            Some(mask) => {
                let (ox, oy) = self.origin();
                let (col, row) = (x - ox, y - oy);

                if col < 0 || row < 0 {
                    return false;
                }

                mask.get((row as usize, col as usize)).copied().unwrap_or(false)
            }
            None => self
                .bbox
                .contains(nalgebra::Point2::new(x as f32 + 0.5, y as f32 + 0.5)),
        }
    }

    /// Foreground area in pixels.
    pub fn area(&self) -> f32 {
        match &self.mask {
            Some(mask) => mask.iter().filter(|&&v| v).count() as f32,
            None => self.bbox.area(),
        }
    }

    /// Perimeter estimated from the exposed pixel edges of the foreground,
    /// scaled by pi/4 to compensate for the staircase of a digitized contour.
    pub fn perimeter(&self) -> f32 {
        let edges = match &self.mask {
            Some(mask) => {
                let (rows, cols) = mask.dim();
                let at = |r: isize, c: isize| {
                    r >= 0
                        && c >= 0
                        && (r as usize) < rows
                        && (c as usize) < cols
                        && mask[(r as usize, c as usize)]
                };

                let mut edges = 0usize;
                for ((r, c), &v) in mask.indexed_iter() {
                    if !v {
                        continue;
                    }

                    let (r, c) = (r as isize, c as isize);
                    edges += [(r - 1, c), (r + 1, c), (r, c - 1), (r, c + 1)]
                        .iter()
                        .filter(|&&(nr, nc)| !at(nr, nc))
                        .count();
                }

                edges as f32
            }
            None if self.bbox.is_degenerate() => 0.0,
            None => 2.0 * (self.bbox.width() + self.bbox.height()),
        };

        edges * std::f32::consts::FRAC_PI_4
    }

    /// Foreground area counted in whole pixels: a pixel of an unmasked box
    /// belongs to it when its centre does.
    pub fn pixel_area(&self) -> f32 {
        match &self.mask {
            Some(_) => self.area(),
            None => {
                let span = |lo: f32, hi: f32| ((hi - 0.5).ceil() - (lo - 0.5).ceil()).max(0.0);
                span(self.bbox.left(), self.bbox.right()) * span(self.bbox.top(), self.bbox.bottom())
            }
        }
    }

    /// Foreground shared with `other` as a pixel-aligned box and its mask,
    /// `None` when no pixel is shared.
    pub fn shared(&self, other: &Region<'_>) -> Option<(BBox<Ltwh>, Array2<bool>)> {
        let inter = self.bbox.intersection(other.bbox)?;

        let x0 = inter.left().floor() as i64;
        let y0 = inter.top().floor() as i64;
        let x1 = inter.right().ceil() as i64;
        let y1 = inter.bottom().ceil() as i64;

        let mask = Array2::from_shape_fn(((y1 - y0) as usize, (x1 - x0) as usize), |(r, c)| {
            let (x, y) = (x0 + c as i64, y0 + r as i64);
            self.is_set(x, y) && other.is_set(x, y)
        });

        if !mask.iter().any(|&v| v) {
            return None;
        }

        let bbox = BBox::ltwh(x0 as f32, y0 as f32, (x1 - x0) as f32, (y1 - y0) as f32);
        Some((bbox, mask))
    }

    /// Counts foreground pixels shared with `other`. Two plain boxes are
    /// compared by rectangle area; as soon as one side has a mask both
    /// sides are counted in pixels.
    pub fn overlap(&self, other: &Region<'_>) -> Overlap {
        let by_pixel = self.mask.is_some() || other.mask.is_some();
        let (area_a, area_b) = if by_pixel {
            (self.pixel_area(), other.pixel_area())
        } else {
            (self.area(), other.area())
        };

        let inter = match self.bbox.intersection(other.bbox) {
            Some(inter) => inter,
            None => {
                return Overlap {
                    intersecting: 0.0,
                    area_a,
                    area_b,
                }
            }
        };

        let intersecting = if !by_pixel {
            inter.area()
        } else {
            let x0 = inter.left().floor() as i64;
            let y0 = inter.top().floor() as i64;
            let x1 = inter.right().ceil() as i64;
            let y1 = inter.bottom().ceil() as i64;

            let mut count = 0usize;
            for y in y0..y1 {
                for x in x0..x1 {
                    if self.is_set(x, y) && other.is_set(x, y) {
                        count += 1;
                    }
                }
            }

            count as f32
        };

        Overlap {
            intersecting,
            area_a,
            area_b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn box_without_mask_is_filled() {
        let bbox = BBox::ltwh(2.0, 2.0, 3.0, 2.0);
        let region = Region::new(&bbox, None);

        assert_eq!(region.area(), 6.0);
        assert!(region.is_set(2, 2));
        assert!(region.is_set(4, 3));
        assert!(!region.is_set(5, 3));
    }

    #[test]
    fn mask_pixels_are_anchored_at_box_corner() {
        let bbox = BBox::ltwh(10.0, 20.0, 2.0, 2.0);
        let mask = array![[true, false], [false, true]];
        let region = Region::new(&bbox, Some(&mask));

        assert_eq!(region.area(), 2.0);
        assert!(region.is_set(10, 20));
        assert!(!region.is_set(11, 20));
        assert!(region.is_set(11, 21));
        assert!(!region.is_set(9, 20));
    }

    #[test]
    fn overlap_counts_shared_mask_pixels() {
        let a_box = BBox::ltwh(0.0, 0.0, 3.0, 1.0);
        let a_mask = array![[true, true, true]];
        let b_box = BBox::ltwh(1.0, 0.0, 3.0, 1.0);
        let b_mask = array![[true, false, true]];

        let a = Region::new(&a_box, Some(&a_mask));
        let b = Region::new(&b_box, Some(&b_mask));
        let ov = a.overlap(&b);

        // shared columns 1 and 2; b only has column 1 set among them
        assert_eq!(ov.intersecting, 1.0);
        assert_eq!(ov.area_a, 3.0);
        assert_eq!(ov.area_b, 2.0);
    }

    #[test]
    fn fractional_box_against_mask_is_counted_in_pixels() {
        let mask_box = BBox::ltwh(0.0, 0.0, 2.0, 2.0);
        let mask = Array2::from_elem((2, 2), true);
        let fractional = BBox::ltwh(0.4, 0.0, 1.2, 2.0);

        let masked = Region::new(&mask_box, Some(&mask));
        let plain = Region::new(&fractional, None);
        let ov = plain.overlap(&masked);

        // both pixel centres of each row fall inside [0.4, 1.6)
        assert_eq!(ov.intersecting, 4.0);
        assert_eq!(ov.area_a, 4.0);
        assert_eq!(ov.area_b, 4.0);
        assert!(ov.intersecting <= ov.area_a.min(ov.area_b));
    }

    #[test]
    fn shared_region_is_pixel_aligned() {
        let a_box = BBox::ltwh(0.0, 0.0, 3.0, 1.0);
        let a_mask = array![[true, true, true]];
        let b_box = BBox::ltwh(1.0, 0.0, 3.0, 1.0);
        let b_mask = array![[true, false, true]];

        let a = Region::new(&a_box, Some(&a_mask));
        let b = Region::new(&b_box, Some(&b_mask));

        let (bbox, mask) = a.shared(&b).expect("one shared pixel");
        assert_eq!(bbox, BBox::ltwh(1.0, 0.0, 2.0, 1.0));
        assert_eq!(mask, array![[true, false]]);
        assert!(check_mask(&bbox, &mask).is_ok());

        let far = BBox::ltwh(10.0, 0.0, 1.0, 1.0);
        assert!(a.shared(&Region::new(&far, None)).is_none());
    }

    #[test]
    fn overlap_of_plain_boxes_uses_rect_area() {
        let a_box = BBox::ltwh(0.0, 0.0, 4.0, 4.0);
        let b_box = BBox::ltwh(2.0, 2.0, 4.0, 4.0);
        let ov = Region::new(&a_box, None).overlap(&Region::new(&b_box, None));

        assert_abs_diff_eq!(ov.intersecting, 4.0);
    }

    #[test]
    fn rejects_mismatched_mask() {
        let bbox = BBox::ltwh(0.0, 0.0, 3.0, 2.0);

        assert!(check_mask(&bbox, &Array2::from_elem((2, 3), true)).is_ok());
        assert_eq!(
            check_mask(&bbox, &Array2::from_elem((3, 3), true)),
            Err(Error::MaskShape {
                rows: 3,
                cols: 3,
                width: 3,
                height: 2
            })
        );
    }
}

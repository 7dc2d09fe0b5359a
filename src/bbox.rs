use serde_derive::{Deserialize, Serialize};
use std::marker::PhantomData;

use nalgebra as na;

pub trait BBoxFormat: std::fmt::Debug + Copy + PartialEq {}

/// Left-top-width-height format, contains left top corner and width-height
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ltwh;
impl BBoxFormat for Ltwh {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

/// X-y-width-height format, contains coordinates of the center of bbox and width-height
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Xywh;
impl BBoxFormat for Xywh {}

/// Axis-aligned box in pixel space. Serialized as a plain `[f32; 4]`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
#[serde(transparent, bound = "")]
pub struct BBox<F: BBoxFormat>([f32; 4], #[serde(skip)] PhantomData<F>);

impl BBox<Ltwh> {
    #[inline]
    pub fn ltwh(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], PhantomData)
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        self.0[3]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[0] + self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[1] + self.0[3]
    }

    #[inline]
    pub fn center(&self) -> na::Point2<f32> {
        let c = self.as_xywh();
        na::Point2::new(c.cx(), c.cy())
    }

    /// Area in square pixels; degenerate boxes have area 0.
    #[inline]
    pub fn area(&self) -> f32 {
        if self.is_degenerate() {
            0.0
        } else {
            self.0[2] * self.0[3]
        }
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        !(self.0[2] > 0.0 && self.0[3] > 0.0)
    }

    /// Half-open containment: the left/top edges belong to the box, the
    /// right/bottom edges do not.
    #[inline]
    pub fn contains(&self, p: na::Point2<f32>) -> bool {
        p.x >= self.left() && p.x < self.right() && p.y >= self.top() && p.y < self.bottom()
    }

    pub fn intersection(&self, other: &BBox<Ltwh>) -> Option<BBox<Ltwh>> {
        let inter = self.as_ltrb().intersection(&other.as_ltrb());

        if inter.is_empty() {
            None
        } else {
            Some(inter.as_ltwh())
        }
    }

    /// Smallest box covering both inputs.
    pub fn union(&self, other: &BBox<Ltwh>) -> BBox<Ltwh> {
        self.as_ltrb().union(&other.as_ltrb()).as_ltwh()
    }

    pub fn iou(&self, other: &BBox<Ltwh>) -> f32 {
        if self.is_degenerate() || other.is_degenerate() {
            return 0.0;
        }

        let inter = self.intersection(other).map(|b| b.area()).unwrap_or(0.0);
        let union = self.area() + other.area() - inter;

        if union > 0.0 {
            inter / union
        } else {
            0.0
        }
    }

    /// Same size, centre moved to `c`.
    #[inline]
    pub fn recentered(&self, c: na::Point2<f32>) -> BBox<Ltwh> {
        BBox::xywh(c.x, c.y, self.width(), self.height()).as_ltwh()
    }

    #[inline]
    pub fn as_ltrb(&self) -> BBox<Ltrb> {
        self.into()
    }

    #[inline]
    pub fn as_xywh(&self) -> BBox<Xywh> {
        self.into()
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], PhantomData)
    }

    #[inline]
    pub fn as_ltwh(&self) -> BBox<Ltwh> {
        self.into()
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    /// No positive-area overlap between left/right or top/bottom.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !(self.right() > self.left() && self.bottom() > self.top())
    }

    /// Corner-wise overlap; empty when the inputs do not overlap.
    pub fn intersection(&self, other: &BBox<Ltrb>) -> BBox<Ltrb> {
        BBox::ltrb(
            self.left().max(other.left()),
            self.top().max(other.top()),
            self.right().min(other.right()),
            self.bottom().min(other.bottom()),
        )
    }

    pub fn union(&self, other: &BBox<Ltrb>) -> BBox<Ltrb> {
        BBox::ltrb(
            self.left().min(other.left()),
            self.top().min(other.top()),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }
}

impl BBox<Xywh> {
    #[inline]
    pub fn xywh(x1: f32, x2: f32, x3: f32, x4: f32) -> Self {
        BBox([x1, x2, x3, x4], PhantomData)
    }

    #[inline(always)]
    pub fn as_ltwh(&self) -> BBox<Ltwh> {
        self.into()
    }

    #[inline(always)]
    pub fn cx(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn cy(&self) -> f32 {
        self.0[1]
    }
}

impl<'a> From<&'a BBox<Ltwh>> for BBox<Ltrb> {
    #[inline]
    fn from(v: &'a BBox<Ltwh>) -> Self {
        Self(
            [v.0[0], v.0[1], v.0[2] + v.0[0], v.0[3] + v.0[1]],
            PhantomData,
        )
    }
}

impl<'a> From<&'a BBox<Ltrb>> for BBox<Ltwh> {
    #[inline]
    fn from(v: &'a BBox<Ltrb>) -> Self {
        Self(
            [v.0[0], v.0[1], v.0[2] - v.0[0], v.0[3] - v.0[1]],
            PhantomData,
        )
    }
}

impl<'a> From<&'a BBox<Ltwh>> for BBox<Xywh> {
    #[inline]
    fn from(v: &'a BBox<Ltwh>) -> Self {
        Self(
            [v.0[0] + v.0[2] / 2.0, v.0[1] + v.0[3] / 2.0, v.0[2], v.0[3]],
            PhantomData,
        )
    }
}

impl<'a> From<&'a BBox<Xywh>> for BBox<Ltwh> {
    #[inline]
    fn from(v: &'a BBox<Xywh>) -> Self {
        Self(
            [v.0[0] - v.0[2] / 2.0, v.0[1] - v.0[3] / 2.0, v.0[2], v.0[3]],
            PhantomData,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = BBox::ltwh(3.0, 4.0, 10.0, 7.5);
        assert_abs_diff_eq!(a.iou(&a), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BBox::ltwh(0.0, 0.0, 10.0, 10.0);
        let b = BBox::ltwh(20.0, 20.0, 5.0, 5.0);
        assert_eq!(a.iou(&b), 0.0);

        // touching edges do not overlap
        let c = BBox::ltwh(10.0, 0.0, 10.0, 10.0);
        assert_eq!(a.iou(&c), 0.0);
    }

    #[test]
    fn iou_is_symmetric() {
        let a = BBox::ltwh(10.0, 10.0, 20.0, 20.0);
        let b = BBox::ltwh(12.0, 11.0, 20.0, 20.0);

        assert_abs_diff_eq!(a.iou(&b), b.iou(&a), epsilon = 1e-6);
        // 18 * 19 / (400 + 400 - 342)
        assert_abs_diff_eq!(a.iou(&b), 342.0 / 458.0, epsilon = 1e-5);
    }

    #[test]
    fn iou_of_degenerate_box_is_zero() {
        let a = BBox::ltwh(0.0, 0.0, 0.0, 10.0);
        let b = BBox::ltwh(0.0, 0.0, 10.0, 10.0);

        assert_eq!(a.iou(&a), 0.0);
        assert_eq!(a.iou(&b), 0.0);
        assert_eq!(b.iou(&a), 0.0);
    }

    #[test]
    fn containment_is_half_open() {
        let a = BBox::ltwh(0.0, 0.0, 10.0, 10.0);

        assert!(a.contains(na::Point2::new(0.0, 0.0)));
        assert!(a.contains(na::Point2::new(9.99, 5.0)));
        assert!(!a.contains(na::Point2::new(10.0, 5.0)));
        assert!(!a.contains(na::Point2::new(5.0, 10.0)));
    }

    #[test]
    fn union_covers_both() {
        let a = BBox::ltwh(0.0, 0.0, 4.0, 4.0);
        let b = BBox::ltwh(6.0, 2.0, 4.0, 4.0);

        assert_eq!(a.union(&b), BBox::ltwh(0.0, 0.0, 10.0, 6.0));
    }

    #[test]
    fn recentering_keeps_size() {
        let a = BBox::ltwh(2.0, 4.0, 6.0, 8.0);

        assert_eq!(a.center(), na::Point2::new(5.0, 8.0));
        assert_eq!(a.recentered(na::Point2::new(10.0, 10.0)), BBox::ltwh(7.0, 6.0, 6.0, 8.0));
        assert_eq!(a.recentered(a.center()), a);
    }

    #[test]
    fn corner_intersection_of_disjoint_boxes_is_empty() {
        let a = BBox::ltrb(0.0, 0.0, 4.0, 4.0);
        let b = BBox::ltrb(4.0, 1.0, 8.0, 3.0);

        assert!(a.intersection(&b).is_empty());
        assert_eq!(a.union(&b), BBox::ltrb(0.0, 0.0, 8.0, 4.0));

        let c = BBox::ltwh(1.0, 1.0, 2.0, 2.0);
        let d = BBox::ltwh(2.0, 2.0, 2.0, 2.0);
        assert_eq!(c.intersection(&d), Some(BBox::ltwh(2.0, 2.0, 1.0, 1.0)));
    }
}

use ndarray::Array2;
use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltwh};
use crate::error::Result;
use crate::mask::{self, Region};
use crate::object::ClassId;

/// One observed object of a single frame, as produced by a detector.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltwh>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<Array2<bool>>,
    #[serde(rename = "c")]
    pub class: ClassId,
    #[serde(rename = "p")]
    pub confidence: f32,
}

impl Detection {
    pub fn new(bbox: BBox<Ltwh>, class: ClassId, confidence: f32) -> Self {
        Self {
            bbox,
            mask: None,
            class,
            confidence,
        }
    }

    pub fn with_mask(
        bbox: BBox<Ltwh>,
        mask: Array2<bool>,
        class: ClassId,
        confidence: f32,
    ) -> Result<Self> {
        mask::check_mask(&bbox, &mask)?;

        Ok(Self {
            bbox,
            mask: Some(mask),
            class,
            confidence,
        })
    }

    #[inline]
    pub fn iou(&self, other: &Detection) -> f32 {
        self.bbox.iou(&other.bbox)
    }

    #[inline]
    pub fn region(&self) -> Region<'_> {
        Region::new(&self.bbox, self.mask.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_compact_form() {
        let det: Detection =
            serde_json::from_str(r#"{"bbox": [10, 10, 20, 20], "c": 2, "p": 0.75}"#)
                .expect("valid detection");

        assert_eq!(det.bbox, BBox::ltwh(10.0, 10.0, 20.0, 20.0));
        assert_eq!(det.class, ClassId(2));
        assert_eq!(det.confidence, 0.75);
        assert!(det.mask.is_none());
    }

    #[test]
    fn mask_must_match_box() {
        let bbox = BBox::ltwh(0.0, 0.0, 4.0, 2.0);

        assert!(Detection::with_mask(bbox, Array2::from_elem((2, 4), true), ClassId(0), 1.0).is_ok());
        assert!(Detection::with_mask(bbox, Array2::from_elem((4, 2), true), ClassId(0), 1.0).is_err());
    }
}

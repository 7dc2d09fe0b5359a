use serde_derive::{Deserialize, Serialize};

use crate::detection::Detection;
use crate::FrameIndex;

/// All detections of one time point.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: FrameIndex,
    pub detections: Vec<Detection>,
}

impl Frame {
    pub fn new(index: FrameIndex, detections: Vec<Detection>) -> Self {
        Self { index, detections }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.detections.len()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

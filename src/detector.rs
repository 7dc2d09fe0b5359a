//! Detection sources feeding the tracker and object lists.
//!
//! Thresholding and AI inference live outside this crate; all the tracker
//! needs from them is one capability: the detections of a given frame.

use std::collections::BTreeMap;
use std::fmt;

use crate::detection::Detection;
use crate::error::Result;
use crate::FrameIndex;

pub trait DetectionSource {
    fn detections(&mut self, frame: FrameIndex) -> Result<Vec<Detection>>;
}

impl<F> DetectionSource for F
where
    F: FnMut(FrameIndex) -> Result<Vec<Detection>>,
{
    #[inline]
    fn detections(&mut self, frame: FrameIndex) -> Result<Vec<Detection>> {
        self(frame)
    }
}

/// Detector selected by configuration.
pub enum Detector {
    /// Threshold/contour segmentation.
    Threshold(Box<dyn DetectionSource + Send>),
    /// Model inference.
    Model(Box<dyn DetectionSource + Send>),
    /// Detections computed up front; frames without an entry are empty.
    Recorded(BTreeMap<FrameIndex, Vec<Detection>>),
}

impl Detector {
    pub fn threshold<S: DetectionSource + Send + 'static>(source: S) -> Self {
        Detector::Threshold(Box::new(source))
    }

    pub fn model<S: DetectionSource + Send + 'static>(source: S) -> Self {
        Detector::Model(Box::new(source))
    }

    pub fn recorded<I: IntoIterator<Item = (FrameIndex, Vec<Detection>)>>(frames: I) -> Self {
        Detector::Recorded(frames.into_iter().collect())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Detector::Threshold(_) => "threshold",
            Detector::Model(_) => "model",
            Detector::Recorded(_) => "recorded",
        }
    }
}

impl fmt::Debug for Detector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Detector").field(&self.kind()).finish()
    }
}

impl DetectionSource for Detector {
    fn detections(&mut self, frame: FrameIndex) -> Result<Vec<Detection>> {
        match self {
            Detector::Threshold(src) | Detector::Model(src) => src.detections(frame),
            Detector::Recorded(frames) => Ok(frames.get(&frame).cloned().unwrap_or_default()),
        }
    }
}

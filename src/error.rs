use thiserror::Error;

use crate::object::ClassId;
use crate::FrameIndex;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("IoU threshold must be in (0, 1], got {0}")]
    InvalidIouThreshold(f32),

    #[error("minimum intersection must be in [0, 1], got {0}")]
    InvalidMinIntersection(f32),

    #[error("{name} noise must be finite and positive, got {value}")]
    InvalidNoise { name: &'static str, value: f32 },

    #[error("invalid validity filter: {0}")]
    InvalidFilter(String),

    #[error("negative frame index {0}")]
    NegativeFrameIndex(FrameIndex),

    #[error("frame {current} does not follow frame {previous}")]
    FrameOrder {
        previous: FrameIndex,
        current: FrameIndex,
    },

    #[error("class {0} is not configured")]
    UnknownClass(ClassId),

    #[error("mask of {rows}x{cols} pixels does not match a {width}x{height} box")]
    MaskShape {
        rows: usize,
        cols: usize,
        width: usize,
        height: usize,
    },

    #[error("detector error: {0}")]
    Detector(String),
}

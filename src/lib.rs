pub mod assignment;
pub mod bbox;
pub mod detection;
pub mod detector;
pub mod error;
pub mod frame;
pub mod kalman;
pub mod mask;
pub mod math;
pub mod object;
pub mod reclassify;
pub mod relation;
pub mod store;
pub mod timing;
pub mod tracker;
pub mod validity;

mod track;

pub use detection::Detection;
pub use error::{Error, Result};
pub use frame::Frame;
pub use object::{ChannelId, ClassId, MeasureKey, Measurements, Object, ObjectId};
pub use reclassify::{FilterLogic, HierarchyHandling, ReclassifyConfig, ReclassifyMode};
pub use relation::{Condition, Measure, OverlapReference, RelationConfig, RelationEvaluator};
pub use store::ObjectStore;
pub use track::{Track, TrackState};
pub use tracker::{Tracker, TrackerConfig};
pub use validity::{Validity, ValidityFilter};

use nalgebra as na;
use std::fmt;

/// Index of a frame (time point) in a sequence. Signed so that callers
/// feeding out-of-range indices get a labeled error instead of a wrap.
pub type FrameIndex = i64;

/// Identity of a track, unique within one `Tracker`.
pub type TrackId = u64;

pub trait Float:
    num_traits::FromPrimitive + na::RealField + Copy + fmt::Debug + PartialEq + 'static
{
}

impl<T> Float for T where
    T: num_traits::FromPrimitive + na::RealField + Copy + fmt::Debug + PartialEq + 'static
{
}

pub trait Tracking {
    fn update(&mut self, frame: FrameIndex, dets: &[Detection]);
    fn tracks(&self) -> Vec<Track>;
}

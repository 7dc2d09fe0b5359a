use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltwh};
use crate::object::ClassId;
use crate::TrackId;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Spawned this frame, not matched yet.
    Tentative,
    /// Matched at least once and seen in the latest frame.
    Confirmed,
    /// Missed at least the latest frame, still within `max_misses`.
    Lost,
}

/// Read-only view of an active track.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Track {
    pub track_id: TrackId,
    pub bbox: BBox<Ltwh>,
    pub missed: u32,
    pub hits: u32,
    pub state: TrackState,
    pub class: ClassId,
    pub confidence: f32,
}

use serde_derive::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

use crate::assignment;
use crate::bbox::{BBox, Ltwh};
use crate::detection::Detection;
use crate::detector::DetectionSource;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::kalman::KalmanFilter;
use crate::object::{ClassId, Object};
use crate::timing::{DurationCollector, StepTimer};
use crate::{FrameIndex, Track, TrackId, TrackState, Tracking};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// Minimum IoU for a track/detection pair to be matched, in (0, 1].
    pub iou_threshold: f32,
    /// A track is removed once it has missed more than this many frames.
    pub max_misses: u32,
    pub process_noise: f32,
    pub measurement_noise: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.3,
            max_misses: 5,
            process_noise: 1e-2,
            measurement_noise: 1e-1,
        }
    }
}

impl TrackerConfig {
    pub fn new(iou_threshold: f32, max_misses: u32) -> Self {
        Self {
            iou_threshold,
            max_misses,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
            return Err(Error::InvalidIouThreshold(self.iou_threshold));
        }

        for (name, value) in [
            ("process", self.process_noise),
            ("measurement", self.measurement_noise),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidNoise { name, value });
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
struct TrackedObject {
    id: TrackId,
    kf: KalmanFilter<f32>,
    bbox: BBox<Ltwh>,
    missed: u32,
    hits: u32,
    class: ClassId,
    confidence: f32,
}

impl TrackedObject {
    fn new(id: TrackId, det: &Detection, config: &TrackerConfig) -> Self {
        Self {
            id,
            kf: KalmanFilter::new(
                det.bbox.center(),
                config.process_noise,
                config.measurement_noise,
            ),
            bbox: det.bbox,
            missed: 0,
            hits: 0,
            class: det.class,
            confidence: det.confidence,
        }
    }

    fn predict(&mut self) {
        let center = self.kf.predict();
        self.bbox = self.bbox.recentered(center);
    }

    fn correct(&mut self, det: &Detection) {
        if !self.kf.correct(det.bbox.center()) {
            tracing::warn!(track = self.id, "singular innovation covariance, correction skipped");
        }

        self.bbox = det.bbox.recentered(self.kf.position());
        self.missed = 0;
        self.hits += 1;
        self.class = det.class;
        self.confidence = det.confidence;
    }

    fn state(&self) -> TrackState {
        if self.missed > 0 {
            TrackState::Lost
        } else if self.hits == 0 {
            TrackState::Tentative
        } else {
            TrackState::Confirmed
        }
    }
}

impl From<&TrackedObject> for Track {
    fn from(t: &TrackedObject) -> Track {
        Track {
            track_id: t.id,
            bbox: t.bbox,
            missed: t.missed,
            hits: t.hits,
            state: t.state(),
            class: t.class,
            confidence: t.confidence,
        }
    }
}

/// Multi-object tracker: Kalman motion model per track, greedy IoU
/// association between predicted tracks and the detections of a frame.
pub struct Tracker {
    config: TrackerConfig,
    tracks: Vec<TrackedObject>,
    next_id: TrackId,
    timing: Option<Arc<dyn DurationCollector>>,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            tracks: Vec::with_capacity(64),
            next_id: 1,
            timing: None,
        })
    }

    pub fn with_timing(mut self, collector: Arc<dyn DurationCollector>) -> Self {
        self.timing = Some(collector);
        self
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Runs one predict, associate, update, age, spawn, cleanup cycle.
    pub fn update(&mut self, frame: FrameIndex, detections: &[Detection]) {
        self.update_and_assign(frame, detections);
    }

    /// Same as `update`, returning the id of the track every detection was
    /// matched to or spawned, in detection order.
    pub fn update_and_assign(&mut self, frame: FrameIndex, detections: &[Detection]) -> Vec<TrackId> {
        let timing = self.timing.clone();
        let _timer = StepTimer::start(timing.as_deref(), "tracker.update");

        for track in &mut self.tracks {
            track.predict();
        }

        let track_boxes: Vec<_> = self.tracks.iter().map(|t| t.bbox).collect();
        let track_ids: Vec<_> = self.tracks.iter().map(|t| t.id).collect();
        let det_boxes: Vec<_> = detections.iter().map(|d| d.bbox).collect();

        let ious = assignment::iou_matrix(&track_boxes, &det_boxes);
        let assignment = assignment::greedy(&ious, &track_ids, self.config.iou_threshold);

        let mut assigned = vec![0; detections.len()];

        for &(ti, di, _) in &assignment.matches {
            let track = &mut self.tracks[ti];
            track.correct(&detections[di]);
            assigned[di] = track.id;
        }

        for &ti in &assignment.unmatched_rows {
            self.tracks[ti].missed += 1;
        }

        for &di in &assignment.unmatched_cols {
            let id = self.next_id;
            self.next_id += 1;

            tracing::debug!(frame, track = id, "track spawned");
            self.tracks
                .push(TrackedObject::new(id, &detections[di], &self.config));
            assigned[di] = id;
        }

        let max_misses = self.config.max_misses;
        self.tracks.retain(|t| {
            let keep = t.missed <= max_misses;
            if !keep {
                tracing::debug!(frame, track = t.id, missed = t.missed, "track removed");
            }
            keep
        });

        tracing::trace!(
            frame,
            matched = assignment.matches.len(),
            missed = assignment.unmatched_rows.len(),
            spawned = assignment.unmatched_cols.len(),
            active = self.tracks.len(),
            "tracker updated"
        );

        assigned
    }

    pub fn active_tracks(&self) -> Vec<Track> {
        self.tracks.iter().map(Into::into).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Feeds a whole pre-detected sequence frame by frame. Frame indices must
    /// be non-negative and strictly ascending; the sequence is checked before
    /// any frame is processed.
    pub fn run_tracker(&mut self, frames: &[Frame]) -> Result<Vec<Vec<TrackId>>> {
        check_frame_order(frames.iter().map(|f| f.index))?;

        Ok(frames
            .iter()
            .map(|f| self.update_and_assign(f.index, &f.detections))
            .collect())
    }

    /// Tracks objects across frames and stamps every object with the id of
    /// its track. Previous tracking ids are cleared first.
    pub fn track_objects(&mut self, frames: &mut [(FrameIndex, Vec<Object>)]) -> Result<()> {
        check_frame_order(frames.iter().map(|(index, _)| *index))?;

        for (_, objects) in frames.iter_mut() {
            for obj in objects.iter_mut() {
                obj.set_tracking_id(None);
            }
        }

        for (index, objects) in frames.iter_mut() {
            let detections: Vec<Detection> = objects.iter().map(Detection::from).collect();
            let ids = self.update_and_assign(*index, &detections);

            for (obj, id) in objects.iter_mut().zip(ids) {
                obj.set_tracking_id(Some(id));
            }
        }

        Ok(())
    }

    /// Pulls detections for every frame in `frames` from `source` and tracks
    /// them, returning each frame with the track ids of its detections. A
    /// source error stops the run; frames pulled before it stay tracked.
    pub fn track_source(
        &mut self,
        source: &mut dyn DetectionSource,
        frames: Range<FrameIndex>,
    ) -> Result<Vec<(Frame, Vec<TrackId>)>> {
        if frames.start < 0 {
            return Err(Error::NegativeFrameIndex(frames.start));
        }

        let mut out = Vec::with_capacity(frames.end.saturating_sub(frames.start).max(0) as usize);

        for index in frames {
            let detections = source.detections(index)?;
            let ids = self.update_and_assign(index, &detections);
            out.push((Frame::new(index, detections), ids));
        }

        Ok(out)
    }
}

impl Tracking for Tracker {
    #[inline]
    fn update(&mut self, frame: FrameIndex, dets: &[Detection]) {
        Tracker::update(self, frame, dets)
    }

    #[inline]
    fn tracks(&self) -> Vec<Track> {
        self.active_tracks()
    }
}

fn check_frame_order<I: IntoIterator<Item = FrameIndex>>(indices: I) -> Result<()> {
    let mut previous: Option<FrameIndex> = None;

    for current in indices {
        if current < 0 {
            return Err(Error::NegativeFrameIndex(current));
        }

        if let Some(previous) = previous {
            if current <= previous {
                return Err(Error::FrameOrder { previous, current });
            }
        }

        previous = Some(current);
    }

    Ok(())
}

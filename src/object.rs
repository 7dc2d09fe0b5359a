//! Analysis-time object records.
//!
//! An `Object` is what detectors hand over to the measurement steps: a
//! region, classification, optional parent link, validity flags and an
//! open-ended map of measurements keyed by `MeasureKey`.

use ndarray::{Array2, ArrayView2};
use num_traits::ToPrimitive;
use serde::ser::{Serialize, Serializer};
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::bbox::{BBox, Ltwh};
use crate::detection::Detection;
use crate::error::Result;
use crate::mask::{self, Region};
use crate::math;
use crate::validity::Validity;
use crate::TrackId;

static SEQ_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// Next process-wide unique id.
    pub fn next() -> Self {
        ObjectId(SEQ_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ClassId(pub u16);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ChannelId(pub u16);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntensityStat {
    Avg,
    Min,
    Max,
    Sum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelationKind {
    Distance,
    Intersection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stat {
    Min,
    Max,
    Avg,
    Count,
}

/// Key of one measurement. The `Display` form is the stable column name
/// used by reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MeasureKey {
    AreaSize,
    Perimeter,
    Circularity,
    Intensity {
        channel: ChannelId,
        stat: IntensityStat,
    },
    Relation {
        kind: RelationKind,
        to: ClassId,
        stat: Stat,
    },
}

impl fmt::Display for IntensityStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IntensityStat::Avg => "avg",
            IntensityStat::Min => "min",
            IntensityStat::Max => "max",
            IntensityStat::Sum => "sum",
        })
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stat::Min => "min",
            Stat::Max => "max",
            Stat::Avg => "avg",
            Stat::Count => "count",
        })
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelationKind::Distance => "distance",
            RelationKind::Intersection => "intersection",
        })
    }
}

impl fmt::Display for MeasureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasureKey::AreaSize => f.write_str("area"),
            MeasureKey::Perimeter => f.write_str("perimeter"),
            MeasureKey::Circularity => f.write_str("circularity"),
            MeasureKey::Intensity { channel, stat } => write!(f, "intensity.{}@ch:{}", stat, channel),
            MeasureKey::Relation { kind, to, stat } => write!(f, "{}.{}@class:{}", kind, stat, to),
        }
    }
}

/// Measurement map; a key written twice keeps the last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Measurements(BTreeMap<MeasureKey, f64>);

impl Measurements {
    #[inline]
    pub fn insert(&mut self, key: MeasureKey, value: f64) -> Option<f64> {
        self.0.insert(key, value)
    }

    #[inline]
    pub fn get(&self, key: MeasureKey) -> Option<f64> {
        self.0.get(&key).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&MeasureKey, &f64)> {
        self.0.iter()
    }
}

impl Serialize for Measurements {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k.to_string(), v)))
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct Object {
    id: ObjectId,
    class: ClassId,
    confidence: f32,
    bbox: BBox<Ltwh>,
    #[serde(skip)]
    mask: Option<Array2<bool>>,
    parent: Option<ObjectId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    linked: Vec<ObjectId>,
    tracking_id: Option<TrackId>,
    validity: Validity,
    measurements: Measurements,
}

impl Object {
    /// Creates an object with a fresh id whose region is the whole box.
    pub fn new(class: ClassId, confidence: f32, bbox: BBox<Ltwh>) -> Self {
        Self::build(ObjectId::next(), class, confidence, bbox, None)
    }

    pub fn with_mask(
        class: ClassId,
        confidence: f32,
        bbox: BBox<Ltwh>,
        mask: Array2<bool>,
    ) -> Result<Self> {
        mask::check_mask(&bbox, &mask)?;

        Ok(Self::build(ObjectId::next(), class, confidence, bbox, Some(mask)))
    }

    /// Replaces the generated id, for callers that own their id space.
    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = id;
        self
    }

    pub fn with_parent(mut self, parent: ObjectId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Links this object to the objects it was derived from.
    pub fn with_links<I: IntoIterator<Item = ObjectId>>(mut self, links: I) -> Self {
        for id in links {
            if !self.linked.contains(&id) {
                self.linked.push(id);
            }
        }
        self
    }

    /// The same object, id kept, filed under `class` with `parent`.
    pub fn move_to(mut self, class: ClassId, parent: Option<ObjectId>) -> Self {
        self.class = class;
        self.parent = parent;
        self
    }

    /// A copy with a fresh id filed under `class` with `parent`; the copy is
    /// linked to its source.
    pub fn copy_to(&self, class: ClassId, parent: Option<ObjectId>) -> Self {
        let mut copy = self.clone().move_to(class, parent).with_links([self.id]);
        copy.id = ObjectId::next();
        copy
    }

    fn build(
        id: ObjectId,
        class: ClassId,
        confidence: f32,
        bbox: BBox<Ltwh>,
        mask: Option<Array2<bool>>,
    ) -> Self {
        let mut obj = Self {
            id,
            class,
            confidence,
            bbox,
            mask,
            parent: None,
            linked: Vec::new(),
            tracking_id: None,
            validity: Validity::UNKNOWN,
            measurements: Measurements::default(),
        };

        let region = obj.region();
        let area = region.area();
        let perimeter = region.perimeter();
        let circularity = math::circularity(area, perimeter);

        obj.measurements.insert(MeasureKey::AreaSize, area as f64);
        obj.measurements.insert(MeasureKey::Perimeter, perimeter as f64);
        obj.measurements.insert(MeasureKey::Circularity, circularity as f64);
        obj
    }

    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[inline]
    pub fn class(&self) -> ClassId {
        self.class
    }

    #[inline]
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    #[inline]
    pub fn bbox(&self) -> &BBox<Ltwh> {
        &self.bbox
    }

    #[inline]
    pub fn mask(&self) -> Option<&Array2<bool>> {
        self.mask.as_ref()
    }

    #[inline]
    pub fn region(&self) -> Region<'_> {
        Region::new(&self.bbox, self.mask.as_ref())
    }

    #[inline]
    pub fn centroid(&self) -> nalgebra::Point2<f32> {
        self.bbox.center()
    }

    #[inline]
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    #[inline]
    pub fn set_parent(&mut self, parent: ObjectId) {
        self.parent = Some(parent);
    }

    #[inline]
    pub fn linked(&self) -> &[ObjectId] {
        &self.linked
    }

    #[inline]
    pub fn tracking_id(&self) -> Option<TrackId> {
        self.tracking_id
    }

    #[inline]
    pub fn set_tracking_id(&mut self, id: Option<TrackId>) {
        self.tracking_id = id;
    }

    #[inline]
    pub fn validity(&self) -> Validity {
        self.validity
    }

    /// ORs `flags` into the validity; flags are never cleared.
    #[inline]
    pub fn add_validity(&mut self, flags: Validity) {
        self.validity = self.validity.with(flags);
    }

    #[inline]
    pub fn mark_reference_spot(&mut self) {
        self.add_validity(Validity::REFERENCE_SPOT);
    }

    #[inline]
    pub fn measurements(&self) -> &Measurements {
        &self.measurements
    }

    #[inline]
    pub fn measurements_mut(&mut self) -> &mut Measurements {
        &mut self.measurements
    }

    #[inline]
    pub fn measurement(&self, key: MeasureKey) -> Option<f64> {
        self.measurements.get(key)
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.measurement(MeasureKey::AreaSize).unwrap_or(0.0)
    }

    #[inline]
    pub fn circularity(&self) -> f64 {
        self.measurement(MeasureKey::Circularity).unwrap_or(0.0)
    }

    /// Samples `plane` (rows = y, cols = x) inside the object's region and
    /// records avg/min/max/sum for `channel`. Pixels outside the plane are
    /// ignored; an object without any sampled pixel records zeros.
    pub fn measure_intensity<P>(&mut self, channel: ChannelId, plane: ArrayView2<'_, P>) -> [f64; 4]
    where
        P: ToPrimitive + Copy,
    {
        let (rows, cols) = plane.dim();
        let region = self.region();

        let x0 = self.bbox.left().floor().max(0.0) as usize;
        let y0 = self.bbox.top().floor().max(0.0) as usize;
        let x1 = (self.bbox.right().ceil().max(0.0) as usize).min(cols);
        let y1 = (self.bbox.bottom().ceil().max(0.0) as usize).min(rows);

        let mut count = 0usize;
        let mut sum = 0.0f64;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for y in y0..y1 {
            for x in x0..x1 {
                if !region.is_set(x as i64, y as i64) {
                    continue;
                }

                let v = plane[(y, x)].to_f64().unwrap_or(0.0);
                count += 1;
                sum += v;
                min = min.min(v);
                max = max.max(v);
            }
        }

        let stats = if count > 0 {
            [sum / count as f64, min, max, sum]
        } else {
            [0.0; 4]
        };

        let key = |stat| MeasureKey::Intensity { channel, stat };
        self.measurements.insert(key(IntensityStat::Avg), stats[0]);
        self.measurements.insert(key(IntensityStat::Min), stats[1]);
        self.measurements.insert(key(IntensityStat::Max), stats[2]);
        self.measurements.insert(key(IntensityStat::Sum), stats[3]);

        stats
    }
}

impl From<&Detection> for Object {
    fn from(det: &Detection) -> Self {
        Self::build(
            ObjectId::next(),
            det.class,
            det.confidence,
            det.bbox,
            det.mask.clone(),
        )
    }
}

impl From<&Object> for Detection {
    fn from(obj: &Object) -> Self {
        Detection {
            bbox: obj.bbox,
            mask: obj.mask.clone(),
            class: obj.class,
            confidence: obj.confidence,
        }
    }
}

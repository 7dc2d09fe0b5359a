//! Pairwise relationships between two object collections.
//!
//! An evaluator walks the cross product of a "from" and a "to" collection,
//! keeps the pairs its `Condition` accepts and attaches a measurement to
//! the "from" side. A "from" object without any accepted partner is
//! visited once with `None` so callers can record an empty result.

use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::math;
use crate::object::{ClassId, Object, ObjectId, RelationKind};
use crate::timing::{DurationCollector, StepTimer};
use crate::validity::Validity;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Condition {
    /// Every pair.
    All,
    /// Pairs sharing foreground pixels with an overlap fraction of at least
    /// `min_intersection`.
    Intersecting,
    /// Pairs whose objects carry the same, set, parent id.
    SameParentId,
    /// Pairs where "to" is the parent of "from".
    IsToParentOf,
}

/// Denominator of the overlap fraction.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverlapReference {
    From,
    To,
    Union,
    Smaller,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RelationConfig {
    pub condition: Condition,
    pub min_intersection: f32,
    pub reference: OverlapReference,
}

impl Default for RelationConfig {
    fn default() -> Self {
        Self {
            condition: Condition::All,
            min_intersection: 0.1,
            reference: OverlapReference::Smaller,
        }
    }
}

impl RelationConfig {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_intersection) {
            return Err(Error::InvalidMinIntersection(self.min_intersection));
        }

        Ok(())
    }
}

/// What to attach to the "from" objects.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Measure {
    /// Centroid-to-centroid distance statistics.
    Distance,
    /// Overlap fraction statistics.
    Intersection,
    /// Parent = related object with the largest overlap.
    AssignParent,
    /// `LOW_OVERLAP` flag on objects without any related object; objects
    /// with a related object are recorded as passing.
    FlagLowOverlap,
}

impl Measure {
    fn step(self) -> &'static str {
        match self {
            Measure::Distance => "relation.distance",
            Measure::Intersection => "relation.intersection",
            Measure::AssignParent => "relation.assign_parent",
            Measure::FlagLowOverlap => "relation.flag_low_overlap",
        }
    }
}

pub struct RelationEvaluator {
    config: RelationConfig,
    timing: Option<Arc<dyn DurationCollector>>,
}

impl RelationEvaluator {
    pub fn new(config: RelationConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            timing: None,
        })
    }

    pub fn with_timing(mut self, collector: Arc<dyn DurationCollector>) -> Self {
        self.timing = Some(collector);
        self
    }

    #[inline]
    pub fn config(&self) -> &RelationConfig {
        &self.config
    }

    /// Shared foreground pixels relative to the configured reference area,
    /// in [0, 1]. Zero when the reference area is empty.
    pub fn overlap_fraction(&self, from: &Object, to: &Object) -> f32 {
        let ov = from.region().overlap(&to.region());

        let reference = match self.config.reference {
            OverlapReference::From => ov.area_a,
            OverlapReference::To => ov.area_b,
            OverlapReference::Union => ov.area_a + ov.area_b - ov.intersecting,
            OverlapReference::Smaller => ov.area_a.min(ov.area_b),
        };

        if reference > 0.0 {
            (ov.intersecting / reference).min(1.0)
        } else {
            0.0
        }
    }

    pub fn is_related(&self, from: &Object, to: &Object) -> bool {
        match self.config.condition {
            Condition::All => true,
            Condition::Intersecting => {
                let fraction = self.overlap_fraction(from, to);
                fraction > 0.0 && fraction >= self.config.min_intersection
            }
            Condition::SameParentId => from.parent().is_some() && from.parent() == to.parent(),
            Condition::IsToParentOf => from.parent() == Some(to.id()),
        }
    }

    /// Calls `visit` for every accepted pair, and once with `None` for every
    /// "from" object that has no accepted partner. Returns the number of
    /// calls made.
    pub fn for_each_pair<F>(&self, from: &mut [Object], to: &[Object], visit: F) -> usize
    where
        F: FnMut(&mut Object, Option<&Object>),
    {
        self.visit_pairs(from, to, false, visit)
    }

    /// Self-relationship over one collection; an object is never paired
    /// with itself.
    pub fn for_each_pair_within<F>(&self, objects: &mut [Object], visit: F) -> usize
    where
        F: FnMut(&mut Object, Option<&Object>),
    {
        let snapshot = objects.to_vec();
        self.visit_pairs(objects, &snapshot, true, visit)
    }

    fn visit_pairs<F>(&self, from: &mut [Object], to: &[Object], skip_same: bool, mut visit: F) -> usize
    where
        F: FnMut(&mut Object, Option<&Object>),
    {
        let mut calls = 0;

        for f in from.iter_mut() {
            let mut found = false;

            for t in to {
                if skip_same && t.id() == f.id() {
                    continue;
                }

                if !self.is_related(f, t) {
                    continue;
                }

                found = true;
                calls += 1;
                visit(&mut *f, Some(t));
            }

            if !found {
                calls += 1;
                visit(f, None);
            }
        }

        calls
    }

    /// Attaches `measure` to every object of `from`, relating it to `to`.
    /// `to_class` names the "to" collection in the measurement keys.
    pub fn apply(&self, measure: Measure, from: &mut [Object], to: &[Object], to_class: ClassId) -> usize {
        let _timer = StepTimer::start(self.timing.as_deref(), measure.step());

        self.run(measure, from, Some(to), to_class)
    }

    /// Like `apply` with both sides being `objects`.
    pub fn apply_within(&self, measure: Measure, objects: &mut [Object], to_class: ClassId) -> usize {
        let _timer = StepTimer::start(self.timing.as_deref(), measure.step());

        self.run(measure, objects, None, to_class)
    }

    fn run(&self, measure: Measure, from: &mut [Object], to: Option<&[Object]>, to_class: ClassId) -> usize {
        let pairs = |from: &mut [Object], visit: &mut dyn FnMut(&mut Object, Option<&Object>)| match to {
            Some(to) => self.for_each_pair(from, to, visit),
            None => self.for_each_pair_within(from, visit),
        };

        match measure {
            Measure::Distance => pairs(&mut *from, &mut |f: &mut Object, t: Option<&Object>| match t {
                Some(t) => {
                    let d = math::centroid_distance(f.centroid(), t.centroid());
                    math::accumulate(f.measurements_mut(), RelationKind::Distance, to_class, d as f64);
                }
                None => math::accumulate_none(f.measurements_mut(), RelationKind::Distance, to_class),
            }),

            Measure::Intersection => pairs(&mut *from, &mut |f: &mut Object, t: Option<&Object>| match t {
                Some(t) => {
                    let fraction = self.overlap_fraction(f, t);
                    math::accumulate(
                        f.measurements_mut(),
                        RelationKind::Intersection,
                        to_class,
                        fraction as f64,
                    );
                }
                None => math::accumulate_none(f.measurements_mut(), RelationKind::Intersection, to_class),
            }),

            Measure::AssignParent => {
                let mut best: BTreeMap<ObjectId, (f32, ObjectId)> = BTreeMap::new();

                let calls = pairs(&mut *from, &mut |f: &mut Object, t: Option<&Object>| {
                    let t = match t {
                        Some(t) => t,
                        None => return,
                    };

                    let fraction = self.overlap_fraction(f, t);
                    let entry = best.entry(f.id()).or_insert((fraction, t.id()));

                    if fraction > entry.0 || (fraction == entry.0 && t.id() < entry.1) {
                        *entry = (fraction, t.id());
                    }
                });

                for obj in from.iter_mut() {
                    if let Some(&(_, parent)) = best.get(&obj.id()) {
                        obj.set_parent(parent);
                    }
                }

                tracing::debug!(
                    objects = from.len(),
                    assigned = best.len(),
                    to = %to_class,
                    "parents assigned"
                );

                calls
            }

            Measure::FlagLowOverlap => pairs(from, &mut |f: &mut Object, t: Option<&Object>| match t {
                Some(_) => f.add_validity(Validity::VALID),
                None => f.add_validity(Validity::LOW_OVERLAP),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::object::{MeasureKey, Stat};
    use approx::assert_abs_diff_eq;

    fn obj(class: u16, l: f32, t: f32, w: f32, h: f32) -> Object {
        Object::new(ClassId(class), 1.0, BBox::ltwh(l, t, w, h))
    }

    fn evaluator(condition: Condition) -> RelationEvaluator {
        RelationEvaluator::new(RelationConfig::new(condition)).expect("valid config")
    }

    #[test]
    fn rejects_out_of_range_min_intersection() {
        let config = RelationConfig {
            min_intersection: 1.5,
            ..Default::default()
        };

        assert_eq!(
            RelationEvaluator::new(config).err().map(|e| e.to_string()),
            Some("minimum intersection must be in [0, 1], got 1.5".to_string())
        );
    }

    #[test]
    fn all_visits_full_cross_product() {
        let mut from: Vec<_> = (0..3).map(|i| obj(0, i as f32 * 10.0, 0.0, 5.0, 5.0)).collect();
        let to: Vec<_> = (0..4).map(|i| obj(1, i as f32 * 10.0, 50.0, 5.0, 5.0)).collect();

        let mut pairs = 0;
        let calls = evaluator(Condition::All).for_each_pair(&mut from, &to, |_, t| {
            assert!(t.is_some());
            pairs += 1;
        });

        assert_eq!(calls, 12);
        assert_eq!(pairs, 12);
    }

    #[test]
    fn empty_to_visits_each_from_once_with_none() {
        let mut from = vec![obj(0, 0.0, 0.0, 5.0, 5.0), obj(0, 10.0, 0.0, 5.0, 5.0)];

        let mut nones = 0;
        let calls = evaluator(Condition::All).for_each_pair(&mut from, &[], |_, t| {
            assert!(t.is_none());
            nones += 1;
        });

        assert_eq!((calls, nones), (2, 2));
    }

    #[test]
    fn overlap_reference_selects_denominator() {
        let small = obj(0, 0.0, 0.0, 2.0, 2.0);
        let big = obj(1, 0.0, 0.0, 4.0, 4.0);

        let fraction = |reference| {
            let config = RelationConfig {
                reference,
                ..Default::default()
            };
            RelationEvaluator::new(config)
                .expect("valid config")
                .overlap_fraction(&small, &big)
        };

        assert_abs_diff_eq!(fraction(OverlapReference::From), 1.0);
        assert_abs_diff_eq!(fraction(OverlapReference::To), 0.25);
        assert_abs_diff_eq!(fraction(OverlapReference::Union), 0.25);
        assert_abs_diff_eq!(fraction(OverlapReference::Smaller), 1.0);
    }

    #[test]
    fn intersecting_respects_threshold() {
        let config = RelationConfig {
            condition: Condition::Intersecting,
            min_intersection: 0.5,
            reference: OverlapReference::From,
        };
        let ev = RelationEvaluator::new(config).expect("valid config");

        let a = obj(0, 0.0, 0.0, 10.0, 10.0);
        assert!(ev.is_related(&a, &obj(1, 5.0, 0.0, 10.0, 10.0)));
        assert!(!ev.is_related(&a, &obj(1, 6.0, 0.0, 10.0, 10.0)));
        assert!(!ev.is_related(&a, &obj(1, 50.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn parent_conditions() {
        let parent = obj(1, 0.0, 0.0, 10.0, 10.0);
        let child = obj(0, 2.0, 2.0, 2.0, 2.0).with_parent(parent.id());
        let sibling = obj(0, 5.0, 5.0, 2.0, 2.0).with_parent(parent.id());
        let orphan = obj(0, 7.0, 7.0, 2.0, 2.0);

        let same = evaluator(Condition::SameParentId);
        assert!(same.is_related(&child, &sibling));
        assert!(!same.is_related(&child, &orphan));
        assert!(!same.is_related(&orphan, &orphan));

        let to_parent = evaluator(Condition::IsToParentOf);
        assert!(to_parent.is_related(&child, &parent));
        assert!(!to_parent.is_related(&parent, &child));
    }

    #[test]
    fn same_parent_pairs_only_siblings() {
        let p = ObjectId(9_000_001);
        let q = ObjectId(9_000_002);
        let mut objects = vec![
            obj(0, 0.0, 0.0, 2.0, 2.0).with_parent(p),
            obj(0, 5.0, 0.0, 2.0, 2.0).with_parent(p),
            obj(0, 9.0, 0.0, 2.0, 2.0).with_parent(q),
        ];
        let ids: Vec<_> = objects.iter().map(|o| o.id()).collect();

        let mut pairs = Vec::new();
        let mut unrelated = Vec::new();
        evaluator(Condition::SameParentId).for_each_pair_within(&mut objects, |f, t| match t {
            Some(t) => pairs.push((f.id(), t.id())),
            None => unrelated.push(f.id()),
        });

        assert_eq!(pairs, vec![(ids[0], ids[1]), (ids[1], ids[0])]);
        assert_eq!(unrelated, vec![ids[2]]);
    }

    #[test]
    fn to_parent_walk_visits_only_the_parent() {
        let cells = vec![obj(1, 0.0, 0.0, 10.0, 10.0), obj(1, 20.0, 0.0, 10.0, 10.0)];
        let mut spots = vec![
            obj(0, 22.0, 2.0, 2.0, 2.0).with_parent(cells[1].id()),
            obj(0, 2.0, 2.0, 2.0, 2.0),
        ];

        let mut seen = Vec::new();
        let calls = evaluator(Condition::IsToParentOf).for_each_pair(&mut spots, &cells, |f, t| {
            seen.push((f.id(), t.map(|t| t.id())));
        });

        assert_eq!(calls, 2);
        assert_eq!(seen, vec![(spots[0].id(), Some(cells[1].id())), (spots[1].id(), None)]);
    }

    #[test]
    fn distance_accumulates_per_to_class() {
        let mut from = vec![obj(0, 0.0, 0.0, 2.0, 2.0)];
        let near = vec![obj(1, 3.0, 4.0, 2.0, 2.0), obj(1, 6.0, 8.0, 2.0, 2.0)];
        let far = vec![obj(2, 30.0, 40.0, 2.0, 2.0)];

        let ev = evaluator(Condition::All);
        ev.apply(Measure::Distance, &mut from, &near, ClassId(1));
        ev.apply(Measure::Distance, &mut from, &far, ClassId(2));
        ev.apply(Measure::Distance, &mut from, &[], ClassId(3));

        let m = from[0].measurements();
        let key = |to, stat| MeasureKey::Relation {
            kind: RelationKind::Distance,
            to: ClassId(to),
            stat,
        };

        assert_abs_diff_eq!(m.get(key(1, Stat::Min)).unwrap_or_default(), 5.0, epsilon = 1e-5);
        assert_abs_diff_eq!(m.get(key(1, Stat::Max)).unwrap_or_default(), 10.0, epsilon = 1e-5);
        assert_abs_diff_eq!(m.get(key(1, Stat::Avg)).unwrap_or_default(), 7.5, epsilon = 1e-5);
        assert_abs_diff_eq!(m.get(key(2, Stat::Min)).unwrap_or_default(), 50.0, epsilon = 1e-4);
        assert_eq!(m.get(key(3, Stat::Count)), Some(0.0));
        assert_eq!(m.get(key(3, Stat::Min)), None);
    }

    #[test]
    fn assign_parent_picks_largest_overlap() {
        let config = RelationConfig {
            condition: Condition::Intersecting,
            min_intersection: 0.0,
            reference: OverlapReference::From,
        };
        let ev = RelationEvaluator::new(config).expect("valid config");

        let mut spots = vec![obj(0, 8.0, 0.0, 4.0, 4.0), obj(0, 100.0, 100.0, 2.0, 2.0)];
        let cells = vec![obj(1, 0.0, 0.0, 10.0, 10.0), obj(1, 9.0, 0.0, 10.0, 10.0)];

        ev.apply(Measure::AssignParent, &mut spots, &cells, ClassId(1));

        // 3 of 4 columns in the second cell
        assert_eq!(spots[0].parent(), Some(cells[1].id()));
        assert_eq!(spots[1].parent(), None);
    }

    #[test]
    fn flags_objects_without_overlap() {
        let config = RelationConfig {
            condition: Condition::Intersecting,
            min_intersection: 0.5,
            reference: OverlapReference::From,
        };
        let ev = RelationEvaluator::new(config).expect("valid config");

        let mut spots = vec![obj(0, 0.0, 0.0, 2.0, 2.0), obj(0, 50.0, 50.0, 2.0, 2.0)];
        let cells = vec![obj(1, 0.0, 0.0, 10.0, 10.0)];

        ev.apply(Measure::FlagLowOverlap, &mut spots, &cells, ClassId(1));

        assert_eq!(spots[0].validity(), Validity::VALID);
        assert_eq!(spots[0].validity().to_string(), "valid");
        assert_eq!(spots[1].validity(), Validity::LOW_OVERLAP);
    }
}

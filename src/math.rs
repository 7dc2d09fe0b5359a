use nalgebra as na;

use crate::object::{ClassId, MeasureKey, Measurements, RelationKind, Stat};

#[inline]
pub fn centroid_distance(a: na::Point2<f32>, b: na::Point2<f32>) -> f32 {
    na::distance(&a, &b)
}

/// `4*pi*A / P^2`, clamped to 1 for shapes whose digitized perimeter
/// underestimates a perfect circle.
pub fn circularity(area: f32, perimeter: f32) -> f32 {
    let dividend = 4.0 * std::f32::consts::PI * area;
    let perimeter_sq = perimeter * perimeter;

    if dividend < perimeter_sq {
        dividend / perimeter_sq
    } else if area > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Folds `value` into the min/max/avg/count entries of one relation.
pub fn accumulate(m: &mut Measurements, kind: RelationKind, to: ClassId, value: f64) {
    let key = |stat| MeasureKey::Relation { kind, to, stat };

    let count = m.get(key(Stat::Count)).unwrap_or(0.0) + 1.0;
    let avg = m.get(key(Stat::Avg)).unwrap_or(0.0);
    let min = m.get(key(Stat::Min)).map_or(value, |v| v.min(value));
    let max = m.get(key(Stat::Max)).map_or(value, |v| v.max(value));

    m.insert(key(Stat::Count), count);
    m.insert(key(Stat::Avg), avg + (value - avg) / count);
    m.insert(key(Stat::Min), min);
    m.insert(key(Stat::Max), max);
}

/// Records that a relation was evaluated without finding a partner.
pub fn accumulate_none(m: &mut Measurements, kind: RelationKind, to: ClassId) {
    let key = MeasureKey::Relation {
        kind,
        to,
        stat: Stat::Count,
    };

    if m.get(key).is_none() {
        m.insert(key, 0.0);
    }
}

//! Object validity flags.
//!
//! Each filter that rejects an object sets its own bit; bits are combined
//! with OR and never cleared. `Validity::UNKNOWN` marks an object that has
//! not been through any filter yet.

use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use crate::error::{Error, Result};
use crate::object::Object;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct Validity(u32);

const LABELS: [(Validity, &str); 6] = [
    (Validity::TOO_SMALL, "size(small)"),
    (Validity::TOO_BIG, "size(big)"),
    (Validity::LOW_CIRCULARITY, "circ."),
    (Validity::LOW_OVERLAP, "intersect too small"),
    (Validity::AT_THE_EDGE, "edge"),
    (Validity::REFERENCE_SPOT, "ref spot."),
];

impl Validity {
    pub const VALID: Validity = Validity(0);
    pub const TOO_SMALL: Validity = Validity(0x01);
    pub const TOO_BIG: Validity = Validity(0x02);
    pub const LOW_CIRCULARITY: Validity = Validity(0x04);
    pub const LOW_OVERLAP: Validity = Validity(0x08);
    pub const AT_THE_EDGE: Validity = Validity(0x10);
    pub const REFERENCE_SPOT: Validity = Validity(0x20);
    pub const UNKNOWN: Validity = Validity(0x8000_0000);

    pub const SEPARATOR: &'static str = " & ";

    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_bits(bits: u32) -> Self {
        Validity(bits)
    }

    #[inline]
    pub fn is_unknown(self) -> bool {
        self == Self::UNKNOWN
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self == Self::VALID
    }

    #[inline]
    pub fn contains(self, flags: Validity) -> bool {
        self.0 & flags.0 == flags.0
    }

    /// ORs `flags` in. The unknown marker is dropped as soon as any
    /// outcome is recorded.
    #[inline]
    pub fn with(self, flags: Validity) -> Validity {
        Validity((self.0 & !Self::UNKNOWN.0) | flags.0)
    }
}

impl Default for Validity {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl BitOr for Validity {
    type Output = Validity;

    #[inline]
    fn bitor(self, rhs: Validity) -> Validity {
        self.with(rhs)
    }
}

impl BitOrAssign for Validity {
    #[inline]
    fn bitor_assign(&mut self, rhs: Validity) {
        *self = self.with(rhs);
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            return f.write_str("-");
        }

        if self.is_valid() {
            return f.write_str("valid");
        }

        let mut first = true;
        for (flag, label) in LABELS.iter() {
            if !self.contains(*flag) {
                continue;
            }

            if !first {
                f.write_str(Self::SEPARATOR)?;
            }

            f.write_str(label)?;
            first = false;
        }

        Ok(())
    }
}

/// Acceptance filter over the shape measurements and box of an object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidityFilter {
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub min_circularity: Option<f64>,
    pub exclude_edge: bool,
    pub image_width: f32,
    pub image_height: f32,
}

impl ValidityFilter {
    pub fn validate(&self) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min_area, self.max_area) {
            if min > max {
                return Err(Error::InvalidFilter(format!(
                    "minArea {} exceeds maxArea {}",
                    min, max
                )));
            }
        }

        if let Some(c) = self.min_circularity {
            if !(0.0..=1.0).contains(&c) {
                return Err(Error::InvalidFilter(format!(
                    "minCircularity {} is outside [0, 1]",
                    c
                )));
            }
        }

        if self.exclude_edge && !(self.image_width > 0.0 && self.image_height > 0.0) {
            return Err(Error::InvalidFilter(
                "excludeEdge needs a positive image size".to_string(),
            ));
        }

        Ok(())
    }

    pub fn evaluate(&self, obj: &Object) -> Validity {
        let mut flags = Validity::VALID;
        let area = obj.area();

        if self.min_area.map_or(false, |min| area < min) {
            flags |= Validity::TOO_SMALL;
        }

        if self.max_area.map_or(false, |max| area > max) {
            flags |= Validity::TOO_BIG;
        }

        if self.min_circularity.map_or(false, |min| obj.circularity() < min) {
            flags |= Validity::LOW_CIRCULARITY;
        }

        if self.exclude_edge {
            let b = obj.bbox();

            if b.left() <= 0.0
                || b.top() <= 0.0
                || b.right() >= self.image_width
                || b.bottom() >= self.image_height
            {
                flags |= Validity::AT_THE_EDGE;
            }
        }

        flags
    }

    /// Evaluates every object and ORs the outcome into its validity.
    /// Returns how many objects picked up at least one flag. An invalid
    /// filter is rejected before any object is touched.
    pub fn apply(&self, objects: &mut [Object]) -> Result<usize> {
        self.validate()?;

        let mut rejected = 0;

        for obj in objects.iter_mut() {
            let flags = self.evaluate(obj);

            if !flags.is_valid() {
                rejected += 1;
            }

            obj.add_validity(flags);
        }

        tracing::debug!(total = objects.len(), rejected, "validity filter applied");
        Ok(rejected)
    }
}

//! Settings for moving or copying objects into another class depending on
//! whether they are related to a second class.

use serde_derive::{Deserialize, Serialize};

use crate::error::Result;
use crate::object::{ClassId, ObjectId};
use crate::validity::ValidityFilter;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReclassifyMode {
    /// The object leaves its class and keeps its id.
    #[default]
    Move,
    /// The object stays; a linked copy with a fresh id joins the new class.
    Copy,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterLogic {
    #[default]
    ApplyIfMatch,
    ApplyIfNotMatch,
}

/// Parent of a reclassified object.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HierarchyHandling {
    /// The related object becomes the parent. Objects reclassified because
    /// nothing is related keep their parent.
    #[default]
    CreateTree,
    KeepExisting,
    Remove,
}

impl HierarchyHandling {
    pub(crate) fn parent(self, related: Option<ObjectId>, existing: Option<ObjectId>) -> Option<ObjectId> {
        match self {
            HierarchyHandling::CreateTree => related.or(existing),
            HierarchyHandling::KeepExisting => existing,
            HierarchyHandling::Remove => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReclassifyConfig {
    pub new_class: ClassId,
    #[serde(default)]
    pub mode: ReclassifyMode,
    #[serde(default)]
    pub logic: FilterLogic,
    #[serde(default)]
    pub hierarchy: HierarchyHandling,
    /// Only objects this filter accepts are reclassified.
    #[serde(default)]
    pub filter: Option<ValidityFilter>,
}

impl ReclassifyConfig {
    pub fn new(new_class: ClassId) -> Self {
        Self {
            new_class,
            mode: ReclassifyMode::default(),
            logic: FilterLogic::default(),
            hierarchy: HierarchyHandling::default(),
            filter: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        match &self.filter {
            Some(filter) => filter.validate(),
            None => Ok(()),
        }
    }

    pub(crate) fn selects(&self, related: bool) -> bool {
        match self.logic {
            FilterLogic::ApplyIfMatch => related,
            FilterLogic::ApplyIfNotMatch => !related,
        }
    }
}

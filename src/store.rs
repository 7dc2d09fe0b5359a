use serde_derive::Serialize;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::object::{ClassId, Object, ObjectId};
use crate::reclassify::{ReclassifyConfig, ReclassifyMode};
use crate::relation::{Measure, RelationEvaluator};
use crate::validity::ValidityFilter;

/// Objects of one image grouped by class.
///
/// Only declared classes can hold objects; a declared class without any
/// object is an empty collection, an undeclared one is an error.
#[derive(Serialize, Debug, Clone, Default)]
#[serde(transparent)]
pub struct ObjectStore {
    classes: BTreeMap<ClassId, Vec<Object>>,
}

impl ObjectStore {
    pub fn new<I: IntoIterator<Item = ClassId>>(classes: I) -> Self {
        Self {
            classes: classes.into_iter().map(|c| (c, Vec::new())).collect(),
        }
    }

    pub fn declare(&mut self, class: ClassId) {
        self.classes.entry(class).or_default();
    }

    pub fn insert(&mut self, obj: Object) -> Result<()> {
        let class = obj.class();
        self.classes
            .get_mut(&class)
            .ok_or(Error::UnknownClass(class))?
            .push(obj);

        Ok(())
    }

    pub fn objects(&self, class: ClassId) -> Result<&[Object]> {
        self.classes
            .get(&class)
            .map(Vec::as_slice)
            .ok_or(Error::UnknownClass(class))
    }

    pub fn objects_mut(&mut self, class: ClassId) -> Result<&mut [Object]> {
        self.classes
            .get_mut(&class)
            .map(Vec::as_mut_slice)
            .ok_or(Error::UnknownClass(class))
    }

    pub fn classes(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.classes.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.classes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.values().all(Vec::is_empty)
    }

    /// Applies `measure` from every object of class `from` to class `to`.
    /// Returns the number of visited pairs.
    pub fn relate(
        &mut self,
        evaluator: &RelationEvaluator,
        measure: Measure,
        from: ClassId,
        to: ClassId,
    ) -> Result<usize> {
        if !self.classes.contains_key(&to) {
            return Err(Error::UnknownClass(to));
        }

        if from == to {
            let objects = self.objects_mut(from)?;
            return Ok(evaluator.apply_within(measure, objects, to));
        }

        let mut taken = std::mem::take(
            self.classes
                .get_mut(&from)
                .ok_or(Error::UnknownClass(from))?,
        );

        let calls = evaluator.apply(measure, &mut taken, self.objects(to)?, to);
        self.classes.insert(from, taken);

        tracing::debug!(?measure, %from, %to, calls, "relation evaluated");

        Ok(calls)
    }

    /// Evaluates `filter` on every object of `class`, returning how many
    /// were rejected.
    pub fn filter(&mut self, class: ClassId, filter: &ValidityFilter) -> Result<usize> {
        filter.apply(self.objects_mut(class)?)
    }

    fn check_declared(&self, classes: &[ClassId]) -> Result<()> {
        match classes.iter().find(|c| !self.classes.contains_key(c)) {
            Some(&class) => Err(Error::UnknownClass(class)),
            None => Ok(()),
        }
    }

    /// Moves or copies objects of `from` into `config.new_class` depending on
    /// whether `evaluator` relates them to an object of `to`. The first
    /// related object in `to` order is the candidate parent. Returns the
    /// number of objects entered into the new class.
    pub fn reclassify(
        &mut self,
        evaluator: &RelationEvaluator,
        config: &ReclassifyConfig,
        from: ClassId,
        to: ClassId,
    ) -> Result<usize> {
        config.validate()?;
        self.check_declared(&[from, to, config.new_class])?;

        let related: Vec<Option<ObjectId>> = {
            let to_objects = self.objects(to)?;

            self.objects(from)?
                .iter()
                .map(|f| {
                    to_objects
                        .iter()
                        .filter(|t| t.id() != f.id())
                        .find(|t| evaluator.is_related(f, t))
                        .map(Object::id)
                })
                .collect()
        };

        let objects = std::mem::take(
            self.classes
                .get_mut(&from)
                .ok_or(Error::UnknownClass(from))?,
        );

        let mut kept = Vec::with_capacity(objects.len());
        let mut entered = Vec::new();

        for (obj, related) in objects.into_iter().zip(related) {
            let accepted = config
                .filter
                .as_ref()
                .map_or(true, |f| f.evaluate(&obj).is_valid());

            if !(config.selects(related.is_some()) && accepted) {
                kept.push(obj);
                continue;
            }

            let parent = config.hierarchy.parent(related, obj.parent());

            match config.mode {
                ReclassifyMode::Move => entered.push(obj.move_to(config.new_class, parent)),
                ReclassifyMode::Copy => {
                    entered.push(obj.copy_to(config.new_class, parent));
                    kept.push(obj);
                }
            }
        }

        let count = entered.len();
        self.classes.insert(from, kept);
        self.classes.entry(config.new_class).or_default().extend(entered);

        tracing::debug!(%from, %to, new_class = %config.new_class, count, "objects reclassified");

        Ok(count)
    }

    /// Creates one object in `result` for every related pair of `a` and `b`
    /// objects, covering their shared foreground and linked to both sources
    /// and to whatever they were linked to. Every source object takes part
    /// in at most one pair. Returns the number of objects created.
    pub fn colocalize(
        &mut self,
        evaluator: &RelationEvaluator,
        a: ClassId,
        b: ClassId,
        result: ClassId,
    ) -> Result<usize> {
        self.check_declared(&[a, b, result])?;

        let mut used: Vec<ObjectId> = Vec::new();
        let mut created = Vec::new();

        for x in self.objects(a)? {
            for y in self.objects(b)? {
                if x.id() == y.id() || used.contains(&x.id()) || used.contains(&y.id()) {
                    continue;
                }

                if !evaluator.is_related(x, y) {
                    continue;
                }

                let (bbox, mask) = match x.region().shared(&y.region()) {
                    Some(shared) => shared,
                    None => continue,
                };

                let confidence = x.confidence().min(y.confidence());
                let obj = Object::with_mask(result, confidence, bbox, mask)?
                    .with_links([x.id(), y.id()])
                    .with_links(x.linked().iter().chain(y.linked()).copied());

                used.push(x.id());
                used.push(y.id());
                created.push(obj);
            }
        }

        let count = created.len();
        self.classes.entry(result).or_default().extend(created);

        tracing::debug!(%a, %b, %result, count, "objects colocalized");

        Ok(count)
    }
}

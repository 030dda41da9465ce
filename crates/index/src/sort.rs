//! Sort level: an ordered array of `(entity, sort values)`.
//!
//! Sort values hold one value per directive (absent properties read as
//! `Value::Null`) followed by the entity id, so every entry has a unique
//! position under `SortComparator`.

use crate::comparator::{Comparator, Order, SortComparator};
use crate::entries::IndexContext;
use crate::schema::SortDirective;
use crate::traits::{read_property, IndexedEntity, PropertyOverride};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use lumen_core::Value;
use lumen_reactive::ObjectPublishers;

struct SortEntry<E> {
    entity: Rc<E>,
    values: Vec<Value>,
}

/// Live state of a Sort level.
pub struct SortEntries<E> {
    ctx: Rc<IndexContext>,
    directives: Vec<SortDirective>,
    comparator: SortComparator,
    publishers: ObjectPublishers<Value>,
    entries: RefCell<Vec<SortEntry<E>>>,
}

impl<E: IndexedEntity> SortEntries<E> {
    pub(crate) fn new(
        ctx: Rc<IndexContext>,
        directives: Vec<SortDirective>,
        publishers: ObjectPublishers<Value>,
    ) -> Self {
        let orders: Vec<Order> = directives.iter().map(|d| d.order).collect();
        Self {
            ctx,
            directives,
            comparator: SortComparator::new(orders),
            publishers,
            entries: RefCell::new(Vec::new()),
        }
    }

    /// Returns the sort directives.
    #[inline]
    pub fn directives(&self) -> &[SortDirective] {
        &self.directives
    }

    #[inline]
    pub(crate) fn publishers(&self) -> &ObjectPublishers<Value> {
        &self.publishers
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub(crate) fn collect_entities(&self, out: &mut Vec<Rc<E>>) {
        out.extend(self.entries.borrow().iter().map(|entry| entry.entity.clone()));
    }

    /// Computes the sort values of `entity`, with the id last.
    pub(crate) fn sort_values(&self, entity: &E, over: Option<PropertyOverride<'_>>) -> Vec<Value> {
        let mut values: Vec<Value> = self
            .directives
            .iter()
            .map(|d| read_property(entity, &d.property, over).unwrap_or(Value::Null))
            .collect();
        values.push(Value::from(entity.entity_id()));
        values
    }

    /// Returns `Ok(position)` of an entry with exactly these values, or
    /// `Err(insertion point)`.
    fn sort_position(entries: &[SortEntry<E>], comparator: &SortComparator, values: &[Value]) -> Result<usize, usize> {
        entries.binary_search_by(|entry| comparator.compare(&entry.values, values))
    }

    /// Finds the current slot of `entity`, whose stored values should be
    /// `values`. Falls back to a scan if the stored values disagree.
    fn locate(entries: &[SortEntry<E>], comparator: &SortComparator, entity: &E, values: &[Value]) -> Option<usize> {
        match Self::sort_position(entries, comparator, values) {
            Ok(i) if entries[i].entity.entity_id() == entity.entity_id() => Some(i),
            _ => entries
                .iter()
                .position(|entry| entry.entity.entity_id() == entity.entity_id()),
        }
    }

    pub(crate) fn added(&self, entity: &Rc<E>) -> bool {
        let values = self.sort_values(entity, None);
        let mut entries = self.entries.borrow_mut();
        match Self::sort_position(&entries, &self.comparator, &values) {
            Ok(_) => false,
            Err(pos) => {
                entries.insert(
                    pos,
                    SortEntry {
                        entity: entity.clone(),
                        values,
                    },
                );
                self.ctx.stats.entity_added();
                true
            }
        }
    }

    pub(crate) fn removed(&self, entity: &Rc<E>, over: Option<PropertyOverride<'_>>) -> bool {
        let values = self.sort_values(entity, over);
        let mut entries = self.entries.borrow_mut();
        match Self::locate(&entries, &self.comparator, entity, &values) {
            Some(i) => {
                entries.remove(i);
                self.ctx.stats.entity_removed();
                true
            }
            None => false,
        }
    }

    /// Repositions the entity after one of its sort properties changed.
    ///
    /// If the new values still fit between the entry's neighbours, the stored
    /// values are updated in place and nothing is reported as changed.
    /// Otherwise the entry is moved.
    pub(crate) fn property_changed(&self, entity: &Rc<E>, property: &str, old: Option<&Value>) -> bool {
        if !self.directives.iter().any(|d| d.property == property) {
            return false;
        }
        let over = PropertyOverride {
            property,
            value: old,
        };
        let old_values = self.sort_values(entity, Some(over));
        let new_values = self.sort_values(entity, None);

        let mut entries = self.entries.borrow_mut();
        let Some(i) = Self::locate(&entries, &self.comparator, entity, &old_values) else {
            return false;
        };
        let j = match Self::sort_position(&entries, &self.comparator, &new_values) {
            Ok(j) | Err(j) => j,
        };

        if j == i || j == i + 1 {
            entries[i].values = new_values;
            self.ctx.stats.sort_updated_in_place();
            return false;
        }

        let entry = entries.remove(i);
        // Removing slot i shifts everything after it down by one
        let target = if j > i { j - 1 } else { j };
        entries.insert(
            target,
            SortEntry {
                entity: entry.entity,
                values: new_values,
            },
        );
        self.ctx.stats.sort_moved();
        true
    }
}

//! Index trait definitions.
//!
//! `IndexedEntity` is what an index needs from an entity; `EntityObserver` is
//! the mutation event contract the owning collection calls for every add,
//! remove and property change.

use alloc::rc::Rc;
use lumen_core::{Result, Value};

/// An entity that can be placed in an index.
pub trait IndexedEntity {
    /// Returns the stable entity id.
    fn entity_id(&self) -> &str;

    /// Reads a property without registering a dependency.
    fn peek(&self, property: &str) -> Option<Value>;
}

/// Receives entity mutation events from a collection.
///
/// `old`/`new` are `None` when the property did not exist before or does not
/// exist after the change. The entity already reflects the new value when
/// `on_entity_property_changed` is called.
pub trait EntityObserver<E> {
    /// Called after an entity joins the collection.
    fn on_entity_added(&self, id: &str, entity: &Rc<E>) -> Result<()>;

    /// Called when an entity leaves the collection, before it is marked removed.
    fn on_entity_removed(&self, entity: &Rc<E>) -> Result<()>;

    /// Called after one property of a live entity changed.
    fn on_entity_property_changed(
        &self,
        entity: &Rc<E>,
        property: &str,
        old: Option<&Value>,
        new: Option<&Value>,
    ) -> Result<()>;
}

/// A property value substituted for the entity's current one, used to
/// locate an entity under the values it had before a change.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PropertyOverride<'a> {
    pub(crate) property: &'a str,
    pub(crate) value: Option<&'a Value>,
}

/// Reads `property`, honoring `over` when it names the same property.
pub(crate) fn read_property<E: IndexedEntity + ?Sized>(
    entity: &E,
    property: &str,
    over: Option<PropertyOverride<'_>>,
) -> Option<Value> {
    match over {
        Some(over) if over.property == property => over.value.cloned(),
        _ => entity.peek(property),
    }
}

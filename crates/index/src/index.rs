//! Schema-driven incremental indexes.

use crate::entries::{IndexContext, IndexEntries};
use crate::schema::{IndexKind, IndexSchema};
use crate::stats::IndexStats;
use crate::traits::{EntityObserver, IndexedEntity};
use crate::view::IndexView;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use log::debug;
use lumen_core::{Result, Value};
use lumen_reactive::Runtime;

/// An incrementally maintained index over a live entity set.
///
/// The owning collection feeds it every mutation through `EntityObserver`;
/// consumers read it through `proxy()`.
///
/// # Example
///
/// ```rust
/// use lumen_index::{EntityObserver, Index, IndexSchema, IndexedEntity};
/// use lumen_core::Value;
/// use lumen_reactive::Runtime;
/// use std::rc::Rc;
///
/// struct Person(&'static str, &'static str);
///
/// impl IndexedEntity for Person {
///     fn entity_id(&self) -> &str {
///         self.0
///     }
///     fn peek(&self, property: &str) -> Option<Value> {
///         (property == "name").then(|| Value::from(self.1))
///     }
/// }
///
/// let schema = IndexSchema::parse(&["+name"], false).unwrap();
/// let index = Index::new(Runtime::new(), "by_name", schema);
/// for (id, name) in [("e1", "sam"), ("e2", "maggie"), ("e3", "dave")] {
///     let person = Rc::new(Person(id, name));
///     index.on_entity_added(id, &person).unwrap();
/// }
/// assert_eq!(index.proxy().ids(), ["e3", "e2", "e1"]);
/// ```
pub struct Index<E> {
    ctx: Rc<IndexContext>,
    schema: IndexSchema,
    root: Rc<IndexEntries<E>>,
}

impl<E> core::fmt::Debug for Index<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Index")
            .field("name", &self.ctx.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl<E: IndexedEntity + 'static> Index<E> {
    /// Creates an empty index.
    pub fn new(runtime: Rc<Runtime>, name: impl Into<String>, schema: IndexSchema) -> Self {
        let name = name.into();
        debug!("creating index {} ({})", name, schema);
        let ctx = Rc::new(IndexContext {
            name: name.clone(),
            runtime,
            stats: IndexStats::new(),
        });
        let root = IndexEntries::new(&ctx, &schema, name);
        Self { ctx, schema, root }
    }

    /// Returns the index name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.ctx.name
    }

    /// Returns the schema.
    #[inline]
    pub fn schema(&self) -> &IndexSchema {
        &self.schema
    }

    /// Returns the kind of the root level.
    #[inline]
    pub fn kind(&self) -> IndexKind {
        self.root.kind()
    }

    /// Returns the statistics for this index.
    #[inline]
    pub fn stats(&self) -> &IndexStats {
        &self.ctx.stats
    }

    /// Returns true if this index was built for exactly `schema`. See
    /// `IndexSchema::matches`.
    pub fn matches_schema(&self, schema: &IndexSchema) -> bool {
        self.schema.matches(schema)
    }

    /// Returns the live, trackable view of the index contents.
    pub fn proxy(&self) -> IndexView<E> {
        IndexView::new(self.root.clone())
    }

    /// Returns the number of indexed entities. Untracked.
    pub fn len(&self) -> usize {
        self.root.len()
    }

    /// Returns true if nothing is indexed. Untracked.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Returns the indexed entities in index order. Untracked.
    pub fn entities(&self) -> Vec<Rc<E>> {
        let mut out = Vec::new();
        self.root.collect_entities(&mut out);
        out
    }
}

impl<E: IndexedEntity + 'static> EntityObserver<E> for Index<E> {
    fn on_entity_added(&self, _id: &str, entity: &Rc<E>) -> Result<()> {
        self.root.added(entity).map(|_| ())
    }

    fn on_entity_removed(&self, entity: &Rc<E>) -> Result<()> {
        self.root.removed(entity, None).map(|_| ())
    }

    fn on_entity_property_changed(
        &self,
        entity: &Rc<E>,
        property: &str,
        old: Option<&Value>,
        new: Option<&Value>,
    ) -> Result<()> {
        if !self.schema.depends_on(property) {
            return Ok(());
        }
        self.root.property_changed(entity, property, old, new).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::testing::Doc;
    use alloc::vec;
    use lumen_core::{props, Error};

    fn index(terms: &[&str], unique: bool) -> Index<Doc> {
        let schema = IndexSchema::parse(terms, unique).unwrap();
        Index::new(Runtime::new(), "index1", schema)
    }

    fn change(index: &Index<Doc>, doc: &Rc<Doc>, property: &str, value: Option<Value>) -> Result<()> {
        let old = doc.set(property, value.clone());
        index.on_entity_property_changed(doc, property, old.as_ref(), value.as_ref())
    }

    #[test]
    fn test_sort_order_after_each_add() {
        let index = index(&["+name"], false);
        let sam = Doc::new("e1", props([("name", "sam")]));
        let maggie = Doc::new("e2", props([("name", "maggie")]));
        let dave = Doc::new("e3", props([("name", "dave")]));

        index.on_entity_added("e1", &sam).unwrap();
        assert_eq!(index.proxy().ids(), ["e1"]);
        index.on_entity_added("e2", &maggie).unwrap();
        assert_eq!(index.proxy().ids(), ["e2", "e1"]);
        index.on_entity_added("e3", &dave).unwrap();
        assert_eq!(index.proxy().ids(), ["e3", "e2", "e1"]);
        assert_eq!(index.stats().live_entities(), 3);
    }

    #[test]
    fn test_sort_ties_break_by_id() {
        let index = index(&["-age"], false);
        for id in ["c", "a", "b"] {
            index.on_entity_added(id, &Doc::new(id, props([("age", 30i64)]))).unwrap();
        }
        index.on_entity_added("d", &Doc::new("d", props([("age", 40i64)]))).unwrap();
        assert_eq!(index.proxy().ids(), ["d", "a", "b", "c"]);
    }

    #[test]
    fn test_sort_move_and_in_place_update() {
        let index = index(&["+age"], false);
        let a = Doc::new("a", props([("age", 10i64)]));
        let b = Doc::new("b", props([("age", 20i64)]));
        let c = Doc::new("c", props([("age", 30i64)]));
        for doc in [&a, &b, &c] {
            index.on_entity_added(&doc.id, doc).unwrap();
        }
        let generation = index.proxy().generation();

        // Still between its neighbours: no move, no notification
        change(&index, &b, "age", Some(Value::from(25i64))).unwrap();
        assert_eq!(index.proxy().ids(), ["a", "b", "c"]);
        assert_eq!(index.stats().in_place_updates(), 1);
        assert_eq!(index.proxy().generation(), generation);

        change(&index, &a, "age", Some(Value::from(99i64))).unwrap();
        assert_eq!(index.proxy().ids(), ["b", "c", "a"]);
        change(&index, &a, "age", Some(Value::from(0i64))).unwrap();
        assert_eq!(index.proxy().ids(), ["a", "b", "c"]);
        assert_eq!(index.stats().sort_moves(), 2);
        assert_eq!(index.proxy().generation(), generation + 2);

        // A property outside the schema is ignored
        change(&index, &a, "color", Some(Value::from("red"))).unwrap();
        assert_eq!(index.proxy().generation(), generation + 2);
    }

    #[test]
    fn test_sort_remove_uses_current_values() {
        let index = index(&["+age"], false);
        let a = Doc::new("a", props([("age", 1i64)]));
        let b = Doc::new("b", props([("age", 2i64)]));
        index.on_entity_added("a", &a).unwrap();
        index.on_entity_added("b", &b).unwrap();

        index.on_entity_removed(&a).unwrap();
        assert_eq!(index.proxy().ids(), ["b"]);
        // Removing twice is a no-op
        index.on_entity_removed(&a).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_unique_violation_names_key_property_and_index() {
        let index = index(&["=name"], true);
        index.on_entity_added("e1", &Doc::new("e1", props([("name", "kim")]))).unwrap();

        let err = index
            .on_entity_added("e2", &Doc::new("e2", props([("name", "kim")])))
            .unwrap_err();
        assert_eq!(err, Error::unique_key_violation(Value::from("kim"), "name", "index1"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_unique_rekey_and_null_keys() {
        let index = index(&["=name"], true);
        let kim = Doc::new("e1", props([("name", "kim")]));
        let anon = Doc::new("e2", props([("age", 3i64)]));
        index.on_entity_added("e1", &kim).unwrap();
        index.on_entity_added("e2", &anon).unwrap();
        assert_eq!(index.len(), 1);

        change(&index, &kim, "name", Some(Value::from("lee"))).unwrap();
        let view = index.proxy();
        assert!(view.get(&Value::from("kim")).is_none());
        assert_eq!(view.get(&Value::from("lee")).map(|d| d.id.clone()), Some("e1".into()));

        change(&index, &anon, "name", Some(Value::from("kim"))).unwrap();
        assert_eq!(view.keys(), vec![Value::from("kim"), Value::from("lee")]);

        change(&index, &kim, "name", None).unwrap();
        assert_eq!(view.keys(), vec![Value::from("kim")]);
    }

    #[test]
    fn test_unique_rekey_into_taken_key_fails() {
        let index = index(&["=name"], true);
        let kim = Doc::new("e1", props([("name", "kim")]));
        let lee = Doc::new("e2", props([("name", "lee")]));
        index.on_entity_added("e1", &kim).unwrap();
        index.on_entity_added("e2", &lee).unwrap();

        let err = change(&index, &lee, "name", Some(Value::from("kim"))).unwrap_err();
        assert!(matches!(err, Error::UniqueKeyViolation { .. }));
        // The old key was released before the failure
        assert_eq!(index.proxy().keys(), vec![Value::from("kim")]);
    }

    #[test]
    fn test_many_buckets_are_created_and_pruned() {
        let index = index(&["=owner", "+name"], false);
        let a = Doc::new("a", props([("owner", "ann"), ("name", "zed")]));
        let b = Doc::new("b", props([("owner", "ann"), ("name", "amy")]));
        let c = Doc::new("c", props([("name", "bob")]));
        for doc in [&a, &b, &c] {
            index.on_entity_added(&doc.id, doc).unwrap();
        }

        let view = index.proxy();
        assert_eq!(view.keys(), vec![Value::Null, Value::from("ann")]);
        let ann = view.bucket(&Value::from("ann")).unwrap();
        assert_eq!(ann.ids(), ["b", "a"]);
        assert_eq!(view.ids(), ["c", "b", "a"]);

        change(&index, &c, "owner", Some(Value::from("ann"))).unwrap();
        assert_eq!(view.keys(), vec![Value::from("ann")]);
        assert_eq!(ann.ids(), ["b", "c", "a"]);
        assert_eq!(index.stats().buckets_pruned(), 1);

        // Deeper property: delegated to the current bucket
        change(&index, &a, "name", Some(Value::from("abe"))).unwrap();
        assert_eq!(ann.ids(), ["a", "b", "c"]);

        for doc in [&a, &b, &c] {
            index.on_entity_removed(doc).unwrap();
        }
        assert!(view.keys().is_empty());
        assert_eq!(index.stats().live_buckets(), 0);
        assert_eq!(index.stats().live_entities(), 0);
    }

    #[test]
    fn test_many_over_unique_creates_bucket_when_key_appears() {
        let index = index(&["=owner", "=name"], true);
        let doc = Doc::new("a", props([("owner", "ann")]));
        index.on_entity_added("a", &doc).unwrap();
        // Nothing to index yet, so no empty bucket is left behind
        assert!(index.proxy().keys().is_empty());

        change(&index, &doc, "name", Some(Value::from("x"))).unwrap();
        let bucket = index.proxy().bucket(&Value::from("ann")).unwrap();
        assert_eq!(bucket.ids(), ["a"]);
    }

    #[test]
    fn test_unique_treats_signed_zeros_as_one_key() {
        let index = index(&["=score"], true);
        let pos = Doc::new("e1", props([("score", 0.0f64)]));
        index.on_entity_added("e1", &pos).unwrap();

        let err = index
            .on_entity_added("e2", &Doc::new("e2", props([("score", -0.0f64)])))
            .unwrap_err();
        assert!(matches!(err, Error::UniqueKeyViolation { .. }));
        let found = index.proxy().get(&Value::Float64(-0.0)).map(|d| d.id.clone());
        assert_eq!(found, Some("e1".into()));

        // Moving between 0.0 and -0.0 keeps the same key
        change(&index, &pos, "score", Some(Value::Float64(-0.0))).unwrap();
        assert_eq!(index.proxy().keys(), vec![Value::Float64(0.0)]);
        change(&index, &pos, "score", None).unwrap();
        assert!(index.proxy().keys().is_empty());
    }

    #[test]
    fn test_unique_keeps_int_and_float_keys_apart() {
        let index = index(&["=score"], true);
        index.on_entity_added("e1", &Doc::new("e1", props([("score", 2i64)]))).unwrap();
        index.on_entity_added("e2", &Doc::new("e2", props([("score", 2.0f64)]))).unwrap();

        let view = index.proxy();
        assert_eq!(view.keys(), vec![Value::Int64(2), Value::Float64(2.0)]);
        assert_eq!(view.get(&Value::Int64(2)).map(|d| d.id.clone()), Some("e1".into()));
        assert_eq!(view.get(&Value::Float64(2.0)).map(|d| d.id.clone()), Some("e2".into()));
    }

    #[test]
    fn test_many_groups_nan_and_signed_zeros() {
        let index = index(&["=score", "+id"], false);
        let docs = [
            Doc::new("a", props([("score", 0.0f64)])),
            Doc::new("b", props([("score", -0.0f64)])),
            Doc::new("c", props([("score", f64::NAN)])),
            Doc::new("d", props([("score", -f64::NAN)])),
            Doc::new("e", props([("score", 0i64)])),
        ];
        for doc in &docs {
            index.on_entity_added(&doc.id, doc).unwrap();
        }

        let view = index.proxy();
        assert_eq!(
            view.keys(),
            vec![Value::Int64(0), Value::Float64(0.0), Value::Float64(f64::NAN)]
        );
        assert_eq!(view.bucket(&Value::Float64(-0.0)).unwrap().ids(), ["a", "b"]);
        assert_eq!(view.bucket(&Value::Float64(f64::NAN)).unwrap().ids(), ["c", "d"]);

        // Removing by the bit-different twin still finds the bucket
        index.on_entity_removed(&docs[0]).unwrap();
        index.on_entity_removed(&docs[1]).unwrap();
        assert!(view.bucket(&Value::Float64(0.0)).is_none());
        assert_eq!(index.stats().buckets_pruned(), 1);
    }

    #[test]
    fn test_sort_mixes_ints_and_floats_exactly() {
        let big = 1i64 << 53;
        let index = index(&["+n"], false);
        let x0 = Doc::new("x0", props([("n", big + 1)]));
        let x1 = Doc::new("x1", props([("n", big as f64)]));
        let x2 = Doc::new("x2", props([("n", big)]));
        for doc in [&x0, &x1, &x2] {
            index.on_entity_added(&doc.id, doc).unwrap();
        }
        assert_eq!(index.proxy().ids(), ["x2", "x1", "x0"]);

        // Every entity is found again on removal
        for doc in [&x1, &x0, &x2] {
            index.on_entity_removed(doc).unwrap();
        }
        assert!(index.is_empty());
    }

    #[test]
    fn test_sort_places_nan_last_and_zeros_together() {
        let index = index(&["+n"], false);
        let docs = [
            Doc::new("a", props([("n", f64::NAN)])),
            Doc::new("b", props([("n", 1.5f64)])),
            Doc::new("c", props([("n", -0.0f64)])),
            Doc::new("d", props([("n", 0.0f64)])),
            Doc::new("e", props([("n", 1i64)])),
        ];
        for doc in &docs {
            index.on_entity_added(&doc.id, doc).unwrap();
        }
        assert_eq!(index.proxy().ids(), ["c", "d", "e", "b", "a"]);

        change(&index, &docs[0], "n", Some(Value::Float64(-1.0))).unwrap();
        assert_eq!(index.proxy().ids(), ["a", "c", "d", "e", "b"]);
    }

    #[test]
    fn test_matches_schema() {
        let index = index(&["=owner"], false);
        assert!(index.matches_schema(&IndexSchema::parse(&["=owner", "+id"], false).unwrap()));
        assert!(!index.matches_schema(&IndexSchema::parse(&["=owner"], true).unwrap()));
    }

    #[test]
    fn test_matches_schema_is_exact() {
        let index = index(&["=owner", "+name"], false);
        assert!(index.matches_schema(&IndexSchema::parse(&["=owner", "+name", "+id"], false).unwrap()));
        // Neither a prefix nor an extension of the path matches
        assert!(!index.matches_schema(&IndexSchema::parse(&["=owner"], false).unwrap()));
        assert!(!index.matches_schema(&IndexSchema::parse(&["=owner", "+name", "-age"], false).unwrap()));
        assert!(!index.matches_schema(&IndexSchema::parse(&["=owner", "-name"], false).unwrap()));
    }
}

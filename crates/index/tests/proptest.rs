//! Property-based tests for lumen-index using proptest.

use lumen_core::Value;
use lumen_index::{EntityObserver, Index, IndexSchema, IndexedEntity};
use lumen_reactive::Runtime;
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

struct Doc {
    id: String,
    bag: RefCell<BTreeMap<String, Value>>,
}

impl IndexedEntity for Doc {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn peek(&self, property: &str) -> Option<Value> {
        self.bag.borrow().get(property).cloned()
    }
}

#[derive(Clone, Debug)]
enum Op {
    Add(u8, Option<Value>, Option<Value>),
    Remove(u8),
    Set(u8, bool, Option<Value>),
}

/// Small integers mixed with floats that collide with them numerically or
/// differ only in sign bit or NaN payload.
fn key() -> impl Strategy<Value = Value> + Clone {
    prop_oneof![
        (0i64..4).prop_map(Value::from),
        prop::sample::select(vec![0.0, -0.0, 1.5, 2.0, f64::NAN, -f64::NAN]).prop_map(Value::from),
    ]
}

/// True if writing `b` over `a` changes nothing.
fn unchanged(a: &Option<Value>, b: &Option<Value>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.is_identical(b),
        (None, None) => true,
        _ => false,
    }
}

fn op() -> impl Strategy<Value = Op> {
    let value = prop::option::of(key());
    prop_oneof![
        (0u8..12, value.clone(), value.clone()).prop_map(|(id, g, r)| Op::Add(id, g, r)),
        (0u8..12).prop_map(Op::Remove),
        (0u8..12, any::<bool>(), value).prop_map(|(id, group, v)| Op::Set(id, group, v)),
    ]
}

/// Applies ops to every index and to a plain map of live docs.
struct Harness {
    indexes: Vec<Index<Doc>>,
    live: HashMap<String, Rc<Doc>>,
}

impl Harness {
    fn new(schemas: &[(&[&str], bool)]) -> Self {
        let runtime = Runtime::new();
        let indexes = schemas
            .iter()
            .enumerate()
            .map(|(i, (terms, unique))| {
                let schema = IndexSchema::parse(terms, *unique).unwrap();
                Index::new(runtime.clone(), format!("index{}", i + 1), schema)
            })
            .collect();
        Self {
            indexes,
            live: HashMap::new(),
        }
    }

    fn apply(&mut self, op: &Op) {
        match op {
            Op::Add(id, group, rank) => {
                let id = format!("e{:02}", id);
                if self.live.contains_key(&id) {
                    return;
                }
                let mut bag = BTreeMap::new();
                if let Some(g) = group {
                    bag.insert("group".to_string(), g.clone());
                }
                if let Some(r) = rank {
                    bag.insert("rank".to_string(), r.clone());
                }
                let doc = Rc::new(Doc {
                    id: id.clone(),
                    bag: RefCell::new(bag),
                });
                for index in &self.indexes {
                    index.on_entity_added(&id, &doc).unwrap();
                }
                self.live.insert(id, doc);
            }
            Op::Remove(id) => {
                let id = format!("e{:02}", id);
                if let Some(doc) = self.live.remove(&id) {
                    for index in &self.indexes {
                        index.on_entity_removed(&doc).unwrap();
                    }
                }
            }
            Op::Set(id, group, value) => {
                let id = format!("e{:02}", id);
                let Some(doc) = self.live.get(&id) else {
                    return;
                };
                let property = if *group { "group" } else { "rank" };
                let new = value.clone();
                let old = match &new {
                    Some(v) => doc.bag.borrow_mut().insert(property.to_string(), v.clone()),
                    None => doc.bag.borrow_mut().remove(property),
                };
                if unchanged(&old, &new) {
                    return;
                }
                for index in &self.indexes {
                    index
                        .on_entity_property_changed(doc, property, old.as_ref(), new.as_ref())
                        .unwrap();
                }
            }
        }
    }

    fn value(&self, doc: &Doc, property: &str) -> Value {
        doc.peek(property).unwrap_or(Value::Null)
    }

    /// Live ids ordered by `rank` (descending if `desc`), then id.
    fn expected_by_rank(&self, docs: &[&Rc<Doc>], desc: bool) -> Vec<String> {
        let mut docs: Vec<&Rc<Doc>> = docs.to_vec();
        docs.sort_by(|a, b| {
            let ord = self.value(a, "rank").cmp(&self.value(b, "rank"));
            let ord = if desc { ord.reverse() } else { ord };
            ord.then_with(|| a.id.cmp(&b.id))
        });
        docs.iter().map(|d| d.id.clone()).collect()
    }
}

proptest! {
    /// A sort index always equals the live set ordered by its comparator.
    #[test]
    fn sort_index_matches_model(ops in prop::collection::vec(op(), 1..120)) {
        let mut harness = Harness::new(&[(&["+rank"], false), (&["-rank"], false)]);
        for op in &ops {
            harness.apply(op);
            let docs: Vec<&Rc<Doc>> = harness.live.values().collect();
            prop_assert_eq!(harness.indexes[0].proxy().ids(), harness.expected_by_rank(&docs, false));
            prop_assert_eq!(harness.indexes[1].proxy().ids(), harness.expected_by_rank(&docs, true));
        }
    }

    /// Every live entity sits in exactly the bucket of its current key, and
    /// no bucket is empty.
    #[test]
    fn many_index_buckets_match_model(ops in prop::collection::vec(op(), 1..120)) {
        let mut harness = Harness::new(&[(&["=group", "+rank"], false)]);
        for op in &ops {
            harness.apply(op);
            let view = harness.indexes[0].proxy();

            let mut groups: BTreeMap<Value, Vec<&Rc<Doc>>> = BTreeMap::new();
            for doc in harness.live.values() {
                groups.entry(harness.value(doc, "group")).or_default().push(doc);
            }

            let keys: Vec<Value> = groups.keys().cloned().collect();
            prop_assert_eq!(view.keys(), keys);
            for (key, docs) in &groups {
                let bucket = view.bucket(key).unwrap();
                prop_assert_eq!(bucket.ids(), harness.expected_by_rank(docs, false));
            }
            prop_assert_eq!(harness.indexes[0].len(), harness.live.len());
        }
    }

    /// A unique index holds every live entity with a non-null key, and
    /// rejects a second entity under a taken key.
    #[test]
    fn unique_index_rejects_duplicates(keys in prop::collection::vec(prop::option::of(key()), 1..60)) {
        let index: Index<Doc> = Index::new(
            Runtime::new(),
            "index1",
            IndexSchema::parse(&["=badge"], true).unwrap(),
        );
        let mut taken = BTreeSet::new();
        for (i, key) in keys.iter().enumerate() {
            let mut bag = BTreeMap::new();
            if let Some(k) = key {
                bag.insert("badge".to_string(), k.clone());
            }
            let id = format!("e{}", i);
            let doc = Rc::new(Doc { id: id.clone(), bag: RefCell::new(bag) });
            let result = index.on_entity_added(&id, &doc);
            match key {
                Some(k) if !taken.insert(k.clone()) => prop_assert!(result.is_err()),
                _ => prop_assert!(result.is_ok()),
            }
        }
        prop_assert_eq!(index.len(), taken.len());
    }
}

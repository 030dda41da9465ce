//! Sort-value comparators.
//!
//! A sort index stores, per entity, one value for each sort directive
//! followed by the entity id. Comparison walks the directive values in order,
//! honoring each level's direction, and falls back to the id ascending.

use alloc::vec::Vec;
use core::cmp::Ordering;
use lumen_core::Value;

/// Sort order for one sort level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Order {
    /// Ascending order (smallest first)
    #[default]
    Asc,
    /// Descending order (largest first)
    Desc,
}

impl Order {
    /// Applies this order to a comparison result.
    #[inline]
    pub fn apply(&self, ord: Ordering) -> Ordering {
        match self {
            Order::Asc => ord,
            Order::Desc => ord.reverse(),
        }
    }

    /// Returns the directive prefix for this order.
    #[inline]
    pub fn prefix(&self) -> char {
        match self {
            Order::Asc => '+',
            Order::Desc => '-',
        }
    }
}

/// Trait for comparing sort keys.
pub trait Comparator<K: ?Sized> {
    /// Compares two keys according to the comparator's ordering.
    fn compare(&self, a: &K, b: &K) -> Ordering;

    /// Returns true if a < b according to this comparator.
    fn is_less(&self, a: &K, b: &K) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// Returns true if a == b according to this comparator.
    fn is_equal(&self, a: &K, b: &K) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

/// Compares sort-value rows level by level, then by the trailing id.
///
/// Rows are expected to hold one value per order plus the id; a missing
/// value sorts before a present one.
#[derive(Clone, Debug)]
pub struct SortComparator {
    orders: Vec<Order>,
}

impl SortComparator {
    /// Creates a comparator with one order per sort level.
    pub fn new(orders: Vec<Order>) -> Self {
        Self { orders }
    }

    /// Returns the per-level orders, excluding the id tiebreak.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }
}

impl Comparator<[Value]> for SortComparator {
    fn compare(&self, a: &[Value], b: &[Value]) -> Ordering {
        // The id level is always ascending
        let levels = self.orders.iter().copied().chain(core::iter::once(Order::Asc));
        for (i, order) in levels.enumerate() {
            let cmp = match (a.get(i), b.get(i)) {
                (Some(av), Some(bv)) => order.apply(av.cmp(bv)),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };

            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    }
}

//! Property values and their key semantics.
//!
//! A `Value` is both what an entity stores and what an index is keyed by, so
//! its `Eq`, `Hash` and `Ord` impls agree with each other: hash-based indexes
//! and the sorted index see the same notion of "same key".
//!
//! Numbers of different variants are compared by exact numeric value and then
//! by variant, so `Int64(2) < Float64(2.0) < Int64(3)`. Floats compare with
//! `-0.0 == 0.0` and every NaN equal to every other NaN, after all numbers.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

/// A property value.
///
/// Cross-variant order: `Null < Boolean < numbers < String < Bytes`.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Boolean(bool),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl Value {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        if let Value::Int64(i) = self {
            Some(*i)
        } else {
            None
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        if let Value::Float64(f) = self {
            Some(*f)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Value::String(s) = self {
            Some(s)
        } else {
            None
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let Value::Bytes(b) = self {
            Some(b)
        } else {
            None
        }
    }

    /// Rank of the variant in the cross-type order. Both numeric variants
    /// share a rank and are ordered by value.
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Int64(_) | Value::Float64(_) => 2,
            Value::String(_) => 3,
            Value::Bytes(_) => 4,
        }
    }

    /// Returns true if `other` is the very same value: same variant and, for
    /// floats, the same bit pattern.
    ///
    /// This is stricter than `==`, which treats `0.0` and `-0.0` (and every
    /// NaN) as equal keys.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

/// Bit pattern every NaN hashes as.
const CANONICAL_NAN: u64 = 0x7ff8_0000_0000_0000;

/// 2^63, the first float above every `i64`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Bits used to hash a float key: all NaNs collapse to one pattern and
/// `-0.0` hashes as `0.0`.
fn canonical_bits(f: f64) -> u64 {
    if f.is_nan() {
        CANONICAL_NAN
    } else if f == 0.0 {
        0
    } else {
        f.to_bits()
    }
}

/// Total order on floats: NaN after everything, `-0.0 == 0.0`.
fn cmp_f64(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

/// Compares an integer with a float by exact numeric value, without going
/// through a lossy `i64 -> f64` cast.
fn cmp_i64_f64(i: i64, f: f64) -> Ordering {
    if f.is_nan() || f >= I64_BOUND {
        return Ordering::Less;
    }
    if f < -I64_BOUND {
        return Ordering::Greater;
    }
    // In range, so the cast truncates toward zero exactly, and `whole` maps
    // back to f64 exactly.
    let whole = f as i64;
    match i.cmp(&whole) {
        Ordering::Equal => cmp_f64(whole as f64, f),
        ord => ord,
    }
}

/// Keys compare as `(numeric value, variant)` for numbers, so `Int64(2)`
/// sorts just before `Float64(2.0)` and the two are distinct keys.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::Float64(a), Value::Float64(b)) => cmp_f64(*a, *b),
            (Value::Int64(i), Value::Float64(f)) => cmp_i64_f64(*i, *f).then(Ordering::Less),
            (Value::Float64(f), Value::Int64(i)) => {
                cmp_i64_f64(*i, *f).reverse().then(Ordering::Greater)
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Int64(i) => i.hash(state),
            Value::Float64(f) => canonical_bits(*f).hash(state),
            Value::String(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
        }
    }
}

/// Renders values the way they appear in error messages: strings quoted,
/// everything else bare.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Float64(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "{:?}", b),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Boolean,
    i32 => Int64,
    i64 => Int64,
    f64 => Float64,
    String => String,
    Vec<u8> => Bytes,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::vec;

    #[test]
    fn test_value_null() {
        let v = Value::Null;
        assert!(v.is_null());
        assert!(!Value::Int64(0).is_null());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Boolean(true).as_bool(), Some(true));
        assert_eq!(Value::Int64(100).as_i64(), Some(100));
        assert_eq!(Value::Float64(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::String("hello".into()).as_str(), Some("hello"));
        assert_eq!(Value::Bytes(vec![1, 2, 3]).as_bytes(), Some(&[1, 2, 3][..]));
        assert_eq!(Value::Int64(1).as_str(), None);
    }

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Int64(42), Value::Int64(42));
        assert_ne!(Value::Int64(42), Value::Float64(42.0));
        assert_eq!(Value::Null, Value::Null);
        assert_eq!(Value::Float64(f64::NAN), Value::Float64(f64::NAN));
    }

    #[test]
    fn test_value_ordering() {
        assert!(Value::Int64(1) < Value::Int64(2));
        assert!(Value::String("dave".into()) < Value::String("maggie".into()));
        assert!(Value::Null < Value::Int64(i64::MIN));
        assert!(Value::Int64(2) < Value::Float64(2.5));
        assert!(Value::Float64(1.5) < Value::Int64(2));
        assert!(Value::Float64(1e300) < Value::Float64(f64::NAN));
        assert!(Value::Int64(i64::MAX) < Value::Float64(f64::NAN));
        // Different types fall back to the type order
        assert!(Value::Boolean(true) < Value::String("a".into()));
    }

    /// Records the bytes fed to it, so equal hashes can be compared without
    /// a std hasher.
    #[derive(Default)]
    struct ByteHasher(Vec<u8>);

    impl Hasher for ByteHasher {
        fn finish(&self) -> u64 {
            0
        }

        fn write(&mut self, bytes: &[u8]) {
            self.0.extend_from_slice(bytes);
        }
    }

    fn hash_bytes(value: &Value) -> Vec<u8> {
        let mut hasher = ByteHasher::default();
        value.hash(&mut hasher);
        hasher.0
    }

    #[test]
    fn test_signed_zero_is_one_key() {
        let pos = Value::Float64(0.0);
        let neg = Value::Float64(-0.0);
        assert_eq!(pos, neg);
        assert_eq!(pos.cmp(&neg), Ordering::Equal);
        assert_eq!(hash_bytes(&pos), hash_bytes(&neg));
        assert!(!pos.is_identical(&neg));
    }

    #[test]
    fn test_nan_payloads_are_one_key() {
        let a = Value::Float64(f64::NAN);
        let b = Value::Float64(f64::from_bits(0x7ff8_0000_0000_0001));
        assert_eq!(a, b);
        assert_eq!(hash_bytes(&a), hash_bytes(&b));
    }

    #[test]
    fn test_int_and_float_of_same_number_are_distinct() {
        let int = Value::Int64(2);
        let float = Value::Float64(2.0);
        assert_ne!(int, float);
        assert_eq!(int.cmp(&float), Ordering::Less);
        assert_eq!(float.cmp(&int), Ordering::Greater);
    }

    #[test]
    fn test_int_float_comparison_is_exact_above_2_pow_53() {
        let big = 1i64 << 53;
        let x0 = Value::Int64(big + 1);
        let x1 = Value::Float64(big as f64);
        let x2 = Value::Int64(big);
        assert!(x2 < x1);
        assert!(x1 < x0);
        assert!(x2 < x0);

        assert!(Value::Int64(i64::MAX) < Value::Float64(I64_BOUND));
        assert!(Value::Int64(i64::MIN) > Value::Float64(-1e300));
        assert!(Value::Int64(-3) < Value::Float64(-2.5));
        assert!(Value::Int64(-2) > Value::Float64(-2.5));
    }

    #[test]
    fn test_eq_ord_and_hash_agree() {
        let big = 1i64 << 53;
        let values = vec![
            Value::Null,
            Value::Boolean(false),
            Value::Boolean(true),
            Value::Int64(-1),
            Value::Int64(0),
            Value::Int64(2),
            Value::Int64(big),
            Value::Int64(big + 1),
            Value::Int64(i64::MAX),
            Value::Float64(-0.0),
            Value::Float64(0.0),
            Value::Float64(-0.5),
            Value::Float64(2.0),
            Value::Float64(big as f64),
            Value::Float64(f64::INFINITY),
            Value::Float64(f64::NEG_INFINITY),
            Value::Float64(f64::NAN),
            Value::from("2"),
            Value::Bytes(vec![2]),
        ];
        for a in &values {
            for b in &values {
                let ab = a.cmp(b);
                assert_eq!(ab, b.cmp(a).reverse(), "{:?} vs {:?}", a, b);
                assert_eq!(a == b, ab == Ordering::Equal, "{:?} vs {:?}", a, b);
                if a == b {
                    assert_eq!(hash_bytes(a), hash_bytes(b), "{:?} vs {:?}", a, b);
                }
                for c in &values {
                    if ab != Ordering::Greater && b.cmp(c) != Ordering::Greater {
                        assert_ne!(a.cmp(c), Ordering::Greater, "{:?} {:?} {:?}", a, b, c);
                    }
                }
            }
        }
    }

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", Value::from("kim")), "\"kim\"");
        assert_eq!(format!("{}", Value::from(7i64)), "7");
        assert_eq!(format!("{}", Value::Null), "null");
        assert_eq!(format!("{}", Value::Boolean(false)), "false");
    }

    #[test]
    fn test_value_from_impls() {
        let v: Value = 42i32.into();
        assert_eq!(v.as_i64(), Some(42));

        let v: Value = "hello".into();
        assert_eq!(v.as_str(), Some("hello"));

        let v: Value = Some(100i64).into();
        assert_eq!(v.as_i64(), Some(100));

        let v: Value = None::<i64>.into();
        assert!(v.is_null());
    }
}

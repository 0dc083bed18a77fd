#![forbid(unsafe_code)]

//! Dynamic value tree with structural sharing.
//!
//! # Design
//!
//! [`Value`] is a small JSON-like tree. Strings, lists and maps live behind
//! `Rc`, so cloning a value is O(1) and unchanged subtrees can be shared
//! between successive snapshots of a store.
//!
//! A write at a nested path rebuilds only the spine from the root to the
//! written key: every ancestor map or list gets a fresh `Rc`, every sibling
//! subtree is carried over by reference. [`Value::ptr_eq`] exposes that
//! identity so consumers can short-circuit equality checks.
//!
//! # Invariants
//!
//! 1. `Undefined` is never stored inside a map: writing it removes the key.
//! 2. Lists keep their indices stable; writing `Undefined` into a list slot
//!    leaves an `Undefined` hole rather than shifting later elements.
//! 3. Equality is deep, with a pointer fast path for shared variants.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::path::Path;

/// Map storage used by [`Value::Map`].
pub type ValueMap = BTreeMap<Rc<str>, Value>;

/// A node in an observable value tree.
#[derive(Clone, Default)]
pub enum Value {
    /// Nothing lives at this location.
    #[default]
    Undefined,
    /// Explicit null.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    Map(Rc<ValueMap>),
}

impl Value {
    /// Build a map value from key/value pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: AsRef<str>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (Rc::from(k.as_ref()), v.into()))
            .filter(|(_, v): &(Rc<str>, Value)| !v.is_undefined())
            .collect();
        Self::Map(Rc::new(map))
    }

    /// Build a list value.
    pub fn list<V, I>(items: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        Self::List(Rc::new(items.into_iter().map(Into::into).collect()))
    }

    #[must_use]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view. Floats with no fractional part convert too.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Direct child under `key`. Lists accept canonical decimal keys only
    /// (`"0"`, `"12"`; never `"+1"` or `"01"`).
    #[must_use]
    pub fn child(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(map) => map.get(key),
            Self::List(items) => list_index(key).and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Value at `path`, or `None` if any segment is missing.
    #[must_use]
    pub fn lookup(&self, path: &Path) -> Option<&Value> {
        path.segments()
            .try_fold(self, |node, key| node.child(key))
            .filter(|v| !v.is_undefined())
    }

    /// Identity comparison.
    ///
    /// Shared variants (strings, lists, maps) are identical when they point
    /// at the same allocation. Scalars have no identity and compare by value.
    #[must_use]
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Rc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Map(a), Self::Map(b)) => Rc::ptr_eq(a, b),
            (Self::Str(_) | Self::List(_) | Self::Map(_), _)
            | (_, Self::Str(_) | Self::List(_) | Self::Map(_)) => false,
            _ => self == other,
        }
    }

    /// Return a copy of this tree with the subtree at `keys` replaced.
    ///
    /// Missing intermediate locations (and scalars in the way) become maps.
    /// Ancestors along `keys` are rebuilt; siblings are shared.
    pub(crate) fn with_replaced(
        &self,
        keys: &[Rc<str>],
        replacement: Value,
    ) -> Result<Value, &'static str> {
        let Some((key, rest)) = keys.split_first() else {
            return Ok(replacement);
        };
        match self {
            Self::List(items) => {
                let index = list_index(key).ok_or("list elements are addressed by index")?;
                let current = items.get(index).cloned().unwrap_or_default();
                let next_child = current.with_replaced(rest, replacement)?;
                let mut next = Vec::clone(items);
                if index >= next.len() {
                    next.resize(index + 1, Value::Undefined);
                }
                next[index] = next_child;
                Ok(Self::List(Rc::new(next)))
            }
            Self::Map(map) => Ok(Self::Map(Rc::new(Self::replace_entry(
                ValueMap::clone(map),
                key,
                rest,
                replacement,
            )?))),
            _ => Ok(Self::Map(Rc::new(Self::replace_entry(
                ValueMap::new(),
                key,
                rest,
                replacement,
            )?))),
        }
    }

    fn replace_entry(
        mut map: ValueMap,
        key: &Rc<str>,
        rest: &[Rc<str>],
        replacement: Value,
    ) -> Result<ValueMap, &'static str> {
        let current = map.get(&**key).cloned().unwrap_or_default();
        let next_child = current.with_replaced(rest, replacement)?;
        if next_child.is_undefined() {
            map.remove(&**key);
        } else {
            map.insert(Rc::clone(key), next_child);
        }
        Ok(map)
    }

    fn write_json_like(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{:?}", &**s),
            Self::Undefined => f.write_str("undefined"),
            other => write!(f, "{other}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) | (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            // NaN equals NaN here so repeated NaN writes stay idempotent.
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Str(a), Self::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b) || a == b,
            (Self::Map(a), Self::Map(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

/// Text form used when a value is rendered into a slot.
///
/// Strings print raw, `Undefined` prints nothing, containers print in a
/// compact JSON-like form.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => Ok(()),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    item.write_json_like(f)?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{:?}:", &**key)?;
                    value.write_json_like(f)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_json_like(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Self::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Str(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Self::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(Rc::new(items))
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Self::Map(Rc::new(map))
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Self::Null
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

/// Index named by a list segment.
///
/// Only the canonical spelling is accepted, so every element has exactly one
/// path and string comparison of segments stays sound.
fn list_index(key: &str) -> Option<usize> {
    let canonical = !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key == "0" || !key.starts_with('0'));
    if canonical { key.parse().ok() } else { None }
}

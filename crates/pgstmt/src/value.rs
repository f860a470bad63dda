//! Bound parameter values.
//!
//! [`Value`] is the closed set of things a statement can bind. Scalars compare by
//! value; `Array`, `Object`, `Json` and `Function` are reference values backed by an
//! `Arc`, so cloning a `Value` keeps its identity while building a second, equal value
//! does not. The deduplication pass relies on that distinction in strict mode and on
//! [`StructuralEq`] in deep mode.

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::Arc;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type, to_sql_checked};
use uuid::Uuid;

/// A value bound to a positional placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// An absent value. Binds as NULL but is never equal to [`Value::Null`].
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Json(Arc<serde_json::Value>),
    Array(Arc<Vec<Value>>),
    Object(Arc<BTreeMap<String, Value>>),
    Function(Arc<FnDescriptor>),
}

/// A callable described by its declared parameter list and body text.
///
/// Two descriptors are equal when both the parameter list and the body text match
/// exactly. This is a textual policy: semantically equivalent functions written
/// differently are not equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnDescriptor {
    pub params: Vec<String>,
    pub body: String,
}

impl Value {
    /// Build an array value with a fresh identity.
    pub fn array<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::Array(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    /// Build an object value with a fresh identity.
    pub fn object<K: Into<String>, V: Into<Value>>(
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Value::Object(Arc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Build a JSON value with a fresh identity.
    pub fn json(value: serde_json::Value) -> Self {
        Value::Json(Arc::new(value))
    }

    /// Build a function value from its parameter list and body text.
    pub fn function<P: Into<String>>(
        params: impl IntoIterator<Item = P>,
        body: impl Into<String>,
    ) -> Self {
        Value::Function(Arc::new(FnDescriptor {
            params: params.into_iter().map(Into::into).collect(),
            body: body.into(),
        }))
    }

    /// Check if this value binds as SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    /// Short kind name, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamp",
            Value::Json(_) => "json",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Identity key used by strict-mode deduplication.
    ///
    /// Returns `None` for values that are never equal to anything, including
    /// themselves (NaN).
    pub(crate) fn strict_key(&self) -> Option<StrictKey<'_>> {
        Some(match self {
            Value::Null => StrictKey::Null,
            Value::Undefined => StrictKey::Undefined,
            Value::Bool(b) => StrictKey::Bool(*b),
            Value::Int(n) => StrictKey::Int(*n),
            Value::Float(f) if f.is_nan() => return None,
            // +0.0 and -0.0 compare equal
            Value::Float(f) if *f == 0.0 => StrictKey::Float(0.0f64.to_bits()),
            Value::Float(f) => StrictKey::Float(f.to_bits()),
            Value::Text(s) => StrictKey::Text(s),
            Value::Uuid(u) => StrictKey::Uuid(*u),
            Value::Timestamp(t) => StrictKey::Timestamp(*t),
            Value::Json(v) => StrictKey::Ref(Arc::as_ptr(v) as *const () as usize),
            Value::Array(v) => StrictKey::Ref(Arc::as_ptr(v) as *const () as usize),
            Value::Object(v) => StrictKey::Ref(Arc::as_ptr(v) as *const () as usize),
            Value::Function(v) => StrictKey::Ref(Arc::as_ptr(v) as *const () as usize),
        })
    }

    /// Convert into a JSON document. Function values have no JSON form.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        use serde_json::Value as J;
        Some(match self {
            Value::Null | Value::Undefined => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(n) => J::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f).map_or(J::Null, J::Number),
            Value::Text(s) => J::String(s.clone()),
            Value::Uuid(u) => J::String(u.to_string()),
            Value::Timestamp(t) => J::String(t.to_rfc3339()),
            Value::Json(v) => (**v).clone(),
            Value::Array(items) => J::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Object(map) => J::Object(
                map.iter()
                    .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect::<Option<serde_json::Map<_, _>>>()?,
            ),
            Value::Function(_) => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum StrictKey<'a> {
    Null,
    Undefined,
    Bool(bool),
    Int(i64),
    Float(u64),
    Text(&'a str),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Ref(usize),
}

/// Structural equality across value kinds.
///
/// Rules: scalars are equal iff they are the same kind with the same value; arrays
/// are equal iff they have the same length and pairwise equal items; objects are
/// equal iff they have the same key set and pairwise equal values; functions are
/// equal iff their parameter lists and body text match. `Null` and `Undefined` are
/// only equal to themselves, and values of different kinds are never equal.
pub trait StructuralEq {
    fn structural_eq(&self, other: &Self) -> bool;
}

impl StructuralEq for Value {
    fn structural_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::Array(a), Value::Array(b)) => {
                Arc::ptr_eq(a, b) || a.as_slice().structural_eq(b.as_slice())
            }
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b) || (**a).structural_eq(b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b) || (**a).structural_eq(b),
            _ => false,
        }
    }
}

impl StructuralEq for [Value] {
    fn structural_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|(a, b)| a.structural_eq(b))
    }
}

impl StructuralEq for BTreeMap<String, Value> {
    fn structural_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| v.structural_eq(o)))
    }
}

impl StructuralEq for FnDescriptor {
    fn structural_eq(&self, other: &Self) -> bool {
        self.params == other.params && self.body == other.body
    }
}

// ==================== Conversions ====================

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::json(v)
    }
}

impl From<FnDescriptor> for Value {
    fn from(v: FnDescriptor) -> Self {
        Value::Function(Arc::new(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::array(v)
    }
}

/// Values supplied to a single leaf.
///
/// A scalar becomes a one-element list; a `Vec` or array is flattened so each item
/// fills one placeholder. To bind a whole list to one placeholder (for example
/// `= ANY(?)`), pass a [`Value::array`].
pub trait IntoBindings {
    fn into_bindings(self) -> Vec<Value>;
}

impl IntoBindings for Value {
    fn into_bindings(self) -> Vec<Value> {
        vec![self]
    }
}

impl IntoBindings for () {
    fn into_bindings(self) -> Vec<Value> {
        Vec::new()
    }
}

impl<T: Into<Value>> IntoBindings for Vec<T> {
    fn into_bindings(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<Value>, const N: usize> IntoBindings for [T; N] {
    fn into_bindings(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<T: Into<Value>> IntoBindings for Option<T> {
    fn into_bindings(self) -> Vec<Value> {
        vec![self.into()]
    }
}

macro_rules! impl_scalar_bindings {
    ($($t:ty),*) => {
        $(impl IntoBindings for $t {
            fn into_bindings(self) -> Vec<Value> {
                vec![Value::from(self)]
            }
        })*
    };
}

impl_scalar_bindings!(
    bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, &str, String, &String, Uuid,
    DateTime<Utc>, serde_json::Value, FnDescriptor
);

// ==================== tokio-postgres ====================

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null | Value::Undefined => Ok(IsNull::Yes),
            Value::Bool(b) => b.to_sql_checked(ty, out),
            Value::Int(n) => {
                if *ty == Type::INT2 {
                    i16::try_from(*n)?.to_sql_checked(ty, out)
                } else if *ty == Type::INT4 {
                    i32::try_from(*n)?.to_sql_checked(ty, out)
                } else {
                    n.to_sql_checked(ty, out)
                }
            }
            Value::Float(f) => {
                if *ty == Type::FLOAT4 {
                    (*f as f32).to_sql_checked(ty, out)
                } else {
                    f.to_sql_checked(ty, out)
                }
            }
            Value::Text(s) => s.as_str().to_sql_checked(ty, out),
            Value::Uuid(u) => u.to_sql_checked(ty, out),
            Value::Timestamp(t) => t.to_sql_checked(ty, out),
            Value::Json(v) => (**v).to_sql_checked(ty, out),
            Value::Array(items) => {
                if !matches!(ty.kind(), Kind::Array(_)) {
                    return Err(format!("cannot bind array value to {ty}").into());
                }
                (**items).to_sql_checked(ty, out)
            }
            Value::Object(_) => match self.to_json() {
                Some(doc) => doc.to_sql_checked(ty, out),
                None => Err("object value contains a function and has no JSON form".into()),
            },
            Value::Function(_) => Err("function values cannot be bound as SQL parameters".into()),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let a = Value::array([1, 2]);
        let b = a.clone();
        let c = Value::array([1, 2]);
        assert_eq!(a.strict_key(), b.strict_key());
        assert_ne!(a.strict_key(), c.strict_key());
        assert!(a.structural_eq(&c));
    }

    #[test]
    fn scalars_compare_by_value_in_strict_mode() {
        assert_eq!(Value::from(1).strict_key(), Value::from(1i64).strict_key());
        assert_eq!(Value::from("x").strict_key(), Value::from("x".to_string()).strict_key());
        assert_eq!(Value::Float(0.0).strict_key(), Value::Float(-0.0).strict_key());
        assert!(Value::Float(f64::NAN).strict_key().is_none());
    }

    #[test]
    fn null_and_undefined_are_distinct() {
        assert!(Value::Null.structural_eq(&Value::Null));
        assert!(!Value::Null.structural_eq(&Value::Undefined));
        assert!(!Value::Undefined.structural_eq(&Value::from(false)));
        assert_ne!(Value::Null.strict_key(), Value::Undefined.strict_key());
    }

    #[test]
    fn mismatched_kinds_are_never_equal() {
        assert!(!Value::Int(1).structural_eq(&Value::Float(1.0)));
        assert!(!Value::Text("1".into()).structural_eq(&Value::Int(1)));
        assert!(!Value::array([1]).structural_eq(&Value::object([("0", 1)])));
    }

    #[test]
    fn objects_ignore_key_order() {
        let a = Value::object([("a", Value::from(1)), ("b", Value::array(["x"]))]);
        let b = Value::object([("b", Value::array(["x"])), ("a", Value::from(1))]);
        assert!(a.structural_eq(&b));

        let c = Value::object([("a", 1)]);
        assert!(!a.structural_eq(&c));
    }

    #[test]
    fn nested_arrays_compare_pairwise() {
        let a = Value::array([Value::array([1, 2]), Value::from("z")]);
        let b = Value::array([Value::array([1, 2]), Value::from("z")]);
        let c = Value::array([Value::array([2, 1]), Value::from("z")]);
        assert!(a.structural_eq(&b));
        assert!(!a.structural_eq(&c));
        assert!(!Value::array([1, 2]).structural_eq(&Value::array([1, 2, 3])));
    }

    #[test]
    fn functions_compare_by_signature_and_body() {
        let f = Value::function(["a", "b"], "return a + b");
        let g = Value::function(["a", "b"], "return a + b");
        let h = Value::function(["x", "y"], "return x + y");
        assert!(f.structural_eq(&g));
        assert!(!f.structural_eq(&h));
    }

    #[test]
    fn bindings_flatten_lists() {
        assert_eq!(5i32.into_bindings(), vec![Value::Int(5)]);
        assert_eq!(vec![1, 2].into_bindings(), vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(["a", "b"].into_bindings().len(), 2);
        assert!(().into_bindings().is_empty());
        assert_eq!(None::<i32>.into_bindings(), vec![Value::Null]);
        assert_eq!(Value::array([1, 2]).into_bindings().len(), 1);
    }

    #[test]
    fn object_converts_to_json() {
        let v = Value::object([("id", Value::from(7)), ("tags", Value::array(["a"]))]);
        assert_eq!(v.to_json(), Some(serde_json::json!({"id": 7, "tags": ["a"]})));
        assert_eq!(Value::function(["x"], "x").to_json(), None);
    }
}

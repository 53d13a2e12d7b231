//! Typed property values and the insertion-ordered property map.
//!
//! Values are stored in the kind they were set with. Reads go through an
//! explicit coercion table: widening integer and float conversions, any kind to
//! string, and string parsing into any kind. Everything else is a
//! [`SendError::Format`].

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SendError, SendResult};

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl PropertyValue {
    /// Convert a generic JSON value into a property value.
    ///
    /// Only scalars are accepted: booleans, integers that fit in `i64`,
    /// floating point numbers and strings.
    pub fn from_json(value: &Value) -> SendResult<Self> {
        match value {
            Value::Bool(b) => Ok(PropertyValue::Bool(*b)),
            Value::String(s) => Ok(PropertyValue::String(s.clone())),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(PropertyValue::Long(i))
                } else if n.is_u64() {
                    Err(SendError::format(format!("integer {} does not fit a long", n)))
                } else if let Some(f) = n.as_f64() {
                    Ok(PropertyValue::Double(f))
                } else {
                    Err(SendError::format(format!("unsupported number {}", n)))
                }
            }
            Value::Null => Err(SendError::format("null is not a valid property value")),
            Value::Array(_) | Value::Object(_) => Err(SendError::format(
                "only scalar values can be used as properties",
            )),
        }
    }

    /// Render back into JSON.
    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Bool(b) => Value::from(*b),
            PropertyValue::Byte(v) => Value::from(*v),
            PropertyValue::Short(v) => Value::from(*v),
            PropertyValue::Int(v) => Value::from(*v),
            PropertyValue::Long(v) => Value::from(*v),
            PropertyValue::Float(v) => Value::from(*v as f64),
            PropertyValue::Double(v) => Value::from(*v),
            PropertyValue::String(s) => Value::from(s.as_str()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "boolean",
            PropertyValue::Byte(_) => "byte",
            PropertyValue::Short(_) => "short",
            PropertyValue::Int(_) => "int",
            PropertyValue::Long(_) => "long",
            PropertyValue::Float(_) => "float",
            PropertyValue::Double(_) => "double",
            PropertyValue::String(_) => "string",
        }
    }

    fn mismatch(&self, target: &str) -> SendError {
        SendError::format(format!("cannot read {} property as {}", self.kind(), target))
    }

    fn parse<T: std::str::FromStr>(s: &str, target: &str) -> SendResult<T> {
        s.trim()
            .parse::<T>()
            .map_err(|_| SendError::format(format!("cannot parse {:?} as {}", s, target)))
    }

    pub fn as_bool(&self) -> SendResult<bool> {
        match self {
            PropertyValue::Bool(b) => Ok(*b),
            PropertyValue::String(s) => Ok(s.eq_ignore_ascii_case("true")),
            other => Err(other.mismatch("boolean")),
        }
    }

    pub fn as_byte(&self) -> SendResult<i8> {
        match self {
            PropertyValue::Byte(v) => Ok(*v),
            PropertyValue::String(s) => Self::parse(s, "byte"),
            other => Err(other.mismatch("byte")),
        }
    }

    pub fn as_short(&self) -> SendResult<i16> {
        match self {
            PropertyValue::Byte(v) => Ok(i16::from(*v)),
            PropertyValue::Short(v) => Ok(*v),
            PropertyValue::String(s) => Self::parse(s, "short"),
            other => Err(other.mismatch("short")),
        }
    }

    pub fn as_int(&self) -> SendResult<i32> {
        match self {
            PropertyValue::Byte(v) => Ok(i32::from(*v)),
            PropertyValue::Short(v) => Ok(i32::from(*v)),
            PropertyValue::Int(v) => Ok(*v),
            PropertyValue::String(s) => Self::parse(s, "int"),
            other => Err(other.mismatch("int")),
        }
    }

    pub fn as_long(&self) -> SendResult<i64> {
        match self {
            PropertyValue::Byte(v) => Ok(i64::from(*v)),
            PropertyValue::Short(v) => Ok(i64::from(*v)),
            PropertyValue::Int(v) => Ok(i64::from(*v)),
            PropertyValue::Long(v) => Ok(*v),
            PropertyValue::String(s) => Self::parse(s, "long"),
            other => Err(other.mismatch("long")),
        }
    }

    pub fn as_float(&self) -> SendResult<f32> {
        match self {
            PropertyValue::Float(v) => Ok(*v),
            PropertyValue::String(s) => Self::parse(s, "float"),
            other => Err(other.mismatch("float")),
        }
    }

    pub fn as_double(&self) -> SendResult<f64> {
        match self {
            PropertyValue::Float(v) => Ok(f64::from(*v)),
            PropertyValue::Double(v) => Ok(*v),
            PropertyValue::String(s) => Self::parse(s, "double"),
            other => Err(other.mismatch("double")),
        }
    }

    /// Every kind has a string form.
    pub fn as_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Byte(v) => write!(f, "{}", v),
            PropertyValue::Short(v) => write!(f, "{}", v),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Long(v) => write!(f, "{}", v),
            PropertyValue::Float(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::String(v) => f.write_str(v),
        }
    }
}

macro_rules! impl_from_property {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for PropertyValue {
                fn from(value: $ty) -> Self {
                    PropertyValue::$variant(value)
                }
            }
        )*
    };
}

impl_from_property! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

/// Property names must be non-empty.
pub(crate) fn check_name(name: &str) -> SendResult<()> {
    if name.is_empty() {
        return Err(SendError::validation("property name must not be empty"));
    }
    Ok(())
}

/// Insertion-ordered property storage.
///
/// Replacing an existing name keeps its original position. Lookups are linear;
/// property sets are small.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyMap {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a property. Fails on an empty name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> SendResult<()> {
        let name = name.into();
        check_name(&name)?;
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((name, value)),
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        let index = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Overwrite entries in `self` with every entry of `other`.
    pub(crate) fn overlay(&mut self, other: &PropertyMap) {
        for (name, value) in &other.entries {
            match self.entries.iter_mut().find(|(n, _)| n == name) {
                Some((_, existing)) => *existing = value.clone(),
                None => self.entries.push((name.clone(), value.clone())),
            }
        }
    }

    fn require(&self, name: &str) -> SendResult<&PropertyValue> {
        self.get(name)
            .ok_or_else(|| SendError::format(format!("property `{}` is not set", name)))
    }

    /// Absent properties read as `false`.
    pub fn get_bool(&self, name: &str) -> SendResult<bool> {
        match self.get(name) {
            Some(value) => value.as_bool(),
            None => Ok(false),
        }
    }

    pub fn get_byte(&self, name: &str) -> SendResult<i8> {
        self.require(name)?.as_byte()
    }

    pub fn get_short(&self, name: &str) -> SendResult<i16> {
        self.require(name)?.as_short()
    }

    pub fn get_int(&self, name: &str) -> SendResult<i32> {
        self.require(name)?.as_int()
    }

    pub fn get_long(&self, name: &str) -> SendResult<i64> {
        self.require(name)?.as_long()
    }

    pub fn get_float(&self, name: &str) -> SendResult<f32> {
        self.require(name)?.as_float()
    }

    pub fn get_double(&self, name: &str) -> SendResult<f64> {
        self.require(name)?.as_double()
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        self.get(name).map(PropertyValue::as_string)
    }
}

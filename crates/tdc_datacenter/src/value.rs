//! Typed attribute values and node keys.

use std::fmt;
use std::sync::Arc;

use crate::error::{ArgumentError, Result};

/// Type code of integer and boolean attributes
pub(crate) const TYPE_INT: u16 = 1;
/// Type code of single precision attributes
pub(crate) const TYPE_SINGLE: u16 = 2;
/// Type code of string attributes
pub(crate) const TYPE_STRING: u16 = 3;
/// Extended code distinguishing booleans from integers
pub(crate) const EXTENSION_BOOLEAN: u16 = 1;

/// The value of a node attribute
#[derive(Debug, Clone, PartialEq)]
pub enum DataCenterValue {
    /// 32-bit signed integer
    Int(i32),
    /// 32-bit float
    Single(f32),
    /// Interned string
    String(Arc<str>),
    /// Boolean flag
    Boolean(bool),
}

impl DataCenterValue {
    /// The `type_info` field this value is stored with
    pub const fn type_info(&self) -> u16 {
        match self {
            DataCenterValue::Int(_) => TYPE_INT,
            DataCenterValue::Single(_) => TYPE_SINGLE,
            DataCenterValue::String(_) => TYPE_STRING,
            DataCenterValue::Boolean(_) => TYPE_INT | EXTENSION_BOOLEAN << 2,
        }
    }

    /// Name of the variant, for diagnostics
    pub const fn type_name(&self) -> &'static str {
        match self {
            DataCenterValue::Int(_) => "int",
            DataCenterValue::Single(_) => "single",
            DataCenterValue::String(_) => "string",
            DataCenterValue::Boolean(_) => "boolean",
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            DataCenterValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_single(&self) -> Option<f32> {
        match self {
            DataCenterValue::Single(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataCenterValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataCenterValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for DataCenterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataCenterValue::Int(v) => write!(f, "{v}"),
            DataCenterValue::Single(v) => write!(f, "{v}"),
            DataCenterValue::String(v) => f.write_str(v),
            DataCenterValue::Boolean(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for DataCenterValue {
    fn from(value: i32) -> Self {
        DataCenterValue::Int(value)
    }
}

impl From<f32> for DataCenterValue {
    fn from(value: f32) -> Self {
        DataCenterValue::Single(value)
    }
}

impl From<bool> for DataCenterValue {
    fn from(value: bool) -> Self {
        DataCenterValue::Boolean(value)
    }
}

impl From<&str> for DataCenterValue {
    fn from(value: &str) -> Self {
        DataCenterValue::String(value.into())
    }
}

impl From<String> for DataCenterValue {
    fn from(value: String) -> Self {
        DataCenterValue::String(value.into())
    }
}

impl From<Arc<str>> for DataCenterValue {
    fn from(value: Arc<str>) -> Self {
        DataCenterValue::String(value)
    }
}

/// Attribute names the client uses to index the children of a node
///
/// Holds at most [`DataCenterKeys::MAX`] names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DataCenterKeys {
    names: Vec<Arc<str>>,
}

impl DataCenterKeys {
    /// Maximum number of key names
    pub const MAX: usize = 4;

    /// Build a key set, rejecting empty names and more than [`DataCenterKeys::MAX`] entries
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let names: Vec<Arc<str>> = names.into_iter().map(Into::into).collect();

        if names.len() > Self::MAX {
            return Err(ArgumentError::TooManyKeys(names.len()).into());
        }

        if names.iter().any(|name| name.is_empty()) {
            return Err(ArgumentError::EmptyName.into());
        }

        Ok(Self { names })
    }

    /// The key set without any names
    pub fn none() -> Self {
        Self::default()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|name| &**name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub(crate) fn from_names(names: Vec<Arc<str>>) -> Self {
        Self { names }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::error::{ArgumentError, Error};
    use crate::value::{DataCenterKeys, DataCenterValue};

    #[test]
    fn type_info() {
        assert_eq!(DataCenterValue::from(5).type_info(), 1);
        assert_eq!(DataCenterValue::from(true).type_info(), 5);
        assert_eq!(DataCenterValue::from(1.5f32).type_info(), 2);
        assert_eq!(DataCenterValue::from("x").type_info(), 3);
    }

    #[test]
    fn accessors() {
        let value = DataCenterValue::from("hello");
        assert_eq!(value.as_str(), Some("hello"));
        assert_eq!(value.as_int(), None);
        assert_eq!(value.to_string(), "hello");
        assert_eq!(DataCenterValue::Int(-3).as_int(), Some(-3));
    }

    #[test]
    fn keys_are_limited() {
        let keys = DataCenterKeys::new(["id", "name"]).unwrap();
        assert_eq!(keys.names().collect::<Vec<_>>(), vec!["id", "name"]);

        let err = DataCenterKeys::new(["a", "b", "c", "d", "e"]).unwrap_err();
        assert!(matches!(err, Error::Argument(ArgumentError::TooManyKeys(5))));

        let err = DataCenterKeys::new([""]).unwrap_err();
        assert!(matches!(err, Error::Argument(ArgumentError::EmptyName)));
    }
}

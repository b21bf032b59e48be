//! Typed module properties exposed to a host UI.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors reading or writing a property.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("Unknown property: {0}")]
    Unknown(String),

    #[error("Property '{name}' expects a {expected}")]
    TypeMismatch {
        name: &'static str,
        expected: PropertyKind,
    },

    #[error("Property '{0}' is read-only")]
    ReadOnly(&'static str),
}

/// Value type of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Bool,
    Number,
    Text,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKind::Bool => f.write_str("bool"),
            PropertyKind::Number => f.write_str("number"),
            PropertyKind::Text => f.write_str("text"),
        }
    }
}

/// A property value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Bool(_) => PropertyKind::Bool,
            PropertyValue::Number(_) => PropertyKind::Number,
            PropertyValue::Text(_) => PropertyKind::Text,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

type Getter<M> = fn(&M) -> PropertyValue;
type Setter<M> = fn(&mut M, PropertyValue) -> Option<()>;

/// Descriptor binding a property name to accessors on module type `M`.
///
/// A setter returns `None` when handed a value of the wrong type.
pub struct Property<M> {
    pub name: &'static str,
    pub kind: PropertyKind,
    get: Getter<M>,
    set: Option<Setter<M>>,
}

impl<M> Property<M> {
    pub const fn read_only(name: &'static str, kind: PropertyKind, get: Getter<M>) -> Self {
        Self {
            name,
            kind,
            get,
            set: None,
        }
    }

    pub const fn read_write(
        name: &'static str,
        kind: PropertyKind,
        get: Getter<M>,
        set: Setter<M>,
    ) -> Self {
        Self {
            name,
            kind,
            get,
            set: Some(set),
        }
    }

    pub fn get(&self, module: &M) -> PropertyValue {
        (self.get)(module)
    }

    pub fn set(&self, module: &mut M, value: PropertyValue) -> Result<(), PropertyError> {
        let set = self.set.ok_or(PropertyError::ReadOnly(self.name))?;
        if value.kind() != self.kind {
            return Err(self.mismatch());
        }
        set(module, value).ok_or_else(|| self.mismatch())
    }

    pub fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    fn mismatch(&self) -> PropertyError {
        PropertyError::TypeMismatch {
            name: self.name,
            expected: self.kind,
        }
    }
}

/// Look up `name` in a descriptor table and read it.
pub fn get_property<M>(
    table: &[Property<M>],
    module: &M,
    name: &str,
) -> Result<PropertyValue, PropertyError> {
    table
        .iter()
        .find(|p| p.name == name)
        .map(|p| p.get(module))
        .ok_or_else(|| PropertyError::Unknown(name.to_string()))
}

/// Look up `name` in a descriptor table and write it.
pub fn set_property<M>(
    table: &[Property<M>],
    module: &mut M,
    name: &str,
    value: PropertyValue,
) -> Result<(), PropertyError> {
    table
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| PropertyError::Unknown(name.to_string()))?
        .set(module, value)
}

use std::fmt;
use std::str::FromStr;

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::value::AttributeType;

// ---------------------------------------------------------------------------
// Attribute
// ---------------------------------------------------------------------------

/// A single named attribute within a tuple schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub ty: AttributeType,
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// An ordered tuple schema, parsed from a compact string like
/// `"id: int64, name: string"`.
///
/// Attribute order is significant: two schemas are assignable only when
/// their attribute sequences match exactly by name and type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    attributes: Vec<Attribute>,
}

impl Schema {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Lookup an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Whether a stream carrying `other` may be assigned to a port
    /// declared with `self`. Exact name + type sequence equality.
    pub fn is_assignable_from(&self, other: &Schema) -> bool {
        self == other
    }
}

impl FromStr for Schema {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            anyhow::bail!("empty schema string");
        }

        let mut attributes = Vec::new();
        for part in s.split(',') {
            let (name, ty) = part
                .split_once(':')
                .ok_or_else(|| anyhow::anyhow!("schema attribute {part:?} missing `name: type`"))?;
            let name = name.trim();
            if name.is_empty() {
                anyhow::bail!("schema attribute {part:?} has an empty name");
            }
            if !is_valid_attr_name(name) {
                anyhow::bail!("invalid attribute name {name:?}");
            }
            if attributes.iter().any(|a: &Attribute| a.name == name) {
                anyhow::bail!("duplicate attribute name {name:?}");
            }
            attributes.push(Attribute {
                name: name.to_string(),
                ty: ty.parse()?,
            });
        }

        Ok(Self { attributes })
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attr) in self.attributes.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", attr.name, attr.ty)?;
        }
        Ok(())
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Attribute names follow identifier rules: `[A-Za-z_][A-Za-z0-9_]*`.
fn is_valid_attr_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

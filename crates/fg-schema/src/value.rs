use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AttributeType
// ---------------------------------------------------------------------------

/// Scalar types supported in tuple schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    Int32,
    Int64,
    Float64,
    Bool,
    String,
    Timestamp,
}

impl AttributeType {
    /// Whether values of this type have a total order usable by delta
    /// window policies. Booleans and strings do not qualify.
    pub fn is_ordered(&self) -> bool {
        !matches!(self, Self::Bool | Self::String)
    }
}

impl FromStr for AttributeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim() {
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            "float64" => Ok(Self::Float64),
            "bool" => Ok(Self::Bool),
            "string" => Ok(Self::String),
            "timestamp" => Ok(Self::Timestamp),
            other => anyhow::bail!(
                "unknown attribute type {other:?} (expected int32/int64/float64/bool/string/timestamp)"
            ),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Timestamp => "timestamp",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Value
// ---------------------------------------------------------------------------

/// A typed scalar value: parameter bindings and delta-policy thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Bool(bool),
    String(String),
    /// Seconds since the epoch.
    Timestamp(f64),
}

impl Value {
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            Self::Int32(_) => AttributeType::Int32,
            Self::Int64(_) => AttributeType::Int64,
            Self::Float64(_) => AttributeType::Float64,
            Self::Bool(_) => AttributeType::Bool,
            Self::String(_) => AttributeType::String,
            Self::Timestamp(_) => AttributeType::Timestamp,
        }
    }

    /// Parse a literal as a value of the given type.
    pub fn parse_typed(ty: AttributeType, literal: &str) -> anyhow::Result<Self> {
        let s = literal.trim();
        let parsed = match ty {
            AttributeType::Int32 => s.parse().map(Self::Int32).ok(),
            AttributeType::Int64 => s.parse().map(Self::Int64).ok(),
            AttributeType::Float64 => s.parse().map(Self::Float64).ok(),
            AttributeType::Bool => s.parse().map(Self::Bool).ok(),
            AttributeType::String => Some(Self::String(s.to_string())),
            AttributeType::Timestamp => s.parse().map(Self::Timestamp).ok(),
        };
        parsed.ok_or_else(|| anyhow::anyhow!("invalid {ty} literal: {literal:?}"))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v}"),
            Self::Timestamp(v) => write!(f, "{v}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

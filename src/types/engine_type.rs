//! This module defines the canonical, type-safe representation of the element
//! types the engine accepts in a column or matrix buffer.

use crate::error::ExchangeError;
use arrow::datatypes::DataType as ArrowDataType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The element type tag attached to every buffer handed to the engine.
///
/// Each variant names exactly one engine type constant. Date-time values are
/// always carried as ISO-like text, but keep their own tag so the engine parses
/// them as time rather than as free text.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EngineType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Text,
    DateTime,
}

impl EngineType {
    /// Maps an Arrow `DataType` through the fixed element-type table.
    ///
    /// Types outside the table return `UnsupportedType`; the marshaler treats
    /// that as the "object" class and attempts a date-time reinterpretation
    /// before giving up.
    pub fn from_arrow_type(arrow_type: &ArrowDataType) -> Result<Self, ExchangeError> {
        match arrow_type {
            ArrowDataType::Int8 => Ok(Self::Int8),
            ArrowDataType::Int16 => Ok(Self::Int16),
            ArrowDataType::Int32 => Ok(Self::Int32),
            ArrowDataType::Int64 => Ok(Self::Int64),
            ArrowDataType::UInt8 => Ok(Self::UInt8),
            ArrowDataType::UInt16 => Ok(Self::UInt16),
            ArrowDataType::UInt32 => Ok(Self::UInt32),
            ArrowDataType::UInt64 => Ok(Self::UInt64),
            ArrowDataType::Float32 => Ok(Self::Float32),
            ArrowDataType::Float64 => Ok(Self::Float64),
            ArrowDataType::Utf8 | ArrowDataType::LargeUtf8 | ArrowDataType::Utf8View => {
                Ok(Self::Text)
            }
            ArrowDataType::Timestamp(_, _) | ArrowDataType::Date32 | ArrowDataType::Date64 => {
                Ok(Self::DateTime)
            }
            // Time deltas travel as their integer count.
            ArrowDataType::Duration(_) => Ok(Self::Int64),
            dt => Err(ExchangeError::UnsupportedType(format!(
                "Cannot convert Arrow type {:?} to an engine type",
                dt
            ))),
        }
    }

    /// The symbolic engine constant for this type tag.
    pub fn constant_name(&self) -> &'static str {
        match self {
            Self::Int8 => "GMT_CHAR",
            Self::Int16 => "GMT_SHORT",
            Self::Int32 => "GMT_INT",
            Self::Int64 => "GMT_LONG",
            Self::UInt8 => "GMT_UCHAR",
            Self::UInt16 => "GMT_USHORT",
            Self::UInt32 => "GMT_UINT",
            Self::UInt64 => "GMT_ULONG",
            Self::Float32 => "GMT_FLOAT",
            Self::Float64 => "GMT_DOUBLE",
            Self::Text => "GMT_TEXT",
            Self::DateTime => "GMT_DATETIME",
        }
    }

    /// Returns `true` if values of this type travel as a string table.
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::Text | Self::DateTime)
    }

    /// Returns `true` if the data type is a floating-point number.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

/// Returns `true` for Arrow string types, the only host types that start a
/// trailing text block in a table.
pub fn is_arrow_text(arrow_type: &ArrowDataType) -> bool {
    matches!(
        arrow_type,
        ArrowDataType::Utf8 | ArrowDataType::LargeUtf8 | ArrowDataType::Utf8View
    )
}

/// Provides the canonical string representation for an `EngineType`.
impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

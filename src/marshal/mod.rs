// In: src/marshal/mod.rs

//! The Buffer Marshaler: host arrays to contiguous, typed engine buffers.
//!
//! A `Buffer` is the only thing handed to the container builder. It always owns
//! (or shares, through Arrow's reference-counted buffers) one contiguous block
//! tagged with its engine type, so the engine may read it at any time while
//! the buffer is alive.
//!
//! Conversion steps for one host column:
//! 1.  Map the Arrow type through the fixed table in `EngineType::from_arrow_type`.
//!     Unlisted types get one date-time reinterpretation attempt.
//! 2.  Numeric columns without nulls are shared zero-copy. Columns with nulls
//!     are materialized: floats keep their width with NaN, integers are
//!     promoted to `Float64` with NaN.
//! 3.  Text and date-time columns become a NUL-terminated string table.

pub mod datetime;


use arrow::array::{Array, ArrayRef, AsArray, StringViewArray};
use arrow::buffer::ScalarBuffer;
use arrow::compute::cast;
use arrow::datatypes::*;
use ndarray::{Array2, ArrayView2};
use num_traits::{NumCast, ToPrimitive};
use std::ffi::CString;
use std::os::raw::{c_char, c_void};

use crate::error::ExchangeError;
use crate::traits::EngineNative;
use crate::types::engine_type::is_arrow_text;
use crate::types::EngineType;
use crate::utils::to_cstring;

/// Separator used when several trailing text columns are folded into one.
pub const TEXT_JOIN_SEPARATOR: &str = " ";

//==================================================================================
// I. Buffer Types
//==================================================================================

/// The storage of a buffer, one variant per element representation.
#[derive(Debug, Clone)]
pub enum BufferData {
    Int8(ScalarBuffer<i8>),
    Int16(ScalarBuffer<i16>),
    Int32(ScalarBuffer<i32>),
    Int64(ScalarBuffer<i64>),
    UInt8(ScalarBuffer<u8>),
    UInt16(ScalarBuffer<u16>),
    UInt32(ScalarBuffer<u32>),
    UInt64(ScalarBuffer<u64>),
    Float32(ScalarBuffer<f32>),
    Float64(ScalarBuffer<f64>),
    Text(TextData),
}

/// Owned C strings plus the pointer array the engine reads them through.
#[derive(Debug)]
pub struct TextData {
    strings: Vec<CString>,
    // Points into `strings`; CString contents do not move when the Vec does.
    pointers: Vec<*mut c_char>,
}

impl TextData {
    pub fn new<S: AsRef<str>>(values: &[S]) -> Result<Self, ExchangeError> {
        let strings = values
            .iter()
            .map(|value| to_cstring(value.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_cstrings(strings))
    }

    fn from_cstrings(strings: Vec<CString>) -> Self {
        let pointers = strings.iter().map(|s| s.as_ptr() as *mut c_char).collect();
        Self { strings, pointers }
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.strings
            .iter()
            .map(|s| s.to_string_lossy().into_owned())
            .collect()
    }

    pub fn as_ptr(&self) -> *mut *mut c_char {
        self.pointers.as_ptr() as *mut *mut c_char
    }
}

impl Clone for TextData {
    fn clone(&self) -> Self {
        Self::from_cstrings(self.strings.clone())
    }
}

/// A contiguous, engine-typed block of column or matrix data.
#[derive(Debug, Clone)]
pub struct Buffer {
    engine_type: EngineType,
    data: BufferData,
}

impl Buffer {
    /// Wraps numeric values; the engine type follows from `T`.
    pub fn from_scalar<T: EngineNative>(values: ScalarBuffer<T>) -> Self {
        Self {
            engine_type: T::ENGINE_TYPE,
            data: T::into_buffer_data(values),
        }
    }

    pub fn from_vec<T: EngineNative>(values: Vec<T>) -> Self {
        Self::from_scalar(ScalarBuffer::from(values))
    }

    pub fn text<S: AsRef<str>>(values: &[S]) -> Result<Self, ExchangeError> {
        Ok(Self {
            engine_type: EngineType::Text,
            data: BufferData::Text(TextData::new(values)?),
        })
    }

    /// Date-time values already rendered as text.
    pub fn datetime<S: AsRef<str>>(values: &[S]) -> Result<Self, ExchangeError> {
        Ok(Self {
            engine_type: EngineType::DateTime,
            data: BufferData::Text(TextData::new(values)?),
        })
    }

    pub fn engine_type(&self) -> EngineType {
        self.engine_type
    }

    pub fn data(&self) -> &BufferData {
        &self.data
    }

    pub fn len(&self) -> usize {
        match &self.data {
            BufferData::Int8(v) => v.len(),
            BufferData::Int16(v) => v.len(),
            BufferData::Int32(v) => v.len(),
            BufferData::Int64(v) => v.len(),
            BufferData::UInt8(v) => v.len(),
            BufferData::UInt16(v) => v.len(),
            BufferData::UInt32(v) => v.len(),
            BufferData::UInt64(v) => v.len(),
            BufferData::Float32(v) => v.len(),
            BufferData::Float64(v) => v.len(),
            BufferData::Text(t) => t.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every buffer is a single contiguous block.
    pub fn is_contiguous(&self) -> bool {
        true
    }

    /// Address handed to the engine: the first element, or the string pointer array.
    pub fn as_ptr(&self) -> *mut c_void {
        match &self.data {
            BufferData::Int8(v) => v.as_ptr() as *mut c_void,
            BufferData::Int16(v) => v.as_ptr() as *mut c_void,
            BufferData::Int32(v) => v.as_ptr() as *mut c_void,
            BufferData::Int64(v) => v.as_ptr() as *mut c_void,
            BufferData::UInt8(v) => v.as_ptr() as *mut c_void,
            BufferData::UInt16(v) => v.as_ptr() as *mut c_void,
            BufferData::UInt32(v) => v.as_ptr() as *mut c_void,
            BufferData::UInt64(v) => v.as_ptr() as *mut c_void,
            BufferData::Float32(v) => v.as_ptr() as *mut c_void,
            BufferData::Float64(v) => v.as_ptr() as *mut c_void,
            BufferData::Text(t) => t.as_ptr() as *mut c_void,
        }
    }

    /// Numeric contents widened to `f64`; `None` for text buffers.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        fn widen<T: ToPrimitive + Copy>(values: &[T]) -> Vec<f64> {
            values
                .iter()
                .map(|v| v.to_f64().unwrap_or(f64::NAN))
                .collect()
        }
        match &self.data {
            BufferData::Int8(v) => Some(widen(v)),
            BufferData::Int16(v) => Some(widen(v)),
            BufferData::Int32(v) => Some(widen(v)),
            BufferData::Int64(v) => Some(widen(v)),
            BufferData::UInt8(v) => Some(widen(v)),
            BufferData::UInt16(v) => Some(widen(v)),
            BufferData::UInt32(v) => Some(widen(v)),
            BufferData::UInt64(v) => Some(widen(v)),
            BufferData::Float32(v) => Some(widen(v)),
            BufferData::Float64(v) => Some(v.to_vec()),
            BufferData::Text(_) => None,
        }
    }

    /// Text contents; `None` for numeric buffers.
    pub fn strings(&self) -> Option<Vec<String>> {
        match &self.data {
            BufferData::Text(t) => Some(t.to_strings()),
            _ => None,
        }
    }

    pub fn text_data(&self) -> Option<&TextData> {
        match &self.data {
            BufferData::Text(t) => Some(t),
            _ => None,
        }
    }
}

//==================================================================================
// II. Single Column Conversion
//==================================================================================

/// Converts one host column into an engine buffer.
pub fn to_buffer(array: &dyn Array) -> Result<Buffer, ExchangeError> {
    let engine_type = match EngineType::from_arrow_type(array.data_type()) {
        Ok(engine_type) => engine_type,
        Err(ExchangeError::UnsupportedType(reason)) => {
            log::debug!("{}; attempting date-time reinterpretation", reason);
            return Buffer::datetime(&datetime::reinterpret_as_datetime(array)?);
        }
        Err(e) => return Err(e),
    };

    match engine_type {
        EngineType::Text => Buffer::text(&text_values(array)?),
        EngineType::DateTime => Buffer::datetime(&datetime::format_temporal(array)?),
        _ => numeric_buffer(array),
    }
}

fn numeric_buffer(array: &dyn Array) -> Result<Buffer, ExchangeError> {
    match array.data_type() {
        DataType::Int8 => primitive_buffer::<Int8Type>(array),
        DataType::Int16 => primitive_buffer::<Int16Type>(array),
        DataType::Int32 => primitive_buffer::<Int32Type>(array),
        DataType::Int64 => primitive_buffer::<Int64Type>(array),
        DataType::UInt8 => primitive_buffer::<UInt8Type>(array),
        DataType::UInt16 => primitive_buffer::<UInt16Type>(array),
        DataType::UInt32 => primitive_buffer::<UInt32Type>(array),
        DataType::UInt64 => primitive_buffer::<UInt64Type>(array),
        DataType::Float32 => primitive_buffer::<Float32Type>(array),
        DataType::Float64 => primitive_buffer::<Float64Type>(array),
        DataType::Duration(TimeUnit::Second) => primitive_buffer::<DurationSecondType>(array),
        DataType::Duration(TimeUnit::Millisecond) => {
            primitive_buffer::<DurationMillisecondType>(array)
        }
        DataType::Duration(TimeUnit::Microsecond) => {
            primitive_buffer::<DurationMicrosecondType>(array)
        }
        DataType::Duration(TimeUnit::Nanosecond) => {
            primitive_buffer::<DurationNanosecondType>(array)
        }
        dt => Err(ExchangeError::UnsupportedType(format!(
            "{:?} is not a numeric type",
            dt
        ))),
    }
}

fn primitive_buffer<T>(array: &dyn Array) -> Result<Buffer, ExchangeError>
where
    T: ArrowPrimitiveType,
    T::Native: EngineNative + NumCast,
{
    let typed = array.as_primitive_opt::<T>().ok_or_else(|| {
        ExchangeError::UnsupportedType(format!(
            "Array of type {:?} could not be read as a primitive column",
            array.data_type()
        ))
    })?;

    if typed.null_count() == 0 {
        return Ok(Buffer::from_scalar(typed.values().clone()));
    }

    // Only floating-point types can represent NaN in place.
    match <T::Native as NumCast>::from(f64::NAN) {
        Some(nan) => Ok(Buffer::from_vec(
            typed.iter().map(|v| v.unwrap_or(nan)).collect::<Vec<_>>(),
        )),
        None => Ok(Buffer::from_vec(
            typed
                .iter()
                .map(|v| v.and_then(|x| x.to_f64()).unwrap_or(f64::NAN))
                .collect::<Vec<f64>>(),
        )),
    }
}

/// Reads a column as text. Non-text columns are cast to `Utf8` first; nulls become "".
pub fn text_values(array: &dyn Array) -> Result<Vec<String>, ExchangeError> {
    fn collect<'a>(values: impl Iterator<Item = Option<&'a str>>) -> Vec<String> {
        values.map(|v| v.unwrap_or_default().to_string()).collect()
    }

    let values = match array.data_type() {
        DataType::Utf8 => collect(array.as_string::<i32>().iter()),
        DataType::LargeUtf8 => collect(array.as_string::<i64>().iter()),
        DataType::Utf8View => {
            let view = array
                .as_any()
                .downcast_ref::<StringViewArray>()
                .ok_or_else(|| ExchangeError::UnsupportedType("malformed Utf8View".into()))?;
            collect(view.iter())
        }
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
            datetime::format_temporal(array)?
        }
        _ => {
            let rendered = cast(array, &DataType::Utf8)?;
            collect(rendered.as_string::<i32>().iter())
        }
    };
    Ok(values)
}

/// Copies a matrix into one row-major buffer.
pub fn matrix_to_buffer<T: EngineNative>(matrix: ArrayView2<'_, T>) -> Buffer {
    let values = match matrix.as_slice() {
        Some(row_major) => row_major.to_vec(),
        None => matrix.iter().copied().collect(),
    };
    Buffer::from_vec(values)
}

/// Moves an owned matrix into a buffer, copying only if it is not row-major.
pub fn matrix_into_buffer<T: EngineNative>(matrix: Array2<T>) -> Buffer {
    if !matrix.is_standard_layout() {
        return matrix_to_buffer(matrix.view());
    }
    let n = matrix.len();
    let (mut values, offset) = matrix.into_raw_vec_and_offset();
    values.drain(..offset.unwrap_or(0));
    values.truncate(n);
    Buffer::from_vec(values)
}

//==================================================================================
// III. Column Sets
//==================================================================================

/// Buffers for a table: numeric (or date-time) columns plus one optional text column.
#[derive(Debug, Clone)]
pub struct BufferSet {
    pub columns: Vec<Buffer>,
    pub trailing_text: Option<Buffer>,
    pub n_rows: usize,
}

impl BufferSet {
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }
}

/// Index of the first column, from the third onward, that holds text.
pub fn text_split_index(columns: &[ArrayRef]) -> usize {
    columns
        .iter()
        .enumerate()
        .skip(2)
        .find(|(_, column)| is_arrow_text(column.data_type()))
        .map(|(index, _)| index)
        .unwrap_or(columns.len())
}

/// Converts a set of equal-length columns.
///
/// Columns from the split point on are rendered as text and joined row-wise
/// with a single space into the trailing text column.
pub fn to_buffer_set(columns: &[ArrayRef]) -> Result<BufferSet, ExchangeError> {
    let first = columns
        .first()
        .ok_or_else(|| ExchangeError::InvalidInput("No columns were given".to_string()))?;
    let n_rows = first.len();
    if let Some((index, column)) = columns
        .iter()
        .enumerate()
        .find(|(_, column)| column.len() != n_rows)
    {
        return Err(ExchangeError::SizeMismatch(format!(
            "All columns must have the same length: column 0 has {} rows, column {} has {}",
            n_rows,
            index,
            column.len()
        )));
    }

    let split = text_split_index(columns);
    let buffers = columns[..split]
        .iter()
        .map(|column| to_buffer(column.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    let trailing_text = if split < columns.len() {
        let mut rows = vec![Vec::with_capacity(columns.len() - split); n_rows];
        for column in &columns[split..] {
            for (row, value) in rows.iter_mut().zip(text_values(column.as_ref())?) {
                row.push(value);
            }
        }
        let joined: Vec<String> = rows
            .into_iter()
            .map(|parts| parts.join(TEXT_JOIN_SEPARATOR))
            .collect();
        Some(Buffer::text(&joined)?)
    } else {
        None
    };

    Ok(BufferSet {
        columns: buffers,
        trailing_text,
        n_rows,
    })
}

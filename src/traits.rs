//! This module defines shared traits used across the marshaling layer.

use arrow::buffer::ScalarBuffer;

use crate::marshal::BufferData;
use crate::types::EngineType;

/// A plain-old-data primitive the engine can read directly from memory.
///
/// Links a Rust primitive to its engine type tag and to the `BufferData`
/// variant that carries it.
pub trait EngineNative: bytemuck::Pod + arrow::datatypes::ArrowNativeType {
    /// The engine type tag for this primitive.
    const ENGINE_TYPE: EngineType;

    /// Wraps an owned, contiguous run of values as buffer data.
    fn into_buffer_data(values: ScalarBuffer<Self>) -> BufferData;
}

// Implement the trait for every primitive the engine reads natively.
macro_rules! impl_engine_native {
    ($T:ty, $variant:ident) => {
        impl EngineNative for $T {
            const ENGINE_TYPE: EngineType = EngineType::$variant;

            fn into_buffer_data(values: ScalarBuffer<Self>) -> BufferData {
                BufferData::$variant(values)
            }
        }
    };
}

impl_engine_native!(i8, Int8);
impl_engine_native!(i16, Int16);
impl_engine_native!(i32, Int32);
impl_engine_native!(i64, Int64);
impl_engine_native!(u8, UInt8);
impl_engine_native!(u16, UInt16);
impl_engine_native!(u32, UInt32);
impl_engine_native!(u64, UInt64);
impl_engine_native!(f32, Float32);
impl_engine_native!(f64, Float64);

//! This module defines the core, strongly-typed data representations used
//! throughout the exchange layer.
//!
//! It includes the canonical `EngineType` enum, which replaces runtime
//! inspection of host element types with a closed, Arrow-compatible union,
//! and the small enums that name engine data families and grid metadata.

pub mod engine_type;
pub mod kinds;

// Re-export the main type(s) for easier access.
pub use engine_type::EngineType;
pub use kinds::{DataKind, Direction, GridType, Registration, Via};

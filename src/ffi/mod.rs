//! The Foreign Function Interface (FFI) boundary towards the engine library.
//!
//! `abi` mirrors the engine's C layouts and entry-point signatures, and
//! `library` locates the shared library and binds those entry points once.
//! Nothing in this module interprets data; that is left to the session,
//! container and decode layers.

pub mod abi;
pub mod library;

#[cfg(test)]
pub mod mock;

pub use library::EngineLibrary;

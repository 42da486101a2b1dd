// In: src/error.rs

//! This module defines the single, unified error type for the entire exchange layer.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! Failures raised while a session is involved carry the engine's own
//! explanation: the session appends its captured error lines to the message
//! before the error leaves the crate (see `Session::describe`).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    // =========================================================================
    // === Constant & Type Resolution
    // =========================================================================
    #[error("Unknown engine constant: {0}")]
    UnknownConstant(String),

    #[error("Invalid constant expression: {0}")]
    InvalidConstant(String),

    #[error("Unsupported data type for this operation: {0}")]
    UnsupportedType(String),

    #[error("Size mismatch: {0}")]
    SizeMismatch(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("String cannot be passed to the engine: {0}")]
    InvalidString(String),

    // =========================================================================
    // === Session Lifecycle & Native Calls
    // =========================================================================
    #[error("Session is already open: {0}")]
    AlreadyOpen(String),

    #[error("Session is not open: {0}")]
    NotOpen(String),

    #[error("Native call failed: {0}")]
    NativeFailure(String),

    #[error("Unknown default: {0}")]
    UnknownDefault(String),

    #[error("Engine version {found} is older than the required {required}")]
    VersionMismatch { found: String, required: String },

    #[error("Engine returned a null pointer: {0}")]
    NullPointer(String),

    // =========================================================================
    // === Containers & Virtual Files
    // =========================================================================
    #[error("Failed to create an empty data container: {0}")]
    ContainerCreationFailed(String),

    #[error("Failed to attach data to container: {0}")]
    PopulationFailed(String),

    #[error("Failed to open virtual file: {0}")]
    VirtualFileOpenFailed(String),

    #[error("Failed to close virtual file: {0}")]
    VirtualFileCloseFailed(String),

    /// A scoped acquisition where both the body and the release failed.
    /// `primary` is the failure that happened first.
    #[error("{primary} (release also failed: {secondary})")]
    Compound {
        primary: Box<ExchangeError>,
        #[source]
        secondary: Box<ExchangeError>,
    },

    // =========================================================================
    // === Grid Geometry
    // =========================================================================
    #[error("Unsupported grid dimensionality: {0}")]
    UnsupportedDimensionality(String),

    #[error("Zero grid increment: {0}")]
    ZeroIncrement(String),

    // =========================================================================
    // === Shared Library
    // =========================================================================
    #[error("Engine library not found. Attempted:\n{0}")]
    LibraryNotFound(String),

    #[error("Error loading engine library at '{path}'. Missing function '{symbol}'.")]
    MissingSymbol { path: String, symbol: String },

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the Arrow library.
    #[error("Arrow operation failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically while loading configuration.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// An array could not be reshaped into the requested dimensions.
    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl ExchangeError {
    /// Merges the outcome of a scoped body with the outcome of its release.
    ///
    /// The release always ran. If only one side failed, that failure is
    /// returned; if both failed, the body's failure stays primary.
    pub fn settle<T>(
        body: Result<T, ExchangeError>,
        release: Result<(), ExchangeError>,
    ) -> Result<T, ExchangeError> {
        match (body, release) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(release_err)) => Err(release_err),
            (Err(body_err), Ok(())) => Err(body_err),
            (Err(body_err), Err(release_err)) => Err(ExchangeError::Compound {
                primary: Box::new(body_err),
                secondary: Box::new(release_err),
            }),
        }
    }
}

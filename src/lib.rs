//! This file is the root of the `gmt_exchange` crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of the library (`session`, `bridge`, etc.)
//!     so the Rust compiler knows they exist.
//! 2.  Re-exporting the handful of types most callers need, so that a typical
//!     program only imports from the crate root.
//!
//! A minimal round trip through the engine looks like:
//!
//! ```no_run
//! use std::sync::Arc;
//! use arrow::array::{ArrayRef, Float64Array};
//! use gmt_exchange::{DataKind, ExchangeError, Session};
//!
//! fn main() -> Result<(), ExchangeError> {
//!     let columns: Vec<ArrayRef> = vec![
//!         Arc::new(Float64Array::from(vec![0.0, 1.0])),
//!         Arc::new(Float64Array::from(vec![5.0, 6.0])),
//!     ];
//!     let table = Session::begin("example", |session| {
//!         session.virtualfile_from_columns(&columns, |input| {
//!             session.with_output(DataKind::Dataset, None, |output| {
//!                 session.call_module("select", format!("{} ->{}", input, output.name()))?;
//!                 session.virtualfile_to_dataset(output)
//!             })
//!         })
//!     })?;
//!     println!("{:?}", table);
//!     Ok(())
//! }
//! ```

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod bridge;
pub mod config;
pub mod container;
pub mod decode;
pub mod error;
pub mod ffi;
pub mod grid;
pub mod logging;
pub mod marshal;
pub mod session;
pub mod traits;
pub mod types;
pub mod utils;

//==================================================================================
// 2. Re-exports
//==================================================================================
pub use bridge::{InputData, OutputTarget, VirtualFile};
pub use config::ExchangeConfig;
pub use container::{ContainerSpec, DataContainer};
pub use decode::{DecodedTable, ImageRaster, Raster};
pub use error::ExchangeError;
pub use ffi::EngineLibrary;
pub use grid::{ExtractedGrid, Grid};
pub use marshal::{Buffer, BufferSet};
pub use session::{CommonValue, EngineInfo, ModuleArgs, Session};
pub use types::{DataKind, Direction, EngineType, GridType, Registration, Via};

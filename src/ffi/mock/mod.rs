//! An in-process stand-in for the engine library, used by the unit tests.
//!
//! It implements all entry points of `FunctionTable` with plain Rust, keeps
//! every object it hands out alive until its session is destroyed, and prints
//! `[ERROR]` lines through the registered callback exactly like the engine.

pub mod engine;

use std::sync::Arc;

pub use dataset::{GridSpec, ImageSpec, OwnedDataset, OwnedGrid, OwnedImage, SegmentSpec, TableSpec};
pub use engine::{MockSession, FAIL_TAG};

use crate::config::ExchangeConfig;
use crate::ffi::abi::FunctionTable;
use crate::ffi::library::EngineLibrary;
use crate::session::Session;

pub fn mock_functions() -> FunctionTable {
    FunctionTable {
        create_session: engine::create_session,
        destroy_session: engine::destroy_session,
        get_enum: engine::get_enum,
        get_default: engine::get_default,
        get_common: engine::get_common,
        call_module: engine::call_module,
        create_data: engine::create_data,
        put_vector: engine::put_vector,
        put_strings: engine::put_strings,
        put_matrix: engine::put_matrix,
        read_data: engine::read_data,
        write_data: engine::write_data,
        open_virtualfile: engine::open_virtualfile,
        close_virtualfile: engine::close_virtualfile,
        inquire_virtualfile: engine::inquire_virtualfile,
        read_virtualfile: engine::read_virtualfile,
        extract_region: engine::extract_region,
    }
}

pub fn mock_library() -> Arc<EngineLibrary> {
    Arc::new(EngineLibrary::from_functions(mock_functions(), "mock-engine"))
}

/// Configuration that never consults the environment or `gmt-config`.
pub fn test_config() -> ExchangeConfig {
    ExchangeConfig {
        library_path: None,
        use_gmt_config: false,
        ..ExchangeConfig::default()
    }
}

pub fn open_session() -> Session {
    let mut session = Session::with_library(mock_library(), test_config());
    session.open("mock").expect("mock session opens");
    session
}

/// The engine-side state behind an open session.
pub fn state(session: &Session) -> &MockSession {
    let api = session.raw_handle().expect("session is open");
    // SAFETY: the mock's session pointer is a live `MockSession` until destroyed,
    // and destruction requires `&mut Session`.
    unsafe { &*(api as *const MockSession) }
}

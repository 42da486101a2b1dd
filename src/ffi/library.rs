// In: src/ffi/library.rs

//! Discovery and binding of the engine shared library.
//!
//! The library is located once, every required entry point is resolved up
//! front, and the resulting `FunctionTable` is shared by all sessions through an
//! `Arc<EngineLibrary>`. A library missing any entry point is rejected at load
//! time rather than failing later in the middle of an operation.

use libloading::Library;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, OnceLock};

use crate::config::ExchangeConfig;
use crate::error::ExchangeError;
use crate::ffi::abi::{self, FunctionTable, REQUIRED_SYMBOLS};

/// File names the engine library ships under on the current platform.
pub fn platform_library_names() -> &'static [&'static str] {
    if cfg!(target_os = "windows") {
        &["gmt.dll", "gmt_w64.dll", "gmt_w32.dll"]
    } else if cfg!(target_os = "macos") {
        &["libgmt.dylib"]
    } else {
        &["libgmt.so"]
    }
}

/// A loaded engine library and its bound entry points.
pub struct EngineLibrary {
    functions: FunctionTable,
    path: PathBuf,
    // Keeps the code behind `functions` mapped. `None` for in-process tables.
    _library: Option<Library>,
}

static GLOBAL_LIBRARY: OnceLock<Arc<EngineLibrary>> = OnceLock::new();

impl EngineLibrary {
    /// Searches every candidate location in order and binds the first library
    /// that loads.
    pub fn load(config: &ExchangeConfig) -> Result<Self, ExchangeError> {
        let mut failures = Vec::new();
        for candidate in candidate_paths(config) {
            match Self::open_path(&candidate) {
                Ok(library) => {
                    log::info!("Loaded engine library from '{}'", candidate.display());
                    return Ok(library);
                }
                // A library that loads but lacks entry points is not worth skipping past.
                Err(err @ ExchangeError::MissingSymbol { .. }) => return Err(err),
                Err(err) => {
                    log::debug!("Engine library candidate '{}' rejected: {}", candidate.display(), err);
                    failures.push(format!("{}: {}", candidate.display(), err));
                }
            }
        }
        Err(ExchangeError::LibraryNotFound(failures.join("\n")))
    }

    /// Loads one specific library file and binds all required entry points.
    pub fn open_path(path: &Path) -> Result<Self, ExchangeError> {
        // SAFETY: loading runs the library's initializers. The engine library is
        // trusted the same way any linked dependency would be.
        let library = unsafe { Library::new(path) }
            .map_err(|e| ExchangeError::LibraryNotFound(e.to_string()))?;
        let functions = bind_functions(&library, path)?;
        Ok(Self {
            functions,
            path: path.to_path_buf(),
            _library: Some(library),
        })
    }

    /// Wraps a function table whose code is already part of this process.
    pub fn from_functions(functions: FunctionTable, label: impl Into<PathBuf>) -> Self {
        Self {
            functions,
            path: label.into(),
            _library: None,
        }
    }

    /// The process-wide library, loaded on first use from `ExchangeConfig::from_env()`.
    ///
    /// A failed load is not cached; the next call searches again.
    pub fn global() -> Result<Arc<Self>, ExchangeError> {
        if let Some(library) = GLOBAL_LIBRARY.get() {
            return Ok(Arc::clone(library));
        }
        let loaded = Arc::new(Self::load(&ExchangeConfig::from_env())?);
        // Another thread may have won the race; either instance is equivalent.
        Ok(Arc::clone(GLOBAL_LIBRARY.get_or_init(|| loaded)))
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for EngineLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLibrary")
            .field("path", &self.path)
            .field("dynamic", &self._library.is_some())
            .finish()
    }
}

/// Every location to try, in priority order: the configured path, the
/// directory reported by `gmt-config`, then the bare names for the system loader.
pub fn candidate_paths(config: &ExchangeConfig) -> Vec<PathBuf> {
    let names = platform_library_names();
    let mut candidates = Vec::new();

    if let Some(configured) = &config.library_path {
        if configured.is_file() {
            candidates.push(configured.clone());
        } else {
            candidates.extend(names.iter().map(|name| configured.join(name)));
        }
    }

    if config.use_gmt_config {
        if let Some(dir) = gmt_config_lib_dir() {
            candidates.extend(names.iter().map(|name| dir.join(name)));
        }
    }

    candidates.extend(names.iter().map(PathBuf::from));
    candidates
}

/// Extracts the `-L` directory from `gmt-config --libs`, if the tool is available.
fn gmt_config_lib_dir() -> Option<PathBuf> {
    let output = Command::new("gmt-config").arg("--libs").output().ok()?;
    if !output.status.success() {
        return None;
    }
    parse_libs_dir(&String::from_utf8_lossy(&output.stdout))
}

fn parse_libs_dir(libs: &str) -> Option<PathBuf> {
    libs.split_whitespace()
        .find_map(|flag| flag.strip_prefix("-L"))
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
}

fn bind_functions(library: &Library, path: &Path) -> Result<FunctionTable, ExchangeError> {
    macro_rules! bind {
        ($index:expr, $ty:ty) => {{
            let symbol = REQUIRED_SYMBOLS[$index];
            // SAFETY: the symbol is cast to the signature declared for it in
            // `abi`; the table never outlives `library` (both live in `EngineLibrary`).
            unsafe {
                *library
                    .get::<$ty>(symbol.as_bytes())
                    .map_err(|_| ExchangeError::MissingSymbol {
                        path: path.display().to_string(),
                        symbol: symbol.to_string(),
                    })?
            }
        }};
    }

    Ok(FunctionTable {
        create_session: bind!(0, abi::CreateSessionFn),
        destroy_session: bind!(1, abi::DestroySessionFn),
        get_enum: bind!(2, abi::GetEnumFn),
        get_default: bind!(3, abi::GetDefaultFn),
        get_common: bind!(4, abi::GetCommonFn),
        call_module: bind!(5, abi::CallModuleFn),
        create_data: bind!(6, abi::CreateDataFn),
        put_vector: bind!(7, abi::PutVectorFn),
        put_strings: bind!(8, abi::PutStringsFn),
        put_matrix: bind!(9, abi::PutMatrixFn),
        read_data: bind!(10, abi::ReadDataFn),
        write_data: bind!(11, abi::WriteDataFn),
        open_virtualfile: bind!(12, abi::OpenVirtualFileFn),
        close_virtualfile: bind!(13, abi::CloseVirtualFileFn),
        inquire_virtualfile: bind!(14, abi::InquireVirtualFileFn),
        read_virtualfile: bind!(15, abi::ReadVirtualFileFn),
        extract_region: bind!(16, abi::ExtractRegionFn),
    })
}

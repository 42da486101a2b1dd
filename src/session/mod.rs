// In: src/session/mod.rs

//! The Session Manager.
//!
//! A `Session` owns at most one live engine session and is the only path to
//! the engine's entry points. It follows a two-state machine:
//!
//! ```text
//! Closed --open--> Open --close--> Closed
//! ```
//!
//! Every native call is wrapped in `capturing`, which routes the engine's
//! diagnostic lines into this session's `DiagnosticLog` for the duration of the
//! call. Failures append the retained error lines to their message.
//!
//! A session is deliberately `!Send`: the engine is not re-entrant, and all
//! operations on one session run in issue order on one thread.

pub mod capture;
pub mod constants;
pub mod handle;


use serde::{Deserialize, Serialize};
use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::ptr::{self, NonNull};
use std::rc::Rc;
use std::sync::Arc;

use crate::config::ExchangeConfig;
use crate::container::DataContainer;
use crate::error::ExchangeError;
use crate::ffi::abi::{FunctionTable, DEFAULT_VALUE_LEN, NOTSET};
use crate::ffi::library::EngineLibrary;
use crate::types::DataKind;
use crate::utils::{buffer_to_string, to_cstring};

use self::capture::{capture_diagnostic, DiagnosticLog};
use self::constants::{ConstantResolver, FAMILIES, GEOMETRIES, VIAS};
use self::handle::SessionHandle;

/// Letters accepted by `Session::get_common`.
pub const COMMON_OPTIONS: &str = "BIJRUVXYabfghinoprst:x";

//==================================================================================
// I. Supporting Types
//==================================================================================

/// Build and runtime facts reported by an open engine session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    pub version: String,
    pub padding: u32,
    pub share_dir: String,
    pub plugin_dir: String,
    pub library_path: String,
    pub cores: u32,
    pub grid_layout: String,
    /// Only reported by engines built with image support.
    pub image_layout: Option<String>,
    pub binary_version: Option<String>,
}

/// State of a common command-line option in the current session.
#[derive(Debug, Clone, PartialEq)]
pub enum CommonValue {
    /// The option has not been given.
    Unset,
    /// The option is set; the engine reports an integer for it.
    Set(i32),
    /// Numeric parameters: two increments for `-I`, four bounds for `-R`.
    Values(Vec<f64>),
}

/// Arguments of a module call: one command line, or one string per argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleArgs {
    Line(String),
    List(Vec<String>),
}

impl From<&str> for ModuleArgs {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

impl From<String> for ModuleArgs {
    fn from(line: String) -> Self {
        Self::Line(line)
    }
}

impl From<Vec<String>> for ModuleArgs {
    fn from(args: Vec<String>) -> Self {
        Self::List(args)
    }
}

impl From<&[&str]> for ModuleArgs {
    fn from(args: &[&str]) -> Self {
        Self::List(args.iter().map(|a| a.to_string()).collect())
    }
}

//==================================================================================
// II. Session
//==================================================================================

pub struct Session {
    library: Arc<EngineLibrary>,
    config: ExchangeConfig,
    handle: Option<SessionHandle>,
    constants: ConstantResolver,
    log: Rc<DiagnosticLog>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("library", &self.library)
            .field("open", &self.is_open())
            .field("cached_constants", &self.constants.len())
            .finish()
    }
}

impl Session {
    /// A closed session on the process-wide library, configured from the environment.
    pub fn new() -> Result<Self, ExchangeError> {
        Ok(Self::with_library(
            EngineLibrary::global()?,
            ExchangeConfig::from_env(),
        ))
    }

    /// A closed session on an explicitly provided library.
    pub fn with_library(library: Arc<EngineLibrary>, config: ExchangeConfig) -> Self {
        let log = Rc::new(DiagnosticLog::new(config.error_marker.clone()));
        Self {
            library,
            config,
            handle: None,
            constants: ConstantResolver::new(),
            log,
        }
    }

    /// Opens a session on the global library, runs `body`, and always closes it.
    pub fn begin<T, F>(name: &str, body: F) -> Result<T, ExchangeError>
    where
        F: FnOnce(&Session) -> Result<T, ExchangeError>,
    {
        let session = Self::new()?;
        session.run(name, body)
    }

    /// Like `begin`, on an explicitly provided library and configuration.
    pub fn begin_with<T, F>(
        library: Arc<EngineLibrary>,
        config: ExchangeConfig,
        name: &str,
        body: F,
    ) -> Result<T, ExchangeError>
    where
        F: FnOnce(&Session) -> Result<T, ExchangeError>,
    {
        Self::with_library(library, config).run(name, body)
    }

    fn run<T, F>(mut self, name: &str, body: F) -> Result<T, ExchangeError>
    where
        F: FnOnce(&Session) -> Result<T, ExchangeError>,
    {
        self.open(name)?;
        let result = body(&self);
        ExchangeError::settle(result, self.close())
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn library(&self) -> &Arc<EngineLibrary> {
        &self.library
    }

    pub(crate) fn functions(&self) -> &FunctionTable {
        self.library.functions()
    }

    //==============================================================================
    // Lifecycle
    //==============================================================================

    /// Creates the engine session. Fails with `AlreadyOpen` while one exists.
    pub fn open(&mut self, name: &str) -> Result<(), ExchangeError> {
        if self.handle.is_some() {
            return Err(ExchangeError::AlreadyOpen(format!(
                "Cannot open session '{}': a session is already open. Close it first.",
                name
            )));
        }
        self.log.clear();
        self.constants.clear();

        let mode = self.get_constant("GMT_SESSION_EXTERNAL")?;
        let pad = match self.config.pad {
            Some(pad) => pad,
            None => self.get_constant("GMT_PAD_DEFAULT")? as u32,
        };
        let tag = to_cstring(name)?;
        let functions = *self.functions();

        let raw = self.capturing(|| unsafe {
            (functions.create_session)(tag.as_ptr(), pad, mode as c_uint, Some(capture_diagnostic))
        });
        // SAFETY: a non-null result is a fresh session owned by nobody else.
        let handle = unsafe { SessionHandle::from_raw(raw, functions.destroy_session) }
            .ok_or_else(|| {
                ExchangeError::NativeFailure(
                    self.describe(format!("Failed to create engine session '{}'", name)),
                )
            })?;
        self.handle = Some(handle);
        log::info!("Opened engine session '{}'", name);

        if self.config.check_version {
            if let Err(err) = self.check_version() {
                return ExchangeError::settle(Err(err), self.close());
            }
        }
        Ok(())
    }

    /// Opens a session named after `ExchangeConfig::session_name`.
    pub fn open_default(&mut self) -> Result<(), ExchangeError> {
        let name = self.config.session_name.clone();
        self.open(&name)
    }

    /// Destroys the engine session.
    ///
    /// The handle is released even when the engine reports a failure, so the
    /// session is always `Closed` afterwards.
    pub fn close(&mut self) -> Result<(), ExchangeError> {
        let handle = self.handle.take().ok_or_else(|| {
            ExchangeError::NotOpen("There is no open session to close".to_string())
        })?;
        let status = self.capturing(|| handle.destroy());
        self.constants.clear();
        if status != 0 {
            return Err(ExchangeError::NativeFailure(self.describe(format!(
                "Failed to destroy engine session (status {})",
                status
            ))));
        }
        log::info!("Closed engine session");
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// The open session pointer, or `NotOpen`.
    pub(crate) fn raw_handle(&self) -> Result<*mut c_void, ExchangeError> {
        self.handle.as_ref().map(SessionHandle::as_ptr).ok_or_else(|| {
            ExchangeError::NotOpen("This operation requires an open session".to_string())
        })
    }

    /// Session pointer for calls that also work without a session.
    fn api_ptr(&self) -> *mut c_void {
        self.handle
            .as_ref()
            .map_or(ptr::null_mut(), SessionHandle::as_ptr)
    }

    fn check_version(&self) -> Result<(), ExchangeError> {
        let found = self.get_default("API_VERSION")?;
        if version_at_least(&found, &self.config.minimum_version) {
            Ok(())
        } else {
            Err(ExchangeError::VersionMismatch {
                found,
                required: self.config.minimum_version.clone(),
            })
        }
    }

    //==============================================================================
    // Diagnostics
    //==============================================================================

    /// Runs one native call with this session's diagnostic log active.
    pub(crate) fn capturing<R>(&self, call: impl FnOnce() -> R) -> R {
        let _active = capture::activate(&self.log);
        call()
    }

    /// The retained error lines, joined with newlines.
    pub fn error_message(&self) -> String {
        self.log.message()
    }

    /// Appends the retained error lines to `message`.
    pub fn describe(&self, message: impl Into<String>) -> String {
        let message = message.into();
        if self.log.is_empty() {
            message
        } else {
            format!("{}\n{}", message, self.log.message())
        }
    }

    //==============================================================================
    // Constants
    //==============================================================================

    /// Resolves one symbolic constant; works whether or not the session is open.
    pub fn get_constant(&self, name: &str) -> Result<i32, ExchangeError> {
        self.constants
            .resolve_with(name, |name| self.lookup_enum(name))
    }

    /// Resolves `BASE` or `BASE|MODIFIER` against the given name sets.
    pub fn resolve_composite(
        &self,
        expr: &str,
        allowed_base: &[&str],
        allowed_modifiers: Option<&[&str]>,
    ) -> Result<i32, ExchangeError> {
        self.constants
            .resolve_composite(expr, allowed_base, allowed_modifiers, |name| {
                self.lookup_enum(name)
            })
    }

    fn lookup_enum(&self, name: &str) -> Result<i32, ExchangeError> {
        let key = to_cstring(name)?;
        let api = self.api_ptr();
        let value = self.capturing(|| unsafe { (self.functions().get_enum)(api, key.as_ptr()) });
        if value == NOTSET {
            return Err(ExchangeError::UnknownConstant(self.describe(format!(
                "Constant '{}' doesn't exist in the engine library",
                name
            ))));
        }
        Ok(value)
    }

    //==============================================================================
    // Defaults & Common Options
    //==============================================================================

    /// Reads a named engine default, e.g. `API_VERSION` or `API_CORES`.
    pub fn get_default(&self, key: &str) -> Result<String, ExchangeError> {
        let api = self.raw_handle()?;
        let c_key = to_cstring(key)?;
        let mut value = vec![0u8; DEFAULT_VALUE_LEN];
        let status = self.capturing(|| unsafe {
            (self.functions().get_default)(api, c_key.as_ptr(), value.as_mut_ptr() as *mut c_char)
        });
        if status != 0 {
            return Err(ExchangeError::UnknownDefault(self.describe(format!(
                "Error getting default value for '{}' (error code {})",
                key, status
            ))));
        }
        Ok(buffer_to_string(&value))
    }

    fn optional_default(&self, key: &str) -> Result<Option<String>, ExchangeError> {
        match self.get_default(key) {
            Ok(value) => Ok(Some(value)),
            Err(ExchangeError::UnknownDefault(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn numeric_default(&self, key: &str) -> Result<u32, ExchangeError> {
        let value = self.get_default(key)?;
        value.trim().parse().map_err(|_| {
            ExchangeError::InvalidInput(format!(
                "Default '{}' is not a number: '{}'",
                key, value
            ))
        })
    }

    pub fn info(&self) -> Result<EngineInfo, ExchangeError> {
        Ok(EngineInfo {
            version: self.get_default("API_VERSION")?,
            padding: self.numeric_default("API_PAD")?,
            share_dir: self.get_default("API_SHAREDIR")?,
            plugin_dir: self.get_default("API_PLUGINDIR")?,
            library_path: self.get_default("API_LIBRARY")?,
            cores: self.numeric_default("API_CORES")?,
            grid_layout: self.get_default("API_GRID_LAYOUT")?,
            image_layout: self.optional_default("API_IMAGE_LAYOUT")?,
            binary_version: self.optional_default("API_BIN_VERSION")?,
        })
    }

    /// Queries a common option of the current session.
    pub fn get_common(&self, option: char) -> Result<CommonValue, ExchangeError> {
        if !COMMON_OPTIONS.contains(option) {
            return Err(ExchangeError::InvalidInput(format!(
                "Unknown common option '{}'; must be one of '{}'",
                option, COMMON_OPTIONS
            )));
        }
        let api = self.raw_handle()?;
        let mut par = [0.0f64; 6];
        let status = self.capturing(|| unsafe {
            (self.functions().get_common)(api, option as c_uint, par.as_mut_ptr())
        });
        if status < 0 {
            return Ok(CommonValue::Unset);
        }
        Ok(match option {
            'I' => CommonValue::Values(par[..2].to_vec()),
            'R' => CommonValue::Values(par[..4].to_vec()),
            _ => CommonValue::Set(status),
        })
    }

    //==============================================================================
    // Module Dispatch & File I/O
    //==============================================================================

    /// Runs an engine module. Arguments may name virtual files like any path.
    pub fn call_module(
        &self,
        module: &str,
        args: impl Into<ModuleArgs>,
    ) -> Result<(), ExchangeError> {
        let api = self.raw_handle()?;
        let call_module = self.functions().call_module;
        let c_module = to_cstring(module)?;

        let status = match args.into() {
            ModuleArgs::Line(line) => {
                let mode = self.get_constant("GMT_MODULE_CMD")?;
                let c_line = to_cstring(&line)?;
                self.capturing(|| unsafe {
                    call_module(api, c_module.as_ptr(), mode, c_line.as_ptr() as *mut c_void)
                })
            }
            ModuleArgs::List(list) => {
                let c_args = list
                    .iter()
                    .map(|arg| to_cstring(arg))
                    .collect::<Result<Vec<_>, _>>()?;
                let mut argv: Vec<*mut c_char> =
                    c_args.iter().map(|arg| arg.as_ptr() as *mut c_char).collect();
                let argc = c_int::try_from(argv.len()).map_err(|_| {
                    ExchangeError::InvalidInput(format!("Too many arguments: {}", argv.len()))
                })?;
                let argv_ptr = if argv.is_empty() {
                    ptr::null_mut()
                } else {
                    argv.as_mut_ptr() as *mut c_void
                };
                self.capturing(|| unsafe { call_module(api, c_module.as_ptr(), argc, argv_ptr) })
            }
        };

        if status != 0 {
            return Err(ExchangeError::NativeFailure(self.describe(format!(
                "Module '{}' failed with status code {}",
                module, status
            ))));
        }
        log::debug!("Module '{}' completed", module);
        Ok(())
    }

    /// Reads a file into an engine-owned container of the given kind.
    pub fn read_data(
        &self,
        infile: &str,
        kind: DataKind,
        region: Option<[f64; 4]>,
    ) -> Result<DataContainer<'_>, ExchangeError> {
        let api = self.raw_handle()?;
        let family = self.get_constant(kind.family())?;
        let geometry = self.get_constant(kind.default_geometry())?;
        let method = self.get_constant("GMT_IS_FILE")?;
        let mode = self.get_constant("GMT_READ_NORMAL")?;
        let c_infile = to_cstring(infile)?;
        let wesn = region.as_ref().map_or(ptr::null(), |r| r.as_ptr());

        let data = self.capturing(|| unsafe {
            (self.functions().read_data)(
                api,
                family as c_uint,
                method as c_uint,
                geometry as c_uint,
                mode as c_uint,
                wesn,
                c_infile.as_ptr(),
                ptr::null_mut(),
            )
        });
        let data = NonNull::new(data).ok_or_else(|| {
            ExchangeError::NativeFailure(self.describe(format!("Failed to read data from '{}'", infile)))
        })?;
        Ok(DataContainer::from_engine(self, data, kind))
    }

    /// Writes a container to a file.
    ///
    /// `family` and `geometry` may carry modifiers (e.g. `GMT_IS_DATASET|GMT_VIA_VECTOR`);
    /// `mode` is a single constant such as `GMT_WRITE_SET`.
    pub fn write_data(
        &self,
        family: &str,
        geometry: &str,
        mode: &str,
        wesn: Option<[f64; 4]>,
        output: &str,
        data: &DataContainer<'_>,
    ) -> Result<(), ExchangeError> {
        let api = self.raw_handle()?;
        let family_value = self.resolve_composite(family, FAMILIES, Some(VIAS))?;
        let geometry_value = self.resolve_composite(geometry, GEOMETRIES, None)?;
        let method = self.get_constant("GMT_IS_FILE")?;
        let mode_value = self.get_constant(mode)?;
        let c_output = to_cstring(output)?;
        let wesn_ptr = wesn.as_ref().map_or(ptr::null(), |r| r.as_ptr());

        let status = self.capturing(|| unsafe {
            (self.functions().write_data)(
                api,
                family_value as c_uint,
                method as c_uint,
                geometry_value as c_uint,
                mode_value as c_uint,
                wesn_ptr,
                c_output.as_ptr(),
                data.as_ptr(),
            )
        });
        if status != 0 {
            return Err(ExchangeError::NativeFailure(self.describe(format!(
                "Failed to write data to '{}'",
                output
            ))));
        }
        Ok(())
    }

    /// The region (west, east, south, north) of the current figure or `-R` setting.
    pub fn extract_region(&self) -> Result<[f64; 4], ExchangeError> {
        let api = self.raw_handle()?;
        let mut wesn = [0.0f64; 4];
        let status = self.capturing(|| unsafe {
            (self.functions().extract_region)(api, ptr::null_mut(), wesn.as_mut_ptr())
        });
        if status != 0 {
            return Err(ExchangeError::NativeFailure(
                self.describe("Failed to extract region from current figure"),
            ));
        }
        Ok(wesn)
    }

    //==============================================================================
    // Virtual Files by Name
    //==============================================================================

    /// The family code the engine registered for a virtual file.
    pub fn inquire_virtualfile(&self, name: &str) -> Result<u32, ExchangeError> {
        let api = self.raw_handle()?;
        let c_name = to_cstring(name)?;
        Ok(self.capturing(|| unsafe { (self.functions().inquire_virtualfile)(api, c_name.as_ptr()) }))
    }

    /// The container behind a virtual file, typically one the engine wrote into.
    pub fn read_virtualfile(
        &self,
        name: &str,
        kind: DataKind,
    ) -> Result<DataContainer<'_>, ExchangeError> {
        let api = self.raw_handle()?;
        let c_name = to_cstring(name)?;
        let data =
            self.capturing(|| unsafe { (self.functions().read_virtualfile)(api, c_name.as_ptr()) });
        let data = NonNull::new(data).ok_or_else(|| {
            ExchangeError::NullPointer(
                self.describe(format!("Virtual file '{}' holds no data", name)),
            )
        })?;
        Ok(DataContainer::from_engine(self, data, kind))
    }

    /// Unregisters a virtual file. Releasing the same name twice fails.
    pub fn close_virtualfile(&self, name: &str) -> Result<(), ExchangeError> {
        let api = self.raw_handle()?;
        let c_name = to_cstring(name)?;
        let status = self
            .capturing(|| unsafe { (self.functions().close_virtualfile)(api, c_name.as_ptr()) });
        if status != 0 {
            return Err(ExchangeError::VirtualFileCloseFailed(self.describe(format!(
                "Failed to close virtual file '{}' (status {})",
                name, status
            ))));
        }
        log_event!("event" = "virtualfile_close", "name" = name);
        Ok(())
    }
}

/// Compares dotted version strings numerically, ignoring any non-numeric suffix
/// of a component (`6.6.0_dev` counts as `6.6.0`).
pub fn version_at_least(found: &str, required: &str) -> bool {
    fn components(version: &str) -> Vec<u64> {
        version
            .trim()
            .split('.')
            .map(|part| {
                let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
                digits.parse().unwrap_or(0)
            })
            .collect()
    }
    let mut found = components(found);
    let mut required = components(required);
    let width = found.len().max(required.len());
    found.resize(width, 0);
    required.resize(width, 0);
    found >= required
}

// In: src/container/mod.rs

//! The Container Builder.
//!
//! Empty containers are allocated by the engine from a `ContainerSpec` and then
//! filled in place with host buffers. A `DataContainer<'a>` borrows both the
//! session that created it and every buffer attached to it, so the borrow
//! checker guarantees the engine never reads a freed buffer.

use std::marker::PhantomData;
use std::os::raw::{c_int, c_uint, c_void};
use std::ptr::{self, NonNull};

use crate::error::ExchangeError;
use crate::marshal::Buffer;
use crate::session::constants::{
    split_expression, FAMILIES, GEOMETRIES, METHODS, MODES, MODE_MODIFIERS, REGISTRATIONS,
    STRING_FAMILIES, VIAS,
};
use crate::session::Session;
use crate::types::{DataKind, Registration, Via};

/// Arguments of an empty-container request.
///
/// Absent tuples reach the engine as null pointers, never as zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub family: String,
    pub geometry: String,
    pub mode: String,
    pub dim: Option<[u64; 4]>,
    pub ranges: Option<[f64; 4]>,
    pub increments: Option<[f64; 2]>,
    pub registration: Registration,
    /// `None` selects 0 for matrix-backed families and the engine default otherwise.
    pub pad: Option<i32>,
}

impl ContainerSpec {
    pub fn new(family: &str, geometry: &str, mode: &str) -> Self {
        Self {
            family: family.to_string(),
            geometry: geometry.to_string(),
            mode: mode.to_string(),
            dim: None,
            ranges: None,
            increments: None,
            registration: Registration::default(),
            pad: None,
        }
    }

    pub fn dim(mut self, dim: [u64; 4]) -> Self {
        self.dim = Some(dim);
        self
    }

    pub fn ranges(mut self, ranges: [f64; 4]) -> Self {
        self.ranges = Some(ranges);
        self
    }

    pub fn increments(mut self, increments: [f64; 2]) -> Self {
        self.increments = Some(increments);
        self
    }

    pub fn registration(mut self, registration: Registration) -> Self {
        self.registration = registration;
        self
    }

    pub fn pad(mut self, pad: i32) -> Self {
        self.pad = Some(pad);
        self
    }

    fn is_matrix_backed(&self) -> bool {
        self.family.contains("MATRIX")
    }
}

/// An engine-allocated container.
///
/// The engine frees containers when the session is destroyed, so dropping
/// this value releases nothing.
#[derive(Debug)]
pub struct DataContainer<'a> {
    session: &'a Session,
    ptr: NonNull<c_void>,
    kind: Option<DataKind>,
    via: Via,
    dim: Option<[u64; 4]>,
    _buffers: PhantomData<&'a Buffer>,
}

impl<'a> DataContainer<'a> {
    /// Wraps a container the engine produced (read from a file or a virtual file).
    pub(crate) fn from_engine(session: &'a Session, ptr: NonNull<c_void>, kind: DataKind) -> Self {
        Self {
            session,
            ptr,
            kind: Some(kind),
            via: Via::None,
            dim: None,
            _buffers: PhantomData,
        }
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr.as_ptr()
    }

    pub fn kind(&self) -> Option<DataKind> {
        self.kind
    }

    pub fn via(&self) -> Via {
        self.via
    }

    pub fn session(&self) -> &'a Session {
        self.session
    }

    pub fn n_columns(&self) -> Option<usize> {
        self.dim.map(|d| d[0] as usize)
    }

    pub fn n_rows(&self) -> Option<usize> {
        self.dim.map(|d| d[1] as usize)
    }

    fn population_failure(&self, message: String) -> ExchangeError {
        ExchangeError::PopulationFailed(self.session.describe(message))
    }

    /// Attaches `buffer` as column `column` of a vector-backed container.
    pub fn put_vector(&mut self, column: usize, buffer: &'a Buffer) -> Result<(), ExchangeError> {
        if self.via != Via::Vector {
            return Err(self.population_failure(
                "Columns can only be attached to a container created with GMT_VIA_VECTOR".into(),
            ));
        }
        if let (Some(n_columns), Some(n_rows)) = (self.n_columns(), self.n_rows()) {
            if column >= n_columns {
                return Err(self.population_failure(format!(
                    "Column index {} is out of range for {} columns",
                    column, n_columns
                )));
            }
            if buffer.len() != n_rows {
                return Err(ExchangeError::SizeMismatch(self.session.describe(format!(
                    "Column {} has {} rows, the container expects {}",
                    column,
                    buffer.len(),
                    n_rows
                ))));
            }
        }

        let api = self.session.raw_handle()?;
        let type_ = self.session.get_constant(buffer.engine_type().constant_name())?;
        let status = self.session.capturing(|| unsafe {
            (self.session.functions().put_vector)(
                api,
                self.ptr.as_ptr(),
                column as c_uint,
                type_ as c_uint,
                buffer.as_ptr(),
            )
        });
        if status != 0 {
            return Err(self.population_failure(format!(
                "Failed to put column {} of type {} into the container",
                column,
                buffer.engine_type()
            )));
        }
        Ok(())
    }

    /// Attaches a text buffer as the container's trailing strings.
    ///
    /// `family` names the container family with a method modifier, e.g.
    /// `GMT_IS_VECTOR|GMT_IS_DUPLICATE`.
    pub fn put_strings(&mut self, family: &str, buffer: &'a Buffer) -> Result<(), ExchangeError> {
        let text = buffer.text_data().ok_or_else(|| {
            ExchangeError::UnsupportedType(self.session.describe(format!(
                "Strings must be text, got {}",
                buffer.engine_type()
            )))
        })?;
        if let Some(n_rows) = self.n_rows() {
            if text.len() != n_rows {
                return Err(ExchangeError::SizeMismatch(self.session.describe(format!(
                    "{} strings given, the container expects {}",
                    text.len(),
                    n_rows
                ))));
            }
        }

        let api = self.session.raw_handle()?;
        let family_value = self
            .session
            .resolve_composite(family, STRING_FAMILIES, Some(METHODS))?;
        let status = self.session.capturing(|| unsafe {
            (self.session.functions().put_strings)(
                api,
                family_value as c_uint,
                self.ptr.as_ptr(),
                text.as_ptr(),
            )
        });
        if status != 0 {
            return Err(self.population_failure("Failed to put strings into the container".into()));
        }
        Ok(())
    }

    /// Attaches a row-major numeric buffer to a matrix-backed container.
    pub fn put_matrix(&mut self, buffer: &'a Buffer, pad: i32) -> Result<(), ExchangeError> {
        if self.via != Via::Matrix {
            return Err(self.population_failure(
                "A matrix can only be attached to a container created with GMT_VIA_MATRIX".into(),
            ));
        }
        if buffer.engine_type().is_textual() {
            return Err(ExchangeError::UnsupportedType(self.session.describe(format!(
                "Matrix data must be numeric, got {}",
                buffer.engine_type()
            ))));
        }
        if let (Some(n_columns), Some(n_rows)) = (self.n_columns(), self.n_rows()) {
            if buffer.len() != n_columns * n_rows {
                return Err(ExchangeError::SizeMismatch(self.session.describe(format!(
                    "Matrix buffer has {} values, the container expects {} x {}",
                    buffer.len(),
                    n_rows,
                    n_columns
                ))));
            }
        }

        let api = self.session.raw_handle()?;
        let type_ = self.session.get_constant(buffer.engine_type().constant_name())?;
        let status = self.session.capturing(|| unsafe {
            (self.session.functions().put_matrix)(
                api,
                self.ptr.as_ptr(),
                type_ as c_uint,
                pad as c_int,
                buffer.as_ptr(),
            )
        });
        if status != 0 {
            return Err(self.population_failure("Failed to put matrix into the container".into()));
        }
        Ok(())
    }
}

impl Session {
    /// Asks the engine for an empty container described by `spec`.
    pub fn create_empty(&self, spec: &ContainerSpec) -> Result<DataContainer<'_>, ExchangeError> {
        let api = self.raw_handle()?;
        let family = self.resolve_composite(&spec.family, FAMILIES, Some(VIAS))?;
        let geometry = self.resolve_composite(&spec.geometry, GEOMETRIES, None)?;
        let mode = self.resolve_composite(&spec.mode, MODES, Some(MODE_MODIFIERS))?;
        let registration =
            self.resolve_composite(spec.registration.constant_name(), REGISTRATIONS, None)?;
        let pad = match spec.pad {
            Some(pad) => pad,
            None if spec.is_matrix_backed() => 0,
            None => self.get_constant("GMT_PAD_DEFAULT")?,
        };

        let dim = spec.dim.as_ref().map_or(ptr::null(), |d| d.as_ptr());
        let ranges = spec.ranges.as_ref().map_or(ptr::null(), |r| r.as_ptr());
        let increments = spec.increments.as_ref().map_or(ptr::null(), |i| i.as_ptr());

        let data = self.capturing(|| unsafe {
            (self.functions().create_data)(
                api,
                family as c_uint,
                geometry as c_uint,
                mode as c_uint,
                dim,
                ranges,
                increments,
                registration as c_uint,
                pad as c_int,
                ptr::null_mut(),
            )
        });
        let data = NonNull::new(data).ok_or_else(|| {
            ExchangeError::ContainerCreationFailed(
                self.describe(format!("Failed to create an empty {} container", spec.family)),
            )
        })?;

        let (base, modifier) = split_expression(&spec.family)?;
        log_event!(
            "event" = "container_create",
            "family" = spec.family,
            "geometry" = spec.geometry,
            "pad" = pad
        );
        Ok(DataContainer {
            session: self,
            ptr: data,
            kind: DataKind::from_family(base),
            via: Via::from_modifier(modifier),
            dim: spec.dim,
            _buffers: PhantomData,
        })
    }
}

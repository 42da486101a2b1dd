// In: src/bridge/virtualfile.rs

use std::os::raw::{c_char, c_uint};

use crate::container::DataContainer;
use crate::error::ExchangeError;
use crate::session::constants::{
    split_expression, DIRECTIONS, FAMILIES, GEOMETRIES, METHODS, VIAS,
};
use crate::session::Session;
use crate::types::Direction;
use crate::utils::buffer_to_string;

/// A registered virtual file.
///
/// The guard borrows the session and the container behind it, so neither can
/// go away while the engine may still read through the name. Prefer `close`,
/// which reports release failures; dropping an open guard releases it too but
/// can only log a failure.
#[derive(Debug)]
pub struct VirtualFile<'a> {
    session: &'a Session,
    name: String,
    direction: Direction,
    open: bool,
}

impl<'a> VirtualFile<'a> {
    /// The name to pass to modules in place of a file path.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn close(mut self) -> Result<(), ExchangeError> {
        self.open = false;
        self.session.close_virtualfile(&self.name)
    }
}

impl Drop for VirtualFile<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(err) = self.session.close_virtualfile(&self.name) {
                log::warn!("Virtual file '{}' was not released: {}", self.name, err);
            }
        }
    }
}

impl Session {
    /// Registers `data` (or, for output, an empty slot) under a virtual file name.
    ///
    /// `direction` is `GMT_IN` or `GMT_OUT`, optionally with a method modifier
    /// such as `GMT_IS_REFERENCE`. Input files need a container.
    pub fn open_virtualfile<'a>(
        &'a self,
        family: &str,
        geometry: &str,
        direction: &str,
        data: Option<&'a DataContainer<'a>>,
    ) -> Result<VirtualFile<'a>, ExchangeError> {
        let api = self.raw_handle()?;
        let (direction_base, _) = split_expression(direction)?;
        let flow = Direction::from_constant(direction_base).ok_or_else(|| {
            ExchangeError::InvalidConstant(format!(
                "Invalid direction '{}'; must be one of {:?}",
                direction_base, DIRECTIONS
            ))
        })?;
        if flow == Direction::In && data.is_none() {
            return Err(ExchangeError::InvalidInput(
                "An input virtual file needs a data container".to_string(),
            ));
        }

        let family_value = self.resolve_composite(family, FAMILIES, Some(VIAS))?;
        let geometry_value = self.resolve_composite(geometry, GEOMETRIES, None)?;
        let direction_value = self.resolve_composite(direction, DIRECTIONS, Some(METHODS))?;
        let name_len = self.get_constant("GMT_VF_LEN")?;
        let mut name = vec![0u8; name_len.max(1) as usize];
        let data_ptr = data.map_or(std::ptr::null_mut(), DataContainer::as_ptr);

        let status = self.capturing(|| unsafe {
            (self.functions().open_virtualfile)(
                api,
                family_value as c_uint,
                geometry_value as c_uint,
                direction_value as c_uint,
                data_ptr,
                name.as_mut_ptr() as *mut c_char,
            )
        });
        if status != 0 {
            return Err(ExchangeError::VirtualFileOpenFailed(self.describe(format!(
                "Failed to create a virtual file for {} ({}) with status {}",
                family, direction, status
            ))));
        }

        let name = buffer_to_string(&name);
        log_event!(
            "event" = "virtualfile_open",
            "name" = name,
            "family" = family,
            "direction" = direction
        );
        Ok(VirtualFile {
            session: self,
            name,
            direction: flow,
            open: true,
        })
    }

    /// Opens a virtual file, runs `body` with its name, and always releases it.
    ///
    /// A release failure is reported even when `body` succeeded; when both
    /// fail, the body's error is primary.
    pub fn with_virtual_file<'a, T, F>(
        &'a self,
        family: &str,
        geometry: &str,
        direction: &str,
        data: Option<&'a DataContainer<'a>>,
        body: F,
    ) -> Result<T, ExchangeError>
    where
        F: FnOnce(&str) -> Result<T, ExchangeError>,
    {
        let file = self.open_virtualfile(family, geometry, direction, data)?;
        let result = body(file.name());
        ExchangeError::settle(result, file.close())
    }
}

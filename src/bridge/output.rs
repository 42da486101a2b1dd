// In: src/bridge/output.rs

use crate::bridge::virtualfile::VirtualFile;
use crate::decode::{decode_grid, decode_image, decode_table, DecodedTable, ImageRaster, Raster};
use crate::error::ExchangeError;
use crate::session::Session;
use crate::types::DataKind;

/// Where a module writes its result.
#[derive(Debug)]
pub enum OutputTarget<'a> {
    /// Written straight to storage; there is nothing to decode afterwards.
    Path(String),
    /// An engine-populated virtual file of the given kind.
    Virtual { file: VirtualFile<'a>, kind: DataKind },
}

impl<'a> OutputTarget<'a> {
    /// The name to pass to a module as its output.
    pub fn name(&self) -> &str {
        match self {
            Self::Path(path) => path,
            Self::Virtual { file, .. } => file.name(),
        }
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, Self::Virtual { .. })
    }

    pub fn kind(&self) -> Option<DataKind> {
        match self {
            Self::Path(_) => None,
            Self::Virtual { kind, .. } => Some(*kind),
        }
    }

    /// Releases the virtual file, if any.
    pub fn close(self) -> Result<(), ExchangeError> {
        match self {
            Self::Path(_) => Ok(()),
            Self::Virtual { file, .. } => file.close(),
        }
    }

    fn virtual_name(&self, expected: DataKind) -> Result<Option<&str>, ExchangeError> {
        match self {
            Self::Path(_) => Ok(None),
            Self::Virtual { file, kind } if *kind == expected => Ok(Some(file.name())),
            Self::Virtual { kind, .. } => Err(ExchangeError::InvalidInput(format!(
                "Output target holds {:?} data, not {:?}",
                kind, expected
            ))),
        }
    }
}

impl Session {
    /// A target for module output: `path` unchanged when given, otherwise a
    /// fresh output virtual file of `kind` for the engine to populate.
    pub fn for_output(&self, kind: DataKind, path: Option<&str>) -> Result<OutputTarget<'_>, ExchangeError> {
        match path {
            Some(path) => Ok(OutputTarget::Path(path.to_string())),
            None => {
                let file = self.open_virtualfile(
                    kind.family(),
                    kind.default_geometry(),
                    "GMT_OUT|GMT_IS_REFERENCE",
                    None,
                )?;
                Ok(OutputTarget::Virtual { file, kind })
            }
        }
    }

    /// Scoped `for_output`: the target is released on every exit path.
    pub fn with_output<T, F>(&self, kind: DataKind, path: Option<&str>, body: F) -> Result<T, ExchangeError>
    where
        F: FnOnce(&OutputTarget<'_>) -> Result<T, ExchangeError>,
    {
        let target = self.for_output(kind, path)?;
        let result = body(&target);
        ExchangeError::settle(result, target.close())
    }

    /// Decodes the table a module wrote; `None` when it went to a file.
    pub fn virtualfile_to_dataset(&self, target: &OutputTarget<'_>) -> Result<Option<DecodedTable>, ExchangeError> {
        match target.virtual_name(DataKind::Dataset)? {
            Some(name) => {
                let container = self.read_virtualfile(name, DataKind::Dataset)?;
                decode_table(&container).map(Some)
            }
            None => Ok(None),
        }
    }

    pub fn virtualfile_to_raster(&self, target: &OutputTarget<'_>) -> Result<Option<Raster>, ExchangeError> {
        match target.virtual_name(DataKind::Grid)? {
            Some(name) => {
                let container = self.read_virtualfile(name, DataKind::Grid)?;
                decode_grid(&container).map(Some)
            }
            None => Ok(None),
        }
    }

    pub fn virtualfile_to_image(&self, target: &OutputTarget<'_>) -> Result<Option<ImageRaster>, ExchangeError> {
        match target.virtual_name(DataKind::Image)? {
            Some(name) => {
                let container = self.read_virtualfile(name, DataKind::Image)?;
                decode_image(&container).map(Some)
            }
            None => Ok(None),
        }
    }
}

// In: src/bridge/builders.rs

use arrow::array::ArrayRef;
use arrow::record_batch::RecordBatch;
use ndarray::ArrayView2;
use std::path::Path;

use crate::container::ContainerSpec;
use crate::error::ExchangeError;
use crate::grid::{extract_extent_and_increment, Grid};
use crate::marshal::{matrix_into_buffer, matrix_to_buffer, to_buffer_set};
use crate::session::Session;
use crate::traits::EngineNative;

const DATASET_VIA_VECTOR: &str = "GMT_IS_DATASET|GMT_VIA_VECTOR";
const DATASET_VIA_MATRIX: &str = "GMT_IS_DATASET|GMT_VIA_MATRIX";
const GRID_VIA_MATRIX: &str = "GMT_IS_GRID|GMT_VIA_MATRIX";
const INPUT_BY_REFERENCE: &str = "GMT_IN|GMT_IS_REFERENCE";

/// Host data accepted wherever a module expects an input file.
#[derive(Debug, Clone, Copy)]
pub enum InputData<'d> {
    /// An existing file, passed to the engine unchanged.
    File(&'d Path),
    Columns(&'d [ArrayRef]),
    RecordBatch(&'d RecordBatch),
    Matrix(ArrayView2<'d, f64>),
    Grid(&'d Grid),
}

impl Session {
    /// Exposes a set of columns to the engine as a table.
    ///
    /// Columns from the third one onwards that start with a text column are
    /// joined into the trailing text of each record.
    pub fn virtualfile_from_columns<T, F>(&self, columns: &[ArrayRef], body: F) -> Result<T, ExchangeError>
    where
        F: FnOnce(&str) -> Result<T, ExchangeError>,
    {
        // Marshaling fails before anything is asked of the engine.
        let set = to_buffer_set(columns)?;
        let mode = if set.trailing_text.is_some() {
            "GMT_CONTAINER_ONLY|GMT_WITH_STRINGS"
        } else {
            "GMT_CONTAINER_ONLY"
        };
        let spec = ContainerSpec::new(DATASET_VIA_VECTOR, "GMT_IS_POINT", mode).dim([
            set.n_columns() as u64,
            set.n_rows as u64,
            1,
            0,
        ]);

        let mut container = self.create_empty(&spec)?;
        for (index, buffer) in set.columns.iter().enumerate() {
            container.put_vector(index, buffer)?;
        }
        if let Some(text) = &set.trailing_text {
            container.put_strings("GMT_IS_VECTOR|GMT_IS_DUPLICATE", text)?;
        }
        log::debug!(
            "Exposing {} columns x {} rows (trailing text: {})",
            set.n_columns(),
            set.n_rows,
            set.trailing_text.is_some()
        );
        self.with_virtual_file(
            DATASET_VIA_VECTOR,
            "GMT_IS_POINT",
            INPUT_BY_REFERENCE,
            Some(&container),
            body,
        )
    }

    pub fn virtualfile_from_record_batch<T, F>(&self, batch: &RecordBatch, body: F) -> Result<T, ExchangeError>
    where
        F: FnOnce(&str) -> Result<T, ExchangeError>,
    {
        self.virtualfile_from_columns(batch.columns(), body)
    }

    /// Exposes a 2-D array (rows are records) to the engine as a table.
    pub fn virtualfile_from_matrix<N, T, F>(&self, matrix: ArrayView2<'_, N>, body: F) -> Result<T, ExchangeError>
    where
        N: EngineNative,
        F: FnOnce(&str) -> Result<T, ExchangeError>,
    {
        let (n_rows, n_columns) = matrix.dim();
        let buffer = matrix_to_buffer(matrix);
        let spec = ContainerSpec::new(DATASET_VIA_MATRIX, "GMT_IS_POINT", "GMT_CONTAINER_ONLY")
            .dim([n_columns as u64, n_rows as u64, 1, 0]);

        let mut container = self.create_empty(&spec)?;
        container.put_matrix(&buffer, 0)?;
        self.with_virtual_file(
            DATASET_VIA_MATRIX,
            "GMT_IS_POINT",
            INPUT_BY_REFERENCE,
            Some(&container),
            body,
        )
    }

    /// Exposes a 2-D grid to the engine. Extent and increments come from the
    /// grid's own axes; registration and grid type default to gridline and
    /// Cartesian.
    pub fn virtualfile_from_grid<T, F>(&self, grid: &Grid, body: F) -> Result<T, ExchangeError>
    where
        F: FnOnce(&str) -> Result<T, ExchangeError>,
    {
        let extracted = extract_extent_and_increment(grid)?;
        let mode = format!("GMT_CONTAINER_ONLY|{}", extracted.grid_type.constant_name());
        let spec = ContainerSpec::new(GRID_VIA_MATRIX, "GMT_IS_SURFACE", &mode)
            .ranges(extracted.region)
            .increments(extracted.increment)
            .registration(extracted.registration);
        let buffer = matrix_into_buffer(extracted.matrix);

        let mut container = self.create_empty(&spec)?;
        container.put_matrix(&buffer, 0)?;
        self.with_virtual_file(
            GRID_VIA_MATRIX,
            "GMT_IS_SURFACE",
            INPUT_BY_REFERENCE,
            Some(&container),
            body,
        )
    }

    /// Runs `body` with a name the engine can read `data` from.
    ///
    /// Files are passed through without creating a virtual file.
    pub fn virtualfile_in<T, F>(&self, data: InputData<'_>, body: F) -> Result<T, ExchangeError>
    where
        F: FnOnce(&str) -> Result<T, ExchangeError>,
    {
        match data {
            InputData::File(path) => {
                let path = path.to_str().ok_or_else(|| {
                    ExchangeError::InvalidString(format!("{} is not valid UTF-8", path.display()))
                })?;
                body(path)
            }
            InputData::Columns(columns) => self.virtualfile_from_columns(columns, body),
            InputData::RecordBatch(batch) => self.virtualfile_from_record_batch(batch, body),
            InputData::Matrix(matrix) => self.virtualfile_from_matrix(matrix, body),
            InputData::Grid(grid) => self.virtualfile_from_grid(grid, body),
        }
    }
}

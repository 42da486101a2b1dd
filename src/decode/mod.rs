// In: src/decode/mod.rs

//! The Result Decoder.
//!
//! Engine-owned results are copied eagerly into host memory, so nothing
//! returned from here keeps a foreign pointer alive. Datasets become one
//! `Vec<f64>` per column plus one optional text column; grids and images
//! lose their padding and are presented with ascending axes.

use arrow::array::{ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3};
use std::iter;
use std::os::raw::{c_char, c_void};
use std::sync::Arc;

use crate::container::DataContainer;
use crate::error::ExchangeError;
use crate::ffi::abi::{GmtDataSegment, GmtDataTable, GmtDataset, GmtGrid, GmtGridHeader, GmtImage};
use crate::grid::Grid;
use crate::types::{DataKind, GridType, Registration, Via};
use crate::utils::{engine_slice, fixed_c_string, read_c_string, to_usize};


//==================================================================================
// I. Tables
//==================================================================================

/// A decoded dataset: every table and segment concatenated in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedTable {
    pub columns: Vec<Vec<f64>>,
    /// Trailing text, one entry per row, present if any segment carried text.
    pub text: Option<Vec<String>>,
    pub headers: Vec<String>,
    pub warnings: Vec<String>,
}

impl DecodedTable {
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn n_rows(&self) -> usize {
        self.columns
            .first()
            .map(Vec::len)
            .or_else(|| self.text.as_ref().map(Vec::len))
            .unwrap_or(0)
    }

    /// Numeric values as one `Vec` per record.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.n_rows())
            .map(|row| self.columns.iter().map(|column| column[row]).collect())
            .collect()
    }

    pub fn to_matrix(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.n_rows(), self.n_columns()), |(row, col)| {
            self.columns[col][row]
        })
    }

    /// Column names from the last header line, if it names every column.
    ///
    /// A header that names only the numeric columns gets `text` appended for
    /// the trailing text column.
    pub fn column_names_from_header(&self) -> Option<Vec<String>> {
        let header = self.headers.last()?;
        let mut names: Vec<String> = header
            .trim_start_matches('#')
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        let with_text = self.text.is_some();
        if names.len() == self.n_columns() + usize::from(with_text) {
            Some(names)
        } else if with_text && names.len() == self.n_columns() {
            names.push("text".to_string());
            Some(names)
        } else {
            None
        }
    }

    /// Converts to a record batch of `Float64` columns plus a `Utf8` text column.
    ///
    /// Names default to the header's, then to the column positions.
    pub fn to_record_batch(&self, names: Option<&[String]>) -> Result<RecordBatch, ExchangeError> {
        let expected = self.n_columns() + usize::from(self.text.is_some());
        let names: Vec<String> = match names {
            Some(names) if names.len() == expected => names.to_vec(),
            Some(names) => {
                return Err(ExchangeError::InvalidInput(format!(
                    "{} column names given for {} columns",
                    names.len(),
                    expected
                )))
            }
            None => self
                .column_names_from_header()
                .unwrap_or_else(|| (0..expected).map(|i| i.to_string()).collect()),
        };

        let mut fields = Vec::with_capacity(expected);
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(expected);
        for (name, column) in names.iter().zip(&self.columns) {
            fields.push(Field::new(name.as_str(), DataType::Float64, false));
            arrays.push(Arc::new(Float64Array::from(column.clone())));
        }
        if let (Some(text), Some(name)) = (&self.text, names.last()) {
            fields.push(Field::new(name.as_str(), DataType::Utf8, false));
            arrays.push(Arc::new(StringArray::from(text.clone())));
        }
        let options = RecordBatchOptions::new().with_row_count(Some(self.n_rows()));
        Ok(RecordBatch::try_new_with_options(
            Arc::new(Schema::new(fields)),
            arrays,
            &options,
        )?)
    }
}

fn native_pointer(container: &DataContainer<'_>, kind: DataKind) -> Result<*mut c_void, ExchangeError> {
    if container.via() != Via::None || container.kind() != Some(kind) {
        return Err(ExchangeError::InvalidInput(format!(
            "Container ({:?} via {:?}) cannot be decoded as {:?}",
            container.kind(),
            container.via(),
            kind
        )));
    }
    Ok(container.as_ptr())
}

/// Decodes an engine-produced dataset container.
pub fn decode_table(container: &DataContainer<'_>) -> Result<DecodedTable, ExchangeError> {
    let ptr = native_pointer(container, DataKind::Dataset)?;
    // SAFETY: native dataset containers point at a `GmtDataset` owned by the
    // session, which the container borrows.
    unsafe { decode_dataset(ptr as *const GmtDataset) }
}

/// Only the trailing text of a dataset container; empty when it has none.
pub fn decode_text(container: &DataContainer<'_>) -> Result<Vec<String>, ExchangeError> {
    Ok(decode_table(container)?.text.unwrap_or_default())
}

/// # Safety
/// `dataset` must be null or point to a well-formed dataset hierarchy whose
/// counts match its allocations.
pub(crate) unsafe fn decode_dataset(dataset: *const GmtDataset) -> Result<DecodedTable, ExchangeError> {
    let dataset = dataset
        .as_ref()
        .ok_or_else(|| ExchangeError::NullPointer("Dataset is null".to_string()))?;
    let n_columns = to_usize(dataset.n_columns, "Dataset column count")?;
    let n_tables = to_usize(dataset.n_tables, "Dataset table count")?;

    let mut decoded = DecodedTable {
        columns: vec![Vec::new(); n_columns],
        ..DecodedTable::default()
    };
    let mut text = Vec::new();
    let mut has_text = false;

    let tables = engine_slice(dataset.table as *const *mut GmtDataTable, n_tables, "Table array")?;
    for (table_index, &table) in tables.iter().enumerate() {
        let table = table.as_ref().ok_or_else(|| {
            ExchangeError::NullPointer(format!("Table {} is null", table_index))
        })?;
        let headers = engine_slice(
            table.header as *const *mut c_char,
            table.n_headers as usize,
            "Table header array",
        )?;
        decoded
            .headers
            .extend(headers.iter().filter_map(|&header| read_c_string(header)));

        let n_segments = to_usize(table.n_segments, "Table segment count")?;
        let segments = engine_slice(
            table.segment as *const *mut GmtDataSegment,
            n_segments,
            "Segment array",
        )?;
        for (segment_index, &segment) in segments.iter().enumerate() {
            let segment = segment.as_ref().ok_or_else(|| {
                ExchangeError::NullPointer(format!(
                    "Segment {} of table {} is null",
                    segment_index, table_index
                ))
            })?;
            let n_rows = to_usize(segment.n_rows, "Segment row count")?;
            let present = to_usize(segment.n_columns, "Segment column count")?.min(n_columns);
            let data = engine_slice(segment.data as *const *mut f64, present, "Segment column array")?;

            for (col, column) in decoded.columns.iter_mut().enumerate() {
                match data.get(col) {
                    Some(&values) => {
                        column.extend_from_slice(engine_slice(values as *const f64, n_rows, "Column data")?)
                    }
                    None => column.extend(iter::repeat(f64::NAN).take(n_rows)),
                }
            }

            if segment.text.is_null() {
                text.extend(iter::repeat(String::new()).take(n_rows));
                continue;
            }
            has_text = true;
            let rows = engine_slice(segment.text as *const *mut c_char, n_rows, "Segment text")?;
            let mut missing = 0usize;
            for &row in rows {
                text.push(read_c_string(row).unwrap_or_else(|| {
                    missing += 1;
                    String::new()
                }));
            }
            if missing > 0 {
                let warning = format!(
                    "Segment {} of table {}: {} missing text values replaced with empty strings",
                    segment_index, table_index, missing
                );
                log::warn!("{}", warning);
                decoded.warnings.push(warning);
            }
        }
    }

    decoded.text = has_text.then_some(text);
    log::debug!(
        "Decoded {} tables into {} columns x {} rows",
        n_tables,
        decoded.n_columns(),
        decoded.n_rows()
    );
    Ok(decoded)
}

//==================================================================================
// II. Grids
//==================================================================================

/// A decoded grid with ascending coordinates: `values[[j, i]]` sits at `(x[i], y[j])`.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub values: Array2<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// West, east, south, north.
    pub region: [f64; 4],
    pub increment: [f64; 2],
    pub z_range: [f64; 2],
    pub registration: Registration,
    pub grid_type: GridType,
    pub x_units: String,
    pub y_units: String,
    pub z_units: String,
    pub title: String,
    pub command: String,
    pub remark: String,
}

impl Raster {
    /// The same data as a `Grid` ready to go back to the engine.
    pub fn to_grid(&self) -> Result<Grid, ExchangeError> {
        Ok(Grid::from_2d(self.values.clone(), self.y.clone(), self.x.clone())?
            .with_registration(self.registration)
            .with_grid_type(self.grid_type))
    }
}

/// Node coordinates from the header, ascending along both axes.
fn header_coordinates(header: &GmtGridHeader) -> (Vec<f64>, Vec<f64>) {
    let offset = if header.registration == Registration::Pixel.flag() { 0.5 } else { 0.0 };
    let axis = |low: f64, inc: f64, n: u32| -> Vec<f64> {
        (0..n).map(|i| low + (f64::from(i) + offset) * inc).collect()
    };
    (
        axis(header.wesn[0], header.inc[0], header.n_columns),
        axis(header.wesn[2], header.inc[1], header.n_rows),
    )
}

fn infer_grid_type(x_units: &str, y_units: &str) -> GridType {
    let (x, y) = (x_units.to_lowercase(), y_units.to_lowercase());
    let lon = x.starts_with("lon") || x.contains("degrees_east");
    let lat = y.starts_with("lat") || y.contains("degrees_north");
    if lon && lat {
        GridType::Geographic
    } else {
        GridType::Cartesian
    }
}

/// Padding per side and the padded dimensions, after checking they agree.
fn padded_layout(header: &GmtGridHeader) -> Result<([usize; 4], usize, usize), ExchangeError> {
    let pad = header.pad.map(|p| p as usize);
    let (mx, my) = (header.mx as usize, header.my as usize);
    if mx != header.n_columns as usize + pad[0] + pad[1] || my != header.n_rows as usize + pad[2] + pad[3] {
        return Err(ExchangeError::SizeMismatch(format!(
            "Padded size {}x{} does not match {}x{} nodes with padding {:?}",
            mx, my, header.n_columns, header.n_rows, pad
        )));
    }
    Ok((pad, mx, my))
}

pub fn decode_grid(container: &DataContainer<'_>) -> Result<Raster, ExchangeError> {
    let ptr = native_pointer(container, DataKind::Grid)?;
    // SAFETY: native grid containers point at a `GmtGrid` owned by the session.
    unsafe { decode_grid_ptr(ptr as *const GmtGrid) }
}

/// # Safety
/// `grid` must be null or point to a grid whose header describes its sample buffer.
pub(crate) unsafe fn decode_grid_ptr(grid: *const GmtGrid) -> Result<Raster, ExchangeError> {
    let grid = grid
        .as_ref()
        .ok_or_else(|| ExchangeError::NullPointer("Grid is null".to_string()))?;
    let header = grid
        .header
        .as_ref()
        .ok_or_else(|| ExchangeError::NullPointer("Grid header is null".to_string()))?;
    let (pad, mx, my) = padded_layout(header)?;
    let (n_columns, n_rows) = (header.n_columns as usize, header.n_rows as usize);

    let samples = engine_slice(grid.data as *const f32, mx * my, "Grid data")?;
    let padded = ArrayView2::from_shape((my, mx), samples)?;
    // Rows are stored north first; padding on top belongs to the north side.
    let north_up = padded.slice(s![pad[3]..pad[3] + n_rows, pad[0]..pad[0] + n_columns]);
    let values = north_up.slice(s![..;-1, ..]).mapv(f64::from);

    let (x, y) = header_coordinates(header);
    let x_units = fixed_c_string(&header.x_units);
    let y_units = fixed_c_string(&header.y_units);
    let grid_type = infer_grid_type(&x_units, &y_units);

    Ok(Raster {
        values,
        x,
        y,
        region: header.wesn,
        increment: header.inc,
        z_range: [header.z_min, header.z_max],
        registration: Registration::from_flag(header.registration),
        grid_type,
        x_units,
        y_units,
        z_units: fixed_c_string(&header.z_units),
        title: fixed_c_string(&header.title),
        command: fixed_c_string(&header.command),
        remark: fixed_c_string(&header.remark),
    })
}

//==================================================================================
// III. Images
//==================================================================================

/// A decoded image indexed as (band, y, x) with ascending coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRaster {
    pub values: Array3<u8>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub region: [f64; 4],
    pub increment: [f64; 2],
    pub registration: Registration,
    /// The engine's memory layout code, e.g. `TRBa`.
    pub layout: String,
}

impl ImageRaster {
    pub fn n_bands(&self) -> usize {
        self.values.dim().0
    }
}

pub fn decode_image(container: &DataContainer<'_>) -> Result<ImageRaster, ExchangeError> {
    let ptr = native_pointer(container, DataKind::Image)?;
    // SAFETY: native image containers point at a `GmtImage` owned by the session.
    unsafe { decode_image_ptr(ptr as *const GmtImage) }
}

/// # Safety
/// `image` must be null or point to an image whose header describes its byte buffer.
pub(crate) unsafe fn decode_image_ptr(image: *const GmtImage) -> Result<ImageRaster, ExchangeError> {
    let image = image
        .as_ref()
        .ok_or_else(|| ExchangeError::NullPointer("Image is null".to_string()))?;
    let header = image
        .header
        .as_ref()
        .ok_or_else(|| ExchangeError::NullPointer("Image header is null".to_string()))?;
    let (pad, mx, my) = padded_layout(header)?;
    let (n_columns, n_rows) = (header.n_columns as usize, header.n_rows as usize);
    let n_bands = header.n_bands.max(1) as usize;
    let layout = fixed_c_string(&header.mem_layout);

    let samples = engine_slice(image.data as *const u8, n_bands * mx * my, "Image data")?;
    let padded: ArrayView3<'_, u8> = match layout.chars().nth(2) {
        None | Some('B') => ArrayView3::from_shape((n_bands, my, mx), samples)?,
        Some('P') => ArrayView3::from_shape((my, mx, n_bands), samples)?.permuted_axes([2, 0, 1]),
        Some(other) => {
            return Err(ExchangeError::UnsupportedType(format!(
                "Image memory layout '{}' ({} interleaving) is not supported",
                layout, other
            )))
        }
    };
    let north_up = padded.slice(s![.., pad[3]..pad[3] + n_rows, pad[0]..pad[0] + n_columns]);
    let values = north_up.slice(s![.., ..;-1, ..]).to_owned();
    let (x, y) = header_coordinates(header);

    Ok(ImageRaster {
        values,
        x,
        y,
        region: header.wesn,
        increment: header.inc,
        registration: Registration::from_flag(header.registration),
        layout,
    })
}

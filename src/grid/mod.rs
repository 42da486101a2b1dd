// In: src/grid/mod.rs

//! Host-side grids and the extraction of their extent and spacing.
//!
//! A `Grid` is an n-dimensional array with one coordinate vector per axis.
//! Only two-dimensional grids can be handed to the engine; their axes are
//! ordered `(y, x)`, i.e. rows then columns.

use ndarray::{Array2, ArrayD, ArrayView2, Axis, Ix2};

use crate::error::ExchangeError;
use crate::types::{GridType, Registration};

/// Relative tolerance for successive coordinate differences.
pub const SPACING_RTOL: f64 = 1e-5;
/// Absolute tolerance for successive coordinate differences.
pub const SPACING_ATOL: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq)]
pub struct GridAxis {
    pub name: String,
    pub coords: Vec<f64>,
}

impl GridAxis {
    pub fn new(name: &str, coords: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            coords,
        }
    }
}

/// Gridded values with named coordinate axes and optional engine metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub values: ArrayD<f64>,
    pub axes: Vec<GridAxis>,
    /// `None` is treated as gridline registration.
    pub registration: Option<Registration>,
    /// `None` is treated as Cartesian.
    pub grid_type: Option<GridType>,
}

impl Grid {
    pub fn new(values: ArrayD<f64>, axes: Vec<GridAxis>) -> Result<Self, ExchangeError> {
        if axes.len() != values.ndim() {
            return Err(ExchangeError::InvalidInput(format!(
                "Grid has {} dimensions but {} coordinate axes",
                values.ndim(),
                axes.len()
            )));
        }
        for (axis, &len) in axes.iter().zip(values.shape()) {
            if axis.coords.len() != len {
                return Err(ExchangeError::SizeMismatch(format!(
                    "Axis '{}' has {} coordinates but the grid has {} values along it",
                    axis.name,
                    axis.coords.len(),
                    len
                )));
            }
        }
        Ok(Self {
            values,
            axes,
            registration: None,
            grid_type: None,
        })
    }

    /// A two-dimensional grid with rows along `y` and columns along `x`.
    pub fn from_2d(values: Array2<f64>, y: Vec<f64>, x: Vec<f64>) -> Result<Self, ExchangeError> {
        Self::new(
            values.into_dyn(),
            vec![GridAxis::new("y", y), GridAxis::new("x", x)],
        )
    }

    pub fn with_registration(mut self, registration: Registration) -> Self {
        self.registration = Some(registration);
        self
    }

    pub fn with_grid_type(mut self, grid_type: GridType) -> Self {
        self.grid_type = Some(grid_type);
        self
    }

    pub fn ndim(&self) -> usize {
        self.values.ndim()
    }
}

/// A grid in the engine's layout: north row first, positive increments.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedGrid {
    pub matrix: Array2<f64>,
    /// West, east, south, north.
    pub region: [f64; 4],
    /// x increment, y increment.
    pub increment: [f64; 2],
    pub registration: Registration,
    pub grid_type: GridType,
    /// Irregular-spacing notices, also logged at warn level.
    pub warnings: Vec<String>,
}

fn spacing_is_uniform(diffs: &[f64], reference: f64) -> bool {
    diffs
        .iter()
        .all(|d| (d - reference).abs() <= SPACING_ATOL + SPACING_RTOL * reference.abs())
}

/// The effective increment of one axis; may be negative.
fn axis_increment(axis: &GridAxis, warnings: &mut Vec<String>) -> Result<f64, ExchangeError> {
    let coords = &axis.coords;
    if coords.len() < 2 {
        return Err(ExchangeError::ZeroIncrement(format!(
            "Axis '{}' needs at least two coordinates to define an increment",
            axis.name
        )));
    }
    let diffs: Vec<f64> = coords.windows(2).map(|w| w[1] - w[0]).collect();
    let mut increment = diffs[0];
    if !spacing_is_uniform(&diffs, increment) {
        increment = (coords[coords.len() - 1] - coords[0]) / (coords.len() - 1) as f64;
        let message = format!(
            "Grid may have irregular spacing in the '{}' dimension, but only regular spacing is \
             supported. Calculated regular spacing {} is assumed in the '{}' dimension.",
            axis.name, increment, axis.name
        );
        log::warn!("{}", message);
        warnings.push(message);
    }
    if increment == 0.0 {
        return Err(ExchangeError::ZeroIncrement(format!(
            "Grid has a zero increment in the '{}' dimension",
            axis.name
        )));
    }
    Ok(increment)
}

fn axis_bounds(coords: &[f64], increment: f64, registration: Registration) -> (f64, f64) {
    let (min, max) = coords
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &c| (lo.min(c), hi.max(c)));
    let half = increment.abs() / 2.0 * registration.flag() as f64;
    (min - half, max + half)
}

/// Derives the matrix, region and increments the engine needs from a 2-D grid.
pub fn extract_extent_and_increment(grid: &Grid) -> Result<ExtractedGrid, ExchangeError> {
    if grid.ndim() != 2 || grid.axes.len() != 2 {
        return Err(ExchangeError::UnsupportedDimensionality(format!(
            "Only 2-D grids can be passed to the engine, got {} dimensions",
            grid.ndim()
        )));
    }
    let registration = grid.registration.unwrap_or_default();
    let grid_type = grid.grid_type.unwrap_or_default();
    let (y_axis, x_axis) = (&grid.axes[0], &grid.axes[1]);

    let mut warnings = Vec::new();
    let x_inc = axis_increment(x_axis, &mut warnings)?;
    let y_inc = axis_increment(y_axis, &mut warnings)?;
    let (west, east) = axis_bounds(&x_axis.coords, x_inc, registration);
    let (south, north) = axis_bounds(&y_axis.coords, y_inc, registration);

    let mut matrix = grid.values.view().into_dimensionality::<Ix2>()?;
    if x_inc < 0.0 {
        matrix.invert_axis(Axis(1));
    }
    if y_inc < 0.0 {
        matrix.invert_axis(Axis(0));
    }
    // Ascending rows become north-up rows.
    matrix.invert_axis(Axis(0));

    Ok(ExtractedGrid {
        matrix: matrix.as_standard_layout().into_owned(),
        region: [west, east, south, north],
        increment: [x_inc.abs(), y_inc.abs()],
        registration,
        grid_type,
        warnings,
    })
}

/// Rebuilds a `(y, x)` grid with ascending axes from a north-up matrix.
pub fn matrix_to_grid(
    matrix: ArrayView2<'_, f64>,
    region: [f64; 4],
    increment: [f64; 2],
    registration: Registration,
) -> Result<Grid, ExchangeError> {
    let (n_rows, n_columns) = matrix.dim();
    let offset = match registration {
        Registration::Gridline => 0.0,
        Registration::Pixel => 0.5,
    };
    let x: Vec<f64> = (0..n_columns)
        .map(|i| region[0] + (i as f64 + offset) * increment[0])
        .collect();
    let y: Vec<f64> = (0..n_rows)
        .map(|j| region[2] + (j as f64 + offset) * increment[1])
        .collect();

    let expected_columns = expected_nodes(region[0], region[1], increment[0], registration);
    let expected_rows = expected_nodes(region[2], region[3], increment[1], registration);
    if expected_columns != n_columns || expected_rows != n_rows {
        return Err(ExchangeError::SizeMismatch(format!(
            "A {} x {} matrix does not match region {:?} with increments {:?} (expected {} x {})",
            n_rows, n_columns, region, increment, expected_rows, expected_columns
        )));
    }

    let mut ascending = matrix;
    ascending.invert_axis(Axis(0));
    Ok(Grid::from_2d(ascending.to_owned(), y, x)?.with_registration(registration))
}

fn expected_nodes(low: f64, high: f64, increment: f64, registration: Registration) -> usize {
    let cells = ((high - low) / increment).round() as usize;
    match registration {
        Registration::Gridline => cells + 1,
        Registration::Pixel => cells,
    }
}

//! Small enums naming the engine's data families and grid metadata flags.

use serde::{Deserialize, Serialize};

/// The three container families the exchange layer can decode.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    Dataset,
    Grid,
    Image,
}

impl DataKind {
    /// The engine family constant for this kind.
    pub fn family(&self) -> &'static str {
        match self {
            Self::Dataset => "GMT_IS_DATASET",
            Self::Grid => "GMT_IS_GRID",
            Self::Image => "GMT_IS_IMAGE",
        }
    }

    /// The geometry used when the engine is asked to produce this kind.
    pub fn default_geometry(&self) -> &'static str {
        match self {
            Self::Dataset => "GMT_IS_PLP",
            Self::Grid | Self::Image => "GMT_IS_SURFACE",
        }
    }

    /// Parses the base family name of a family constant expression.
    pub fn from_family(name: &str) -> Option<Self> {
        match name {
            "GMT_IS_DATASET" => Some(Self::Dataset),
            "GMT_IS_GRID" => Some(Self::Grid),
            "GMT_IS_IMAGE" => Some(Self::Image),
            _ => None,
        }
    }
}

/// How a container's data is supplied: natively, as column vectors, or as one matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Via {
    #[default]
    None,
    Vector,
    Matrix,
}

impl Via {
    pub fn from_modifier(modifier: Option<&str>) -> Self {
        match modifier {
            Some("GMT_VIA_VECTOR") => Self::Vector,
            Some("GMT_VIA_MATRIX") => Self::Matrix,
            _ => Self::None,
        }
    }
}

/// Data flow direction of a virtual file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// The host supplies data for the engine to read.
    In,
    /// The engine writes data the host decodes afterwards.
    Out,
}

impl Direction {
    pub fn from_constant(name: &str) -> Option<Self> {
        match name {
            "GMT_IN" => Some(Self::In),
            "GMT_OUT" => Some(Self::Out),
            _ => None,
        }
    }
}

/// Grid node registration.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Registration {
    /// Values sit on grid-line intersections.
    #[default]
    Gridline = 0,
    /// Values describe cell centers.
    Pixel = 1,
}

impl Registration {
    pub fn from_flag(flag: u32) -> Self {
        if flag == 1 {
            Self::Pixel
        } else {
            Self::Gridline
        }
    }

    pub fn flag(&self) -> u32 {
        *self as u32
    }

    pub fn constant_name(&self) -> &'static str {
        match self {
            Self::Gridline => "GMT_GRID_NODE_REG",
            Self::Pixel => "GMT_GRID_PIXEL_REG",
        }
    }
}

/// Coordinate system of a grid.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum GridType {
    #[default]
    Cartesian = 0,
    Geographic = 1,
}

impl GridType {
    pub fn constant_name(&self) -> &'static str {
        match self {
            Self::Cartesian => "GMT_GRID_IS_CARTESIAN",
            Self::Geographic => "GMT_GRID_IS_GEO",
        }
    }
}

//! The Constant Resolver: symbolic engine names to integer values.
//!
//! The engine owns the numeric values of its constants, so every name is looked
//! up through the engine and cached per session. Composite expressions of the
//! form `BASE|MODIFIER` combine additive bit flags.

use hashbrown::HashMap;
use std::cell::RefCell;

use crate::error::ExchangeError;

//==================================================================================
// I. Valid Name Sets
//==================================================================================

pub const FAMILIES: &[&str] = &[
    "GMT_IS_DATASET",
    "GMT_IS_GRID",
    "GMT_IS_IMAGE",
    "GMT_IS_PALETTE",
    "GMT_IS_POSTSCRIPT",
    "GMT_IS_CUBE",
];

/// Families accepted when attaching string arrays.
pub const STRING_FAMILIES: &[&str] = &[
    "GMT_IS_DATASET",
    "GMT_IS_GRID",
    "GMT_IS_IMAGE",
    "GMT_IS_PALETTE",
    "GMT_IS_POSTSCRIPT",
    "GMT_IS_CUBE",
    "GMT_IS_VECTOR",
    "GMT_IS_MATRIX",
];

pub const VIAS: &[&str] = &["GMT_VIA_MATRIX", "GMT_VIA_VECTOR"];

pub const GEOMETRIES: &[&str] = &[
    "GMT_IS_NONE",
    "GMT_IS_POINT",
    "GMT_IS_LINE",
    "GMT_IS_POLYGON",
    "GMT_IS_PLP",
    "GMT_IS_SURFACE",
    "GMT_IS_VOLUME",
];

pub const METHODS: &[&str] = &["GMT_IS_DUPLICATE", "GMT_IS_REFERENCE"];

pub const DIRECTIONS: &[&str] = &["GMT_IN", "GMT_OUT"];

pub const MODES: &[&str] = &["GMT_CONTAINER_ONLY", "GMT_IS_OUTPUT"];

pub const MODE_MODIFIERS: &[&str] = &[
    "GMT_GRID_IS_CARTESIAN",
    "GMT_GRID_IS_GEO",
    "GMT_WITH_STRINGS",
];

pub const REGISTRATIONS: &[&str] = &["GMT_GRID_PIXEL_REG", "GMT_GRID_NODE_REG"];

/// Separator between the base and the modifier of a composite expression.
pub const SEPARATOR: char = '|';

//==================================================================================
// II. Resolver
//==================================================================================

/// Per-session cache of resolved constants.
#[derive(Debug, Default)]
pub struct ConstantResolver {
    cache: RefCell<HashMap<String, i32>>,
}

impl ConstantResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached value of `name`, or asks `lookup` and caches its answer.
    ///
    /// Failed lookups are not cached.
    pub fn resolve_with<F>(&self, name: &str, lookup: F) -> Result<i32, ExchangeError>
    where
        F: FnOnce(&str) -> Result<i32, ExchangeError>,
    {
        if let Some(&value) = self.cache.borrow().get(name) {
            return Ok(value);
        }
        let value = lookup(name)?;
        self.cache.borrow_mut().insert(name.to_string(), value);
        Ok(value)
    }

    /// Resolves `BASE` or `BASE|MODIFIER` against the allowed name sets.
    ///
    /// The base must be in `allowed_base`. A modifier is only accepted when
    /// `allowed_modifiers` is given and contains it. The result is the sum of
    /// the two resolved values.
    pub fn resolve_composite<F>(
        &self,
        expr: &str,
        allowed_base: &[&str],
        allowed_modifiers: Option<&[&str]>,
        mut lookup: F,
    ) -> Result<i32, ExchangeError>
    where
        F: FnMut(&str) -> Result<i32, ExchangeError>,
    {
        let (base, modifier) = split_expression(expr)?;

        if !allowed_base.contains(&base) {
            return Err(ExchangeError::InvalidConstant(format!(
                "Invalid constant argument '{}'. Must be one of {:?}.",
                base, allowed_base
            )));
        }

        let mut value = self.resolve_with(base, &mut lookup)?;

        if let Some(modifier) = modifier {
            let allowed = allowed_modifiers.ok_or_else(|| {
                ExchangeError::InvalidConstant(format!(
                    "Constant modifiers are not allowed for '{}'.",
                    expr
                ))
            })?;
            if !allowed.contains(&modifier) {
                return Err(ExchangeError::InvalidConstant(format!(
                    "Invalid constant modifier '{}'. Must be one of {:?}.",
                    modifier, allowed
                )));
            }
            value += self.resolve_with(modifier, &mut lookup)?;
        }
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    /// Forgets every cached value. Values belong to a session; a new session
    /// may be backed by a different library.
    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }
}

/// Splits an expression into its base and optional modifier.
pub fn split_expression(expr: &str) -> Result<(&str, Option<&str>), ExchangeError> {
    let mut parts = expr.split(SEPARATOR);
    let base = parts.next().unwrap_or_default();
    let modifier = parts.next();
    if parts.next().is_some() {
        return Err(ExchangeError::InvalidConstant(format!(
            "Only one modifier is allowed in constants, {} given: '{}'",
            expr.matches(SEPARATOR).count(),
            expr
        )));
    }
    Ok((base, modifier))
}

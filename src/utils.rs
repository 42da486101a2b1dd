//! This module provides a set of shared, low-level utility functions used
//! throughout the exchange layer.
//!
//! Its primary responsibilities include:
//! 1.  Converting host strings into NUL-terminated C strings and back.
//! 2.  Encapsulating `unsafe` reads of engine-owned memory into well-defined,
//!     narrowly-scoped functions that can be heavily audited.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use crate::error::ExchangeError;

//==================================================================================
// 1. String Conversions
//==================================================================================

/// Converts a host string into a C string, rejecting interior NUL bytes.
pub fn to_cstring(value: &str) -> Result<CString, ExchangeError> {
    CString::new(value).map_err(|e| {
        ExchangeError::InvalidString(format!(
            "'{}' contains a NUL byte at position {}",
            value.replace('\0', "\\0"),
            e.nul_position()
        ))
    })
}

/// Reads a NUL-terminated string owned by the engine.
///
/// Returns `None` for a null pointer. Invalid UTF-8 is replaced rather than rejected.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays valid for
/// the duration of the call.
pub unsafe fn read_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

/// Reads a fixed-width, possibly NUL-padded character array (e.g. a grid header field).
pub fn fixed_c_string(chars: &[c_char]) -> String {
    let bytes: Vec<u8> = chars
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Reads the NUL-terminated prefix of a byte buffer the engine wrote into.
pub fn buffer_to_string(buffer: &[u8]) -> String {
    match CStr::from_bytes_until_nul(buffer) {
        Ok(cstr) => cstr.to_string_lossy().into_owned(),
        Err(_) => String::from_utf8_lossy(buffer).into_owned(),
    }
}

//==================================================================================
// 2. Engine Memory Views
//==================================================================================

/// Creates a zero-copy view over `len` elements of engine-owned memory.
///
/// A zero-length request never dereferences `ptr`. A null pointer with a
/// non-zero length is reported as `ExchangeError::NullPointer`.
///
/// # Safety
/// When non-null, `ptr` must point to at least `len` initialized, properly
/// aligned values of `T` that stay valid and unmodified for `'a`.
pub unsafe fn engine_slice<'a, T>(
    ptr: *const T,
    len: usize,
    what: &str,
) -> Result<&'a [T], ExchangeError> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(ExchangeError::NullPointer(format!(
            "{} is null but {} elements were expected",
            what, len
        )));
    }
    Ok(std::slice::from_raw_parts(ptr, len))
}

/// Converts an engine count to `usize`, failing loudly instead of truncating.
pub fn to_usize(value: u64, what: &str) -> Result<usize, ExchangeError> {
    usize::try_from(value).map_err(|_| {
        ExchangeError::InvalidInput(format!("{} ({}) does not fit in memory", what, value))
    })
}

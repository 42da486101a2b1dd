//! Owned native session pointer.

use std::os::raw::{c_int, c_void};
use std::ptr::NonNull;

use crate::ffi::abi::DestroySessionFn;

/// Exclusive ownership of one engine session.
///
/// Not `Clone`/`Copy`; the native teardown runs exactly once, either through
/// `destroy` or on drop.
#[derive(Debug)]
pub struct SessionHandle {
    ptr: NonNull<c_void>,
    destroy: DestroySessionFn,
}

impl SessionHandle {
    /// Takes ownership of `ptr`, returning `None` for a null session.
    ///
    /// # Safety
    /// `ptr` must be a session created by the engine whose teardown is `destroy`,
    /// not owned by anything else.
    pub unsafe fn from_raw(ptr: *mut c_void, destroy: DestroySessionFn) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr, destroy })
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.ptr.as_ptr()
    }

    /// Tears the session down and returns the engine's status code.
    pub fn destroy(self) -> c_int {
        let status = unsafe { (self.destroy)(self.ptr.as_ptr()) };
        std::mem::forget(self);
        status
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let status = unsafe { (self.destroy)(self.ptr.as_ptr()) };
        if status != 0 {
            log::warn!("Implicit session teardown returned status {}", status);
        }
    }
}

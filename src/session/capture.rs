//! Capture of the engine's diagnostic output.
//!
//! The engine reports problems by printing lines through a callback registered
//! at session creation. The callback cannot carry a Rust closure, so each
//! session owns a `DiagnosticLog` and activates it on the calling thread for
//! exactly the duration of one native call. Lines printed while no log is
//! active still reach the `log` facade.

use std::cell::RefCell;
use std::os::raw::{c_char, c_int, c_void};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::utils::read_c_string;

/// `log` target receiving every line the engine prints.
pub const ENGINE_LOG_TARGET: &str = "gmt_exchange::engine";

/// Error lines retained from one session's diagnostic output.
#[derive(Debug)]
pub struct DiagnosticLog {
    lines: RefCell<Vec<String>>,
    marker: String,
}

impl DiagnosticLog {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            lines: RefCell::new(Vec::new()),
            marker: marker.into(),
        }
    }

    /// Records `line` if it contains the error marker. Returns whether it was kept.
    pub fn record(&self, line: &str) -> bool {
        if line.contains(&self.marker) {
            self.lines.borrow_mut().push(line.to_string());
            true
        } else {
            false
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.borrow().clone()
    }

    /// Retained lines joined with newlines; empty when nothing was retained.
    pub fn message(&self) -> String {
        self.lines.borrow().join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.lines.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.lines.borrow_mut().clear();
    }
}

thread_local! {
    static ACTIVE_LOGS: RefCell<Vec<Rc<DiagnosticLog>>> = const { RefCell::new(Vec::new()) };
}

/// Keeps a log active on this thread until dropped.
pub struct ActiveCapture {
    _not_send: std::marker::PhantomData<Rc<()>>,
}

/// Makes `log` the destination of engine diagnostics on this thread.
///
/// Activations nest; the most recent one receives the lines.
pub fn activate(log: &Rc<DiagnosticLog>) -> ActiveCapture {
    ACTIVE_LOGS.with(|stack| stack.borrow_mut().push(Rc::clone(log)));
    ActiveCapture {
        _not_send: std::marker::PhantomData,
    }
}

impl Drop for ActiveCapture {
    fn drop(&mut self) {
        ACTIVE_LOGS.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

fn dispatch_line(line: &str) {
    log::debug!(target: ENGINE_LOG_TARGET, "{}", line);
    ACTIVE_LOGS.with(|stack| {
        if let Some(active) = stack.borrow().last() {
            active.record(line);
        }
    });
}

/// Print callback registered with every session the crate creates.
///
/// # Safety
/// Called by the engine with a NUL-terminated message or null.
pub unsafe extern "C" fn capture_diagnostic(_stream: *mut c_void, message: *const c_char) -> c_int {
    // Never unwind into the engine.
    let _ = catch_unwind(AssertUnwindSafe(|| {
        if let Some(text) = read_c_string(message) {
            let line = text.trim_end();
            if !line.is_empty() {
                dispatch_line(line);
            }
        }
    }));
    0
}

//! Step results and outbound notification channels
//!
//! Every driver interaction funnels through [`Reporter`], which turns the
//! call's outcome into a [`StepResult`], logs it and forwards it to the
//! optional [`StatusSink`]. Flash progress goes to a separate
//! [`ProgressSink`].

use crate::error::DriverError;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Uniform outcome of one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// Whether the step succeeded
    pub ok: bool,
    /// Human-readable description of the outcome
    pub message: String,
}

impl StepResult {
    /// A successful step
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    /// A failed step
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = if self.ok { "ok" } else { "failed" };
        write!(f, "[{}] {}", tag, self.message)
    }
}

/// Success code returned by a driver call
///
/// The J-Link SDK signals success with `true` or a non-negative integer,
/// depending on the call.
pub trait ReturnCode: fmt::Debug {
    /// Whether this code means the call succeeded
    fn succeeded(&self) -> bool;
}

impl ReturnCode for bool {
    fn succeeded(&self) -> bool {
        *self
    }
}

impl ReturnCode for i32 {
    fn succeeded(&self) -> bool {
        *self >= 0
    }
}

impl ReturnCode for usize {
    fn succeeded(&self) -> bool {
        true
    }
}

impl ReturnCode for () {
    fn succeeded(&self) -> bool {
        true
    }
}

impl<T: fmt::Debug> ReturnCode for Vec<T> {
    fn succeeded(&self) -> bool {
        true
    }
}

/// Receives `(ok, message)` after every step
pub trait StatusSink: Send + Sync {
    /// Called once per step
    fn status(&self, ok: bool, message: &str);
}

impl<F> StatusSink for F
where
    F: Fn(bool, &str) + Send + Sync,
{
    fn status(&self, ok: bool, message: &str) {
        self(ok, message)
    }
}

/// Receives flash progress during `loadbin`
pub trait ProgressSink: Send + Sync {
    /// Called for each progress update
    fn progress(&self, percent: u8, action: &str, detail: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(u8, &str, &str) + Send + Sync,
{
    fn progress(&self, percent: u8, action: &str, detail: &str) {
        self(percent, action, detail)
    }
}

/// Run a driver call, converting a panic into [`DriverError::Panicked`]
pub fn catch_fault<T, F>(f: F) -> Result<T, DriverError>
where
    F: FnOnce() -> Result<T, DriverError>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let reason = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            Err(DriverError::Panicked(reason))
        }
    }
}

/// Converts driver outcomes into step results and publishes them
#[derive(Clone, Default)]
pub struct Reporter {
    status: Option<Arc<dyn StatusSink>>,
}

impl Reporter {
    /// Create a reporter, optionally publishing to a status sink
    pub fn new(status: Option<Arc<dyn StatusSink>>) -> Self {
        Self { status }
    }

    /// Replace the status sink
    pub fn set_status_sink(&mut self, sink: Arc<dyn StatusSink>) {
        self.status = Some(sink);
    }

    /// Run a driver call and report its outcome
    pub fn call<T, F>(&self, call: &str, f: F) -> StepResult
    where
        T: ReturnCode,
        F: FnOnce() -> Result<T, DriverError>,
    {
        self.call_value(call, f).0
    }

    /// Run a driver call, report it, and hand back the returned value
    pub fn call_value<T, F>(&self, call: &str, f: F) -> (StepResult, Option<T>)
    where
        T: ReturnCode,
        F: FnOnce() -> Result<T, DriverError>,
    {
        let (result, value) = match catch_fault(f) {
            Ok(code) => (
                StepResult {
                    ok: code.succeeded(),
                    message: format!("{} ret: {:?}", call, code),
                },
                Some(code),
            ),
            Err(e) => (StepResult::failure(format!("{} exception: {}", call, e)), None),
        };
        self.report(&result);
        (result, value)
    }

    /// Report a failure that did not come from a driver call
    pub fn fail(&self, message: impl Into<String>) -> StepResult {
        let result = StepResult::failure(message);
        self.report(&result);
        result
    }

    /// Report a success that did not come from a driver call
    pub fn succeed(&self, message: impl Into<String>) -> StepResult {
        let result = StepResult::success(message);
        self.report(&result);
        result
    }

    /// Log a result and forward it to the status sink
    pub fn report(&self, result: &StepResult) {
        if result.ok {
            log::info!("{}", result.message);
        } else {
            log::error!("{}", result.message);
        }
        if let Some(sink) = &self.status {
            sink.status(result.ok, &result.message);
        }
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("status", &self.status.is_some())
            .finish()
    }
}

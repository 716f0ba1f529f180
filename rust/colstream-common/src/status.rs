//! Status codes reported at the API boundary.
//!
//! Every fallible operation maps onto one of a small set of codes. The end of a
//! frame sequence is reported as [`Status::IterationComplete`], which is a normal
//! termination signal and not a failure.

use std::panic::UnwindSafe;

use crate::{Result, error::Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    Success = 0,
    IterationComplete = 1,
    Exception = 2,
    UnknownException = 3,
}

impl Status {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Status> {
        match code {
            0 => Some(Status::Success),
            1 => Some(Status::IterationComplete),
            2 => Some(Status::Exception),
            3 => Some(Status::UnknownException),
            _ => None,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Status::Success => "Success",
            Status::IterationComplete => "End of iteration",
            Status::Exception => "Exception thrown",
            Status::UnknownException => "Unknown exception thrown",
        }
    }

    /// Returns `true` for codes that callers must treat as failures.
    pub fn is_failure(self) -> bool {
        matches!(self, Status::Exception | Status::UnknownException)
    }

    /// Status of a plain operation result.
    pub fn of<T>(result: &Result<T>) -> Status {
        match result {
            Ok(_) => Status::Success,
            Err(e) => e.status(),
        }
    }

    /// Status of an iteration step, where `Ok(None)` marks the end of the sequence.
    pub fn of_next<T>(result: &Result<Option<T>>) -> Status {
        match result {
            Ok(Some(_)) => Status::Success,
            Ok(None) => Status::IterationComplete,
            Err(e) => e.status(),
        }
    }
}

/// Returns the textual description of a raw status code.
pub fn status_description(code: i32) -> &'static str {
    Status::from_code(code)
        .map(Status::description)
        .unwrap_or("Unrecognised status code")
}

/// Runs `f`, converting a panic into an [`ErrorKind::Unknown`](crate::error::ErrorKind::Unknown)
/// error so that it surfaces as [`Status::UnknownException`].
pub fn guarded<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + UnwindSafe,
{
    match std::panic::catch_unwind(f) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            Err(Error::unknown(message))
        }
    }
}

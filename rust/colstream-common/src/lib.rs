//! Core definitions relied upon by all colstream-* crates: the error type,
//! boundary status codes and the process-wide failure hook.

pub mod error;
pub mod failure;
pub mod macros;
pub mod result;
pub mod status;

pub use error::{CallbackError, Error, ErrorKind};
pub use failure::{clear_failure_handler, set_failure_handler};
pub use result::Result;
pub use status::{Status, status_description};

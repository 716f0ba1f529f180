//! Process-wide failure hook.
//!
//! A handler registered here observes every [`Error`] as it is raised. It has no
//! influence on error propagation: the error is still returned to the caller.

use std::sync::{Arc, RwLock};

use crate::error::Error;

type Handler = Arc<dyn Fn(&Error) + Send + Sync + 'static>;

static HANDLER: RwLock<Option<Handler>> = RwLock::new(None);

/// Registers `handler`, replacing any previously registered one.
pub fn set_failure_handler<F>(handler: F)
where
    F: Fn(&Error) + Send + Sync + 'static,
{
    let mut slot = HANDLER.write().unwrap_or_else(|e| e.into_inner());
    *slot = Some(Arc::new(handler));
}

pub fn clear_failure_handler() {
    let mut slot = HANDLER.write().unwrap_or_else(|e| e.into_inner());
    *slot = None;
}

pub(crate) fn notify(err: &Error) {
    let handler = HANDLER
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .as_ref()
        .cloned();
    if let Some(handler) = handler {
        handler(err);
    }
    log::trace!("error raised: {err}");
}

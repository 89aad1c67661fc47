//! Message handlers
//!
//! Each submodule handles one category of messages; `App::update` dispatches
//! to them. Handlers validate locally, start capability calls through the
//! relevant slot and return the `Task` that performs them.

pub mod crop;
pub mod editing;
pub mod primary;
pub mod remap;
pub mod session;

use crate::core::task::Task;
use crate::error::EditError;
use crate::session::notice::Notice;

/// Result type for message handlers
pub type HandlerResult = Task;

/// Surface an error as a notice. Superseded results are dropped silently.
pub fn report(notices: &mut Vec<Notice>, err: EditError) {
    match &err {
        EditError::Superseded => {
            log::debug!("Dropping superseded result");
            return;
        }
        EditError::Capability(e) => log::warn!("Capability call failed: {}", e),
        EditError::StateInvariant(what) => log::error!("State invariant violated: {}", what),
        EditError::Validation(v) => log::debug!("Rejected locally: {}", v),
    }
    if let Some(notice) = Notice::from_error(&err) {
        notices.push(notice);
    }
}

/// Helper to get a mutable optional app field or reject with a notice
#[macro_export]
macro_rules! require {
    ($app:ident . $field:ident, $missing:expr) => {
        match $app.$field.as_mut() {
            Some(value) => value,
            None => {
                $app.notices
                    .push($crate::session::notice::Notice::from($missing));
                return $crate::core::task::Task::none();
            }
        }
    };
}

/// Unwrap a result or report its error and return `Task::none()`
#[macro_export]
macro_rules! try_or_report {
    ($app:ident, $result:expr) => {
        match $result {
            Ok(value) => value,
            Err(err) => {
                $crate::core::handlers::report(&mut $app.notices, err.into());
                return $crate::core::task::Task::none();
            }
        }
    };
}

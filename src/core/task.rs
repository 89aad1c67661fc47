//! Deferred work returned by message handlers
//!
//! A `Task` wraps at most one future resolving to the next `Msg`. Tasks that
//! run a capability call are bound to the slot and ticket they belong to, so
//! the event loop can hand the spawned task's abort handle to that slot.

use std::future::Future;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::session::lifecycle::Ticket;
use crate::session::messages::Msg;

/// Which request slot owns a spawned task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKey {
    Upload,
    Primary,
    LayerEdit,
    Remap,
    Crop,
}

#[must_use = "a Task does nothing unless spawned"]
pub struct Task {
    future: Option<BoxFuture<'static, Msg>>,
    binding: Option<(SlotKey, Ticket)>,
}

impl Task {
    pub fn none() -> Self {
        Self {
            future: None,
            binding: None,
        }
    }

    /// Run `future` and turn its output into a message
    pub fn perform<T, F, M>(future: F, map: M) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        M: FnOnce(T) -> Msg + Send + 'static,
    {
        Self {
            future: Some(future.map(map).boxed()),
            binding: None,
        }
    }

    pub fn bound_to(mut self, key: SlotKey, ticket: Ticket) -> Self {
        self.binding = Some((key, ticket));
        self
    }

    #[cfg(test)]
    pub fn is_none(&self) -> bool {
        self.future.is_none()
    }

    pub fn into_parts(self) -> (Option<BoxFuture<'static, Msg>>, Option<(SlotKey, Ticket)>) {
        (self.future, self.binding)
    }

    /// Await the task in place (tests drive the loop by hand)
    #[cfg(test)]
    pub async fn resolve(self) -> Option<Msg> {
        match self.future {
            Some(future) => Some(future.await),
            None => None,
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("pending", &self.future.is_some())
            .field("binding", &self.binding)
            .finish()
    }
}

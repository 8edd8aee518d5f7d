//! Client lifecycle notifications.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use crate::Error;

/// Kinds of [`Event`], used to register listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// See [`Event::Reconnecting`].
    Reconnecting,
    /// See [`Event::Reconnected`].
    Reconnected,
    /// See [`Event::ReconnectFailed`].
    ReconnectFailed,
    /// See [`Event::Error`].
    Error,
    /// See [`Event::Close`].
    Close,
}

/// A lifecycle notification.
#[derive(Debug)]
pub enum Event {
    /// Reconnection started.
    Reconnecting,
    /// Reconnection succeeded.
    Reconnected {
        /// The mailbox selected again, if one was selected and reselecting
        /// it worked.
        mailbox: Option<String>,
    },
    /// Every reconnection attempt failed.
    ReconnectFailed(Error),
    /// A command failed at connection level.
    Error(String),
    /// The client was disconnected or closed.
    Close,
}

impl Event {
    /// The kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Reconnecting => EventKind::Reconnecting,
            Self::Reconnected { .. } => EventKind::Reconnected,
            Self::ReconnectFailed(_) => EventKind::ReconnectFailed,
            Self::Error(_) => EventKind::Error,
            Self::Close => EventKind::Close,
        }
    }
}

/// Identifies a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&Event) + Send + Sync>;

/// Listener registry keyed by event kind.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    by_kind: HashMap<EventKind, Vec<(ListenerId, Listener)>>,
}

impl Listeners {
    pub(crate) fn add(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.by_kind.entry(kind).or_default().push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        for listeners in self.by_kind.values_mut() {
            if let Some(pos) = listeners.iter().position(|(lid, _)| *lid == id) {
                listeners.remove(pos);
                return true;
            }
        }
        false
    }

    pub(crate) fn clear(&mut self) {
        self.by_kind.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    /// Calls every listener for the event's kind. A panicking listener is
    /// logged and the rest still run.
    pub(crate) fn emit(&self, event: &Event) {
        let kind = event.kind();
        let Some(listeners) = self.by_kind.get(&kind) else {
            return;
        };
        for (id, listener) in listeners {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                tracing::warn!(?kind, ?id, "Event listener panicked");
            }
        }
    }
}

impl std::fmt::Debug for Listeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.len())
            .finish_non_exhaustive()
    }
}

//! Host lifecycle notifications and the worker scope seam.

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use url::Url;

use crate::error::RegistryError;
use crate::route::Route;

/// Lifecycle notifications the coordinator subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleEventKind {
    Install,
    Activate,
}

impl LifecycleEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEventKind::Install => "install",
            LifecycleEventKind::Activate => "activate",
        }
    }
}

/// Work registered through [`ExtendableEvent::wait_until`].
pub type PendingWork = LocalBoxFuture<'static, Result<(), RegistryError>>;

/// A lifecycle event whose completion the host defers until every
/// registered future settles.
pub struct ExtendableEvent {
    kind: LifecycleEventKind,
    pending: RefCell<Vec<PendingWork>>,
}

impl ExtendableEvent {
    pub fn new(kind: LifecycleEventKind) -> Self {
        Self {
            kind,
            pending: RefCell::new(Vec::new()),
        }
    }

    pub fn kind(&self) -> LifecycleEventKind {
        self.kind
    }

    /// Extend the event's lifetime until `work` settles.
    pub fn wait_until(&self, work: PendingWork) {
        self.pending.borrow_mut().push(work);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Drain the registered work. Called by the host after dispatch.
    pub fn take_pending(&self) -> Vec<PendingWork> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }
}

impl fmt::Debug for ExtendableEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtendableEvent")
            .field("kind", &self.kind)
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// Handler invoked for a lifecycle notification.
pub type EventListener = Rc<dyn Fn(&ExtendableEvent)>;

/// The worker global scope as seen by the coordinator.
pub trait ServiceWorkerScope {
    /// URL of the running worker script; relative URLs resolve against it.
    fn location(&self) -> Url;

    /// Subscribe to a lifecycle notification.
    fn add_event_listener(&self, kind: LifecycleEventKind, listener: EventListener);

    /// Bind a route into the host-wide router.
    fn register_route(&self, route: Rc<dyn Route>);
}

//! Zero-argument change notification.
//!
//! A [`Signal`] carries no payload: observers are told *that* something
//! changed and re-query the state themselves. Each emission also bumps a
//! counter, so pollers can compare [`Signal::version`] instead of
//! subscribing.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

type Listener = Rc<dyn Fn()>;

struct SignalInner {
    version: Cell<u64>,
    next_listener_id: Cell<u64>,
    listeners: RefCell<BTreeMap<u64, Listener>>,
}

/// Observable change counter. Cloning yields another handle to the same
/// signal.
#[derive(Clone)]
pub struct Signal {
    inner: Rc<SignalInner>,
}

impl Signal {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SignalInner {
                version: Cell::new(0),
                next_listener_id: Cell::new(1),
                listeners: RefCell::new(BTreeMap::new()),
            }),
        }
    }

    /// Register `listener`. It stays registered until the returned
    /// [`Subscription`] is dropped or detached.
    #[must_use = "dropping the subscription detaches the listener"]
    pub fn subscribe(&self, listener: impl Fn() + 'static) -> Subscription {
        let id = self.inner.next_listener_id.get();
        self.inner.next_listener_id.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .insert(id, Rc::new(listener));
        Subscription {
            signal: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Bump the counter and call every listener once, in subscription order.
    ///
    /// Listeners are snapshotted first: a listener may subscribe, detach or
    /// emit other signals while being called.
    pub fn emit(&self) {
        self.inner.version.set(self.inner.version.get() + 1);
        let listeners: Vec<Listener> = self.inner.listeners.borrow().values().cloned().collect();
        for listener in listeners {
            listener();
        }
    }

    /// Number of emissions so far.
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

impl Default for Signal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("version", &self.version())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle to a registered listener. Detaches on drop.
pub struct Subscription {
    signal: Weak<SignalInner>,
    id: u64,
}

impl Subscription {
    /// Detach the listener now.
    pub fn detach(self) {
        drop(self);
    }

    /// Whether the signal this subscription belongs to still exists.
    pub fn is_attached(&self) -> bool {
        self.signal
            .upgrade()
            .is_some_and(|s| s.listeners.borrow().contains_key(&self.id))
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.upgrade() {
            signal.listeners.borrow_mut().remove(&self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .finish()
    }
}

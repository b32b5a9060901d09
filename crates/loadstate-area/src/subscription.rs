//! State-change subscriptions
//!
//! Every area keeps an ordered listener set. Listeners are either user
//! callbacks or the upward link of a segment to its parent. The set is
//! shared behind a lock so a [`Subscription`] can dispose itself without
//! access to the tree, including from inside a notification.

use std::sync::{Arc, Weak};

use loadstate_core::AreaId;
use parking_lot::Mutex;

/// Subscriber callback, called with the new effective loading state
pub type Callback = Box<dyn FnMut(bool) + Send>;

pub(crate) type SharedCallback = Arc<Mutex<Callback>>;

/// Listener identity - unique within one area's listener set
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Clone)]
pub(crate) enum Listener {
    /// Re-evaluate the parent area
    Segment(AreaId),
    /// User callback
    Callback(SharedCallback),
}

#[derive(Default)]
struct ListenerSet {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
}

#[derive(Clone, Default)]
pub(crate) struct Listeners {
    set: Arc<Mutex<ListenerSet>>,
}

impl Listeners {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, listener: Listener) -> ListenerId {
        let mut set = self.set.lock();
        let id = ListenerId(set.next_id);
        set.next_id += 1;
        set.entries.push((id, listener));
        id
    }

    pub(crate) fn add_callback(&self, callback: Callback) -> ListenerId {
        self.add(Listener::Callback(Arc::new(Mutex::new(callback))))
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        remove_from(&self.set, id)
    }

    pub(crate) fn contains(&self, id: ListenerId) -> bool {
        self.set.lock().entries.iter().any(|(entry, _)| *entry == id)
    }

    /// Copy of the current listeners in registration order
    pub(crate) fn snapshot(&self) -> Vec<(ListenerId, Listener)> {
        self.set.lock().entries.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.set.lock().entries.len()
    }

    pub(crate) fn clear(&self) {
        self.set.lock().entries.clear();
    }

    pub(crate) fn subscription(&self, id: ListenerId) -> Subscription {
        Subscription {
            set: Arc::downgrade(&self.set),
            id,
        }
    }
}

fn remove_from(set: &Mutex<ListenerSet>, id: ListenerId) -> bool {
    let mut set = set.lock();
    let before = set.entries.len();
    set.entries.retain(|(entry, _)| *entry != id);
    set.entries.len() != before
}

/// Disposer returned by `on_emit`
///
/// Dropping a subscription does NOT unsubscribe; call [`Subscription::dispose`].
#[derive(Clone)]
pub struct Subscription {
    set: Weak<Mutex<ListenerSet>>,
    id: ListenerId,
}

impl Subscription {
    /// Remove the callback. Calling it again, or after the area is gone, is a no-op.
    pub fn dispose(&self) {
        if let Some(set) = self.set.upgrade() {
            remove_from(&set, self.id);
        }
    }

    /// Whether the callback is still registered
    pub fn is_active(&self) -> bool {
        self.set
            .upgrade()
            .map(|set| set.lock().entries.iter().any(|(entry, _)| *entry == self.id))
            .unwrap_or(false)
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

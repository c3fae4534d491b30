use std::sync::{Arc, Weak};

use crossterm::event::KeyCode;
use parking_lot::Mutex;

struct Entry<A> {
    id: u64,
    key: KeyCode,
    action: A,
}

struct Registry<A> {
    next_id: u64,
    entries: Vec<Entry<A>>,
}

/// Page-level key listeners. A listener stays registered exactly as long as
/// its [`Subscription`] handle is alive.
pub struct EventBus<A> {
    registry: Arc<Mutex<Registry<A>>>,
}

impl<A> Default for EventBus<A> {
    fn default() -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 1,
                entries: Vec::new(),
            })),
        }
    }
}

impl<A: Clone + Send + 'static> EventBus<A> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, key: KeyCode, action: A) -> Subscription {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id = registry.next_id.wrapping_add(1);
        registry.entries.push(Entry { id, key, action });
        drop(registry);

        let weak: Weak<Mutex<Registry<A>>> = Arc::downgrade(&self.registry);
        Subscription {
            id,
            release: Some(Box::new(move |id| {
                if let Some(registry) = weak.upgrade() {
                    registry.lock().entries.retain(|entry| entry.id != id);
                }
            })),
        }
    }

    /// Actions of every live listener for `key`, in subscription order.
    pub fn dispatch(&self, key: KeyCode) -> Vec<A> {
        self.registry
            .lock()
            .entries
            .iter()
            .filter(|entry| entry.key == key)
            .map(|entry| entry.action.clone())
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        self.registry.lock().entries.len()
    }
}

pub struct Subscription {
    id: u64,
    release: Option<Box<dyn FnOnce(u64) + Send>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.release.is_some())
            .finish()
    }
}

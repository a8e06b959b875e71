use std::sync::Arc;

pub type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Opaque handle returned by a registration, used to remove it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered registry of event handlers.
///
/// Handlers fire in registration order and are removed through the id handed
/// out at registration, never by comparing closures.
pub struct SubscriberList<E> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Handler<E>)>,
}

impl<E> SubscriberList<E> {
    pub fn new() -> Self {
        SubscriberList {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub fn subscribe(&mut self, handler: Handler<E>) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.push((id, handler));
        id
    }

    /// Returns false when the id was already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    /// Snapshot of the handlers in registration order, so delivery can happen
    /// outside any lock guarding the list itself.
    pub fn handlers(&self) -> Vec<Handler<E>> {
        self.entries
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E> Default for SubscriberList<E> {
    fn default() -> Self {
        Self::new()
    }
}

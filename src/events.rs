//! Typed notification channels.
//!
//! Each producer (the viewport, every tile layer) owns one `EventChannel` for
//! its own event type. Registering a listener returns a [`Subscription`];
//! dropping or disposing it removes the listener.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

type Listener<E> = Rc<RefCell<dyn FnMut(&E)>>;

struct Listeners<E> {
    next_id: u64,
    entries: Vec<(u64, Listener<E>)>,
}

pub struct EventChannel<E> {
    inner: Rc<RefCell<Listeners<E>>>,
}

impl<E: 'static> EventChannel<E> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Registers `listener`; it stays registered for as long as the returned
    /// subscription is alive (or forever after [`Subscription::detach`]).
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: FnMut(&E) + 'static,
    {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            let listener: Listener<E> = Rc::new(RefCell::new(listener));
            inner.entries.push((id, listener));
            id
        };

        let weak: Weak<RefCell<Listeners<E>>> = Rc::downgrade(&self.inner);
        Subscription {
            disposer: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().entries.retain(|(entry_id, _)| *entry_id != id);
                }
            })),
        }
    }

    /// Delivers `event` to every listener registered at the time of the call.
    /// A listener that re-enters the channel while it is already running is
    /// skipped for the nested event.
    pub fn emit(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();

        for listener in listeners {
            if let Ok(mut callback) = listener.try_borrow_mut() {
                (&mut *callback)(event);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }
}

impl<E: 'static> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("listeners", &self.inner.borrow().entries.len())
            .finish()
    }
}

/// Disposer for a registered listener.
#[must_use = "dropping a Subscription unregisters its listener"]
pub struct Subscription {
    disposer: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Unregisters the listener now.
    pub fn dispose(mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }

    /// Keeps the listener registered for the lifetime of the channel.
    pub fn detach(mut self) {
        self.disposer = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.disposer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_listener_receives_events_until_disposed() {
        let channel: EventChannel<u32> = EventChannel::new();
        let total = Rc::new(Cell::new(0));

        let sink = Rc::clone(&total);
        let subscription = channel.subscribe(move |value| sink.set(sink.get() + *value));

        channel.emit(&3);
        channel.emit(&4);
        assert_eq!(total.get(), 7);
        assert_eq!(channel.listener_count(), 1);

        subscription.dispose();
        channel.emit(&100);
        assert_eq!(total.get(), 7);
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn test_drop_unsubscribes_and_detach_keeps() {
        let channel: EventChannel<()> = EventChannel::new();
        let hits = Rc::new(Cell::new(0));

        {
            let sink = Rc::clone(&hits);
            let _scoped = channel.subscribe(move |_| sink.set(sink.get() + 1));
            channel.emit(&());
        }
        channel.emit(&());
        assert_eq!(hits.get(), 1);

        let sink = Rc::clone(&hits);
        channel.subscribe(move |_| sink.set(sink.get() + 10)).detach();
        channel.emit(&());
        assert_eq!(hits.get(), 11);
    }

    #[test]
    fn test_subscription_outliving_channel_is_harmless() {
        let channel: EventChannel<u8> = EventChannel::new();
        let subscription = channel.subscribe(|_| {});
        drop(channel);
        subscription.dispose();
    }
}

//! Subscribable callbacks used by embedders (§4.10). A pure data structure:
//! no threading policy of its own beyond a single internal lock, and no
//! knowledge of the protocol.

use parking_lot::Mutex;

struct Subscriber<Args> {
    callback: Box<dyn Fn(&Args) -> bool + Send + Sync>,
    disposable: bool,
}

/// An ordered list of subscribers firing against a shared `Args` value.
/// Firing invokes every subscriber in registration order, ANDs their
/// boolean results together, then drops subscribers registered as
/// disposable. Subscribers added while a fire is in progress are observed
/// starting with the next fire (the fire holds the lock for its duration).
pub struct Event<Args> {
    subscribers: Mutex<Vec<Subscriber<Args>>>,
}

impl<Args> Default for Event<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> Event<Args> {
    pub fn new() -> Self {
        Self { subscribers: Mutex::new(Vec::new()) }
    }

    /// Registers a subscriber. `disposable` subscribers are removed after
    /// their first fire.
    pub fn subscribe(&self, disposable: bool, callback: impl Fn(&Args) -> bool + Send + Sync + 'static) {
        self.subscribers.lock().push(Subscriber {
            callback: Box::new(callback),
            disposable,
        });
    }

    /// Fires the event, invoking every subscriber with `args` in order.
    /// Returns `true` iff every subscriber returned `true`.
    pub fn fire(&self, args: &Args) -> bool {
        let mut subscribers = self.subscribers.lock();
        let mut success = true;
        for subscriber in subscribers.iter() {
            success &= (subscriber.callback)(args);
        }
        subscribers.retain(|subscriber| !subscriber.disposable);
        success
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

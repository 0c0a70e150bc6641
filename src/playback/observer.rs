use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Token returned by `subscribe_*`; pass it back to unsubscribe.
///
/// Tokens are process-unique, so one token never matches a callback in another list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

impl Subscription {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Ordered list of synchronous callbacks for one outward signal.
pub struct Observers<T: ?Sized> {
    callbacks: Vec<(u64, Rc<dyn Fn(&T)>)>,
}

impl<T: ?Sized> Default for Observers<T> {
    fn default() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for Observers<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("len", &self.callbacks.len())
            .finish()
    }
}

impl<T: ?Sized> Observers<T> {
    pub fn subscribe(&mut self, f: impl Fn(&T) + 'static) -> Subscription {
        let sub = Subscription::next();
        self.callbacks.push((sub.0, Rc::new(f)));
        sub
    }

    /// Returns whether the token belonged to this list.
    pub fn unsubscribe(&mut self, sub: Subscription) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(id, _)| *id != sub.0);
        self.callbacks.len() != before
    }

    pub fn emit(&self, value: &T) {
        for (_, f) in &self.callbacks {
            f(value);
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn clear(&mut self) {
        self.callbacks.clear();
    }
}

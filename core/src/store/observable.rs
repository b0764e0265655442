//! Minimal publish/subscribe value container.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A value holder that notifies subscribers on every change.
///
/// Notification is synchronous on the caller's thread; no lock is held
/// while callbacks run. The latest value is always retrievable via
/// [`Observable::get`], so rapid consecutive `set` calls cannot strand a
/// late subscriber on a stale value.
pub struct Observable<T: Clone> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    value: Mutex<T>,
    subscribers: Mutex<Vec<(u64, Callback<T>)>>,
    next_id: AtomicU64,
}

impl<T: Clone> Observable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: Mutex::new(initial),
                subscribers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Clone of the current value.
    pub fn get(&self) -> T {
        self.inner.lock_value().clone()
    }

    pub fn set(&self, value: T) {
        *self.inner.lock_value() = value.clone();
        self.notify(&value);
    }

    /// Mutate the current value in place and notify subscribers once.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let (result, snapshot) = {
            let mut guard = self.inner.lock_value();
            let result = f(&mut guard);
            (result, guard.clone())
        };
        self.notify(&snapshot);
        result
    }

    /// Register a change callback. The callback is invoked immediately
    /// with the current value, then on every subsequent change until the
    /// returned [`Subscription`] is dropped.
    #[must_use = "dropping the subscription unsubscribes"]
    pub fn subscribe(&self, callback: impl Fn(&T) + Send + Sync + 'static) -> Subscription
    where
        T: Send + 'static,
    {
        let callback: Callback<T> = Arc::new(callback);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut subscribers = self.inner.lock_subscribers();
            subscribers.push((id, Arc::clone(&callback)));
        }
        callback(&self.get());
        let inner = Arc::downgrade(&self.inner);
        Subscription {
            unsubscribe: Box::new(move || {
                if let Some(inner) = Weak::upgrade(&inner) {
                    inner.lock_subscribers().retain(|(sub_id, _)| *sub_id != id);
                }
            }),
        }
    }

    fn notify(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = {
            let subscribers = self.inner.lock_subscribers();
            subscribers.iter().map(|(_, cb)| Arc::clone(cb)).collect()
        };
        for callback in callbacks {
            callback(value);
        }
    }
}

impl<T> Inner<T> {
    fn lock_value(&self) -> std::sync::MutexGuard<'_, T> {
        // Lock poisoning only happens if a subscriber panicked; the value
        // itself is still coherent.
        self.value.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<(u64, Callback<T>)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Default> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Observable").field(&self.get()).finish()
    }
}

/// Handle keeping a subscription alive; dropping it unsubscribes.
pub struct Subscription {
    unsubscribe: Box<dyn FnOnce() + Send>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let unsubscribe = std::mem::replace(&mut self.unsubscribe, Box::new(|| {}));
        unsubscribe();
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn collector() -> (Arc<Mutex<Vec<i32>>>, impl Fn(&i32) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |value: &i32| sink.lock().expect("lock").push(*value))
    }

    #[test]
    fn subscriber_sees_current_value_then_changes() {
        let observable = Observable::new(1);
        let (seen, callback) = collector();
        let _sub = observable.subscribe(callback);
        observable.set(2);
        observable.set(3);
        assert_eq!(vec![1, 2, 3], *seen.lock().expect("lock"));
    }

    #[test]
    fn latest_value_is_retrievable_after_rapid_sets() {
        let observable = Observable::new(0);
        for i in 1..=100 {
            observable.set(i);
        }
        assert_eq!(100, observable.get());
        let (seen, callback) = collector();
        let _sub = observable.subscribe(callback);
        assert_eq!(vec![100], *seen.lock().expect("lock"));
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let observable = Observable::new(0);
        let (seen, callback) = collector();
        let sub = observable.subscribe(callback);
        observable.set(1);
        drop(sub);
        observable.set(2);
        assert_eq!(vec![0, 1], *seen.lock().expect("lock"));
    }

    #[test]
    fn update_notifies_once_with_final_value() {
        let observable = Observable::new(vec![1]);
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let _sub = observable.subscribe(move |_| {
            *counter.lock().expect("lock") += 1;
        });
        observable.update(|v| {
            v.push(2);
            v.push(3);
        });
        assert_eq!(vec![1, 2, 3], observable.get());
        // One call from subscribe, one from update.
        assert_eq!(2, *calls.lock().expect("lock"));
    }

    #[test]
    fn subscriptions_can_be_created_and_held_across_threads() {
        let observable = Observable::new(0);
        let (seen, callback) = collector();
        let remote = observable.clone();
        let sub = std::thread::spawn(move || remote.subscribe(callback))
            .join()
            .expect("join");
        observable.set(7);
        assert_eq!(vec![0, 7], *seen.lock().expect("lock"));
        drop(sub);
    }

    #[test]
    fn independent_observables_do_not_interfere() {
        let a = Observable::new(1);
        let b = a.clone();
        b.set(5);
        assert_eq!(5, a.get());
    }
}

//! Subscriptions that follow the active handle.
//!
//! A [`Binding`] attaches a consumer sink to one stream of whatever handle
//! is currently active, through a [`Pipe`] of transformation stages. When
//! the active handle changes, the inner subscription against the previous
//! handle is torn down before one against the new handle is made, so a
//! binding never holds two inner subscriptions at once. While no handle is
//! active the binding is idle.
//!
//! Pipe state (a `scan` accumulator) belongs to the binding, not to the
//! handle: it survives reconnects.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::connection::ActiveHandle;
use crate::schema::{Message, MessageKind};
use crate::service::ServiceHandle;
use crate::stream::{Stream, Subscription};

type Stage<T, U> = Box<dyn FnMut(&T) -> Option<U> + Send>;

/// Chain of transformation stages from stream values `T` to sink values `U`.
///
/// Built from [`Pipe::identity`] and extended with [`map`](Pipe::map),
/// [`filter`](Pipe::filter), [`filter_map`](Pipe::filter_map) and
/// [`scan`](Pipe::scan).
pub struct Pipe<T, U> {
    stage: Stage<T, U>,
}

impl<T, U> std::fmt::Debug for Pipe<T, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe").finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Pipe<T, T> {
    /// Pass values through unchanged.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            stage: Box::new(|v: &T| Some(v.clone())),
        }
    }
}

impl<T: 'static, U: 'static> Pipe<T, U> {
    /// Transform every value.
    #[must_use]
    pub fn map<V, F>(self, mut f: F) -> Pipe<T, V>
    where
        F: FnMut(U) -> V + Send + 'static,
    {
        let mut stage = self.stage;
        Pipe {
            stage: Box::new(move |v: &T| stage(v).map(&mut f)),
        }
    }

    /// Drop values failing `predicate`.
    #[must_use]
    pub fn filter<F>(self, mut predicate: F) -> Self
    where
        F: FnMut(&U) -> bool + Send + 'static,
    {
        let mut stage = self.stage;
        Pipe {
            stage: Box::new(move |v: &T| stage(v).filter(|u| predicate(u))),
        }
    }

    /// Transform and drop in one step.
    #[must_use]
    pub fn filter_map<V, F>(self, mut f: F) -> Pipe<T, V>
    where
        F: FnMut(U) -> Option<V> + Send + 'static,
    {
        let mut stage = self.stage;
        Pipe {
            stage: Box::new(move |v: &T| stage(v).and_then(&mut f)),
        }
    }

    /// Fold values into `state`, emitting what `f` returns for each one.
    #[must_use]
    pub fn scan<S, V, F>(self, mut state: S, mut f: F) -> Pipe<T, V>
    where
        S: Send + 'static,
        F: FnMut(&mut S, U) -> V + Send + 'static,
    {
        let mut stage = self.stage;
        Pipe {
            stage: Box::new(move |v: &T| stage(v).map(|u| f(&mut state, u))),
        }
    }

    fn apply(&mut self, value: &T) -> Option<U> {
        (self.stage)(value)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pipe and sink of one binding, shared by every inner subscription it
/// makes. `None` once the binding is torn down.
struct Delivery<T, U, F> {
    slot: Mutex<Option<(Pipe<T, U>, F)>>,
}

impl<T: 'static, U: 'static, F: FnMut(U)> Delivery<T, U, F> {
    fn new(pipe: Pipe<T, U>, sink: F) -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Some((pipe, sink))),
        })
    }

    fn deliver(&self, value: &T) {
        let mut guard = lock(&self.slot);
        if let Some((pipe, sink)) = guard.as_mut() {
            if let Some(out) = pipe.apply(value) {
                sink(out);
            }
        }
    }
}

/// Type-erased teardown of a [`Delivery`].
trait Close: Send + Sync {
    fn close(&self);
    fn is_closed(&self) -> bool;
}

impl<T, U, F: Send> Close for Delivery<T, U, F> {
    fn close(&self) {
        // Waits for a delivery in progress; the sink is dropped unlocked.
        let taken = lock(&self.slot).take();
        drop(taken);
    }

    fn is_closed(&self) -> bool {
        lock(&self.slot).is_none()
    }
}

/// A live binding. Dropping it stops all delivery.
///
/// Once teardown returns no value reaches the sink, even when the active
/// handle is being switched on another thread at the same moment.
#[must_use = "dropping a Binding unbinds immediately"]
pub struct Binding {
    outer: Option<Subscription>,
    inner: Arc<Mutex<Option<Subscription>>>,
    delivery: Arc<dyn Close>,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("bound", &self.is_bound())
            .finish()
    }
}

impl Binding {
    /// Whether an inner subscription to a handle's stream exists right now.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        lock(&self.inner).is_some()
    }

    /// Tear down now. Equivalent to dropping the binding.
    pub fn unbind(self) {
        drop(self);
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        // Outer first so no new inner subscription can be made, then close
        // the delivery before clearing the slot: a handle switch already
        // running elsewhere either sees the close or leaves its
        // subscription in the slot for us to take.
        drop(self.outer.take());
        self.delivery.close();
        let inner = lock(&self.inner).take();
        drop(inner);
    }
}

/// Re-run `subscribe` against every handle `active` publishes, keeping at
/// most one resulting subscription alive.
fn follow<S>(active: &ActiveHandle, delivery: Arc<dyn Close>, mut subscribe: S) -> Binding
where
    S: FnMut(&ServiceHandle) -> Subscription + Send + 'static,
{
    let inner: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

    let slot = Arc::clone(&inner);
    let closed = Arc::clone(&delivery);
    let outer = active.subscribe(move |handle: &Option<ServiceHandle>| {
        let previous = lock(&slot).take();
        drop(previous);

        let Some(handle) = handle else {
            log::trace!("[Binding] No active handle, idle");
            return;
        };
        let subscription = subscribe(handle);

        let mut guard = lock(&slot);
        if closed.is_closed() {
            drop(guard);
            drop(subscription);
            return;
        }
        *guard = Some(subscription);
    });

    Binding {
        outer: Some(outer),
        inner,
        delivery,
    }
}

/// Bind `sink` to the stream `selector` picks from the active handle.
///
/// Values flow through `pipe` before reaching `sink`. Latest-value and
/// history streams replay into the sink on every (re)bind, as they would
/// for any new subscriber.
pub fn bind<T, U, Sel, F>(active: &ActiveHandle, selector: Sel, pipe: Pipe<T, U>, sink: F) -> Binding
where
    T: Clone + Send + 'static,
    U: 'static,
    Sel: Fn(&ServiceHandle) -> &Stream<T> + Send + 'static,
    F: FnMut(U) + Send + 'static,
{
    let delivery = Delivery::new(pipe, sink);
    let target = Arc::clone(&delivery);
    follow(active, delivery, move |handle| {
        let target = Arc::clone(&target);
        selector(handle).subscribe(move |value: &T| target.deliver(value))
    })
}

/// Like [`bind`], but selects the stream by [`MessageKind`] and delivers
/// values wrapped as [`Message`]s.
pub fn bind_kind<U, F>(active: &ActiveHandle, kind: MessageKind, pipe: Pipe<Message, U>, sink: F) -> Binding
where
    U: 'static,
    F: FnMut(U) + Send + 'static,
{
    let delivery = Delivery::new(pipe, sink);
    let target = Arc::clone(&delivery);
    follow(active, delivery, move |handle| {
        let target = Arc::clone(&target);
        handle.subscribe_kind(kind, move |message| target.deliver(&message))
    })
}

//! Multicast streams with explicit delivery disciplines.
//!
//! A [`StreamSource`] is the write side of a stream and is owned by whoever
//! produces values (the router, or a mock). Any number of read-only
//! [`Stream`] views can be cloned from it and handed to consumers.
//!
//! # Disciplines
//!
//! | Discipline | New subscriber receives | Retained |
//! |---|---|---|
//! | [`Discipline::Latest`] | the most recent value, if any | one value |
//! | [`Discipline::Event`] | nothing from the past | nothing |
//! | [`Discipline::History`] | up to N past values, oldest first | last N |
//!
//! # Delivery
//!
//! Emissions and subscription replays on one stream are serialized by a
//! dispatch lock, so every observer sees values of that stream in emission
//! order and a replay never interleaves with a live value. Sinks run with
//! the state lock released: a sink may drop its own [`Subscription`].
//! A sink must not emit on, or subscribe to, the stream that is calling it.
//!
//! Teardown flips the observer's `active` flag before detaching it. Every
//! delivery checks the flag under the observer's sink lock, so nothing
//! reaches a sink after its subscription is gone, including a value that
//! was already being fanned out to other observers.

// Rust guideline compliant 2026-02

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// How a stream treats values emitted before a subscriber arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discipline {
    /// Replay the most recent value, then every later one.
    Latest,
    /// Only values emitted after subscribing.
    Event,
    /// Replay up to this many past values (oldest first), then every later one.
    History(usize),
}

/// Lock a mutex, recovering the data if a sink panicked while holding it.
fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Sink<T> = Box<dyn FnMut(&T) + Send>;

struct Observer<T> {
    id: u64,
    active: Arc<AtomicBool>,
    sink: Mutex<Sink<T>>,
}

impl<T> Observer<T> {
    fn deliver(&self, value: &T) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        let mut sink = lock(&self.sink);
        if self.active.load(Ordering::Acquire) {
            (sink)(value);
        }
    }
}

struct State<T> {
    retained: VecDeque<T>,
    observers: Vec<Arc<Observer<T>>>,
    next_id: u64,
}

struct Shared<T> {
    discipline: Discipline,
    dispatch: Mutex<()>,
    state: Mutex<State<T>>,
}

impl<T> Shared<T> {
    fn new(discipline: Discipline, retained: VecDeque<T>) -> Arc<Self> {
        Arc::new(Self {
            discipline,
            dispatch: Mutex::new(()),
            state: Mutex::new(State {
                retained,
                observers: Vec::new(),
                next_id: 0,
            }),
        })
    }
}

/// Type-erased detach hook so a [`Subscription`] does not carry `T`.
trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<T: Send> Detach for Shared<T> {
    fn detach(&self, id: u64) {
        lock(&self.state).observers.retain(|o| o.id != id);
    }
}

/// Write side of a stream.
///
/// Not cloneable: exactly one producer owns it. Dropping the source does
/// not affect existing subscribers; they simply never receive another value.
pub struct StreamSource<T> {
    shared: Arc<Shared<T>>,
}

impl<T> std::fmt::Debug for StreamSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSource")
            .field("discipline", &self.shared.discipline)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> StreamSource<T> {
    /// Create a source with the given discipline and nothing retained.
    #[must_use]
    pub fn new(discipline: Discipline) -> Self {
        Self {
            shared: Shared::new(discipline, VecDeque::new()),
        }
    }

    /// Latest-value source.
    #[must_use]
    pub fn latest() -> Self {
        Self::new(Discipline::Latest)
    }

    /// Event source.
    #[must_use]
    pub fn event() -> Self {
        Self::new(Discipline::Event)
    }

    /// Bounded-history source retaining `len` values.
    #[must_use]
    pub fn history(len: usize) -> Self {
        Self::new(Discipline::History(len))
    }

    /// Read-only view for consumers.
    #[must_use]
    pub fn stream(&self) -> Stream<T> {
        Stream {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Publish a value to every active subscriber, retaining it as the
    /// discipline requires.
    pub fn emit(&self, value: T) {
        let _dispatch = lock(&self.shared.dispatch);
        let observers = {
            let mut state = lock(&self.shared.state);
            match self.shared.discipline {
                Discipline::Latest => {
                    state.retained.clear();
                    state.retained.push_back(value.clone());
                }
                Discipline::Event => {}
                Discipline::History(len) => {
                    state.retained.push_back(value.clone());
                    while state.retained.len() > len {
                        state.retained.pop_front();
                    }
                }
            }
            state.observers.clone()
        };
        for observer in &observers {
            observer.deliver(&value);
        }
    }
}

/// Read-only view of a stream. Cheap to clone.
pub struct Stream<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("discipline", &self.shared.discipline)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> Stream<T> {
    /// A stream that replays `value` to every subscriber and never emits
    /// again. Used for canned mock values.
    #[must_use]
    pub fn constant(value: T) -> Self {
        Self {
            shared: Shared::new(Discipline::Latest, VecDeque::from([value])),
        }
    }

    /// Delivery discipline of this stream.
    #[must_use]
    pub fn discipline(&self) -> Discipline {
        self.shared.discipline
    }

    /// Most recently retained value, `None` if nothing was emitted yet or
    /// the stream retains nothing.
    #[must_use]
    pub fn latest(&self) -> Option<T> {
        lock(&self.shared.state).retained.back().cloned()
    }

    /// All retained values, oldest first.
    #[must_use]
    pub fn retained(&self) -> Vec<T> {
        lock(&self.shared.state).retained.iter().cloned().collect()
    }

    /// Number of live observers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.shared.state).observers.len()
    }

    /// Register `sink`, replaying retained values to it first.
    ///
    /// Delivery stops when the returned [`Subscription`] is dropped or
    /// [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(&self, sink: F) -> Subscription
    where
        F: FnMut(&T) + Send + 'static,
    {
        let _dispatch = lock(&self.shared.dispatch);
        let active = Arc::new(AtomicBool::new(true));
        let (observer, replay) = {
            let mut state = lock(&self.shared.state);
            let observer = Arc::new(Observer {
                id: state.next_id,
                active: Arc::clone(&active),
                sink: Mutex::new(Box::new(sink)),
            });
            state.next_id += 1;
            state.observers.push(Arc::clone(&observer));
            let replay: Vec<T> = state.retained.iter().cloned().collect();
            (observer, replay)
        };
        for value in &replay {
            observer.deliver(value);
        }

        let shared: Arc<dyn Detach> = Arc::clone(&self.shared) as Arc<dyn Detach>;
        Subscription {
            id: observer.id,
            active,
            stream: Arc::downgrade(&shared),
        }
    }
}

/// Live registration of a sink on a stream.
///
/// Dropping it tears the registration down.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    active: Arc<AtomicBool>,
    stream: Weak<dyn Detach>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Subscription {
    /// Whether the sink can still receive values.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stop delivery now. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(stream) = self.stream.upgrade() {
            stream.detach(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl FnMut(&T) + Send) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink_seen = Arc::clone(&seen);
        (seen, move |v: &T| sink_seen.lock().unwrap().push(v.clone()))
    }

    #[test]
    fn test_latest_replays_last_value_then_follows() {
        let source = StreamSource::latest();
        source.emit(1);
        source.emit(2);
        source.emit(3);

        let (seen, sink) = recorder::<i32>();
        let _sub = source.stream().subscribe(sink);
        assert_eq!(*seen.lock().unwrap(), vec![3]);

        source.emit(4);
        source.emit(5);
        assert_eq!(*seen.lock().unwrap(), vec![3, 4, 5]);
    }

    #[test]
    fn test_latest_before_first_emission_yields_nothing() {
        let source = StreamSource::<i32>::latest();
        let (seen, sink) = recorder::<i32>();
        let _sub = source.stream().subscribe(sink);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(source.stream().latest(), None);

        source.emit(7);
        assert_eq!(*seen.lock().unwrap(), vec![7]);
        assert_eq!(source.stream().latest(), Some(7));
    }

    #[test]
    fn test_event_does_not_replay() {
        let source = StreamSource::event();
        source.emit("early");

        let (seen, sink) = recorder::<&str>();
        let _sub = source.stream().subscribe(sink);
        assert!(seen.lock().unwrap().is_empty());

        source.emit("late");
        assert_eq!(*seen.lock().unwrap(), vec!["late"]);
        assert_eq!(source.stream().latest(), None);
    }

    #[test]
    fn test_history_replays_bounded_window_oldest_first() {
        let source = StreamSource::history(25);
        for i in 0..30 {
            source.emit(i);
        }

        let (seen, sink) = recorder::<i32>();
        let _sub = source.stream().subscribe(sink);
        let expected: Vec<i32> = (5..30).collect();
        assert_eq!(*seen.lock().unwrap(), expected);
    }

    #[test]
    fn test_history_with_fewer_values_than_capacity() {
        let source = StreamSource::history(25);
        source.emit(1);
        source.emit(2);

        let (seen, sink) = recorder::<i32>();
        let _sub = source.stream().subscribe(sink);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_drop_subscription_stops_delivery() {
        let source = StreamSource::event();
        let stream = source.stream();
        let (seen, sink) = recorder::<i32>();
        let sub = stream.subscribe(sink);
        source.emit(1);
        assert_eq!(stream.subscriber_count(), 1);

        sub.unsubscribe();
        assert_eq!(stream.subscriber_count(), 0);
        source.emit(2);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }

    #[test]
    fn test_sink_can_tear_itself_down() {
        let source = StreamSource::event();
        let stream = source.stream();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let count = Arc::new(Mutex::new(0));

        let sink_slot = Arc::clone(&slot);
        let sink_count = Arc::clone(&count);
        let sub = stream.subscribe(move |_: &i32| {
            *sink_count.lock().unwrap() += 1;
            sink_slot.lock().unwrap().take();
        });
        *slot.lock().unwrap() = Some(sub);

        source.emit(1);
        source.emit(2);
        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[test]
    fn test_teardown_during_fan_out_skips_pending_delivery() {
        // First observer drops the second one mid-emission; the second must
        // not see the value that was already being fanned out.
        let source = StreamSource::event();
        let stream = source.stream();
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let killer_victim = Arc::clone(&victim);
        let _killer = stream.subscribe(move |_: &i32| {
            killer_victim.lock().unwrap().take();
        });
        let (seen, sink) = recorder::<i32>();
        *victim.lock().unwrap() = Some(stream.subscribe(sink));

        source.emit(1);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_constant_replays_to_every_subscriber() {
        let stream = Stream::constant(42);
        let (a, sink_a) = recorder::<i32>();
        let (b, sink_b) = recorder::<i32>();
        let _sa = stream.subscribe(sink_a);
        let _sb = stream.subscribe(sink_b);
        assert_eq!(*a.lock().unwrap(), vec![42]);
        assert_eq!(*b.lock().unwrap(), vec![42]);
    }

    #[test]
    fn test_subscription_outlives_source() {
        let source = StreamSource::latest();
        let stream = source.stream();
        source.emit(1);
        let (seen, sink) = recorder::<i32>();
        let sub = stream.subscribe(sink);
        drop(source);
        assert!(sub.is_active());
        drop(sub);
        assert_eq!(*seen.lock().unwrap(), vec![1]);
    }
}

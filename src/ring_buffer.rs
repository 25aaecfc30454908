use crate::error::{Full, Role};
use crate::sync::{Arc, AtomicBool, AtomicUsize, Ordering, UnsafeCell};
use crate::trace::{debug, trace};
use crate::wait::{Timeout, WaitStrategy};
use crossbeam_utils::CachePadded;
use std::cell::Cell;
use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::ptr;

/// Number of usable slots of a [`RingBuffer::default`] buffer.
pub const DEFAULT_CAPACITY: usize = 256;

/// Marker type to opt-out of `Sync` while remaining `Send`.
type PhantomUnsync = PhantomData<Cell<&'static ()>>;

/// Storage and indices shared by the buffer and both of its ends.
///
/// # Layout
///
/// `slots` has `capacity + 1` entries. One slot is never written so that the
/// two index states stay distinguishable:
///
/// ```text
/// empty:  read_index == write_index
/// full:   (write_index + 1) % slots.len() == read_index
/// ```
///
/// # Ownership of slots
///
/// A slot holds an initialized `T` exactly when it lies in the ring range
/// `[read_index, write_index)`. The producer only writes the slot at
/// `write_index` (outside that range) and then publishes it with a
/// `Release` store of `write_index`; the consumer only reads the slot at
/// `read_index` (inside that range) and then hands it back with a `Release`
/// store of `read_index`. Each side `Acquire`-loads the other side's index
/// before touching a slot, so every slot access happens-after the access
/// that handed it over.
///
/// # Single writer per index
///
/// `write_index` is stored only by the producer end and `read_index` only by
/// the consumer end. At most one end of each kind exists at any time (see
/// the acquisition flags), which is what makes the protocol lock-free.
struct Shared<T> {
    /// Next slot to be written. Owned by the producer, read by the consumer.
    write_index: CachePadded<AtomicUsize>,

    /// Next slot to be read. Owned by the consumer, read by the producer.
    read_index: CachePadded<AtomicUsize>,

    producer_acquired: AtomicBool,
    consumer_acquired: AtomicBool,

    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// SAFETY: values of `T` are moved from the producer's thread to the
// consumer's thread, hence `T: Send`. Concurrent access to the slots is
// mediated by the Release/Acquire protocol on the two indices described
// above, and at most one end per role can exist.
unsafe impl<T: Send> Send for Shared<T> {}
unsafe impl<T: Send> Sync for Shared<T> {}

impl<T> Shared<T> {
    fn new(capacity: usize) -> Self {
        assert!(capacity < usize::MAX, "ring buffer capacity is too large");
        let slots = (0..capacity + 1)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();
        Self {
            write_index: CachePadded::new(AtomicUsize::new(0)),
            read_index: CachePadded::new(AtomicUsize::new(0)),
            producer_acquired: AtomicBool::new(false),
            consumer_acquired: AtomicBool::new(false),
            slots,
        }
    }

    #[inline(always)]
    fn capacity(&self) -> usize {
        self.slots.len() - 1
    }

    /// Returns `(index + 1) % slots.len()` without a division.
    #[inline(always)]
    fn next(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.slots.len() { 0 } else { next }
    }

    #[inline(always)]
    fn flag(&self, role: Role) -> &AtomicBool {
        match role {
            Role::Producer => &self.producer_acquired,
            Role::Consumer => &self.consumer_acquired,
        }
    }

    /// Transitions the role's flag from unacquired to acquired.
    ///
    /// Returns `false`, without side effects, if the role is already held.
    fn claim(&self, role: Role) -> bool {
        let claimed = self
            .flag(role)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if claimed {
            debug!(%role, capacity = self.capacity(), "acquired ring buffer end");
        } else {
            debug!(%role, "ring buffer end is already acquired");
        }
        claimed
    }

    /// Resets the role's flag when its end is dropped.
    ///
    /// The `Release` store pairs with the `AcqRel` exchange in [`claim`]: a
    /// later owner of the role, possibly on another thread, observes every
    /// index store the dropped end made.
    ///
    /// [`claim`]: Shared::claim
    fn release(&self, role: Role) {
        self.flag(role).store(false, Ordering::Release);
        debug!(%role, "released ring buffer end");
    }
}

impl<T> Drop for Shared<T> {
    /// Drops the values that were enqueued but never dequeued.
    fn drop(&mut self) {
        // `&mut self`: both ends are gone and `Arc` has synchronized with
        // their last accesses, so relaxed loads see the final indices.
        let write = self.write_index.load(Ordering::Relaxed);
        let mut read = self.read_index.load(Ordering::Relaxed);
        while read != write {
            // SAFETY: slots in `[read, write)` hold initialized values that
            // nobody else can reach any more.
            self.slots[read].with_mut(|slot| unsafe { (*slot).assume_init_drop() });
            read = self.next(read);
        }
    }
}

/// A fixed-capacity, lock-free, single-producer single-consumer ring buffer.
///
/// The buffer is a factory for its two ends: [`Producer`], which may only
/// enqueue, and [`Consumer`], which may only dequeue. Each end can be held by
/// at most one owner at a time; asking for an end that is already held
/// returns `None`. Dropping an end makes it available again.
///
/// Storage is reference counted and shared with the ends, so the ends may be
/// moved to other threads and outlive the `RingBuffer` value itself.
///
/// # Example
///
/// ```
/// use spsc_ring::RingBuffer;
///
/// let ring = RingBuffer::<u64>::new(2);
/// let producer = ring.acquire_producer_end().unwrap();
/// let consumer = ring.acquire_consumer_end().unwrap();
/// assert!(ring.acquire_producer_end().is_none());
///
/// let worker = std::thread::spawn(move || {
///     for i in 1..=100 {
///         let mut value = i;
///         while let Err(full) = producer.enqueue(value) {
///             value = full.into_inner();
///             std::thread::yield_now();
///         }
///     }
/// });
///
/// for expected in 1..=100 {
///     let value = loop {
///         if let Some(value) = consumer.dequeue() {
///             break value;
///         }
///         std::thread::yield_now();
///     };
///     assert_eq!(value, expected);
/// }
/// worker.join().unwrap();
/// ```
pub struct RingBuffer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> RingBuffer<T> {
    /// Creates a ring buffer holding up to `capacity` values.
    ///
    /// Allocates `capacity + 1` slots; this is the only allocation the
    /// buffer ever makes. A capacity of `0` is accepted and yields a buffer
    /// that is always both full and empty.
    ///
    /// # Panics
    ///
    /// Panics if `capacity + 1` overflows or the allocation fails.
    pub fn new(capacity: usize) -> Self {
        trace!(capacity, "creating ring buffer");
        Self {
            shared: Arc::new(Shared::new(capacity)),
        }
    }

    /// Returns the number of values the buffer can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Claims the producer end.
    ///
    /// Returns `None` if a [`Producer`] for this buffer is currently alive.
    /// This is an expected outcome rather than an error; whether it indicates
    /// a bug is for the caller to decide.
    pub fn acquire_producer_end(&self) -> Option<Producer<T>> {
        self.shared.claim(Role::Producer).then(|| Producer {
            shared: Arc::clone(&self.shared),
            _unsync: PhantomData,
        })
    }

    /// Claims the consumer end.
    ///
    /// Returns `None` if a [`Consumer`] for this buffer is currently alive.
    pub fn acquire_consumer_end(&self) -> Option<Consumer<T>> {
        self.shared.claim(Role::Consumer).then(|| Consumer {
            shared: Arc::clone(&self.shared),
            _unsync: PhantomData,
        })
    }

    /// Returns `true` while a [`Producer`] is alive.
    ///
    /// The answer may be stale by the time it is used; it is meant for
    /// diagnostics, not for deciding whether an acquisition will succeed.
    pub fn is_producer_acquired(&self) -> bool {
        self.shared.producer_acquired.load(Ordering::Acquire)
    }

    /// Returns `true` while a [`Consumer`] is alive. See
    /// [`is_producer_acquired`](Self::is_producer_acquired).
    pub fn is_consumer_acquired(&self) -> bool {
        self.shared.consumer_acquired.load(Ordering::Acquire)
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<T> Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("producer_acquired", &self.is_producer_acquired())
            .field("consumer_acquired", &self.is_consumer_acquired())
            .finish()
    }
}

/// The write end of a [`RingBuffer`].
///
/// Only one `Producer` per buffer exists at a time. It is [`Send`] but
/// **not** [`Sync`]: it can be moved to the producing thread, but `&Producer`
/// cannot be shared, so two threads can never enqueue concurrently.
///
/// Dropping the producer releases the role; a new one can then be acquired.
pub struct Producer<T> {
    shared: Arc<Shared<T>>,
    _unsync: PhantomUnsync,
}

impl<T> Producer<T> {
    /// Attempts to enqueue `value` without waiting.
    ///
    /// Returns `Err(Full(value))` if the buffer is full, leaving the buffer
    /// untouched and handing the value back. The caller decides how to react
    /// (spin, yield, back off or give up); see [`enqueue_with`].
    ///
    /// # Ordering
    ///
    /// - `write_index` is loaded `Relaxed`: only this end ever stores it.
    /// - `read_index` is loaded `Acquire`: the slot about to be overwritten
    ///   must have been fully read by the consumer.
    /// - the new `write_index` is stored `Release` after the slot is written,
    ///   so the consumer sees the value before it sees the index.
    ///
    /// [`enqueue_with`]: Producer::enqueue_with
    #[inline]
    pub fn enqueue(&self, value: T) -> Result<(), Full<T>> {
        let shared = &*self.shared;
        let write = shared.write_index.load(Ordering::Relaxed);
        let read = shared.read_index.load(Ordering::Acquire);

        let next = shared.next(write);
        if next == read {
            return Err(Full(value));
        }

        // SAFETY: `write` is outside `[read, write)`, so the consumer does not
        // touch this slot until the store below publishes it. The slot holds
        // no live value: it was either never written or already moved out.
        shared.slots[write].with_mut(|slot| unsafe { ptr::write(slot, MaybeUninit::new(value)) });

        shared.write_index.store(next, Ordering::Release);
        Ok(())
    }

    /// Enqueues `value`, retrying with `strategy` while the buffer is full.
    ///
    /// Returns `Err(Full(value))` if the buffer is still full when `timeout`
    /// runs out. With [`Timeout::Infinite`] this only returns once the value
    /// is in the buffer.
    pub fn enqueue_with<W: WaitStrategy>(
        &self,
        mut value: T,
        strategy: &mut W,
        timeout: Timeout,
    ) -> Result<(), Full<T>> {
        let deadline = timeout.deadline();
        strategy.reset();
        loop {
            match self.enqueue(value) {
                Ok(()) => return Ok(()),
                Err(Full(returned)) => {
                    value = returned;
                    if Timeout::expired(deadline) {
                        debug!(role = %Role::Producer, ?timeout, "enqueue timed out");
                        return Err(Full(value));
                    }
                    strategy.wait();
                }
            }
        }
    }

    /// Returns the number of values the buffer can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        self.shared.release(Role::Producer);
    }
}

impl<T> Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

/// The read end of a [`RingBuffer`].
///
/// Only one `Consumer` per buffer exists at a time. Like [`Producer`] it is
/// [`Send`] but not [`Sync`].
pub struct Consumer<T> {
    shared: Arc<Shared<T>>,
    _unsync: PhantomUnsync,
}

impl<T> Consumer<T> {
    /// Attempts to dequeue the oldest value without waiting.
    ///
    /// Returns `None` if the buffer is empty. Emptiness is a routine state,
    /// not an error; see [`dequeue_with`] for a retrying variant.
    ///
    /// # Ordering
    ///
    /// - `read_index` is loaded `Relaxed`: only this end ever stores it.
    /// - `write_index` is loaded `Acquire`, pairing with the producer's
    ///   `Release` publish so the slot's value is visible.
    /// - the new `read_index` is stored `Release` after the value is moved
    ///   out, so the producer can only reuse the slot afterwards.
    ///
    /// [`dequeue_with`]: Consumer::dequeue_with
    #[inline]
    pub fn dequeue(&self) -> Option<T> {
        let shared = &*self.shared;
        let read = shared.read_index.load(Ordering::Relaxed);
        let write = shared.write_index.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        // SAFETY: `read` is inside `[read, write)`, so the slot was initialized
        // by the producer and published by the `Acquire` load above. The
        // producer does not reuse it until `read_index` moves past it.
        let value = shared.slots[read].with(|slot| unsafe { ptr::read(slot).assume_init() });

        shared.read_index.store(shared.next(read), Ordering::Release);
        Some(value)
    }

    /// Dequeues a value, retrying with `strategy` while the buffer is empty.
    ///
    /// Returns `None` if nothing arrived before `timeout` ran out.
    pub fn dequeue_with<W: WaitStrategy>(&self, strategy: &mut W, timeout: Timeout) -> Option<T> {
        let deadline = timeout.deadline();
        strategy.reset();
        loop {
            if let Some(value) = self.dequeue() {
                return Some(value);
            }
            if Timeout::expired(deadline) {
                debug!(role = %Role::Consumer, ?timeout, "dequeue timed out");
                return None;
            }
            strategy.wait();
        }
    }

    /// Returns the number of values the buffer can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        self.shared.release(Role::Consumer);
    }
}

impl<T> Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

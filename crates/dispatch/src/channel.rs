use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_queue::ArrayQueue;

use crate::signal::Signal;

/// Identifier of a transaction slot inside a [`TransactionChannel`].
///
/// A slot id lives in exactly one place at a time: the free pool, the data
/// ring, or a holder awaiting reclaim after completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(usize);

/// Fixed-capacity, lock-free MPMC queue with an embedded transaction-slot
/// pool of the same bound.
///
/// The data path (alloc/push/pop/dealloc) never takes a lock; blocking
/// variants sleep on a generation-counted signal instead of spinning.
/// Payloads travel by value through the ring, so the pool itself is just
/// per-slot completion flags plus the capacity bound — no per-item heap
/// allocation happens after construction.
///
/// `abort` unblocks every blocked caller and is idempotent.
pub struct TransactionChannel<T> {
    /// Per-slot completion flags, set by consumers, read during reclaim.
    completed: Box<[AtomicBool]>,
    /// Free slot ids.
    free: ArrayQueue<usize>,
    /// In-flight transactions.
    data: ArrayQueue<(usize, T)>,
    aborted: AtomicBool,
    /// Woken on push and abort; blocked `pop` callers sleep here.
    data_signal: Signal,
    /// Woken on pop, dealloc and abort; blocked `alloc`/`push` callers
    /// sleep here.
    free_signal: Signal,
}

impl<T: Send> TransactionChannel<T> {
    /// Create a channel with `capacity` transaction slots.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "channel capacity must be non-zero");

        let free = ArrayQueue::new(capacity);
        for idx in 0..capacity {
            free.push(idx).expect("fresh free ring cannot be full");
        }

        Self {
            completed: (0..capacity).map(|_| AtomicBool::new(false)).collect(),
            free,
            data: ArrayQueue::new(capacity),
            aborted: AtomicBool::new(false),
            data_signal: Signal::new(),
            free_signal: Signal::new(),
        }
    }

    /// Take a free slot from the pool. Non-blocking mode returns None when
    /// the pool is exhausted; blocking mode waits for a dealloc or abort.
    pub fn alloc(&self, block: bool) -> Option<SlotId> {
        loop {
            if self.is_aborted() {
                return None;
            }
            let seen = self.free_signal.generation();
            if let Some(idx) = self.free.pop() {
                self.completed[idx].store(false, Ordering::Release);
                return Some(SlotId(idx));
            }
            if !block {
                return None;
            }
            self.free_signal.wait(seen);
        }
    }

    /// Enqueue a filled transaction and wake a consumer.
    ///
    /// Under the slot-lifecycle invariant the ring always has room for an
    /// allocated slot; the failure path exists for contract completeness and
    /// hands the slot and payload back to the caller.
    pub fn push(&self, slot: SlotId, value: T, block: bool) -> Result<(), (SlotId, T)> {
        let mut item = (slot.0, value);
        loop {
            if self.is_aborted() {
                return Err((SlotId(item.0), item.1));
            }
            let seen = self.free_signal.generation();
            match self.data.push(item) {
                Ok(()) => {
                    self.data_signal.notify_all();
                    return Ok(());
                }
                Err(back) => {
                    if !block {
                        return Err((SlotId(back.0), back.1));
                    }
                    item = back;
                    self.free_signal.wait(seen);
                }
            }
        }
    }

    /// Dequeue the next transaction. Non-blocking mode returns None when
    /// empty; blocking mode waits for data or abort (abort wins: a blocked
    /// or re-entering consumer observes the abort before remaining data).
    pub fn pop(&self, block: bool) -> Option<(SlotId, T)> {
        loop {
            if self.is_aborted() {
                return None;
            }
            let seen = self.data_signal.generation();
            if let Some((idx, value)) = self.data.pop() {
                self.free_signal.notify_all();
                return Some((SlotId(idx), value));
            }
            if !block {
                return None;
            }
            self.data_signal.wait(seen);
        }
    }

    /// Mark a transaction as executed. The holder of the slot id on the
    /// reclaim side observes this via [`TransactionChannel::is_completed`].
    pub fn set_completed(&self, slot: SlotId) {
        self.completed[slot.0].store(true, Ordering::Release);
    }

    pub fn is_completed(&self, slot: SlotId) -> bool {
        self.completed[slot.0].load(Ordering::Acquire)
    }

    /// Return a slot to the free pool and wake a blocked alloc.
    pub fn dealloc(&self, slot: SlotId) {
        self.free
            .push(slot.0)
            .expect("slot returned to free ring twice");
        self.free_signal.notify_all();
    }

    /// Unblock every blocked caller. Idempotent — safe to call repeatedly.
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
        self.data_signal.notify_all();
        self.free_signal.notify_all();
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of in-flight transactions.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn capacity(&self) -> usize {
        self.completed.len()
    }
}

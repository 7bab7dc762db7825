// kgsp-actors: L2 mailboxes and routing
// Four SPSC priority rings per mailbox, a dead-letter ring, and
// advisory backpressure

use crate::message::Message;
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("invalid argument on routing entry point")]
    InvalidArgument,
    #[error("target ring full")]
    QueueFull,
    #[error("message exhausted delivery attempts and was dead-lettered")]
    DeadLettered,
}

/// Priority levels per mailbox. 0 is highest.
pub const PRIORITY_LEVELS: usize = 4;

/// Default per-priority ring capacities (power of two each).
pub const DEFAULT_RING_CAPACITIES: [usize; PRIORITY_LEVELS] = [256, 128, 64, 32];

pub const DEFAULT_DEAD_LETTER_CAPACITY: usize = 128;

pub const DEFAULT_BACKPRESSURE_FRACTION: f64 = 0.9;

/// Single-producer single-consumer ring over `Message` slots.
///
/// One slot stays empty to distinguish full from empty, so a ring of
/// capacity C holds at most C - 1 messages. Producer side touches only
/// `tail`, consumer side only `head`; the release store on each index
/// publishes the slot contents to the other side.
pub struct Ring {
    slots: Box<[UnsafeCell<Message>]>,
    mask: usize,
    head: CachePadded<AtomicUsize>,
    tail: CachePadded<AtomicUsize>,
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    dropped: AtomicU64,
}

// SAFETY: the SPSC contract (one producer thread, one consumer thread)
// plus acquire/release ordering on head and tail makes slot access
// race-free; slots are only read after the index store that published
// them.
unsafe impl Sync for Ring {}
unsafe impl Send for Ring {}

impl Ring {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(2);
        Self {
            slots: std::iter::repeat_with(|| UnsafeCell::new(Message::default()))
                .take(capacity)
                .collect::<Vec<_>>()
                .into_boxed_slice(),
            mask: capacity - 1,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            enqueued: AtomicU64::new(0),
            dequeued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Messages currently queued.
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head) & self.mask
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Producer-side push. `QueueFull` leaves the ring untouched apart
    /// from the dropped counter.
    #[inline]
    pub fn try_push(&self, message: Message) -> Result<(), RouteError> {
        let tail = self.tail.load(Ordering::Relaxed);
        let next = (tail + 1) & self.mask;
        let head = self.head.load(Ordering::Acquire);
        if next == head {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(RouteError::QueueFull);
        }
        // SAFETY: SPSC — only this producer writes slots, and `tail`
        // has not been published yet, so the consumer cannot read this
        // slot until the release store below.
        unsafe {
            *self.slots[tail].get() = message;
        }
        self.tail.store(next, Ordering::Release);
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Consumer-side pop.
    #[inline]
    pub fn try_pop(&self) -> Option<Message> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        // SAFETY: SPSC — the acquire load of `tail` ordered this slot's
        // contents before us, and the producer will not reuse it until
        // `head` advances below.
        let message = unsafe { *self.slots[head].get() };
        self.head.store((head + 1) & self.mask, Ordering::Release);
        self.dequeued.fetch_add(1, Ordering::Relaxed);
        Some(message)
    }

    pub fn counters(&self) -> RingCounters {
        RingCounters {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of one ring's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingCounters {
    pub enqueued: u64,
    pub dequeued: u64,
    pub dropped: u64,
}

/// Mailbox configuration.
#[derive(Debug, Clone, Copy)]
pub struct MailboxConfig {
    pub ring_capacities: [usize; PRIORITY_LEVELS],
    pub dead_letter_capacity: usize,
    pub backpressure_fraction: f64,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            ring_capacities: DEFAULT_RING_CAPACITIES,
            dead_letter_capacity: DEFAULT_DEAD_LETTER_CAPACITY,
            backpressure_fraction: DEFAULT_BACKPRESSURE_FRACTION,
        }
    }
}

/// One actor mailbox: four priority rings plus a dead-letter ring.
pub struct Mailbox {
    rings: [Ring; PRIORITY_LEVELS],
    dead_letters: Ring,
    backpressure_threshold: usize,
}

impl Mailbox {
    pub fn new(config: &MailboxConfig) -> Self {
        let rings = [
            Ring::with_capacity(config.ring_capacities[0]),
            Ring::with_capacity(config.ring_capacities[1]),
            Ring::with_capacity(config.ring_capacities[2]),
            Ring::with_capacity(config.ring_capacities[3]),
        ];
        let total: usize = rings.iter().map(Ring::capacity).sum();
        let threshold = (total as f64 * config.backpressure_fraction) as usize;
        Self {
            rings,
            dead_letters: Ring::with_capacity(config.dead_letter_capacity),
            backpressure_threshold: threshold,
        }
    }

    /// Enqueue by the message's priority ring. The checksum is stamped
    /// before the slot store.
    pub fn enqueue(&self, mut message: Message) -> Result<(), RouteError> {
        let ring = &self.rings[(message.priority & 3) as usize];
        message.seal();
        ring.try_push(message)
    }

    /// Dequeue scanning priority 0 to 3. Expired messages divert to the
    /// dead-letter ring and the scan continues.
    pub fn dequeue(&self, now_ns: u64) -> Option<Message> {
        for ring in &self.rings {
            while let Some(message) = ring.try_pop() {
                if message.is_expired(now_ns) {
                    let _ = self.dead_letters.try_push(message);
                    continue;
                }
                return Some(message);
            }
        }
        None
    }

    /// Queued messages across all priority rings.
    pub fn len(&self) -> usize {
        self.rings.iter().map(Ring::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advisory: producers above this should pause.
    pub fn is_backpressured(&self) -> bool {
        self.len() >= self.backpressure_threshold
    }

    pub fn backpressure_threshold(&self) -> usize {
        self.backpressure_threshold
    }

    pub fn ring(&self, priority: u8) -> &Ring {
        &self.rings[(priority & 3) as usize]
    }

    pub fn dead_letters(&self) -> &Ring {
        &self.dead_letters
    }

    /// Per-ring depths, highest priority first.
    pub fn depths(&self) -> [usize; PRIORITY_LEVELS] {
        [
            self.rings[0].len(),
            self.rings[1].len(),
            self.rings[2].len(),
            self.rings[3].len(),
        ]
    }

    fn push_dead_letter(&self, message: Message) {
        let _ = self.dead_letters.try_push(message);
    }
}

/// Routes messages to mailboxes by target id.
pub struct Router {
    mailboxes: Vec<Mailbox>,
}

impl Router {
    pub fn new(mailbox_count: usize, config: &MailboxConfig) -> Self {
        let mailboxes = (0..mailbox_count.max(1)).map(|_| Mailbox::new(config)).collect();
        Self { mailboxes }
    }

    pub fn mailbox_count(&self) -> usize {
        self.mailboxes.len()
    }

    #[inline(always)]
    pub fn mailbox_id_for(&self, target: u32) -> u32 {
        target % self.mailboxes.len() as u32
    }

    pub fn mailbox(&self, id: u32) -> Option<&Mailbox> {
        self.mailboxes.get(id as usize)
    }

    /// Route one message. Each failed enqueue burns an attempt; when
    /// attempts are exhausted the message lands in the target
    /// mailbox's dead-letter ring.
    pub fn route(&self, mut message: Message) -> Result<(), RouteError> {
        let mailbox = &self.mailboxes[self.mailbox_id_for(message.target) as usize];
        message.attempts = message.attempts.saturating_add(1);
        match mailbox.enqueue(message) {
            Ok(()) => Ok(()),
            Err(RouteError::QueueFull) => {
                if message.attempts >= message.max_attempts {
                    mailbox.push_dead_letter(message);
                    tracing::warn!(
                        message_id = message.message_id,
                        target_actor = message.target,
                        attempts = message.attempts,
                        "message dead-lettered after repeated enqueue failure"
                    );
                    Err(RouteError::DeadLettered)
                } else {
                    Err(RouteError::QueueFull)
                }
            }
            Err(other) => Err(other),
        }
    }

    /// Dequeue from the mailbox owning `target`.
    pub fn dequeue_for(&self, target: u32, now_ns: u64) -> Option<Message> {
        self.mailboxes[self.mailbox_id_for(target) as usize].dequeue(now_ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;

    fn message(id: u64, target: u32, priority: u8) -> Message {
        Message::new(id, 1, target, MessageKind::Data, priority)
    }

    #[test]
    fn test_ring_fifo() {
        let ring = Ring::with_capacity(8);
        for i in 0..5 {
            ring.try_push(message(i, 0, 0)).unwrap();
        }
        for i in 0..5 {
            assert_eq!(ring.try_pop().unwrap().message_id, i);
        }
        assert!(ring.try_pop().is_none());
    }

    #[test]
    fn test_ring_capacity_is_one_less_than_size() {
        let ring = Ring::with_capacity(32);
        let mut accepted = 0;
        for i in 0..33 {
            if ring.try_push(message(i, 0, 3)).is_ok() {
                accepted += 1;
            }
        }
        // One slot distinguishes full from empty.
        assert_eq!(accepted, 31);
        let counters = ring.counters();
        assert_eq!(counters.enqueued, 31);
        assert_eq!(counters.dropped, 2);

        // Draining one frees a slot for one more.
        assert!(ring.try_pop().is_some());
        assert!(ring.try_push(message(99, 0, 3)).is_ok());
    }

    #[test]
    fn test_ring_counter_conservation() {
        let ring = Ring::with_capacity(8);
        for i in 0..20 {
            let _ = ring.try_push(message(i, 0, 0));
            if i % 3 == 0 {
                let _ = ring.try_pop();
            }
        }
        let c = ring.counters();
        assert_eq!(
            c.enqueued - c.dequeued,
            ring.len() as u64,
            "enqueued - dequeued must equal used"
        );
        assert!(ring.len() <= ring.capacity() - 1);
    }

    #[test]
    fn test_mailbox_priority_order() {
        let mailbox = Mailbox::new(&MailboxConfig::default());
        mailbox.enqueue(message(1, 0, 3)).unwrap();
        mailbox.enqueue(message(2, 0, 1)).unwrap();
        mailbox.enqueue(message(3, 0, 0)).unwrap();

        // Priority 0 drains before 1 before 3.
        assert_eq!(mailbox.dequeue(0).unwrap().message_id, 3);
        assert_eq!(mailbox.dequeue(0).unwrap().message_id, 2);
        assert_eq!(mailbox.dequeue(0).unwrap().message_id, 1);
    }

    #[test]
    fn test_mailbox_checksum_stamped() {
        let mailbox = Mailbox::new(&MailboxConfig::default());
        let mut msg = message(7, 0, 0);
        assert!(msg.set_payload(b"payload"));
        mailbox.enqueue(msg).unwrap();
        let out = mailbox.dequeue(0).unwrap();
        assert!(out.verify(), "checksum must survive the ring");
    }

    #[test]
    fn test_ttl_expiry_dead_letters() {
        let mailbox = Mailbox::new(&MailboxConfig::default());
        let expired = message(1, 0, 0).with_ttl(100, 50);
        let live = message(2, 0, 0);
        mailbox.enqueue(expired).unwrap();
        mailbox.enqueue(live).unwrap();

        let got = mailbox.dequeue(1_000).unwrap();
        assert_eq!(got.message_id, 2);
        assert_eq!(mailbox.dead_letters().counters().enqueued, 1);
    }

    #[test]
    fn test_backpressure_threshold() {
        let config = MailboxConfig {
            ring_capacities: [8, 8, 8, 8],
            ..MailboxConfig::default()
        };
        let mailbox = Mailbox::new(&config);
        assert_eq!(mailbox.backpressure_threshold(), 28); // 32 * 0.9
        assert!(!mailbox.is_backpressured());
        for i in 0..28 {
            mailbox.enqueue(message(i, 0, (i % 4) as u8)).unwrap();
        }
        assert!(mailbox.is_backpressured());
    }

    #[test]
    fn test_router_dead_letters_after_max_attempts() {
        let config = MailboxConfig {
            ring_capacities: [2, 2, 2, 2],
            ..MailboxConfig::default()
        };
        let router = Router::new(1, &config);

        // Fill priority-0 ring (capacity 2 holds 1 message).
        router.route(message(1, 0, 0)).unwrap();

        let mut stubborn = message(2, 0, 0);
        stubborn.max_attempts = 2;
        assert_eq!(router.route(stubborn), Err(RouteError::QueueFull));
        stubborn.attempts = 1;
        assert_eq!(router.route(stubborn), Err(RouteError::DeadLettered));
        let mailbox = router.mailbox(0).unwrap();
        assert_eq!(mailbox.dead_letters().counters().enqueued, 1);
    }

    #[test]
    fn test_router_target_partitioning() {
        let router = Router::new(4, &MailboxConfig::default());
        assert_eq!(router.mailbox_id_for(0), 0);
        assert_eq!(router.mailbox_id_for(5), 1);
        assert_eq!(router.mailbox_id_for(7), 3);

        router.route(message(1, 5, 0)).unwrap();
        assert_eq!(router.dequeue_for(5, 0).unwrap().message_id, 1);
        assert!(router.dequeue_for(0, 0).is_none());
    }

    proptest::proptest! {
        #[test]
        fn prop_ring_invariants_under_arbitrary_ops(
            ops in proptest::collection::vec(proptest::bool::ANY, 1..300)
        ) {
            let ring = Ring::with_capacity(16);
            let mut next_id = 0u64;
            let mut expected_front = 0u64;
            for push in ops {
                if push {
                    if ring.try_push(message(next_id, 0, 0)).is_ok() {
                        next_id += 1;
                    }
                } else if let Some(msg) = ring.try_pop() {
                    // FIFO within the ring.
                    proptest::prop_assert_eq!(msg.message_id, expected_front);
                    expected_front += 1;
                }
                let c = ring.counters();
                proptest::prop_assert_eq!(c.enqueued - c.dequeued, ring.len() as u64);
                proptest::prop_assert!(ring.len() <= ring.capacity() - 1);
            }
        }
    }

    #[test]
    fn test_spsc_cross_thread() {
        use std::sync::Arc;
        let ring = Arc::new(Ring::with_capacity(64));
        let producer_ring = Arc::clone(&ring);

        let producer = std::thread::spawn(move || {
            let mut sent = 0u64;
            let mut next = 0u64;
            while sent < 1000 {
                if producer_ring.try_push(message(next, 0, 0)).is_ok() {
                    sent += 1;
                    next += 1;
                }
            }
        });

        let mut received = Vec::with_capacity(1000);
        while received.len() < 1000 {
            if let Some(msg) = ring.try_pop() {
                received.push(msg.message_id);
            }
        }
        producer.join().expect("producer thread panicked");

        // FIFO across threads.
        let expected: Vec<u64> = (0..1000).collect();
        assert_eq!(received, expected);
    }
}

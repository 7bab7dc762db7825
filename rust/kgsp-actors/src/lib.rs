// kgsp-actors: The three-layer actor runtime
// L1 causal collapse, L2 priority mailboxes, L3 supervision

//! # KGSP actor runtime
//!
//! Three layers, all bounded:
//!
//! - **L1 (matrix)**: 8-bit causal actors. A collapse folds eight
//!   precomputed hop masks into the actor's causal vector; the hop
//!   table is built once at startup.
//! - **L2 (mailbox)**: per-actor mailboxes with four SPSC priority
//!   rings, dead-letter capture and advisory backpressure. FIFO within
//!   a ring; any ready priority-0 message is delivered before lower
//!   priorities at the same dequeuer.
//! - **L3 (supervisor)**: lifecycle states, restart strategies
//!   (one-for-one, one-for-all, rest-for-one), rate-limited restarts
//!   and escalation up the supervisor tree.
//!
//! Everything is id-linked: actors hold `supervisor_id` and
//! `mailbox_id`, supervisors hold `managed` lists, and every structural
//! mutation re-checks the linkage invariant.

pub mod mailbox;
pub mod matrix;
pub mod message;
pub mod supervisor;

pub use mailbox::{
    Mailbox, MailboxConfig, Ring, RingCounters, RouteError, Router, DEFAULT_DEAD_LETTER_CAPACITY,
    DEFAULT_RING_CAPACITIES, PRIORITY_LEVELS,
};
pub use matrix::{Actor, ActorError, ActorMatrix, HopTable, COLLAPSE_MASK, COLLAPSE_PENDING_BIT};
pub use message::{Message, MessageKind, MAX_PAYLOAD};
pub use supervisor::{
    BehaviorState, RestartStrategy, SupervisionAction, SupervisionDecision, SupervisionError,
    SupervisionStrategy, Supervisor, SupervisorTree, MAX_MANAGED,
};

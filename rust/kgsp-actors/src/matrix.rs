// kgsp-actors: L1 bit-actor substrate
// 8-bit causal actors; collapse is eight table lookups, an unrolled XOR
// chain and one masked write

use crate::supervisor::BehaviorState;
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActorError {
    #[error("invalid argument on actor entry point")]
    InvalidArgument,
    #[error("actor does not exist")]
    NotFound,
    #[error("actor table full")]
    Capacity,
}

/// Number of hops folded per collapse.
pub const HOP_COUNT: usize = 8;

/// Mask applied to the folded causal vector.
pub const COLLAPSE_MASK: u64 = 0x8888_8888_8888_8888;

/// "Collapse pending" bit in the actor's state byte.
pub const COLLAPSE_PENDING_BIT: u8 = 0x40;

/// Byte-spreading constant for single-bit hop masks.
const SPREAD: u64 = 0x0101_0101_0101_0101;

/// Precomputed hop table: for every state byte, the eight 64-bit masks
/// its collapse folds.
///
/// Layout: hops 0, 1, 2, 5 and 6 are single-bit spread tests of the
/// corresponding state bit; hop 3 spreads the byte's popcount; hop 4
/// spreads `bits ^ 0x88`; hop 7 is a fast hash of the byte.
pub struct HopTable {
    table: Box<[[u64; HOP_COUNT]; 256]>,
}

impl HopTable {
    pub fn build() -> Self {
        let mut table = Box::new([[0u64; HOP_COUNT]; 256]);
        for (byte, hops) in table.iter_mut().enumerate() {
            let b = byte as u8;
            *hops = Self::hops_for(b);
        }
        Self { table }
    }

    fn hops_for(b: u8) -> [u64; HOP_COUNT] {
        let bit = |i: u32| -> u64 {
            if b & (1 << i) != 0 {
                SPREAD << i
            } else {
                0
            }
        };
        [
            bit(0),
            bit(1),
            bit(2),
            u64::from(b.count_ones()) * SPREAD,
            u64::from(b ^ 0x88) * SPREAD,
            bit(5),
            bit(6),
            xxh3_64(&[b]),
        ]
    }

    #[inline(always)]
    pub fn hops(&self, bits: u8) -> &[u64; HOP_COUNT] {
        &self.table[bits as usize]
    }

    /// Recompute a sample of entries and compare. Detects a corrupted
    /// table before the scheduler starts folding with it.
    pub fn verify(&self) -> bool {
        [0u8, 1, 0x40, 0x88, 0xFF]
            .iter()
            .all(|&b| self.table[b as usize] == Self::hops_for(b))
    }
}

/// One causal bit-actor. Cache-aligned; the scheduler owns the array.
#[repr(C, align(64))]
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: u32,
    /// Owning supervisor; 0 is invalid and the actor must not be
    /// scheduled.
    pub supervisor_id: u32,
    pub bits: u8,
    pub state: BehaviorState,
    pub causal_vector: u64,
    pub mailbox_id: u32,
    pub tick_count: u64,
    pub error_count: u32,
    pub restart_count: u32,
    pub last_restart_tick: u64,
}

/// The actor array plus the collapse hop table.
pub struct ActorMatrix {
    actors: Vec<Actor>,
    hops: HopTable,
    max_actors: usize,
}

impl ActorMatrix {
    pub fn new(max_actors: usize) -> Self {
        Self {
            actors: Vec::new(),
            hops: HopTable::build(),
            max_actors: max_actors.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn hop_table(&self) -> &HopTable {
        &self.hops
    }

    /// Spawn an actor under a supervisor. Ids start at 1; 0 stays the
    /// invalid sentinel.
    pub fn spawn(&mut self, supervisor_id: u32, mailbox_id: u32) -> Result<u32, ActorError> {
        if supervisor_id == 0 {
            return Err(ActorError::InvalidArgument);
        }
        if self.actors.len() >= self.max_actors {
            return Err(ActorError::Capacity);
        }
        let id = self.actors.len() as u32 + 1;
        self.actors.push(Actor {
            id,
            supervisor_id,
            bits: 0,
            state: BehaviorState::Initializing,
            causal_vector: 0,
            mailbox_id,
            tick_count: 0,
            error_count: 0,
            restart_count: 0,
            last_restart_tick: 0,
        });
        Ok(id)
    }

    #[inline(always)]
    pub fn get(&self, id: u32) -> Option<&Actor> {
        if id == 0 {
            return None;
        }
        self.actors.get(id as usize - 1)
    }

    #[inline(always)]
    pub fn get_mut(&mut self, id: u32) -> Option<&mut Actor> {
        if id == 0 {
            return None;
        }
        self.actors.get_mut(id as usize - 1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Actor> {
        self.actors.iter()
    }

    /// Collapse an actor's causal state: fold the eight hop masks for
    /// its state byte into the causal vector, mask, and flag the
    /// collapse pending bit.
    #[inline(always)]
    pub fn collapse(&mut self, id: u32) -> Result<u64, ActorError> {
        let actor = match self.get(id) {
            Some(a) => *a,
            None => return Err(ActorError::NotFound),
        };
        if actor.supervisor_id == 0 {
            return Err(ActorError::InvalidArgument);
        }

        let hops = self.hops.table[actor.bits as usize];
        // Fully unrolled fold.
        let folded = actor.causal_vector
            ^ hops[0]
            ^ hops[1]
            ^ hops[2]
            ^ hops[3]
            ^ hops[4]
            ^ hops[5]
            ^ hops[6]
            ^ hops[7];
        let collapsed = folded & COLLAPSE_MASK;

        // The guard above proves the id resolves.
        if let Some(slot) = self.get_mut(id) {
            slot.causal_vector = collapsed;
            slot.bits |= COLLAPSE_PENDING_BIT;
            slot.tick_count += 1;
        }
        Ok(collapsed)
    }
}

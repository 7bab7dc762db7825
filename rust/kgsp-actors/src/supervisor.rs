// kgsp-actors: L3 supervision
// Lifecycle management, restart strategies and rate-limited recovery;
// failures escalate up the supervisor tree, never panic

use crate::matrix::ActorMatrix;
use arrayvec::ArrayVec;
use smallvec::SmallVec;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SupervisionError {
    #[error("invalid argument on supervision entry point")]
    InvalidArgument,
    #[error("referenced actor or supervisor does not exist")]
    NotFound,
    #[error("supervisor table or managed list full")]
    Capacity,
    #[error("actor has no valid supervisor linkage")]
    NoSupervisor,
}

/// Actor behavior states. Micro-states (Idle through Recovery) refine
/// Running; the lifecycle states govern supervision.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorState {
    Idle = 0,
    Processing = 1,
    Waiting = 2,
    Signaling = 3,
    Collapsing = 4,
    Error = 5,
    Recovery = 6,
    Terminating = 7,
    Initializing = 8,
    Running = 9,
    Suspended = 10,
    Restarting = 11,
    Terminated = 12,
}

impl BehaviorState {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(BehaviorState::Idle),
            1 => Some(BehaviorState::Processing),
            2 => Some(BehaviorState::Waiting),
            3 => Some(BehaviorState::Signaling),
            4 => Some(BehaviorState::Collapsing),
            5 => Some(BehaviorState::Error),
            6 => Some(BehaviorState::Recovery),
            7 => Some(BehaviorState::Terminating),
            8 => Some(BehaviorState::Initializing),
            9 => Some(BehaviorState::Running),
            10 => Some(BehaviorState::Suspended),
            11 => Some(BehaviorState::Restarting),
            12 => Some(BehaviorState::Terminated),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn is_terminal(self) -> bool {
        self == BehaviorState::Terminated
    }

    /// Whether the state is an active refinement of Running.
    #[inline(always)]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            BehaviorState::Running
                | BehaviorState::Idle
                | BehaviorState::Processing
                | BehaviorState::Waiting
                | BehaviorState::Signaling
                | BehaviorState::Collapsing
        )
    }

    /// Lifecycle transition validity.
    pub fn can_transition(self, to: BehaviorState) -> bool {
        use BehaviorState::*;
        match (self, to) {
            (Initializing, Running) | (Initializing, Terminated) => true,
            (Running, Suspended) | (Suspended, Running) => true,
            (Running, Error) | (Running, Terminating) => true,
            (Error, Restarting) | (Error, Recovery) | (Error, Terminating) => true,
            (Recovery, Running) | (Recovery, Error) => true,
            (Restarting, Running) | (Restarting, Terminated) => true,
            (Terminating, Terminated) => true,
            // Micro-state churn within the active group.
            (from, to) if from.is_active() && to.is_active() => true,
            (from, Error) if from.is_active() => true,
            _ => false,
        }
    }
}

/// Per-actor restart policy reported with a failure.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartStrategy {
    /// Always restart.
    Permanent = 0,
    /// Never restart.
    Temporary = 1,
    /// Restart only on abnormal exit (reason != 0).
    Transient = 2,
}

/// Supervision strategy applied across a supervisor's children.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionStrategy {
    OneForOne = 0,
    OneForAll = 1,
    RestForOne = 2,
    /// Identical to OneForOne for dynamically added actors.
    SimpleOneForOne = 3,
}

/// Maximum actors per supervisor.
pub const MAX_MANAGED: usize = 32;

/// One supervisor node.
#[derive(Debug, Clone)]
pub struct Supervisor {
    pub id: u32,
    /// 0 means root (no parent).
    pub parent_id: u32,
    /// Managed actors in start order.
    pub managed: ArrayVec<u32, MAX_MANAGED>,
    pub strategy: SupervisionStrategy,
    pub max_restarts_per_actor: u32,
    pub restart_window_ns: u64,
    pub total_restarts: u64,
    pub successful_recoveries: u64,
    pub failed_recoveries: u64,
    pub total_actor_failures: u64,
}

/// What a failure handling pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionAction {
    Restarted,
    /// Strategy said not to restart; the actor terminated.
    Terminated,
    /// Rate limit refused the restart.
    Refused,
}

/// Supervision decision record, emitted to telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct SupervisionDecision {
    pub actor_id: u32,
    pub supervisor_id: u32,
    pub reason: u32,
    pub strategy: SupervisionStrategy,
    pub action: SupervisionAction,
    pub restarted: SmallVec<[u32; 4]>,
    /// Refusals escalate to the parent when one exists.
    pub escalated: bool,
    pub success: bool,
}

/// The supervisor table. Supervisor ids start at 1; 0 is the invalid
/// sentinel actors are checked against.
pub struct SupervisorTree {
    supervisors: Vec<Supervisor>,
    max_supervisors: usize,
}

impl SupervisorTree {
    pub fn new(max_supervisors: usize) -> Self {
        Self {
            supervisors: Vec::new(),
            max_supervisors: max_supervisors.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.supervisors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.supervisors.is_empty()
    }

    pub fn create(
        &mut self,
        parent_id: u32,
        strategy: SupervisionStrategy,
        max_restarts_per_actor: u32,
        restart_window_ns: u64,
    ) -> Result<u32, SupervisionError> {
        if self.supervisors.len() >= self.max_supervisors {
            return Err(SupervisionError::Capacity);
        }
        if parent_id != 0 && self.get(parent_id).is_none() {
            return Err(SupervisionError::NotFound);
        }
        let id = self.supervisors.len() as u32 + 1;
        self.supervisors.push(Supervisor {
            id,
            parent_id,
            managed: ArrayVec::new(),
            strategy,
            max_restarts_per_actor,
            restart_window_ns,
            total_restarts: 0,
            successful_recoveries: 0,
            failed_recoveries: 0,
            total_actor_failures: 0,
        });
        Ok(id)
    }

    pub fn get(&self, id: u32) -> Option<&Supervisor> {
        if id == 0 {
            return None;
        }
        self.supervisors.get(id as usize - 1)
    }

    fn get_mut(&mut self, id: u32) -> Option<&mut Supervisor> {
        if id == 0 {
            return None;
        }
        self.supervisors.get_mut(id as usize - 1)
    }

    /// Link an actor under a supervisor. Keeps both sides of the
    /// relationship consistent.
    pub fn manage(
        &mut self,
        supervisor_id: u32,
        actor_id: u32,
        matrix: &mut ActorMatrix,
    ) -> Result<(), SupervisionError> {
        let supervisor = self
            .get_mut(supervisor_id)
            .ok_or(SupervisionError::NotFound)?;
        if supervisor.managed.contains(&actor_id) {
            return Ok(());
        }
        supervisor
            .managed
            .try_push(actor_id)
            .map_err(|_| SupervisionError::Capacity)?;
        let actor = match matrix.get_mut(actor_id) {
            Some(a) => a,
            None => {
                // Roll back the half-made link.
                if let Some(sup) = self.get_mut(supervisor_id) {
                    sup.managed.retain(|&mut a| a != actor_id);
                }
                return Err(SupervisionError::NotFound);
            }
        };
        actor.supervisor_id = supervisor_id;
        Ok(())
    }

    /// Structural invariant: every managed actor references its
    /// supervisor back.
    pub fn verify_links(&self, matrix: &ActorMatrix) -> bool {
        self.supervisors.iter().all(|sup| {
            sup.managed
                .iter()
                .all(|&aid| matrix.get(aid).is_some_and(|a| a.supervisor_id == sup.id))
        })
    }

    /// Validated behavior transition.
    pub fn transition(
        &self,
        matrix: &mut ActorMatrix,
        actor_id: u32,
        to: BehaviorState,
    ) -> Result<BehaviorState, SupervisionError> {
        let actor = matrix.get_mut(actor_id).ok_or(SupervisionError::NotFound)?;
        if !actor.state.can_transition(to) {
            return Err(SupervisionError::InvalidArgument);
        }
        let from = actor.state;
        actor.state = to;
        Ok(from)
    }

    /// Handle an actor failure report.
    pub fn handle_failure(
        &mut self,
        matrix: &mut ActorMatrix,
        actor_id: u32,
        reason: u32,
        restart: RestartStrategy,
        now_ns: u64,
    ) -> Result<SupervisionDecision, SupervisionError> {
        let (supervisor_id, mut restart_count, last_restart) = {
            let actor = matrix.get(actor_id).ok_or(SupervisionError::NotFound)?;
            (actor.supervisor_id, actor.restart_count, actor.last_restart_tick)
        };
        if supervisor_id == 0 || self.get(supervisor_id).is_none() {
            tracing::warn!(actor_id, reason, "failure reported without supervisor linkage");
            return Err(SupervisionError::NoSupervisor);
        }

        if let Some(actor) = matrix.get_mut(actor_id) {
            actor.error_count += 1;
            actor.state = BehaviorState::Error;
        }
        let strategy = {
            let sup = match self.get_mut(supervisor_id) {
                Some(s) => s,
                None => return Err(SupervisionError::NoSupervisor),
            };
            sup.total_actor_failures += 1;
            sup.strategy
        };

        let mut decision = SupervisionDecision {
            actor_id,
            supervisor_id,
            reason,
            strategy,
            action: SupervisionAction::Terminated,
            restarted: SmallVec::new(),
            escalated: false,
            success: false,
        };

        // Restart policy for the failed actor.
        let should_restart = match restart {
            RestartStrategy::Permanent => true,
            RestartStrategy::Temporary => false,
            RestartStrategy::Transient => reason != 0,
        };
        if !should_restart {
            if let Some(actor) = matrix.get_mut(actor_id) {
                actor.state = BehaviorState::Terminated;
            }
            self.emit_decision(&decision);
            return Ok(decision);
        }

        // Rate limiting with window reset.
        let (max_restarts, window) = {
            let sup = match self.get(supervisor_id) {
                Some(s) => s,
                None => return Err(SupervisionError::NoSupervisor),
            };
            (sup.max_restarts_per_actor, sup.restart_window_ns)
        };
        if now_ns.saturating_sub(last_restart) >= window && restart_count > 0 {
            restart_count = 0;
            if let Some(actor) = matrix.get_mut(actor_id) {
                actor.restart_count = 0;
            }
        }
        if now_ns.saturating_sub(last_restart) < window && restart_count >= max_restarts {
            decision.action = SupervisionAction::Refused;
            decision.escalated = self.escalate(matrix, actor_id, supervisor_id, reason);
            if let Some(sup) = self.get_mut(supervisor_id) {
                sup.failed_recoveries += 1;
            }
            self.emit_decision(&decision);
            return Ok(decision);
        }

        // Strategy selects the restart set.
        let targets: SmallVec<[u32; 4]> = {
            let sup = match self.get(supervisor_id) {
                Some(s) => s,
                None => return Err(SupervisionError::NoSupervisor),
            };
            match strategy {
                SupervisionStrategy::OneForOne | SupervisionStrategy::SimpleOneForOne => {
                    SmallVec::from_slice(&[actor_id])
                }
                SupervisionStrategy::OneForAll => sup.managed.iter().copied().collect(),
                SupervisionStrategy::RestForOne => {
                    let position = sup.managed.iter().position(|&a| a == actor_id);
                    match position {
                        Some(p) => sup.managed[p..].iter().copied().collect(),
                        None => SmallVec::from_slice(&[actor_id]),
                    }
                }
            }
        };

        for &target in &targets {
            if self.restart_actor(matrix, target, now_ns) {
                decision.restarted.push(target);
            }
        }
        if let Some(sup) = self.get_mut(supervisor_id) {
            sup.total_restarts += decision.restarted.len() as u64;
            sup.successful_recoveries += 1;
        }
        decision.action = SupervisionAction::Restarted;
        decision.success = true;
        self.emit_decision(&decision);
        Ok(decision)
    }

    /// Restart one actor: preserve identity and linkage, reset causal
    /// state and transient counters.
    fn restart_actor(&mut self, matrix: &mut ActorMatrix, actor_id: u32, now_ns: u64) -> bool {
        let Some(actor) = matrix.get_mut(actor_id) else {
            return false;
        };
        if actor.state.is_terminal() {
            return false;
        }
        actor.state = BehaviorState::Restarting;
        actor.bits = 0;
        actor.causal_vector = 0;
        actor.tick_count = 0;
        actor.error_count = 0;
        actor.restart_count += 1;
        actor.last_restart_tick = now_ns;
        actor.state = BehaviorState::Running;
        true
    }

    /// Escalate a refused restart to the parent supervisor. Returns
    /// whether a parent accepted the escalation; without one the actor
    /// terminates.
    fn escalate(&mut self, matrix: &mut ActorMatrix, actor_id: u32, supervisor_id: u32, reason: u32) -> bool {
        let parent_id = self.get(supervisor_id).map_or(0, |s| s.parent_id);
        if parent_id == 0 {
            tracing::warn!(
                actor_id,
                supervisor_id,
                reason,
                "restart refused with no parent; terminating actor"
            );
            if let Some(actor) = matrix.get_mut(actor_id) {
                actor.state = BehaviorState::Terminated;
            }
            return false;
        }
        if let Some(parent) = self.get_mut(parent_id) {
            parent.total_actor_failures += 1;
        }
        tracing::warn!(
            actor_id,
            supervisor_id,
            parent_id,
            reason,
            "restart refused; escalated to parent supervisor"
        );
        true
    }

    fn emit_decision(&self, decision: &SupervisionDecision) {
        tracing::debug!(
            actor_id = decision.actor_id,
            supervisor_id = decision.supervisor_id,
            reason = decision.reason,
            action = ?decision.action,
            restarted = decision.restarted.len(),
            "supervision decision"
        );
    }
}

// kgsp: Budget scheduler
// Drives classification, routing, collapse, supervision, validation and
// reasoning under per-operation cycle accounting; overruns are budget
// faults, never cancellations

use crate::config::RuntimeConfig;
use crate::error::EngineError;
use crate::telemetry::{OpTrace, TelemetrySink, TracingSink, ValidationSummary};
use kgsp_actors::{
    ActorMatrix, BehaviorState, MailboxConfig, Message, MessageKind, RestartStrategy, RouteError,
    Router, SupervisionDecision, SupervisorTree,
};
use kgsp_discovery::{DiscoveryConfig, DiscoveryEngine, DiscoveryEvent, PatternClass};
use kgsp_rdf::{Arena, Interner, StringRef, Triple, TripleGraph, Vocab};
use kgsp_reason::{InferenceResult, Reasoner, ReasonerConfig, Rule, RuleKind};
use kgsp_shacl::{
    ConstraintKind, ConstraintParam, EvolutionConfig, ValidationReport, Validator, ValidatorConfig,
};
use kgsp_ticks::{
    CycleSource, GatekeeperReport, HardwareCycles, OpKind, QualityGates, TickBudget, TickRecorder,
    TickStats,
};

/// Outcome of ingesting one triple.
#[derive(Debug)]
pub struct IngestOutcome {
    pub class: PatternClass,
    /// False when the target ring rejected the message.
    pub routed: bool,
    /// Collapse result for the target actor, when one was scheduled.
    pub collapsed: Option<u64>,
    pub promoted: Option<DiscoveryEvent>,
    /// Derived triples folded back into the graph this step.
    pub derived: usize,
    /// Conformance verdict when opportunistic validation ran.
    pub validated: Option<bool>,
}

/// The engine: every layer of the pipeline under one scheduler.
pub struct Engine {
    config: RuntimeConfig,
    interner: Interner,
    vocab: Vocab,
    arena: Arena,
    graph: TripleGraph,
    validator: Validator,
    reasoner: Reasoner,
    discovery: DiscoveryEngine,
    matrix: ActorMatrix,
    router: Router,
    supervisors: SupervisorTree,
    recorder: TickRecorder,
    clock: Box<dyn CycleSource>,
    sink: Box<dyn TelemetrySink>,
    workers: Vec<u32>,
    root_supervisor: u32,
    next_message_id: u64,
    triples_processed: u64,
    budget_faults: u64,
}

impl Engine {
    pub fn new(config: RuntimeConfig) -> Result<Self, EngineError> {
        config
            .validate()
            .map_err(|err| {
                tracing::error!(%err, "configuration rejected");
                EngineError::InvalidArgument("configuration")
            })?;

        let interner = Interner::new();
        let vocab = Vocab::intern(&interner)?;
        let graph = TripleGraph::new(vocab.rdf_type);
        let arena = Arena::with_capacity(config.max_memory_per_node);

        let validator = Validator::create(ValidatorConfig {
            shape_capacity: config.shape_table_capacity,
            max_memory_per_node: config.max_memory_per_node,
            max_memory_per_graph: config.max_memory_per_graph,
            node_budget_cycles: config.node_budget_cycles(),
            evolution: EvolutionConfig {
                ewma_alpha: config.effectiveness_ewma_alpha,
                ..EvolutionConfig::default()
            },
        });
        let reasoner = Reasoner::new(
            vocab,
            ReasonerConfig {
                max_depth: config.reasoner_max_depth,
                budget_cycles: config.reasoner_budget_cycles,
            },
        );
        let discovery = DiscoveryEngine::new(
            vocab,
            DiscoveryConfig {
                confidence_threshold: config.discovery_confidence_threshold,
                min_observations: config.discovery_min_observations,
                ring_size: config.discovery_ring_size,
                max_candidates: config.max_candidates,
                drift_threshold: config.frequency_adaptation_threshold,
                learning_rate: config.frequency_learning_rate,
                ..DiscoveryConfig::default()
            },
        );

        let mut matrix = ActorMatrix::new(config.max_actors);
        let router = Router::new(
            config.max_mailboxes,
            &MailboxConfig {
                ring_capacities: config.mailbox_ring_capacities,
                dead_letter_capacity: config.dead_letter_capacity,
                backpressure_fraction: config.backpressure_fraction,
            },
        );
        let mut supervisors = SupervisorTree::new(config.max_supervisors);
        let root_supervisor = supervisors.create(
            0,
            config.supervision_strategy.into(),
            config.max_restarts_per_window,
            config.restart_window_ns,
        )?;

        let mut workers = Vec::with_capacity(config.worker_pool_size);
        for _ in 0..config.worker_pool_size {
            let id = matrix.spawn(root_supervisor, 0)?;
            if let Some(actor) = matrix.get_mut(id) {
                actor.mailbox_id = router.mailbox_id_for(id);
            }
            supervisors.manage(root_supervisor, id, &mut matrix)?;
            supervisors.transition(&mut matrix, id, BehaviorState::Running)?;
            workers.push(id);
        }

        let recorder = TickRecorder::with_target(config.target_cycles_per_op);
        Ok(Self {
            config,
            interner,
            vocab,
            arena,
            graph,
            validator,
            reasoner,
            discovery,
            matrix,
            router,
            supervisors,
            recorder,
            clock: Box::new(HardwareCycles),
            sink: Box::new(TracingSink),
            workers,
            root_supervisor,
            next_message_id: 0,
            triples_processed: 0,
            budget_faults: 0,
        })
    }

    /// Swap the cycle source (logical clocks for deterministic runs).
    pub fn with_clock(mut self, clock: Box<dyn CycleSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Swap the telemetry sink.
    pub fn with_sink(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Startup self-check. `Corruption` here is fatal to the scheduler.
    pub fn init(&mut self) -> Result<(), EngineError> {
        let a = self.clock.now();
        let b = self.clock.now();
        if b < a {
            return Err(EngineError::Corruption);
        }
        if !self.matrix.hop_table().verify() {
            return Err(EngineError::Corruption);
        }
        self.validator.verify_integrity()?;
        if !self.supervisors.verify_links(&self.matrix) {
            return Err(EngineError::Corruption);
        }
        Ok(())
    }

    // Accessors for embedders and tests.

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn graph(&self) -> &TripleGraph {
        &self.graph
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub fn discovery(&self) -> &DiscoveryEngine {
        &self.discovery
    }

    pub fn matrix(&self) -> &ActorMatrix {
        &self.matrix
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn supervisors(&self) -> &SupervisorTree {
        &self.supervisors
    }

    pub fn root_supervisor(&self) -> u32 {
        self.root_supervisor
    }

    pub fn workers(&self) -> &[u32] {
        &self.workers
    }

    pub fn metrics(&self) -> &TickRecorder {
        &self.recorder
    }

    pub fn stats(&self) -> TickStats {
        self.recorder.stats()
    }

    pub fn budget_faults(&self) -> u64 {
        self.budget_faults
    }

    pub fn triples_processed(&self) -> u64 {
        self.triples_processed
    }

    /// Gatekeeper report for the observed distribution.
    pub fn gatekeeper(&self) -> GatekeeperReport {
        GatekeeperReport::from_recorder(&self.recorder, QualityGates::default())
    }

    /// Register a shape from the external loader interface.
    pub fn load_shape(&mut self, iri: &str, target_class: &str) -> Result<StringRef, EngineError> {
        let shape = self.interner.intern_iri(iri.as_bytes())?;
        let class = self.interner.intern_iri(target_class.as_bytes())?;
        self.validator.load_shape(shape, class)?;
        tracing::info!(shape = iri, target_class, "shape loaded");
        Ok(shape)
    }

    pub fn add_constraint(
        &mut self,
        shape: StringRef,
        kind: ConstraintKind,
        property_path: StringRef,
        param: ConstraintParam,
    ) -> Result<(), EngineError> {
        self.validator
            .add_constraint(shape, kind, property_path, param)?;
        Ok(())
    }

    /// Ingest one triple through the full pipeline cycle.
    pub fn ingest(&mut self, triple: Triple) -> Result<IngestOutcome, EngineError> {
        let mut budget = TickBudget::with_budget(self.ingest_budget_cycles());
        self.arena.reset();

        // Classification and discovery.
        let start = self.clock.now();
        let observation =
            self.discovery
                .observe(&self.interner, &self.vocab, &mut self.validator, &triple)?;
        let end = self.clock.now();
        self.account(OpKind::Classify, start, end, &mut budget);
        if let Some(event) = &observation.promoted {
            self.sink.record_discovery(event.into());
        }

        // Index the triple; schema triples extend the rule table.
        let start = self.clock.now();
        self.graph.insert(triple);
        self.index_schema_rule(&triple);
        let end = self.clock.now();
        self.account(OpKind::Intern, start, end, &mut budget);

        // Route to the worker owning the subject.
        let routed = self.route_triple(&triple, &mut budget);

        // Collapse the worker's causal state and step its behavior.
        let collapsed = if routed {
            self.deliver_and_collapse(&triple, &mut budget)
        } else {
            None
        };

        // Opportunistic validation and reasoning under remaining budget.
        let validated = if budget.exhausted() {
            None
        } else {
            self.opportunistic_validation(triple.subject, &mut budget)
        };
        let derived = if budget.exhausted() {
            0
        } else {
            self.opportunistic_inference(&mut budget)
        };

        self.triples_processed += 1;
        if self.triples_processed % self.config.maintenance_interval == 0 {
            self.maintenance();
        }

        Ok(IngestOutcome {
            class: observation.class,
            routed,
            collapsed,
            promoted: observation.promoted,
            derived,
            validated,
        })
    }

    /// Ingest a stream; routing refusals and budget faults are values
    /// in the outcomes, so the whole batch always runs.
    pub fn process<I>(&mut self, triples: I) -> Vec<IngestOutcome>
    where
        I: IntoIterator<Item = Triple>,
    {
        let mut outcomes = Vec::new();
        for triple in triples {
            match self.ingest(triple) {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    tracing::warn!(%err, "triple rejected");
                }
            }
        }
        outcomes
    }

    /// Full-graph validation pass.
    pub fn validate(&mut self) -> ValidationReport {
        let mut report = ValidationReport::new();
        let start = self.clock.now();
        self.validator
            .validate_graph(&self.graph, &self.interner, self.clock.as_ref(), &mut report);
        let end = self.clock.now();
        self.recorder.record(OpKind::Validate, start, end);
        self.sink.record_op(OpTrace::new(OpKind::Validate, start, end));
        self.sink.record_validation(ValidationSummary::from(&report));
        report
    }

    /// Full forward-chaining pass; derived triples re-enter the graph.
    pub fn infer(&mut self) -> InferenceResult {
        let start = self.clock.now();
        let result = self.reasoner.infer(&self.graph, self.clock.as_ref());
        let end = self.clock.now();
        self.recorder.record(OpKind::Infer, start, end);
        self.sink.record_op(OpTrace::new(OpKind::Infer, start, end));
        for derived in &result.derived {
            self.graph.insert(*derived);
        }
        result
    }

    /// Report an actor failure into the supervision layer.
    pub fn report_actor_failure(
        &mut self,
        actor_id: u32,
        reason: u32,
    ) -> Result<SupervisionDecision, EngineError> {
        let now = self.clock.now();
        let restart: RestartStrategy = self.config.restart_strategy.into();
        let decision =
            self.supervisors
                .handle_failure(&mut self.matrix, actor_id, reason, restart, now)?;
        let end = self.clock.now();
        self.recorder.record(OpKind::Supervise, now, end);
        self.sink.record_op(OpTrace::new(OpKind::Supervise, now, end));
        if end.saturating_sub(now) > self.config.l3_budget_cycles {
            self.note_budget_fault(OpKind::Supervise, end.saturating_sub(now));
        }
        self.sink.record_supervision((&decision).into());
        Ok(decision)
    }

    /// Low-frequency maintenance: constraint evolution, frequency
    /// adaptation and arena reset.
    pub fn maintenance(&mut self) {
        let start = self.clock.now();
        self.discovery.maintenance(&mut self.validator);
        self.arena.reset();
        let end = self.clock.now();
        self.recorder.record(OpKind::Maintenance, start, end);
        self.sink
            .record_op(OpTrace::new(OpKind::Maintenance, start, end));
        tracing::debug!(
            triples = self.triples_processed,
            faults = self.budget_faults,
            "maintenance tick"
        );
    }

    // Internal steps.

    fn ingest_budget_cycles(&self) -> u64 {
        self.config.l1_budget_cycles
            + self.config.l2_budget_cycles
            + self.config.l3_budget_cycles
            + self.config.target_cycles_per_op * 4
    }

    fn account(&mut self, op: OpKind, start: u64, end: u64, budget: &mut TickBudget) {
        self.recorder.record(op, start, end);
        self.sink.record_op(OpTrace::new(op, start, end));
        let elapsed = end.saturating_sub(start);
        budget.charge(op.name(), elapsed);
        if elapsed > self.op_budget(op) {
            self.note_budget_fault(op, elapsed);
        }
    }

    fn op_budget(&self, op: OpKind) -> u64 {
        match op {
            OpKind::Collapse => self.config.l1_budget_cycles,
            OpKind::Route | OpKind::Enqueue | OpKind::Dequeue => self.config.l2_budget_cycles,
            OpKind::Supervise | OpKind::Behavior => self.config.l3_budget_cycles,
            _ => self.config.target_cycles_per_op,
        }
    }

    fn note_budget_fault(&mut self, op: OpKind, elapsed: u64) {
        self.budget_faults += 1;
        tracing::warn!(op = op.name(), elapsed, "budget fault");
    }

    fn is_schema_predicate(&self, predicate: StringRef) -> bool {
        predicate == self.vocab.rdfs_sub_class_of
            || predicate == self.vocab.rdfs_sub_property_of
            || predicate == self.vocab.rdfs_domain
            || predicate == self.vocab.rdfs_range
    }

    fn index_schema_rule(&mut self, triple: &Triple) {
        if !self.is_schema_predicate(triple.predicate) {
            return;
        }
        let kind = if triple.predicate == self.vocab.rdfs_sub_class_of {
            RuleKind::SubClassOf
        } else if triple.predicate == self.vocab.rdfs_sub_property_of {
            RuleKind::SubPropertyOf
        } else if triple.predicate == self.vocab.rdfs_domain {
            RuleKind::Domain
        } else {
            RuleKind::Range
        };
        if let Err(err) = self
            .reasoner
            .add_rule(Rule::new(kind, triple.subject, triple.object))
        {
            tracing::warn!(%err, "schema rule dropped");
        }
    }

    fn worker_for(&self, subject: StringRef) -> u32 {
        self.workers[subject.hash as usize % self.workers.len()]
    }

    fn route_triple(&mut self, triple: &Triple, budget: &mut TickBudget) -> bool {
        let worker = self.worker_for(triple.subject);
        self.next_message_id += 1;

        // Stage the wire payload in the per-operation arena.
        let mut payload = [0u8; 13];
        payload[0..4].copy_from_slice(&triple.subject.hash.to_le_bytes());
        payload[4..8].copy_from_slice(&triple.predicate.hash.to_le_bytes());
        payload[8..12].copy_from_slice(&triple.object.hash.to_le_bytes());
        payload[12] = triple.confidence;
        let staged = self.arena.alloc_slice(&payload);

        let mut message = Message::new(
            self.next_message_id,
            0,
            worker,
            MessageKind::Data,
            0,
        );
        let ok = match &staged {
            Some(bytes) => message.set_payload(bytes),
            None => message.set_payload(&payload),
        };
        debug_assert!(ok);

        let start = self.clock.now();
        let routed = self.router.route(message);
        let end = self.clock.now();
        self.account(OpKind::Enqueue, start, end, budget);

        match routed {
            Ok(()) => true,
            Err(RouteError::QueueFull | RouteError::DeadLettered) => {
                tracing::debug!(worker, "route refused under pressure");
                false
            }
            Err(_) => false,
        }
    }

    fn deliver_and_collapse(&mut self, triple: &Triple, budget: &mut TickBudget) -> Option<u64> {
        let worker = self.worker_for(triple.subject);

        let start = self.clock.now();
        let now_ns = start;
        let delivered = self.router.dequeue_for(worker, now_ns);
        let end = self.clock.now();
        self.account(OpKind::Dequeue, start, end, budget);
        delivered.as_ref()?;

        let start = self.clock.now();
        let collapsed = self.matrix.collapse(worker).ok();
        let end = self.clock.now();
        self.account(OpKind::Collapse, start, end, budget);

        let start = self.clock.now();
        let stepped = self
            .supervisors
            .transition(&mut self.matrix, worker, BehaviorState::Processing)
            .and_then(|_| {
                self.supervisors
                    .transition(&mut self.matrix, worker, BehaviorState::Running)
            });
        let end = self.clock.now();
        self.account(OpKind::Behavior, start, end, budget);
        if let Err(err) = stepped {
            tracing::warn!(worker, %err, "behavior transition refused");
        }

        collapsed
    }

    fn opportunistic_validation(
        &mut self,
        subject: StringRef,
        budget: &mut TickBudget,
    ) -> Option<bool> {
        let mut report = ValidationReport::new();
        let start = self.clock.now();
        self.validator.validate_node(
            &self.graph,
            &self.interner,
            self.clock.as_ref(),
            subject,
            &mut report,
        );
        let end = self.clock.now();
        self.account(OpKind::Validate, start, end, budget);

        if report.nodes_validated == 0 {
            return None;
        }
        report.finalize();
        self.sink.record_validation(ValidationSummary::from(&report));
        Some(report.conforms)
    }

    fn opportunistic_inference(&mut self, budget: &mut TickBudget) -> usize {
        let start = self.clock.now();
        let result = self.reasoner.infer(&self.graph, self.clock.as_ref());
        let end = self.clock.now();
        self.account(OpKind::Infer, start, end, budget);

        let derived = result.derived.len();
        for triple in &result.derived {
            self.graph.insert(*triple);
        }
        derived
    }
}

// kgsp: End-to-end pipeline tests
// Exercises the engine across validation, routing, supervision,
// discovery and reasoning with a deterministic logical clock

use kgsp::kgsp_actors::{BehaviorState, Mailbox, MailboxConfig, Message, MessageKind, RouteError};
use kgsp::prelude::*;
use kgsp::{CollectingSink, SupervisionPolicy};

fn engine_with(config: RuntimeConfig) -> Engine {
    Engine::new(config)
        .expect("engine")
        .with_clock(Box::new(LogicalCycles::with_step(0)))
}

fn engine() -> Engine {
    engine_with(RuntimeConfig::default())
}

fn iri(engine: &Engine, s: &str) -> StringRef {
    engine.interner().intern_iri(s.as_bytes()).unwrap()
}

fn literal(engine: &Engine, s: &str) -> StringRef {
    engine.interner().intern_literal(s.as_bytes()).unwrap()
}

const EX_PERSON: &str = "http://ex/Person";
const EX_NAME: &str = "http://ex/name";
const EX_KNOWS: &str = "http://ex/knows";
const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const RDFS_SUBCLASS: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";

#[test]
fn test_min_count_cardinality_violation() {
    let mut engine = engine();
    engine.init().unwrap();

    let shape = engine.load_shape("http://ex/PersonShape", EX_PERSON).unwrap();
    let name = iri(&engine, EX_NAME);
    engine
        .add_constraint(shape, ConstraintKind::MinCount, name, ConstraintParam::Count(1))
        .unwrap();

    let alice = iri(&engine, "http://ex/alice");
    let rdf_type = iri(&engine, RDF_TYPE);
    let person = iri(&engine, EX_PERSON);
    engine.ingest(Triple::new(alice, rdf_type, person)).unwrap();

    let report = engine.validate();
    assert!(!report.conforms);
    assert_eq!(report.violation_count, 1);
    let result = &report.results[0];
    assert_eq!(result.focus, alice);
    assert_eq!(result.constraint_kind, ConstraintKind::MinCount);
    assert_eq!(result.property_path, name);
}

#[test]
fn test_min_count_satisfied_conforms() {
    let mut engine = engine();
    let shape = engine.load_shape("http://ex/PersonShape", EX_PERSON).unwrap();
    let name = iri(&engine, EX_NAME);
    engine
        .add_constraint(shape, ConstraintKind::MinCount, name, ConstraintParam::Count(1))
        .unwrap();

    let alice = iri(&engine, "http://ex/alice");
    let rdf_type = iri(&engine, RDF_TYPE);
    let person = iri(&engine, EX_PERSON);
    engine.ingest(Triple::new(alice, rdf_type, person)).unwrap();
    engine
        .ingest(Triple::new(alice, name, literal(&engine, "Alice")))
        .unwrap();

    let report = engine.validate();
    assert!(report.conforms, "results: {:?}", report.results);
}

#[test]
fn test_node_kind_iri_constraint() {
    let mut engine = engine();
    let shape = engine.load_shape("http://ex/PersonShape", EX_PERSON).unwrap();
    let knows = iri(&engine, EX_KNOWS);
    engine
        .add_constraint(
            shape,
            ConstraintKind::NodeKind,
            knows,
            ConstraintParam::Kind(NodeKindRule::Iri),
        )
        .unwrap();

    let alice = iri(&engine, "http://ex/alice");
    let rdf_type = iri(&engine, RDF_TYPE);
    let person = iri(&engine, EX_PERSON);
    engine.ingest(Triple::new(alice, rdf_type, person)).unwrap();

    // Literal object: violation.
    let bob_literal = literal(&engine, "bob");
    engine.ingest(Triple::new(alice, knows, bob_literal)).unwrap();
    let report = engine.validate();
    assert!(!report.conforms);
    assert_eq!(report.results[0].value, bob_literal);

    // IRI object on a fresh engine: conforms.
    let mut engine = engine_with(RuntimeConfig::default());
    let shape = engine.load_shape("http://ex/PersonShape", EX_PERSON).unwrap();
    let knows = iri(&engine, EX_KNOWS);
    engine
        .add_constraint(
            shape,
            ConstraintKind::NodeKind,
            knows,
            ConstraintParam::Kind(NodeKindRule::Iri),
        )
        .unwrap();
    let alice = iri(&engine, "http://ex/alice");
    let rdf_type = iri(&engine, RDF_TYPE);
    let person = iri(&engine, EX_PERSON);
    let bob = iri(&engine, "http://ex/bob");
    engine.ingest(Triple::new(alice, rdf_type, person)).unwrap();
    engine.ingest(Triple::new(alice, knows, bob)).unwrap();
    assert!(engine.validate().conforms);
}

#[test]
fn test_mailbox_drop_under_saturation() {
    // Priority-3 ring has capacity 32: 31 usable slots.
    let mailbox = Mailbox::new(&MailboxConfig::default());
    for i in 0..31 {
        mailbox
            .enqueue(Message::new(i, 1, 1, MessageKind::Data, 3))
            .unwrap();
    }
    let refused = mailbox.enqueue(Message::new(31, 1, 1, MessageKind::Data, 3));
    assert_eq!(refused, Err(RouteError::QueueFull));

    let ring = mailbox.ring(3);
    let counters = ring.counters();
    assert_eq!(counters.enqueued, 31);
    assert_eq!(counters.dropped, 1);
    assert_eq!(ring.len(), 31);

    // Draining one message frees a slot.
    assert!(mailbox.dequeue(0).is_some());
    assert!(mailbox
        .enqueue(Message::new(32, 1, 1, MessageKind::Data, 3))
        .is_ok());
}

#[test]
fn test_one_for_all_restart() {
    let config = RuntimeConfig {
        supervision_strategy: SupervisionPolicy::OneForAll,
        worker_pool_size: 3,
        ..RuntimeConfig::default()
    };
    let mut engine = engine_with(config);
    engine.init().unwrap();

    let workers: Vec<u32> = engine.workers().to_vec();
    assert_eq!(workers.len(), 3);

    let decision = engine.report_actor_failure(workers[1], 1).unwrap();
    assert!(decision.success);
    assert_eq!(decision.restarted.len(), 3);

    for &worker in &workers {
        let actor = engine.matrix().get(worker).unwrap();
        assert_eq!(actor.state, BehaviorState::Running);
        assert_eq!(actor.restart_count, 1);
    }
    let supervisor = engine.supervisors().get(engine.root_supervisor()).unwrap();
    assert_eq!(supervisor.total_restarts, 3);
    assert_eq!(supervisor.successful_recoveries, 1);
}

#[test]
fn test_discovery_promotion_end_to_end() {
    let config = RuntimeConfig {
        discovery_confidence_threshold: 0.75,
        ..RuntimeConfig::default()
    };
    let mut engine = engine_with(config).with_sink(Box::new(CollectingSink::default()));

    let mut promoted = None;
    for (subject, question) in [
        ("http://ex/q1", "What?"),
        ("http://ex/q2", "Why?"),
        ("http://ex/q3", "How?"),
    ] {
        let s = iri(&engine, subject);
        let q = iri(&engine, "http://dspy.ex/hasQuestion");
        let a = iri(&engine, "http://dspy.ex/hasAnswer");
        engine
            .ingest(Triple::new(s, q, literal(&engine, question)))
            .unwrap();
        let outcome = engine
            .ingest(Triple::new(s, a, literal(&engine, "Because.")))
            .unwrap();
        if outcome.promoted.is_some() {
            promoted = outcome.promoted;
        }
    }

    let event = promoted.expect("promotion after three observations");
    assert!(event.confidence >= 0.75);
    assert_eq!(event.observation_count, 3);

    let signatures = engine.discovery().signatures();
    assert_eq!(signatures.len(), 1);
    let signature = signatures.iter().next().unwrap();
    assert_eq!(signature.field_count, 2);
    assert_eq!(signature.input_count(), 1);
    assert_eq!(signature.output_count(), 1);

    // The synthesized shape carries min-count and string datatype
    // constraints per field.
    let shape = engine
        .validator()
        .find_shape(signature.shape)
        .expect("shape registered by promotion");
    assert_eq!(shape.constraints.len(), 4);
    let min_counts = shape
        .constraints
        .iter()
        .filter(|c| c.kind == ConstraintKind::MinCount)
        .count();
    let datatypes = shape
        .constraints
        .iter()
        .filter(|c| c.kind == ConstraintKind::Datatype)
        .count();
    assert_eq!(min_counts, 2);
    assert_eq!(datatypes, 2);
}

#[test]
fn test_reasoner_subclass_closure_end_to_end() {
    let mut engine = engine();
    let rdf_type = iri(&engine, RDF_TYPE);
    let subclass = iri(&engine, RDFS_SUBCLASS);
    let manager = iri(&engine, "http://ex/Manager");
    let employee = iri(&engine, "http://ex/Employee");
    let person = iri(&engine, EX_PERSON);
    let alice = iri(&engine, "http://ex/alice");

    engine.ingest(Triple::new(manager, subclass, employee)).unwrap();
    engine.ingest(Triple::new(employee, subclass, person)).unwrap();
    let outcome = engine.ingest(Triple::new(alice, rdf_type, manager)).unwrap();

    assert!(outcome.derived >= 2, "derived {}", outcome.derived);
    assert!(engine.graph().contains(alice, rdf_type, employee));
    assert!(engine.graph().contains(alice, rdf_type, person));

    // Idempotent: a second full pass derives nothing new.
    let again = engine.infer();
    assert!(again.derived.is_empty());
}

#[test]
fn test_histogram_conservation_across_pipeline() {
    let mut engine = engine();
    for i in 0..50 {
        let s = iri(&engine, &format!("http://ex/s{}", i));
        let p = iri(&engine, "http://ex/age");
        let o = literal(&engine, "30");
        engine.ingest(Triple::new(s, p, o)).unwrap();
    }
    let recorder = engine.metrics();
    let bin_total: u64 = recorder.bins().iter().sum();
    assert_eq!(bin_total, recorder.total_operations());

    let bin_cycles: u64 = recorder
        .bins()
        .iter()
        .enumerate()
        .map(|(i, &c)| i as u64 * c)
        .sum();
    assert_eq!(bin_cycles + recorder.overflow_cycles(), recorder.total_cycles());
}

#[test]
fn test_actor_supervisor_linkage_invariant() {
    let mut engine = engine();
    engine.init().unwrap();
    // Every running actor references a supervisor that manages it.
    for actor in engine.matrix().iter() {
        if actor.state == BehaviorState::Running {
            assert_ne!(actor.supervisor_id, 0);
            let supervisor = engine.supervisors().get(actor.supervisor_id).unwrap();
            assert!(supervisor.managed.contains(&actor.id));
        }
    }
}

#[test]
fn test_supervisor_rate_limit_round_trip() {
    let mut engine = engine();
    let worker = engine.workers()[0];
    let max = engine.config().max_restarts_per_window;

    for _ in 0..max {
        let decision = engine.report_actor_failure(worker, 1).unwrap();
        assert!(decision.success);
    }
    assert_eq!(engine.matrix().get(worker).unwrap().restart_count, max);

    let refused = engine.report_actor_failure(worker, 1).unwrap();
    assert!(!refused.success);
    let supervisor = engine.supervisors().get(engine.root_supervisor()).unwrap();
    assert_eq!(supervisor.failed_recoveries, 1);
}

#[test]
fn test_telemetry_stream_covers_operations() {
    let mut engine = engine().with_sink(Box::new(CollectingSink::default()));

    let s = iri(&engine, "http://ex/s");
    let p = iri(&engine, "http://ex/age");
    let o = literal(&engine, "30");
    engine.ingest(Triple::new(s, p, o)).unwrap();

    // Op traces flowed: at least classify, index, enqueue, dequeue,
    // collapse, behavior, validate, infer.
    assert!(engine.metrics().total_operations() >= 8);
}

#[test]
fn test_gatekeeper_report_renders() {
    let mut engine = engine();
    let s = iri(&engine, "http://ex/s");
    let p = iri(&engine, "http://ex/age");
    let o = literal(&engine, "30");
    engine.ingest(Triple::new(s, p, o)).unwrap();

    let report = engine.gatekeeper();
    let text = report.to_string();
    assert!(text.contains("gatekeeper"));
    assert!(report.stats.total_operations > 0);
}

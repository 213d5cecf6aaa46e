//! Lifecycle tests: questions, forgetting, self-monitoring, persistence,
//! and the observable event stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use doxa::config::KernelConfig;
use doxa::event::KernelEvent;
use doxa::explain::{ExplainFormat, ExplainOptions};
use doxa::kernel::{AddOptions, Kernel};
use doxa::question::{AskOptions, QuestionStatus};
use doxa::term::{TermId, TermKind};
use doxa::truth::Truth;

#[test]
fn question_with_no_match_times_out() {
    let mut k = Kernel::with_defaults();
    k.term("noise");
    let handle = k
        .ask(
            "$x --> unicorn",
            AskOptions {
                timeout_ms: Some(20),
                ..Default::default()
            },
        )
        .unwrap();

    std::thread::sleep(Duration::from_millis(50));
    // The resolver sweep runs on step-count boundaries inside the loop;
    // keep feeding work until one fires.
    for i in 0..30 {
        if handle.status() != QuestionStatus::Pending {
            break;
        }
        k.term(&format!("noise{i}"));
        k.run(10);
    }
    assert_eq!(handle.status(), QuestionStatus::TimedOut);
    assert!(handle.try_result().unwrap().is_err());
}

#[test]
fn cancelled_question_reports_cancelled() {
    let mut k = Kernel::with_defaults();
    let handle = k.ask("$x --> anything", AskOptions::default()).unwrap();
    assert!(k.cancel_question(&handle));
    assert_eq!(handle.status(), QuestionStatus::Cancelled);
}

#[test]
fn forgetting_spares_question_material() {
    let mut k = Kernel::new(KernelConfig {
        min_concepts_for_forgetting: 10,
        ..Default::default()
    })
    .unwrap();

    let keep = k.term("keystone");
    let _pending = k
        .ask(
            "keystone --> $x",
            AskOptions {
                timeout_ms: Some(600_000),
                ..Default::default()
            },
        )
        .unwrap();

    let chaff: Vec<TermId> = (0..20).map(|i| k.term(&format!("chaff{i}"))).collect();
    for id in &chaff {
        k.set_importance(id, 0.0);
    }

    for _ in 0..5 {
        k.run_maintenance();
    }

    assert!(k.contains(&keep));
    assert!(chaff.iter().any(|id| !k.contains(id)));
}

#[test]
fn meta_raises_inference_threshold_under_contradiction_load() {
    let mut k = Kernel::with_defaults();
    let before = k.config().inference_threshold;

    for i in 0..5 {
        let name = format!("fact{i}");
        k.add_hyperedge(
            TermKind::Atom,
            vec![name.clone()],
            AddOptions {
                truth: Some(Truth::new(0.95, 0.9)),
                ..Default::default()
            },
        );
        k.add_hyperedge(
            TermKind::Atom,
            vec![name],
            AddOptions {
                truth: Some(Truth::new(0.05, 0.9)),
                premises: vec![TermId::raw("Term(dissenter)")],
                ..Default::default()
            },
        );
    }
    k.run_maintenance();

    assert!(
        k.config().inference_threshold > before,
        "threshold did not increase: {} -> {}",
        before,
        k.config().inference_threshold
    );
}

#[test]
fn event_stream_covers_the_lifecycle() {
    let mut k = Kernel::with_defaults();
    let beliefs = Arc::new(AtomicUsize::new(0));
    let revisions = Arc::new(AtomicUsize::new(0));
    let contradictions = Arc::new(AtomicUsize::new(0));
    let resolutions = Arc::new(AtomicUsize::new(0));
    let steps = Arc::new(AtomicUsize::new(0));

    {
        let beliefs = Arc::clone(&beliefs);
        let revisions = Arc::clone(&revisions);
        let contradictions = Arc::clone(&contradictions);
        let resolutions = Arc::clone(&resolutions);
        let steps = Arc::clone(&steps);
        k.on_event(move |event| match event {
            KernelEvent::BeliefAdded { .. } => {
                beliefs.fetch_add(1, Ordering::Relaxed);
            }
            KernelEvent::Revision { .. } => {
                revisions.fetch_add(1, Ordering::Relaxed);
            }
            KernelEvent::ContradictionDetected { .. } => {
                contradictions.fetch_add(1, Ordering::Relaxed);
            }
            KernelEvent::ContradictionResolved { .. } => {
                resolutions.fetch_add(1, Ordering::Relaxed);
            }
            KernelEvent::Step { .. } => {
                steps.fetch_add(1, Ordering::Relaxed);
            }
            _ => {}
        });
    }

    k.add_hyperedge(
        TermKind::Atom,
        vec!["observed".into()],
        AddOptions {
            truth: Some(Truth::new(0.9, 0.9)),
            ..Default::default()
        },
    );
    k.add_hyperedge(
        TermKind::Atom,
        vec!["observed".into()],
        AddOptions {
            truth: Some(Truth::new(0.1, 0.9)),
            premises: vec![TermId::raw("Term(other-witness)")],
            ..Default::default()
        },
    );
    k.resolve_contradictions();
    k.run(5);

    assert!(beliefs.load(Ordering::Relaxed) >= 2);
    assert!(revisions.load(Ordering::Relaxed) >= 2);
    assert_eq!(contradictions.load(Ordering::Relaxed), 1);
    assert_eq!(resolutions.load(Ordering::Relaxed), 1);
    assert!(steps.load(Ordering::Relaxed) > 0);
}

#[test]
fn snapshot_file_roundtrip_through_kernel() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("state.json");

    let mut k = Kernel::with_defaults();
    k.nal("whale --> mammal %0.95;0.85%").unwrap();
    k.nal("mammal --> animal %1.0;0.9%").unwrap();
    k.run(30);
    k.save_to(&path).unwrap();

    let mut restored = Kernel::with_defaults();
    restored.restore_from(&path).unwrap();

    for id in [
        "Inheritance(whale,mammal)",
        "Inheritance(mammal,animal)",
        "Inheritance(whale,animal)",
    ] {
        let id = TermId::raw(id);
        assert!(restored.contains(&id), "{id} missing after restore");
    }

    // Derived provenance survives the roundtrip.
    let text = restored
        .explain(
            &TermId::raw("Inheritance(whale,animal)"),
            ExplainOptions {
                format: ExplainFormat::Justification,
                depth: 4,
            },
        )
        .unwrap();
    assert!(text.contains("Inheritance(whale,mammal)"));
}

#[test]
fn restored_kernel_keeps_reasoning() {
    let mut k = Kernel::with_defaults();
    k.nal("a --> b %1.0;0.9%").unwrap();
    let json = k.save().unwrap();

    let mut restored = Kernel::with_defaults();
    restored.restore(&json).unwrap();
    restored.nal("b --> c %1.0;0.9%").unwrap();
    restored.run(30);

    assert!(restored.contains(&TermId::raw("Inheritance(a,c)")));
}

#[test]
fn explain_formats_all_render() {
    let mut k = Kernel::with_defaults();
    k.inheritance("a", "b", Some(Truth::new(1.0, 0.9)));
    k.inheritance("b", "c", Some(Truth::new(1.0, 0.9)));
    k.run(20);

    let id = TermId::raw("Inheritance(a,c)");
    for format in [
        ExplainFormat::Story,
        ExplainFormat::Detailed,
        ExplainFormat::Concise,
        ExplainFormat::Technical,
        ExplainFormat::Justification,
        ExplainFormat::Json,
    ] {
        let text = k
            .explain(&id, ExplainOptions { format, depth: 5 })
            .unwrap();
        assert!(!text.is_empty(), "{format:?} rendered nothing");
    }
}

#[test]
fn config_can_come_from_toml() {
    let config = KernelConfig::from_toml_str(
        r#"
        belief_capacity = 4
        memory_maintenance_interval = 50
        contradiction_threshold = 0.5
        "#,
    )
    .unwrap();
    let mut k = Kernel::new(config).unwrap();

    let id = k.term("narrow");
    for i in 0..10 {
        k.add_hyperedge(
            TermKind::Atom,
            vec!["narrow".into()],
            AddOptions {
                truth: Some(Truth::new(0.6, 0.4)),
                premises: vec![TermId::raw(format!("Term(s{i})"))],
                ..Default::default()
            },
        );
    }
    assert!(k.get_beliefs(&id).len() <= 4);
}

#[test]
fn goals_and_context_boost_importance() {
    let mut k = Kernel::with_defaults();
    let goal_term = k.term("mission");
    k.add_goal(&["mission"], 0.9);
    k.push_context("mission");
    k.run_maintenance();

    // The goal term survives aggressive forgetting pressure.
    let mut config = KernelConfig::default();
    config.min_concepts_for_forgetting = 1;
    let mut pressured = Kernel::new(config).unwrap();
    pressured.term("mission");
    pressured.add_goal(&["mission"], 0.9);
    for _ in 0..3 {
        pressured.run_maintenance();
    }
    assert!(pressured.contains(&TermId::raw("Term(mission)")));
    assert!(k.contains(&goal_term));
}

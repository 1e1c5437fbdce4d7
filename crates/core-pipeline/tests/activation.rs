//! View activation against a real session store.

use core_console::InteractiveChannel;
use core_engine::{EngineClient, MemoryTransport, Request, Stage};
use core_pipeline::{Activation, NavigationContext, Orchestrator};
use core_session::{MemoryStore, SessionStore};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn requests(client: &mut EngineClient<MemoryTransport>) -> Vec<Request> {
    client
        .transport_mut()
        .take_sent()
        .into_iter()
        .map(|(_, r)| r)
        .collect()
}

#[test]
fn gate_skips_exactly_one_activation_per_process() {
    let mut session = SessionStore::new(MemoryStore::new());
    let mut orch = Orchestrator::new(Duration::from_millis(100), true);
    let mut client = EngineClient::new(MemoryTransport::new());
    let mut console = InteractiveChannel::new();

    let first = orch
        .activate(NavigationContext::Semantic, "hp a : 1.", &mut session, &mut client, &mut console)
        .unwrap();
    assert_eq!(first, Activation::FirstLoad);
    assert!(requests(&mut client).is_empty());

    for ctx in [
        NavigationContext::Lexer,
        NavigationContext::Syntax,
        NavigationContext::Semantic,
    ] {
        orch.activate(ctx, "hp a : 1.", &mut session, &mut client, &mut console)
            .unwrap();
        let stages: Vec<Stage> = requests(&mut client)
            .iter()
            .map(|r| match r {
                Request::Lexical(_) => Stage::Lexical,
                Request::Syntax(_) => Stage::Syntax,
                Request::Semantic(_) => Stage::Semantic,
                Request::Execute(_) => Stage::Execute,
                other => panic!("unexpected request {other:?}"),
            })
            .collect();
        assert_eq!(stages, ctx.stages().to_vec(), "stage order for {ctx}");
    }
}

#[test]
fn every_stage_carries_the_full_text() {
    let mut session = SessionStore::new(MemoryStore::new());
    session.observe_activation();
    let mut orch = Orchestrator::new(Duration::from_millis(100), true);
    let mut client = EngineClient::new(MemoryTransport::new());
    let mut console = InteractiveChannel::new();
    let text = "flag x : 5.\nshoot(x).";

    orch.activate(NavigationContext::Overview, text, &mut session, &mut client, &mut console)
        .unwrap();
    assert_eq!(
        requests(&mut client),
        vec![Request::Lexical(text.into()), Request::Execute(text.into())]
    );
}

#[test]
fn restart_gets_a_fresh_gate() {
    let durable = MemoryStore::new();
    let mut first = SessionStore::new(durable.clone());
    assert!(!first.observe_activation());
    assert!(first.observe_activation());

    // A new process starts with an empty process-scoped store.
    let mut second = SessionStore::new(durable);
    let mut orch = Orchestrator::new(Duration::ZERO, true);
    let mut client = EngineClient::new(MemoryTransport::new());
    let mut console = InteractiveChannel::new();
    let a = orch
        .activate(NavigationContext::Lexer, "", &mut second, &mut client, &mut console)
        .unwrap();
    assert_eq!(a, Activation::FirstLoad);
}

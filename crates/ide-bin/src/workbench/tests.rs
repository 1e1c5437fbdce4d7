use super::*;
use core_dialog::PresetPicker;
use core_engine::MemoryTransport;
use core_events::{EngineMessage, KeyModifiers, RequestId};
use core_session::{MemoryStore, TEXT_KEY};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn workbench_with(store: MemoryStore, files: FsFileService<PresetPicker>) -> (Workbench, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(64);
    let wb = Workbench::new(WorkbenchParts {
        context: NavigationContext::Overview,
        session: SessionStore::new(Box::new(store) as Box<dyn DurableStore>),
        client: EngineClient::new(EngineLink::Offline(MemoryTransport::new())),
        engine_online: true,
        orchestrator: Orchestrator::new(Duration::from_millis(5), true),
        files,
        acks: Acknowledgements::new(Duration::from_secs(5)),
        tx,
    });
    (wb, rx)
}

fn workbench() -> (Workbench, mpsc::Receiver<Event>) {
    let (mut wb, rx) = workbench_with(MemoryStore::new(), FsFileService::new(PresetPicker::default()));
    wb.bootstrap();
    (wb, rx)
}

fn sent(wb: &Workbench) -> Vec<(RequestId, Request)> {
    let EngineLink::Offline(transport) = wb.client.transport() else {
        panic!("tests run against the in-memory link");
    };
    transport.sent().to_vec()
}

fn press(wb: &mut Workbench, code: KeyCode) -> LoopControl {
    wb.handle_event(Event::Input(InputEvent::Key(KeyEvent::plain(code))))
}

fn chord(wb: &mut Workbench, c: char) -> LoopControl {
    wb.handle_event(Event::Input(InputEvent::Key(KeyEvent::new(
        KeyCode::Char(c),
        KeyModifiers::CTRL,
    ))))
}

fn type_str(wb: &mut Workbench, text: &str) {
    for c in text.chars() {
        press(wb, KeyCode::Char(c));
    }
}

fn reply(wb: &mut Workbench, request: RequestId, body: EngineBody) {
    wb.handle_event(Event::Engine(EngineEvent::Message(EngineMessage { request, body })));
}

#[tokio::test]
async fn first_activation_issues_nothing() {
    let (wb, _rx) = workbench();
    assert!(sent(&wb).is_empty());
}

#[tokio::test]
async fn explicit_run_resets_settles_then_executes() {
    let (mut wb, mut rx) = workbench();
    type_str(&mut wb, "hp a : 1.");
    press(&mut wb, KeyCode::F(5));

    let requests = sent(&wb);
    assert_eq!(requests.len(), 1);
    let (reset, request) = requests[0].clone();
    assert_eq!(request, Request::Reset);
    assert!(!wb.orchestrator.run_enabled());

    // A second run while the first is in flight is refused.
    press(&mut wb, KeyCode::F(5));
    assert_eq!(sent(&wb).len(), 1);

    reply(&mut wb, reset, EngineBody::ResetComplete);
    let settled = rx.recv().await.expect("settle event");
    assert!(matches!(settled, Event::Pipeline(PipelineEvent::SettleElapsed { run: 1 })));
    wb.handle_event(settled);

    let requests: Vec<Request> = sent(&wb).into_iter().map(|(_, r)| r).collect();
    assert_eq!(
        requests,
        vec![
            Request::Reset,
            Request::Lexical("hp a : 1.".into()),
            Request::Execute("hp a : 1.".into()),
        ]
    );
    let exec = sent(&wb)[2].0;
    reply(&mut wb, exec, EngineBody::ExecutionFinished);
    assert!(wb.orchestrator.run_enabled());
}

/// Run the program through reset and settle until it asks for input.
async fn run_until_prompt(wb: &mut Workbench, rx: &mut mpsc::Receiver<Event>, prompt: &str) -> RequestId {
    press(wb, KeyCode::F(5));
    let reset = sent(wb).last().expect("reset sent").0;
    reply(wb, reset, EngineBody::ResetComplete);
    let settled = rx.recv().await.expect("settle event");
    wb.handle_event(settled);
    let exec = sent(wb).last().expect("execute sent").0;
    reply(wb, exec, EngineBody::Prompt(prompt.into()));
    exec
}

#[tokio::test]
async fn prompt_routes_typing_to_console() {
    let (mut wb, mut rx) = workbench();
    run_until_prompt(&mut wb, &mut rx, "guess: ").await;
    type_str(&mut wb, "42");
    press(&mut wb, KeyCode::Enter);

    assert_eq!(wb.editor.text(), "", "console input must not reach the editor");
    assert_eq!(sent(&wb).last().map(|(_, r)| r.clone()), Some(Request::SubmitInput("42".into())));
    assert!(!wb.console.listener().is_attached());
}

#[tokio::test]
async fn pending_prompt_survives_navigation() {
    let (mut wb, mut rx) = workbench();
    run_until_prompt(&mut wb, &mut rx, "hp: ").await;

    press(&mut wb, KeyCode::F(2));
    assert_eq!(wb.context, NavigationContext::Lexer);
    assert!(wb.console.listener().is_attached());
    assert!(wb.console.buffer().text().contains("hp: "));

    type_str(&mut wb, "10");
    press(&mut wb, KeyCode::Enter);
    assert_eq!(wb.editor.text(), "");
    assert_eq!(sent(&wb).last().map(|(_, r)| r.clone()), Some(Request::SubmitInput("10".into())));
    assert!(!wb.console.listener().is_attached());
}

#[tokio::test]
async fn run_during_prompt_starts_over() {
    let (mut wb, mut rx) = workbench();
    let exec = run_until_prompt(&mut wb, &mut rx, "name: ").await;
    let before = sent(&wb).len();

    press(&mut wb, KeyCode::F(5));
    let requests = sent(&wb);
    assert_eq!(requests.len(), before + 1);
    let (reset, request) = requests[before].clone();
    assert_eq!(request, Request::Reset);
    assert!(!wb.console.listener().is_attached());
    assert_eq!(wb.console.buffer().text(), "");

    // The superseded program is ignored; the new run proceeds to execution.
    reply(&mut wb, exec, EngineBody::ExecutionFinished);
    reply(&mut wb, reset, EngineBody::ResetComplete);
    let settled = rx.recv().await.expect("settle event");
    assert!(matches!(settled, Event::Pipeline(PipelineEvent::SettleElapsed { run: 2 })));
    wb.handle_event(settled);
    assert!(matches!(sent(&wb).last(), Some((_, Request::Execute(_)))));
}

#[tokio::test]
async fn navigation_issues_view_stages_and_drops_stale_results() {
    let (mut wb, _rx) = workbench();
    type_str(&mut wb, "flag x : 5.");
    wb.diagnostics = "old error".into();

    press(&mut wb, KeyCode::F(2));
    assert_eq!(wb.context, NavigationContext::Lexer);
    assert_eq!(wb.diagnostics, "");
    let first = sent(&wb)[0].0;
    assert_eq!(sent(&wb)[0].1, Request::Lexical("flag x : 5.".into()));

    press(&mut wb, KeyCode::F(2));
    let second = sent(&wb)[1].0;

    let stale = EngineBody::Lexemes {
        lexemes: vec!["old".into()],
        tokens: vec!["IDENT".into()],
    };
    reply(&mut wb, first, stale);
    assert!(wb.lexemes.is_empty());

    let fresh = EngineBody::Lexemes {
        lexemes: vec!["flag".into(), "x".into()],
        tokens: vec!["KEYWORD".into(), "IDENT".into()],
    };
    reply(&mut wb, second, fresh);
    assert_eq!(wb.lexemes, vec!["flag".to_string(), "x".to_string()]);

    let frame = wb.render(100, 30);
    assert!(frame.line_text(0).contains("Lexical Analyzer"));
}

#[tokio::test]
async fn declined_new_keeps_the_buffer() {
    let (mut wb, mut rx) = workbench();
    type_str(&mut wb, "hp a : 1.");
    assert!(wb.session.is_modified());

    assert_eq!(chord(&mut wb, 'q'), LoopControl::Continue);
    assert!(wb.dialog.is_open());
    // Typing while the dialog is open answers it; nothing reaches the editor.
    press(&mut wb, KeyCode::Char('n'));
    let resolved = rx.recv().await.expect("dialog answer");
    wb.handle_event(resolved);
    assert_eq!(wb.editor.text(), "hp a : 1.");
    assert!(wb.session.is_modified());

    chord(&mut wb, 'q');
    press(&mut wb, KeyCode::Char('y'));
    let resolved = rx.recv().await.expect("dialog answer");
    wb.handle_event(resolved);
    assert_eq!(wb.editor.text(), "");
    assert!(!wb.session.is_modified());
}

#[tokio::test]
async fn ctrl_c_on_clean_buffer_exits() {
    let (mut wb, _rx) = workbench();
    assert_eq!(
        wb.handle_event(Event::Input(InputEvent::CtrlC)),
        LoopControl::Break(ShutdownReason::Exit)
    );
}

#[tokio::test]
async fn save_without_path_prompts_then_writes() {
    let dir = tempfile::tempdir().unwrap();
    let (mut wb, _rx) = workbench();
    type_str(&mut wb, "hp a : 1.");

    chord(&mut wb, 's');
    assert_eq!(wb.prompt.as_ref().map(|p| p.purpose()), Some(PromptPurpose::SaveAs));
    let target = dir.path().join("demo");
    wb.handle_event(Event::Input(InputEvent::Paste(target.display().to_string())));
    press(&mut wb, KeyCode::Enter);

    assert!(wb.prompt.is_none());
    let saved = dir.path().join("demo.lds");
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), "hp a : 1.");
    assert!(!wb.session.is_modified());
    let ack = wb.acks.current().expect("save acknowledged");
    assert!(ack.text.starts_with("Saved:"));
}

#[tokio::test]
async fn cli_file_wins_over_restored_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.lds");
    std::fs::write(&path, "flag x : 5.\r\n").unwrap();
    let mut store = MemoryStore::new();
    store.put(TEXT_KEY, "hp a : 1.").unwrap();

    let (mut wb, _rx) = workbench_with(store, FsFileService::with_path(PresetPicker::default(), &path));
    wb.bootstrap();
    assert_eq!(wb.editor.text(), "flag x : 5.\n");
    assert!(!wb.session.is_modified());
}

#[tokio::test]
async fn undo_reverts_a_typing_run() {
    let (mut wb, _rx) = workbench();
    type_str(&mut wb, "ab");
    press(&mut wb, KeyCode::Enter);
    type_str(&mut wb, "cd");

    chord(&mut wb, 'z');
    assert_eq!(wb.editor.text(), "ab\n");
    chord(&mut wb, 'z');
    assert_eq!(wb.editor.text(), "ab");
    chord(&mut wb, 'y');
    assert_eq!(wb.editor.text(), "ab\n");
    assert!(wb.editor.caret() <= wb.editor.text().len());
}

#[tokio::test]
async fn paste_normalizes_line_endings() {
    let (mut wb, _rx) = workbench();
    wb.handle_event(Event::Input(InputEvent::Paste("a\r\nb".into())));
    assert_eq!(wb.editor.text(), "a\nb");
    assert!(wb.session.is_modified());
}

#[tokio::test]
async fn disconnect_disables_runs() {
    let (mut wb, _rx) = workbench();
    wb.handle_event(Event::Engine(EngineEvent::Disconnected {
        reason: "engine exited".into(),
    }));
    press(&mut wb, KeyCode::F(5));
    assert!(sent(&wb).is_empty());
    assert!(wb.diagnostics.contains("engine exited"));

    let frame = wb.render(100, 30);
    assert!(frame.line_text(29).contains("engine offline"));
}

#[tokio::test]
async fn quit_and_shutdown_break_the_loop() {
    let (mut wb, _rx) = workbench();
    assert_eq!(
        wb.handle_event(Event::Command(CommandEvent::Quit)),
        LoopControl::Break(ShutdownReason::CommandQuit)
    );
    assert_eq!(
        wb.handle_event(Event::Shutdown),
        LoopControl::Break(ShutdownReason::ShutdownEvent)
    );
}

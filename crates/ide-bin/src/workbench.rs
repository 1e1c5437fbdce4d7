//! IDE state and event handling, independent of the terminal.
//!
//! Key routing order: an open confirmation dialog, then the path prompt, then the shortcut
//! table, then the console (while a program waits for input), then the editor.

use crate::editor::EditorBuffer;
use crate::engine_link::EngineLink;
use crate::prompt::{PathPrompt, PromptOutcome, PromptPurpose};
use core_console::{InteractiveChannel, KeyOutcome};
use core_dialog::{
    AckKind, Acknowledgements, ConfirmDialog, FileAction, FileError, FileGuard, FileOutcome,
    FileService, FsFileService, GuardDecision, PresentationId, PresetPicker, normalize_line_endings,
    perform,
};
use core_engine::{EngineClient, EngineError, Request};
use core_events::{
    CHANNEL_SEND_FAILURES, CommandEvent, EngineBody, EngineEvent, Event, InputEvent, KeyCode,
    KeyEvent, PipelineEvent, send_after,
};
use core_keymap::{Action, Keymap, describe};
use core_pipeline::{Activation, NavigationContext, Orchestrator, PipelineAction, RunStart};
use core_session::{DurableStore, SessionStore};
use core_terminal::{EditorView, Frame, LexemeRow, StatusView, ViewModel, compose};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

const PAGE_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Exit,
    CommandQuit,
    ShutdownEvent,
    ChannelClosed,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::Exit => "exit",
            ShutdownReason::CommandQuit => "command_quit",
            ShutdownReason::ShutdownEvent => "shutdown_event",
            ShutdownReason::ChannelClosed => "channel_closed",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Break(ShutdownReason),
}

/// Collaborators assembled at startup.
pub struct WorkbenchParts {
    pub context: NavigationContext,
    pub session: SessionStore<Box<dyn DurableStore>>,
    pub client: EngineClient<EngineLink>,
    pub engine_online: bool,
    pub orchestrator: Orchestrator,
    pub files: FsFileService<PresetPicker>,
    pub acks: Acknowledgements,
    pub tx: mpsc::Sender<Event>,
}

pub struct Workbench {
    context: NavigationContext,
    editor: EditorBuffer,
    first_line: usize,
    session: SessionStore<Box<dyn DurableStore>>,
    client: EngineClient<EngineLink>,
    engine_online: bool,
    orchestrator: Orchestrator,
    console: InteractiveChannel,
    dialog: ConfirmDialog,
    guard: FileGuard,
    files: FsFileService<PresetPicker>,
    acks: Acknowledgements,
    keymap: Keymap,
    hint: String,
    prompt: Option<PathPrompt>,
    lexemes: Vec<String>,
    tokens: Vec<String>,
    diagnostics: String,
    tx: mpsc::Sender<Event>,
}

impl Workbench {
    pub fn new(parts: WorkbenchParts) -> Self {
        let keymap = Keymap::default();
        let hint = key_hints(&keymap);
        Self {
            context: parts.context,
            editor: EditorBuffer::default(),
            first_line: 0,
            session: parts.session,
            client: parts.client,
            engine_online: parts.engine_online,
            orchestrator: parts.orchestrator,
            console: InteractiveChannel::new(),
            dialog: ConfirmDialog::new(),
            guard: FileGuard::new(),
            files: parts.files,
            acks: parts.acks,
            keymap,
            hint,
            prompt: None,
            lexemes: Vec::new(),
            tokens: Vec::new(),
            diagnostics: String::new(),
            tx: parts.tx,
        }
    }

    /// Pick the startup document and run the initial activation (which the lifecycle gate turns
    /// into a no-op on a fresh process).
    ///
    /// A file named on the command line wins over the persisted session text.
    pub fn bootstrap(&mut self) {
        let restored = self.session.initialize();
        let text = match self.files.load_current() {
            Ok(Some(text)) => {
                self.session.load_document(&text);
                if let Some(path) = self.files.current_path() {
                    self.acks.info(format!("Opened: {}", path.display()));
                }
                text
            }
            Ok(None) => restored.unwrap_or_default(),
            Err(e) => {
                self.acks.error(e.to_string());
                restored.unwrap_or_default()
            }
        };
        self.editor = EditorBuffer::new(text);
        if !self.engine_online {
            self.diagnostics = "Engine unavailable: analysis and execution are disabled".to_string();
        }
        self.activate();
    }

    pub fn handle_event(&mut self, event: Event) -> LoopControl {
        match event {
            Event::Input(input) => self.handle_input(input),
            Event::Engine(engine) => {
                self.handle_engine(engine);
                LoopControl::Continue
            }
            Event::Pipeline(PipelineEvent::SettleElapsed { run }) => {
                if let Err(e) = self
                    .orchestrator
                    .on_settled(run, self.editor.text(), &mut self.client)
                {
                    self.engine_failure(&e);
                }
                LoopControl::Continue
            }
            Event::Command(CommandEvent::DialogResolved {
                presentation,
                accepted,
            }) => match self.guard.resolve(presentation, accepted) {
                Some(action) => self.proceed(action),
                None => LoopControl::Continue,
            },
            Event::Command(CommandEvent::Quit) => LoopControl::Break(ShutdownReason::CommandQuit),
            Event::Tick => {
                self.acks.on_tick(Instant::now());
                LoopControl::Continue
            }
            Event::Shutdown => LoopControl::Break(ShutdownReason::ShutdownEvent),
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Input
    // ---------------------------------------------------------------------------------------------

    fn handle_input(&mut self, input: InputEvent) -> LoopControl {
        match input {
            InputEvent::Key(key) => self.handle_key(key),
            // Ctrl-C goes through the same guard as the exit shortcut.
            InputEvent::CtrlC => self.request_file_action(FileAction::Exit),
            InputEvent::Paste(text) => {
                self.handle_paste(&text);
                LoopControl::Continue
            }
            InputEvent::Resize(..) => LoopControl::Continue,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> LoopControl {
        if self.dialog.handle_key(key) {
            return LoopControl::Continue;
        }
        if let Some(prompt) = self.prompt.as_mut() {
            return match prompt.handle_key(key) {
                PromptOutcome::Pending => LoopControl::Continue,
                PromptOutcome::Cancelled => {
                    self.prompt = None;
                    LoopControl::Continue
                }
                PromptOutcome::Submitted(path) => {
                    let purpose = prompt.purpose();
                    self.prompt = None;
                    self.submit_path(purpose, path)
                }
            };
        }
        if let Some(action) = self.keymap.resolve(key) {
            return self.run_action(action);
        }
        if self.console.listener().is_attached() {
            match self.console.on_key(key) {
                KeyOutcome::Submitted(line) => {
                    if let Err(e) = self.client.issue(Request::SubmitInput(line)) {
                        self.engine_failure(&e);
                    }
                }
                KeyOutcome::Consumed | KeyOutcome::Ignored => {}
            }
            return LoopControl::Continue;
        }
        self.edit_key(key);
        LoopControl::Continue
    }

    fn handle_paste(&mut self, text: &str) {
        if self.dialog.is_open() {
            return;
        }
        if let Some(prompt) = self.prompt.as_mut() {
            prompt.paste(text);
            return;
        }
        if self.console.on_paste(text) {
            return;
        }
        let (text, _) = normalize_line_endings(text);
        self.session
            .history_mut()
            .push_discrete_edit(self.editor.text(), self.editor.caret());
        self.editor.insert_str(&text);
        self.session.on_edit(self.editor.text());
    }

    fn edit_key(&mut self, key: KeyEvent) {
        let history = self.session.history_mut();
        let (text, caret) = (self.editor.text(), self.editor.caret());
        let changed = if let Some(c) = key.printable() {
            history.begin_insert_run(text, caret);
            self.editor.insert_char(c);
            true
        } else {
            match key.code {
                KeyCode::Backspace if caret > 0 => {
                    history.begin_insert_run(text, caret);
                    self.editor.backspace()
                }
                KeyCode::Delete if caret < text.len() => {
                    history.push_discrete_edit(text, caret);
                    self.editor.delete()
                }
                KeyCode::Enter => {
                    history.push_discrete_edit(text, caret);
                    self.editor.insert_char('\n');
                    true
                }
                KeyCode::Tab => {
                    history.push_discrete_edit(text, caret);
                    self.editor.insert_char('\t');
                    true
                }
                code => {
                    history.end_insert_run();
                    self.move_caret(code);
                    false
                }
            }
        };
        if changed {
            self.session.on_edit(self.editor.text());
        }
    }

    fn move_caret(&mut self, code: KeyCode) {
        match code {
            KeyCode::Left => self.editor.move_left(),
            KeyCode::Right => self.editor.move_right(),
            KeyCode::Up => self.editor.move_up(1),
            KeyCode::Down => self.editor.move_down(1),
            KeyCode::PageUp => self.editor.move_up(PAGE_LINES),
            KeyCode::PageDown => self.editor.move_down(PAGE_LINES),
            KeyCode::Home => self.editor.move_home(),
            KeyCode::End => self.editor.move_end(),
            _ => {}
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Actions
    // ---------------------------------------------------------------------------------------------

    fn run_action(&mut self, action: Action) -> LoopControl {
        debug!(target: "runtime", action = action.label(), "action");
        match action {
            Action::NewFile => return self.request_file_action(FileAction::New),
            Action::OpenFile => return self.request_file_action(FileAction::Open),
            Action::Exit => return self.request_file_action(FileAction::Exit),
            Action::Save => {
                if self.files.current_path().is_some() {
                    let result = self.files.save(self.editor.text());
                    self.finish_save(result);
                } else {
                    self.prompt = Some(PathPrompt::new(PromptPurpose::SaveAs, ""));
                }
            }
            Action::SaveAs => {
                let suggested = self
                    .files
                    .current_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                self.prompt = Some(PathPrompt::new(PromptPurpose::SaveAs, suggested));
            }
            Action::Run => self.run(),
            Action::Navigate(ctx) => self.navigate(ctx),
            Action::Undo | Action::Redo => {
                let (text, caret) = self.editor.parts_mut();
                let changed = if action == Action::Undo {
                    self.session.undo(text, caret)
                } else {
                    self.session.redo(text, caret)
                };
                self.editor.clamp_caret();
                if !changed {
                    debug!(target: "session.history", action = action.label(), "nothing_to_apply");
                }
            }
            Action::ClearConsole => self.console.clear(),
        }
        LoopControl::Continue
    }

    fn run(&mut self) {
        if !self.engine_online {
            self.acks.error("Engine unavailable");
            return;
        }
        match self.orchestrator.begin_run(&mut self.client, &mut self.console) {
            Ok(RunStart::Started { run }) => debug!(target: "runtime", run, "run_requested"),
            Ok(RunStart::Refused(_)) => self.acks.info("A run is already starting"),
            Err(e) => self.engine_failure(&e),
        }
    }

    /// Switch views the way a page navigation would: park the session, present empty analysis
    /// panes, restore history, then let the orchestrator decide what to issue. The console and
    /// any pending prompt belong to the run and survive navigation.
    fn navigate(&mut self, ctx: NavigationContext) {
        self.session.on_explicit_persist(self.editor.text());
        info!(target: "runtime", from = self.context.as_str(), to = ctx.as_str(), "navigate");
        self.context = ctx;
        self.lexemes.clear();
        self.tokens.clear();
        self.diagnostics.clear();
        self.session.restore_history();
        self.activate();
    }

    fn activate(&mut self) {
        match self.orchestrator.activate(
            self.context,
            self.editor.text(),
            &mut self.session,
            &mut self.client,
            &mut self.console,
        ) {
            Ok(Activation::Issued(issued)) => {
                debug!(target: "runtime", view = self.context.as_str(), stages = issued.len(), "activated")
            }
            Ok(Activation::FirstLoad | Activation::Disabled) => {}
            Err(e) => self.engine_failure(&e),
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Files
    // ---------------------------------------------------------------------------------------------

    fn request_file_action(&mut self, action: FileAction) -> LoopControl {
        match self
            .guard
            .request(action, self.session.is_modified(), &mut self.dialog)
        {
            GuardDecision::Proceed(action) => self.proceed(action),
            GuardDecision::Confirm {
                presentation,
                answer,
            } => {
                self.await_answer(presentation, answer);
                LoopControl::Continue
            }
        }
    }

    /// The answer arrives on a oneshot; relay it into the loop so it is handled like any other
    /// event.
    fn await_answer(&self, presentation: PresentationId, answer: oneshot::Receiver<bool>) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let accepted = answer.await.unwrap_or(false);
            let event = Event::Command(CommandEvent::DialogResolved {
                presentation,
                accepted,
            });
            if tx.send(event).await.is_err() {
                CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
            }
        });
    }

    fn proceed(&mut self, action: FileAction) -> LoopControl {
        if action == FileAction::Open {
            self.prompt = Some(PathPrompt::new(PromptPurpose::Open, ""));
            return LoopControl::Continue;
        }
        let outcome = perform(action, &mut self.files);
        self.apply_outcome(action, outcome)
    }

    fn submit_path(&mut self, purpose: PromptPurpose, path: PathBuf) -> LoopControl {
        self.files.picker_mut().set(path);
        match purpose {
            PromptPurpose::Open => {
                let outcome = perform(FileAction::Open, &mut self.files);
                self.apply_outcome(FileAction::Open, outcome)
            }
            PromptPurpose::SaveAs => {
                let result = self.files.save_as(self.editor.text());
                self.finish_save(result);
                LoopControl::Continue
            }
        }
    }

    fn apply_outcome(&mut self, action: FileAction, outcome: Result<FileOutcome, FileError>) -> LoopControl {
        match outcome {
            Ok(FileOutcome::Loaded(text)) => {
                self.load_document(text);
                match self.files.current_path() {
                    Some(path) if action == FileAction::Open => {
                        self.acks.info(format!("Opened: {}", path.display()))
                    }
                    _ => self.acks.info("New file"),
                }
            }
            Ok(FileOutcome::Cancelled) => self.acks.info("Open cancelled"),
            Ok(FileOutcome::Exit) => return LoopControl::Break(ShutdownReason::Exit),
            Err(e) => self.acks.error(e.to_string()),
        }
        LoopControl::Continue
    }

    fn finish_save(&mut self, result: Result<bool, FileError>) {
        match result {
            Ok(true) => {
                self.session.mark_clean();
                let shown = self
                    .files
                    .current_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                self.acks.info(format!("Saved: {shown}"));
            }
            Ok(false) => self.acks.info("Save cancelled"),
            Err(e) => self.acks.error(e.to_string()),
        }
    }

    fn load_document(&mut self, text: String) {
        self.session.load_document(&text);
        self.editor.set_text(text);
        self.first_line = 0;
        self.lexemes.clear();
        self.tokens.clear();
        self.diagnostics.clear();
    }

    // ---------------------------------------------------------------------------------------------
    // Engine
    // ---------------------------------------------------------------------------------------------

    fn handle_engine(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Message(message) => {
                let Some(message) = self.client.accept(message) else {
                    return;
                };
                match self.orchestrator.on_message(&message) {
                    PipelineAction::ScheduleSettle { run, delay } => {
                        send_after(
                            self.tx.clone(),
                            delay,
                            Event::Pipeline(PipelineEvent::SettleElapsed { run }),
                        );
                    }
                    PipelineAction::RunFinished { run } => debug!(target: "runtime", run, "run_finished"),
                    PipelineAction::None => {}
                }
                self.show(message.body);
            }
            EngineEvent::Disconnected { reason } => {
                warn!(target: "engine", reason = reason.as_str(), "engine_disconnected");
                self.client.on_disconnected();
                self.orchestrator.on_transport_failure();
                self.engine_online = false;
                self.diagnostics = format!("Engine disconnected: {reason}");
            }
        }
    }

    fn show(&mut self, body: EngineBody) {
        match body {
            EngineBody::Lexemes { lexemes, tokens } => {
                self.lexemes = lexemes;
                self.tokens = tokens;
            }
            EngineBody::Diagnostic(text) => self.diagnostics = text,
            EngineBody::DiagnosticsCleared => self.diagnostics.clear(),
            EngineBody::Output(text) => self.console.on_output(&text),
            EngineBody::Prompt(text) => {
                self.console.on_input_requested(&text);
            }
            EngineBody::Terminal(text) => self.console.on_terminal_output(&text),
            EngineBody::ExecutionFinished | EngineBody::ResetComplete => {}
        }
    }

    fn engine_failure(&mut self, error: &EngineError) {
        warn!(target: "engine", error = %error, "engine_request_failed");
        self.orchestrator.on_transport_failure();
        self.diagnostics = format!("Engine unavailable: {error}");
    }

    // ---------------------------------------------------------------------------------------------
    // View
    // ---------------------------------------------------------------------------------------------

    pub fn render(&mut self, width: u16, height: u16) -> Frame {
        let composed = {
            let rows: Vec<LexemeRow<'_>> = self
                .lexemes
                .iter()
                .zip(&self.tokens)
                .map(|(lexeme, token)| LexemeRow { lexeme, token })
                .collect();
            let title = format!("Ludus IDE | {}", self.context.title());
            let file_label = self
                .files
                .current_path()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "untitled".to_string());
            let run_label = if !self.engine_online {
                "engine offline"
            } else if self.orchestrator.run_enabled() {
                "ready"
            } else {
                "running"
            };
            let view = ViewModel {
                title: &title,
                editor: EditorView {
                    text: self.editor.text(),
                    caret: self.editor.line_col(),
                    first_line: self.first_line,
                    file_label: &file_label,
                    modified: self.session.is_modified(),
                },
                console: self.console.buffer().text(),
                console_focused: self.console.buffer().is_focused(),
                lexemes: &rows,
                diagnostics: &self.diagnostics,
                status: StatusView {
                    hint: &self.hint,
                    run_label,
                    ack: self
                        .acks
                        .current()
                        .map(|a| (a.text.as_str(), a.kind == AckKind::Error)),
                    prompt: self.prompt.as_ref().map(|p| (p.purpose().label(), p.input())),
                },
                dialog: self.dialog.question(),
            };
            compose(&view, width, height)
        };
        self.first_line = composed.editor_first_line;
        composed.frame
    }

    pub fn shutdown_engine(&mut self) {
        self.client.transport_mut().shutdown();
    }

    /// Write the edits of the last event batch to durable storage.
    pub fn sync_session(&mut self) {
        self.session.sync();
    }
}

fn key_hints(keymap: &Keymap) -> String {
    [
        Action::Run,
        Action::Save,
        Action::OpenFile,
        Action::NewFile,
        Action::Exit,
    ]
    .into_iter()
    .filter_map(|action| {
        keymap
            .bindings_for(action)
            .first()
            .map(|chord| format!("{} {}", describe(*chord), action.label()))
    })
    .chain(std::iter::once("F1-F4 views".to_string()))
    .collect::<Vec<_>>()
    .join("  ")
}

#[cfg(test)]
mod tests;

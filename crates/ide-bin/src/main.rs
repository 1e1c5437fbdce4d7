//! Ludus IDE entrypoint.
mod editor;
mod engine_link;
mod prompt;
mod workbench;

use anyhow::Result;
use clap::Parser;
use core_config::{Config, load_from};
use core_dialog::{Acknowledgements, FsFileService, PresetPicker};
use core_engine::{EngineClient, StdioTransport};
use core_events::{
    CHANNEL_SEND_FAILURES, ENGINE_MESSAGES_STALE, ENGINE_MESSAGES_TOTAL, EVENT_CHANNEL_CAP, Event,
    EventSourceRegistry, InputEvent, KEYPRESS_TOTAL, TickEventSource,
};
use core_pipeline::{NavigationContext, Orchestrator};
use core_session::{DurableStore, FileDurableStore, SessionStore};
use core_terminal::{CrosstermBackend, Painter, TerminalBackend};
use engine_link::EngineLink;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;
use workbench::{LoopControl, ShutdownReason, Workbench, WorkbenchParts};

const LOG_FILE: &str = "ludus-ide.log";
const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "ludus-ide", version, about = "Terminal IDE for the Ludus language")]
struct Args {
    /// Source file to open at startup. Missing files are created on first save.
    pub path: Option<PathBuf>,
    /// Configuration file (overrides discovery of `ludus.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Initial view: overview, lexer, syntax or semantic.
    #[arg(long = "view", default_value = "overview")]
    pub view: NavigationContext,
    /// Engine command (overrides `[engine].command`).
    #[arg(long = "engine")]
    pub engine: Option<String>,
}

struct AppStartup {
    backend: CrosstermBackend,
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self {
            backend: CrosstermBackend::new(),
            log_guard: None,
        }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join(LOG_FILE);
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        if tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .with_ansi(false)
            .try_init()
            .is_ok()
        {
            self.log_guard = Some(guard);
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

/// Start the engine process. When that fails the IDE still opens, with analysis and execution
/// disabled.
fn connect_engine(config: &Config, tx: &mpsc::Sender<Event>) -> (EngineLink, bool) {
    let engine = &config.file.engine;
    match StdioTransport::spawn(&engine.command, &engine.args, tx.clone()) {
        Ok(transport) => {
            info!(target: "engine", command = engine.command.as_str(), "engine_started");
            (EngineLink::Stdio(transport), true)
        }
        Err(e) => {
            warn!(target: "engine", command = engine.command.as_str(), error = %e, "engine_unavailable");
            (EngineLink::offline(), false)
        }
    }
}

fn build_workbench(args: &Args, config: &Config, tx: &mpsc::Sender<Event>) -> Workbench {
    let (link, engine_online) = connect_engine(config, tx);
    let durable: Box<dyn DurableStore> =
        Box::new(FileDurableStore::open(&config.file.session.resolved_data_dir()));
    let files = match &args.path {
        Some(path) => FsFileService::with_path(PresetPicker::default(), path),
        None => FsFileService::new(PresetPicker::default()),
    };
    let pipeline = &config.file.pipeline;
    let mut workbench = Workbench::new(WorkbenchParts {
        context: args.view,
        session: SessionStore::new(durable),
        client: EngineClient::new(link),
        engine_online,
        orchestrator: Orchestrator::new(pipeline.settle_delay(), pipeline.auto_run),
        files,
        acks: Acknowledgements::new(config.file.ui.ack_timeout()),
        tx: tx.clone(),
    });
    workbench.bootstrap();
    workbench
}

fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

struct IdeRuntime {
    workbench: Workbench,
    backend_size: (u16, u16),
    painter: Painter,
    rx: mpsc::Receiver<Event>,
    source_handles: Vec<tokio::task::JoinHandle<()>>,
    input_task: Option<tokio::task::JoinHandle<()>>,
    input_shutdown: Option<core_input::AsyncInputShutdown>,
}

impl IdeRuntime {
    async fn run(&mut self) -> Result<()> {
        self.paint()?;

        let mut shutdown_reason = ShutdownReason::ChannelClosed;
        'events: while let Some(event) = self.rx.recv().await {
            let mut next = Some(event);
            // Drain whatever is already queued so a burst of keys costs one paint.
            while let Some(event) = next {
                if let Event::Input(InputEvent::Resize(w, h)) = &event {
                    self.backend_size = (*w, *h);
                    self.painter.invalidate();
                }
                if let LoopControl::Break(reason) = self.workbench.handle_event(event) {
                    shutdown_reason = reason;
                    break 'events;
                }
                next = self.rx.try_recv().ok();
            }
            // One durable write per burst, not per keystroke.
            self.workbench.sync_session();
            if let Err(e) = self.paint() {
                error!(target: "runtime", error = %e, "paint_failed");
            }
        }

        self.rx.close();
        self.finalize_shutdown(shutdown_reason).await;
        Ok(())
    }

    fn paint(&mut self) -> Result<()> {
        let (w, h) = self.backend_size;
        let frame = self.workbench.render(w, h);
        let mut out = std::io::stdout().lock();
        let written = self.painter.paint(frame, &mut out)?;
        out.flush()?;
        trace!(target: "runtime", rows = written, "painted");
        Ok(())
    }

    async fn finalize_shutdown(&mut self, reason: ShutdownReason) {
        log_shutdown_stage(reason, "begin");

        while let Some(handle) = self.source_handles.pop() {
            handle.abort();
            match tokio::time::timeout(Duration::from_millis(200), handle).await {
                Ok(Ok(_)) => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_stopped"
                ),
                Ok(Err(err)) if err.is_cancelled() => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_cancelled"
                ),
                Ok(Err(err)) => error!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    ?err,
                    "event_source_task_error"
                ),
                Err(_) => warn!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_timeout"
                ),
            }
        }

        if let Some(shutdown) = self.input_shutdown.take() {
            trace!(target: "runtime.shutdown", reason = reason.as_str(), "input_task_shutdown_signal");
            shutdown.signal();
        }
        if let Some(handle) = self.input_task.take() {
            match handle.await {
                Ok(_) => trace!(target: "runtime.shutdown", reason = reason.as_str(), "input_task_joined"),
                Err(err) if err.is_cancelled() => {
                    trace!(target: "runtime.shutdown", reason = reason.as_str(), "input_task_cancelled")
                }
                Err(err) => error!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    ?err,
                    "input_task_join_failed"
                ),
            }
        }

        log_shutdown_stage(reason, "session");
        self.workbench.sync_session();

        log_shutdown_stage(reason, "engine");
        self.workbench.shutdown_engine();

        info!(
            target: "runtime.shutdown",
            keypresses = KEYPRESS_TOTAL.load(Ordering::Relaxed),
            engine_messages = ENGINE_MESSAGES_TOTAL.load(Ordering::Relaxed),
            engine_stale = ENGINE_MESSAGES_STALE.load(Ordering::Relaxed),
            send_failures = CHANNEL_SEND_FAILURES.load(Ordering::Relaxed),
            "counters"
        );
        log_shutdown_stage(reason, "complete");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut startup = AppStartup::new();
    startup.configure_logging()?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    let config = load_from(args.config.clone())?.with_engine_command(args.engine.clone());
    info!(
        target: "runtime.startup",
        config = config.source.as_ref().map(|p| p.display().to_string()).as_deref(),
        view = args.view.as_str(),
        "config_loaded"
    );

    startup.backend.set_title("Ludus IDE")?;
    let backend_size = startup.backend.size()?;
    let _terminal_guard = startup.backend.enter_guard()?;

    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
    let workbench = build_workbench(&args, &config, &tx);
    let (input_task, input_shutdown) = core_input::spawn_async_input(tx.clone());
    let mut registry = EventSourceRegistry::new();
    registry.register(TickEventSource::new(TICK_INTERVAL));
    let source_handles = registry.spawn_all(&tx);
    // The workbench keeps its own sender for timers and dialog answers.
    drop(tx);

    let mut runtime = IdeRuntime {
        workbench,
        backend_size,
        painter: Painter::new(),
        rx,
        source_handles,
        input_task: Some(input_task),
        input_shutdown: Some(input_shutdown),
    };
    runtime.run().await
}

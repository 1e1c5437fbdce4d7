use crate::key_token::{is_interrupt, key_kind_label, map_key_event};
use crate::log_paste;
use core_events::{
    ASYNC_INPUT_STARTS, ASYNC_INPUT_STOP_CHANNEL, ASYNC_INPUT_STOP_ERROR, ASYNC_INPUT_STOP_SIGNAL,
    ASYNC_INPUT_STOP_STREAM, CHANNEL_SEND_FAILURES, Event, InputEvent, KEYPRESS_TOTAL,
};
use crossterm::event::{
    DisableBracketedPaste, EnableBracketedPaste, Event as CEvent, EventStream, KeyEvent as CKeyEvent,
};
use std::io;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::{Notify, mpsc::Sender};
use tokio::task;
use tokio_stream::StreamExt;
use tracing::{debug, info, trace, warn};

#[derive(Clone, Debug)]
pub struct AsyncInputShutdown {
    notify: Arc<Notify>,
}

impl AsyncInputShutdown {
    pub fn signal(&self) {
        self.notify.notify_one();
    }
}

#[derive(Clone, Debug)]
struct ShutdownListener {
    notify: Arc<Notify>,
}

impl ShutdownListener {
    fn new_pair() -> (AsyncInputShutdown, Self) {
        let notify = Arc::new(Notify::new());
        (
            AsyncInputShutdown {
                notify: notify.clone(),
            },
            ShutdownListener { notify },
        )
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Spawn the input task. Bracketed paste is enabled for the task's lifetime so a pasted program
/// arrives as one `Paste` event instead of a burst of keystrokes.
pub(crate) fn spawn_async_event_task(
    sender: Sender<Event>,
) -> (task::JoinHandle<()>, AsyncInputShutdown) {
    let (shutdown, listener) = ShutdownListener::new_pair();
    let handle = task::spawn(async move {
        let span = tracing::debug_span!(target: "input.thread", "input_async_task");
        let _enter = span.enter();

        if let Err(join_err) = task::spawn_blocking(|| set_bracketed_paste(true)).await {
            debug!(target: "input.paste", ?join_err, "enable_failed_join");
        }

        let stream = EventStream::new();
        AsyncEventStreamTask::new(sender, stream, listener)
            .run()
            .await;

        if let Err(join_err) = task::spawn_blocking(|| set_bracketed_paste(false)).await {
            debug!(target: "input.paste", ?join_err, "disable_failed_join");
        }
    });

    (handle, shutdown)
}

fn set_bracketed_paste(enabled: bool) {
    let result = if enabled {
        crossterm::execute!(io::stdout(), EnableBracketedPaste)
    } else {
        crossterm::execute!(io::stdout(), DisableBracketedPaste)
    };
    if let Err(e) = result {
        debug!(target: "input.paste", enabled, ?e, "toggle_failed");
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExitReason {
    Running,
    ShutdownSignal,
    ChannelClosed,
    StreamEnded,
    StreamError,
}

impl ExitReason {
    fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Running => "running",
            ExitReason::ShutdownSignal => "shutdown_signal",
            ExitReason::ChannelClosed => "channel_closed",
            ExitReason::StreamEnded => "stream_ended",
            ExitReason::StreamError => "stream_error",
        }
    }

    fn record(self) {
        let counter = match self {
            ExitReason::ShutdownSignal => &ASYNC_INPUT_STOP_SIGNAL,
            ExitReason::ChannelClosed => &ASYNC_INPUT_STOP_CHANNEL,
            ExitReason::StreamEnded => &ASYNC_INPUT_STOP_STREAM,
            ExitReason::StreamError => &ASYNC_INPUT_STOP_ERROR,
            ExitReason::Running => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

struct AsyncEventStreamTask<S>
where
    S: tokio_stream::Stream<Item = io::Result<CEvent>> + Send + Unpin + 'static,
{
    sender: Sender<Event>,
    stream: S,
    shutdown: ShutdownListener,
    exit_reason: ExitReason,
    stream_error: Option<io::ErrorKind>,
}

impl<S> AsyncEventStreamTask<S>
where
    S: tokio_stream::Stream<Item = io::Result<CEvent>> + Send + Unpin + 'static,
{
    fn new(sender: Sender<Event>, stream: S, shutdown: ShutdownListener) -> Self {
        Self {
            sender,
            stream,
            shutdown,
            exit_reason: ExitReason::Running,
            stream_error: None,
        }
    }

    async fn run(mut self) {
        info!(target: "input.thread", "async_input_task_started");
        ASYNC_INPUT_STARTS.fetch_add(1, Ordering::Relaxed);
        self.exit_reason = ExitReason::StreamEnded;
        loop {
            let maybe_result = tokio::select! {
                biased;
                _ = self.shutdown.wait() => {
                    self.exit_reason = ExitReason::ShutdownSignal;
                    break;
                }
                result = self.stream.next() => result,
            };

            let Some(result) = maybe_result else {
                break;
            };

            let keep_going = match result {
                Ok(CEvent::Key(key)) => self.handle_key_event(key).await,
                Ok(CEvent::Resize(w, h)) => {
                    trace!(target: "input.event", w, h, "resize");
                    self.send_event(Event::Input(InputEvent::Resize(w, h))).await
                }
                Ok(CEvent::Paste(data)) => {
                    log_paste(&data);
                    self.send_event(Event::Input(InputEvent::Paste(data))).await
                }
                // Focus and mouse events are not used.
                Ok(_) => true,
                Err(err) => {
                    self.exit_reason = ExitReason::StreamError;
                    self.stream_error = Some(err.kind());
                    false
                }
            };
            if !keep_going {
                break;
            }
        }

        let reason = match self.exit_reason {
            ExitReason::Running => ExitReason::StreamEnded,
            other => other,
        };
        reason.record();

        if reason == ExitReason::StreamError {
            warn!(target: "input.thread", error_kind = ?self.stream_error, "async_input_task_stream_error");
        }

        info!(target: "input.thread", reason = reason.as_str(), "async_input_task_stopped");
    }

    async fn handle_key_event(&mut self, key: CKeyEvent) -> bool {
        if is_interrupt(&key) && map_key_event(&key).is_some() {
            trace!(target: "input.event", kind = "ctrl_c", "interrupt");
            return self.send_event(Event::Input(InputEvent::CtrlC)).await;
        }
        let Some(mapped) = map_key_event(&key) else {
            return true;
        };
        KEYPRESS_TOTAL.fetch_add(1, Ordering::Relaxed);
        trace!(
            target: "input.event",
            kind = "keypress",
            key_kind = key_kind_label(&mapped),
            mods = mapped.mods.bits(),
            "key"
        );
        self.send_event(Event::Input(InputEvent::Key(mapped))).await
    }

    async fn send_event(&mut self, event: Event) -> bool {
        if self.sender.send(event).await.is_ok() {
            return true;
        }
        CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
        if self.exit_reason != ExitReason::ShutdownSignal {
            self.exit_reason = ExitReason::ChannelClosed;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_events::{KeyCode, KeyEvent, KeyModifiers};
    use crossterm::event::{KeyCode as CKeyCode, KeyEventKind as CKind, KeyModifiers as CMods};
    use std::sync::Mutex;
    use tokio::sync::{Mutex as TokioMutex, mpsc};
    use tokio::time::{Duration, timeout};
    use tokio_stream::wrappers::UnboundedReceiverStream;
    use tracing::field::{Field, Visit};
    use tracing::{Metadata, Subscriber, subscriber::Interest};
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::Registry;

    static LOG_CAPTURE_GUARD: TokioMutex<()> = TokioMutex::const_new(());

    #[derive(Clone, Default)]
    struct LogCapture {
        events: Arc<Mutex<Vec<CapturedLog>>>,
    }

    #[derive(Clone, Debug)]
    struct CapturedLog {
        target: String,
        fields: Vec<(String, String)>,
    }

    impl CapturedLog {
        fn field(&self, name: &str) -> Option<&str> {
            self.fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.trim_matches('"'))
        }
    }

    #[derive(Default)]
    struct LogVisitor {
        fields: Vec<(String, String)>,
    }

    impl Visit for LogVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }

    impl<S> Layer<S> for LogCapture
    where
        S: Subscriber,
    {
        fn register_callsite(&self, _metadata: &'static Metadata<'static>) -> Interest {
            Interest::always()
        }

        fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
            metadata.target().starts_with("input.")
        }

        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = LogVisitor::default();
            event.record(&mut visitor);
            self.events.lock().unwrap().push(CapturedLog {
                target: event.metadata().target().to_string(),
                fields: visitor.fields,
            });
        }
    }

    /// Route `input.*` events into a shared vec until the returned guard drops.
    fn capture_input_logs() -> (Arc<Mutex<Vec<CapturedLog>>>, tracing::dispatcher::DefaultGuard) {
        let capture = LogCapture::default();
        let events = capture.events.clone();
        let subscriber = Registry::default().with(capture.with_filter(LevelFilter::TRACE));
        (events, tracing::subscriber::set_default(subscriber))
    }

    fn press(code: CKeyCode, mods: CMods) -> CEvent {
        CEvent::Key(CKeyEvent::new(code, mods))
    }

    async fn run_scenario(events: Vec<CEvent>) -> Vec<Event> {
        let (tx, mut rx) = mpsc::channel(64);
        let stream = tokio_stream::iter(events.into_iter().map(Ok));
        let (_shutdown, listener) = ShutdownListener::new_pair();
        AsyncEventStreamTask::new(tx, stream, listener).run().await;

        let mut outputs = Vec::new();
        while let Some(evt) = rx.recv().await {
            outputs.push(evt);
        }
        outputs
    }

    #[tokio::test]
    async fn forwards_key_events_in_order() {
        let base_total = KEYPRESS_TOTAL.load(Ordering::Relaxed);
        let outputs = run_scenario(vec![
            press(CKeyCode::Char('h'), CMods::NONE),
            press(CKeyCode::Char('p'), CMods::NONE),
            press(CKeyCode::F(5), CMods::NONE),
        ])
        .await;

        let keys: Vec<KeyEvent> = outputs
            .into_iter()
            .filter_map(|e| match e {
                Event::Input(InputEvent::Key(k)) => Some(k),
                _ => None,
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                KeyEvent::plain(KeyCode::Char('h')),
                KeyEvent::plain(KeyCode::Char('p')),
                KeyEvent::plain(KeyCode::F(5)),
            ]
        );
        assert!(KEYPRESS_TOTAL.load(Ordering::Relaxed) >= base_total + 3);
    }

    #[tokio::test]
    async fn release_events_are_dropped() {
        let mut release = CKeyEvent::new(CKeyCode::Char('x'), CMods::NONE);
        release.kind = CKind::Release;
        let outputs = run_scenario(vec![CEvent::Key(release), CEvent::FocusGained]).await;
        assert!(outputs.is_empty(), "unexpected outputs: {outputs:?}");
    }

    #[tokio::test]
    async fn forwards_ctrl_c() {
        let outputs = run_scenario(vec![press(CKeyCode::Char('c'), CMods::CONTROL)]).await;
        assert!(matches!(outputs.as_slice(), [Event::Input(InputEvent::CtrlC)]));
    }

    #[tokio::test]
    async fn forwards_save_as_chord() {
        let outputs = run_scenario(vec![press(
            CKeyCode::Char('S'),
            CMods::CONTROL | CMods::SHIFT,
        )])
        .await;
        match outputs.as_slice() {
            [Event::Input(InputEvent::Key(k))] => {
                assert_eq!(k.code, KeyCode::Char('S'));
                assert_eq!(k.mods, KeyModifiers::CTRL | KeyModifiers::SHIFT);
            }
            other => panic!("unexpected output sequence: {other:?}"),
        }
    }

    #[tokio::test]
    async fn forwards_resize_event() {
        let outputs = run_scenario(vec![CEvent::Resize(120, 48)]).await;
        assert!(matches!(
            outputs.as_slice(),
            [Event::Input(InputEvent::Resize(120, 48))]
        ));
    }

    #[tokio::test]
    async fn paste_arrives_whole_and_is_not_logged() {
        let _serial = LOG_CAPTURE_GUARD.lock().await;
        let (events_handle, _dispatch) = capture_input_logs();

        let payload = "hp player : 10.\nprint player.\n".to_string();
        let outputs = run_scenario(vec![CEvent::Paste(payload.clone())]).await;
        match outputs.as_slice() {
            [Event::Input(InputEvent::Paste(data))] => assert_eq!(data, &payload),
            other => panic!("unexpected output sequence: {other:?}"),
        }

        let logs = events_handle.lock().unwrap();
        let paste_log = logs
            .iter()
            .find(|entry| entry.target == "input.paste")
            .unwrap_or_else(|| panic!("missing input.paste log, captured: {logs:?}"));
        assert_eq!(paste_log.field("paste_len"), Some(payload.len().to_string().as_str()));
        for entry in logs.iter() {
            for (_, value) in &entry.fields {
                assert!(!value.contains("player"), "leaked paste content: {value}");
            }
        }
    }

    #[tokio::test]
    async fn keypress_log_omits_character() {
        let _serial = LOG_CAPTURE_GUARD.lock().await;
        let (events_handle, _dispatch) = capture_input_logs();

        run_scenario(vec![press(CKeyCode::Char('q'), CMods::NONE)]).await;

        let logs = events_handle.lock().unwrap();
        let key_log = logs
            .iter()
            .find(|entry| entry.target == "input.event")
            .unwrap_or_else(|| panic!("missing input.event log, captured: {logs:?}"));
        assert_eq!(key_log.field("kind"), Some("keypress"));
        assert_eq!(key_log.field("key_kind"), Some("char"));
        assert!(key_log.fields.iter().all(|(_, v)| !v.contains("'q'")));
    }

    #[tokio::test]
    async fn logs_startup_and_shutdown_reason_on_signal() {
        let _serial = LOG_CAPTURE_GUARD.lock().await;
        let (events_handle, _dispatch) = capture_input_logs();

        let base_start = ASYNC_INPUT_STARTS.load(Ordering::Relaxed);
        let base_signal = ASYNC_INPUT_STOP_SIGNAL.load(Ordering::Relaxed);

        let (tx, rx) = mpsc::channel(1);
        let (event_tx, event_rx) = mpsc::unbounded_channel::<io::Result<CEvent>>();
        let stream = UnboundedReceiverStream::new(event_rx);
        let (shutdown, listener) = ShutdownListener::new_pair();

        let notifier = shutdown.clone();
        let signal_task = tokio::spawn(async move {
            tokio::task::yield_now().await;
            notifier.signal();
        });

        let _keep_alive = event_tx;
        AsyncEventStreamTask::new(tx, stream, listener).run().await;
        signal_task.await.unwrap();
        drop(rx);

        let logged = events_handle.lock().unwrap();
        assert!(
            logged
                .iter()
                .any(|e| e.target == "input.thread" && e.field("message") == Some("async_input_task_started")),
            "missing async_input_task_started log, captured events: {:?}",
            *logged
        );
        let stop_event = logged
            .iter()
            .find(|e| e.target == "input.thread" && e.field("message") == Some("async_input_task_stopped"))
            .unwrap_or_else(|| panic!("missing async_input_task_stopped log: {:?}", *logged));
        assert_eq!(stop_event.field("reason"), Some("shutdown_signal"));

        assert!(ASYNC_INPUT_STARTS.load(Ordering::Relaxed) > base_start);
        assert!(ASYNC_INPUT_STOP_SIGNAL.load(Ordering::Relaxed) > base_signal);
    }

    #[tokio::test]
    async fn channel_closed_increments_telemetry() {
        let base_channel = ASYNC_INPUT_STOP_CHANNEL.load(Ordering::Relaxed);
        let base_failures = CHANNEL_SEND_FAILURES.load(Ordering::Relaxed);

        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let stream = tokio_stream::iter(vec![Ok(CEvent::Resize(10, 10))]);
        let (_shutdown, listener) = ShutdownListener::new_pair();
        AsyncEventStreamTask::new(tx, stream, listener).run().await;

        assert!(ASYNC_INPUT_STOP_CHANNEL.load(Ordering::Relaxed) > base_channel);
        assert!(CHANNEL_SEND_FAILURES.load(Ordering::Relaxed) > base_failures);
    }

    #[tokio::test]
    async fn stream_error_stops_task() {
        let base_error = ASYNC_INPUT_STOP_ERROR.load(Ordering::Relaxed);
        let (tx, mut rx) = mpsc::channel(4);
        let stream = tokio_stream::iter(vec![
            Err(io::Error::other("tty gone")),
            Ok(CEvent::Resize(1, 1)),
        ]);
        let (_shutdown, listener) = ShutdownListener::new_pair();
        AsyncEventStreamTask::new(tx, stream, listener).run().await;

        assert!(rx.recv().await.is_none(), "events after the error must not be forwarded");
        assert!(ASYNC_INPUT_STOP_ERROR.load(Ordering::Relaxed) > base_error);
    }

    #[tokio::test]
    async fn shutdown_signal_exits_immediately() {
        let (tx, mut rx) = mpsc::channel(1);
        let (event_tx, event_rx) = mpsc::unbounded_channel::<io::Result<CEvent>>();
        let stream = UnboundedReceiverStream::new(event_rx);
        let (shutdown, listener) = ShutdownListener::new_pair();

        let task = tokio::spawn(async move {
            let _keep_alive = event_tx;
            AsyncEventStreamTask::new(tx, stream, listener).run().await;
        });

        shutdown.signal();

        timeout(Duration::from_millis(50), task)
            .await
            .expect("shutdown should resolve promptly")
            .expect("task join failed");

        assert!(rx.recv().await.is_none());
    }
}

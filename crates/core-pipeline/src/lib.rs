//! Pipeline orchestration: which analysis stages run, when, and in what order.
//!
//! Two entry points:
//! - [`Orchestrator::activate`] runs once per view activation. The very first activation of the
//!   process issues nothing; later ones issue the view's fixed stage sequence.
//! - [`Orchestrator::begin_run`] starts an explicit run: clear the console, reset the engine,
//!   wait for the reset to land plus a settle delay, then issue lexical analysis and execution.
//!
//! The orchestrator never sleeps and never renders. Settle delays come back as
//! [`PipelineAction::ScheduleSettle`] for the caller to turn into a timed event; results are
//! rendered by whoever consumes the engine events.

mod context;

pub use context::{NavigationContext, ParseContextError};

use core_console::InteractiveChannel;
use core_engine::{EngineClient, EngineError, EngineTransport, Request, RequestId, Stage};
use core_events::{EngineBody, EngineMessage};
use core_session::{DurableStore, SessionStore};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Source of the process lifecycle flag.
pub trait ActivationGate {
    /// True when an activation was already observed in this process. Always records this one.
    fn observe_activation(&mut self) -> bool;
}

impl<D: DurableStore> ActivationGate for SessionStore<D> {
    fn observe_activation(&mut self) -> bool {
        SessionStore::observe_activation(self)
    }
}

/// Explicit run lifecycle. `Idle` and `Executing` accept a new run; a run that is still
/// resetting or settling refuses one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Resetting {
        run: u64,
        reset: RequestId,
    },
    Settling {
        run: u64,
    },
    Executing {
        run: u64,
        exec: RequestId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// First activation of the process: nothing issued.
    FirstLoad,
    /// Auto-run switched off in configuration.
    Disabled,
    Issued(Vec<(Stage, RequestId)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStart {
    Started { run: u64 },
    /// A run is already in flight.
    Refused(RunState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineAction {
    None,
    ScheduleSettle { run: u64, delay: Duration },
    RunFinished { run: u64 },
}

#[derive(Debug)]
pub struct Orchestrator {
    state: RunState,
    runs: u64,
    auto_run: bool,
    settle_delay: Duration,
}

impl Orchestrator {
    pub fn new(settle_delay: Duration, auto_run: bool) -> Self {
        Self {
            state: RunState::Idle,
            runs: 0,
            auto_run,
            settle_delay,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Whether no run is in flight.
    pub fn run_enabled(&self) -> bool {
        self.state == RunState::Idle
    }

    /// Whether an explicit run may start now. An executing program, including one blocked on a
    /// prompt, is superseded by a new run.
    pub fn can_start_run(&self) -> bool {
        matches!(self.state, RunState::Idle | RunState::Executing { .. })
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// View activation. Sends the full editor text to every stage of `ctx` in order.
    ///
    /// When the sequence includes execution it counts as a run: the console is reset first and
    /// the run control stays disabled until the program finishes. If an explicit run is already
    /// in flight the execution stage is skipped.
    pub fn activate<G, T>(
        &mut self,
        ctx: NavigationContext,
        text: &str,
        gate: &mut G,
        client: &mut EngineClient<T>,
        console: &mut InteractiveChannel,
    ) -> Result<Activation, EngineError>
    where
        G: ActivationGate + ?Sized,
        T: EngineTransport,
    {
        let already_active = gate.observe_activation();
        if !already_active {
            info!(target: "pipeline", view = ctx.as_str(), "first_activation_skipped");
            return Ok(Activation::FirstLoad);
        }
        if !self.auto_run {
            debug!(target: "pipeline", view = ctx.as_str(), "auto_run_disabled");
            return Ok(Activation::Disabled);
        }
        let mut issued = Vec::with_capacity(ctx.stages().len());
        for &stage in ctx.stages() {
            if stage == Stage::Execute {
                if !self.run_enabled() {
                    debug!(target: "pipeline", state = ?self.state, "execute_skipped_run_in_flight");
                    continue;
                }
                console.reset();
                let exec = client.issue(Request::for_stage(stage, text))?;
                self.runs += 1;
                self.state = RunState::Executing { run: self.runs, exec };
                issued.push((stage, exec));
                continue;
            }
            let id = client.issue(Request::for_stage(stage, text))?;
            issued.push((stage, id));
        }
        info!(
            target: "pipeline",
            view = ctx.as_str(),
            stages = issued.len(),
            text_len = text.len(),
            "activation_issued"
        );
        Ok(Activation::Issued(issued))
    }

    /// Explicit run. Clears the console and tears down any pending prompt before the reset is
    /// sent, so no stale prompt survives into the new run. Refused while a previous run is still
    /// resetting or settling.
    pub fn begin_run<T: EngineTransport>(
        &mut self,
        client: &mut EngineClient<T>,
        console: &mut InteractiveChannel,
    ) -> Result<RunStart, EngineError> {
        if !self.can_start_run() {
            warn!(target: "pipeline", state = ?self.state, "run_refused_in_flight");
            return Ok(RunStart::Refused(self.state));
        }
        if let RunState::Executing { run, exec } = self.state {
            info!(target: "pipeline", run, exec = exec.0, "run_superseded");
        }
        console.reset();
        let reset = client.issue(Request::Reset)?;
        self.runs += 1;
        let run = self.runs;
        self.state = RunState::Resetting { run, reset };
        info!(target: "pipeline", run, reset = reset.0, "run_started");
        Ok(RunStart::Started { run })
    }

    /// Advance the run state machine on an accepted engine message.
    pub fn on_message(&mut self, message: &EngineMessage) -> PipelineAction {
        match (self.state, &message.body) {
            (RunState::Resetting { run, reset }, EngineBody::ResetComplete) if reset == message.request => {
                self.state = RunState::Settling { run };
                debug!(target: "pipeline", run, delay_ms = self.settle_delay.as_millis() as u64, "reset_complete_settling");
                PipelineAction::ScheduleSettle {
                    run,
                    delay: self.settle_delay,
                }
            }
            (RunState::Executing { run, exec }, EngineBody::ExecutionFinished) if exec == message.request => {
                self.state = RunState::Idle;
                info!(target: "pipeline", run, "run_finished");
                PipelineAction::RunFinished { run }
            }
            _ => PipelineAction::None,
        }
    }

    /// Settle delay elapsed: issue lexical analysis then execution. Returns the execution id, or
    /// `None` when `run` is not the run currently settling.
    pub fn on_settled<T: EngineTransport>(
        &mut self,
        run: u64,
        text: &str,
        client: &mut EngineClient<T>,
    ) -> Result<Option<RequestId>, EngineError> {
        match self.state {
            RunState::Settling { run: current } if current == run => {}
            other => {
                debug!(target: "pipeline", run, state = ?other, "settle_ignored");
                return Ok(None);
            }
        }
        let issued = client
            .issue_stage(Stage::Lexical, text)
            .and_then(|_| client.issue_stage(Stage::Execute, text));
        match issued {
            Ok(exec) => {
                self.state = RunState::Executing { run, exec };
                info!(target: "pipeline", run, exec = exec.0, text_len = text.len(), "run_executing");
                Ok(Some(exec))
            }
            Err(e) => {
                self.state = RunState::Idle;
                Err(e)
            }
        }
    }

    /// Transport lost or a request failed: give the run control back.
    pub fn on_transport_failure(&mut self) {
        if self.state != RunState::Idle {
            warn!(target: "pipeline", state = ?self.state, "run_aborted_transport_failure");
        }
        self.state = RunState::Idle;
    }
}

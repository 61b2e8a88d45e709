//! Core chat session management.
//!
//! This module provides the `ChatSession` struct which owns the transcript and drives one
//! request/response cycle per user turn: it starts the progress indicator, calls the transport,
//! stops the indicator before anything else is printed, collects the reply, and commits it or
//! reports a classified failure.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::chat::config::ChatConfig;
use crate::collector::StreamCollector;
use crate::error::{Error, FailureClass, Result};
use crate::observability::{SESSION_CYCLE_FAILURES, SESSION_CYCLES, SESSION_TIMEOUTS, SESSION_TTFR};
use crate::progress::ProgressIndicator;
use crate::render::Renderer;
use crate::transcript::Transcript;
use crate::transport::{Reply, Transport};
use crate::types::Turn;

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// An assistant turn was committed.
    Answered {
        /// Time from the start of the cycle until the model started answering.
        elapsed: Duration,
    },

    /// Nothing was committed; the error was reported to the renderer.
    Failed {
        /// The classification of the failure.
        class: FailureClass,
        /// The line that was reported.
        message: String,
    },
}

impl CycleOutcome {
    /// True if an assistant turn was committed.
    pub fn is_answered(&self) -> bool {
        matches!(self, CycleOutcome::Answered { .. })
    }
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// The model used for the session.
    pub model: String,
    /// The number of turns in the transcript, including the system turn.
    pub turn_count: usize,
    /// Cycles run so far.
    pub cycles: u64,
    /// Cycles that ended without an answer.
    pub failures: u64,
    /// Time to first response of the last answered cycle.
    pub last_elapsed: Option<Duration>,
}

/// A chat session that manages conversation state and API interactions.
pub struct ChatSession<T: Transport> {
    transport: T,
    config: ChatConfig,
    transcript: Transcript,
    cycles: u64,
    failures: u64,
    last_elapsed: Option<Duration>,
}

impl<T: Transport> ChatSession<T> {
    /// Creates a new session whose transcript holds only the configured system prompt.
    pub fn new(transport: T, config: ChatConfig) -> Self {
        let transcript = Transcript::new(config.system_prompt.clone());
        Self {
            transport,
            config,
            transcript,
            cycles: 0,
            failures: 0,
            last_elapsed: None,
        }
    }

    /// Appends a user turn and runs one cycle for it.
    ///
    /// The user turn stays in the transcript whether or not the cycle succeeds, so a retry
    /// resends it as context.
    pub async fn send(&mut self, user_input: &str, renderer: &mut dyn Renderer) -> CycleOutcome {
        self.transcript.append(Turn::user(user_input));
        self.run_cycle(renderer).await
    }

    /// Runs one request/response cycle over the current transcript.
    ///
    /// Failures never escape: they are classified, reported through the renderer, and returned
    /// as [`CycleOutcome::Failed`].
    pub async fn run_cycle(&mut self, renderer: &mut dyn Renderer) -> CycleOutcome {
        self.cycles += 1;
        SESSION_CYCLES.click();

        let clock_start = Instant::now();
        let mut indicator = ProgressIndicator::start(
            clock_start,
            self.config.progress_interval,
            renderer.progress_sink(),
        );
        debug!(
            cycle = self.cycles,
            turns = self.transcript.len(),
            "starting cycle"
        );

        let result = self.exchange(clock_start, &mut indicator, renderer).await;
        // Already stopped on the success path; failures may arrive before that.
        indicator.stop().await;

        match result {
            Ok((turn, elapsed)) => {
                self.transcript.append(turn);
                self.last_elapsed = Some(elapsed);
                renderer.finish_response(elapsed, &self.transcript);
                info!(
                    cycle = self.cycles,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "cycle answered"
                );
                CycleOutcome::Answered { elapsed }
            }
            Err(err) => {
                self.failures += 1;
                SESSION_CYCLE_FAILURES.click();
                let class = err.class();
                let message = format!("{}: {}", class.label(), err);
                error!(cycle = self.cycles, class = ?class, "cycle failed: {err}");
                renderer.clear_progress();
                renderer.print_error(&message);
                CycleOutcome::Failed { class, message }
            }
        }
    }

    async fn exchange(
        &self,
        clock_start: Instant,
        indicator: &mut ProgressIndicator,
        renderer: &mut dyn Renderer,
    ) -> Result<(Turn, Duration)> {
        let pending = self
            .transport
            .send(self.transcript.turns(), self.config.streaming);
        let reply = match tokio::time::timeout(self.config.timeout, pending).await {
            Ok(reply) => reply?,
            Err(_) => {
                SESSION_TIMEOUTS.click();
                return Err(Error::timeout(
                    "the model did not start answering",
                    Some(self.config.timeout.as_secs_f64()),
                ));
            }
        };
        let elapsed = clock_start.elapsed();
        SESSION_TTFR.add(elapsed.as_secs_f64());

        indicator.stop().await;
        renderer.begin_answer();

        let turn = match reply {
            Reply::Stream(stream) => {
                StreamCollector::new()
                    .collect(stream, renderer)
                    .await?
            }
            Reply::Complete(turn) => {
                if turn.content().is_empty() {
                    return Err(Error::empty_response("the model returned no content"));
                }
                renderer.print_text(turn.content());
                Turn::assistant(turn.content())
            }
        };
        Ok((turn, elapsed))
    }

    /// Resets the transcript to the system turn.
    pub fn clear(&mut self) {
        self.transcript.reset_to_initial();
    }

    /// The conversation so far.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Turns worth showing to a person, in order.
    pub fn visible_history(&self) -> impl Iterator<Item = &Turn> + '_ {
        self.transcript.visible_history()
    }

    /// The model answering this session.
    pub fn model(&self) -> &str {
        self.transport.model()
    }

    /// The configuration this session was built with.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            model: self.model().to_string(),
            turn_count: self.transcript.len(),
            cycles: self.cycles,
            failures: self.failures,
            last_elapsed: self.last_elapsed,
        }
    }
}

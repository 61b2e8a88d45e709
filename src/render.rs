//! Output rendering for chat sessions.
//!
//! The session engine writes everything the user sees through a [`Renderer`].  The progress
//! indicator writes through a separate [`ProgressSink`] obtained from the renderer, because it
//! runs on its own task; the engine joins that task before touching the renderer again.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use serde_json::json;

use crate::progress::{NullProgress, ProgressSink};
use crate::transcript::Transcript;

/// ANSI escape code for dim text (used for progress and timing).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for the answer label).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Return to column zero and erase the line.
const CLEAR_LINE: &str = "\r\x1b[2K";

/// Label printed before each answer.
const ANSWER_LABEL: &str = "Assistant:";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Server-sent events for an HTTP response body
pub trait Renderer: Send {
    /// A sink for the progress indicator of the next cycle.
    fn progress_sink(&self) -> Box<dyn ProgressSink>;

    /// Remove any progress output still visible.
    ///
    /// Sinks handed out before this call must not write anything afterwards, even if their
    /// indicator task is still running.
    fn clear_progress(&mut self);

    /// Called once the model has started answering, before the first chunk.
    fn begin_answer(&mut self);

    /// Print a chunk of response text.
    ///
    /// This is called incrementally as fragments arrive, in arrival order.
    fn print_text(&mut self, text: &str);

    /// Called when a response is complete and committed to `transcript`.
    ///
    /// `elapsed` is the time the model took to start answering.
    fn finish_response(&mut self, elapsed: Duration, transcript: &Transcript);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);
}

/// Plain text renderer with optional ANSI styling.
///
/// This renderer outputs text directly to stdout and errors to stderr.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    progress_visible: Arc<AtomicBool>,
    progress_generation: Arc<AtomicU64>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            progress_visible: Arc::new(AtomicBool::new(false)),
            progress_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn progress_sink(&self) -> Box<dyn ProgressSink> {
        Box::new(TerminalProgress {
            stdout: io::stdout(),
            use_color: self.use_color,
            visible: Arc::clone(&self.progress_visible),
            current: Arc::clone(&self.progress_generation),
            generation: self.progress_generation.load(Ordering::Acquire),
        })
    }

    fn clear_progress(&mut self) {
        // Sinks check the generation under the same lock, so none can write after this.
        let mut out = self.stdout.lock();
        self.progress_generation.fetch_add(1, Ordering::AcqRel);
        if self.progress_visible.swap(false, Ordering::AcqRel) {
            let _ = write!(out, "{CLEAR_LINE}");
            let _ = out.flush();
        }
    }

    fn begin_answer(&mut self) {
        self.clear_progress();
        if self.use_color {
            println!("{ANSI_BOLD}{ANSWER_LABEL}{ANSI_RESET}");
        } else {
            println!("{ANSWER_LABEL}");
        }
        self.flush();
    }

    fn print_text(&mut self, text: &str) {
        print!("{text}");
        self.flush();
    }

    fn finish_response(&mut self, elapsed: Duration, _: &Transcript) {
        println!();
        if self.use_color {
            println!("{ANSI_DIM}({:.2}s){ANSI_RESET}", elapsed.as_secs_f64());
        } else {
            println!("({:.2}s)", elapsed.as_secs_f64());
        }
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.clear_progress();
        if self.use_color {
            eprintln!("\n{ANSI_RED}Error:{ANSI_RESET} {error}");
        } else {
            eprintln!("\nError: {error}");
        }
    }

    fn print_info(&mut self, info: &str) {
        println!("{info}");
    }
}

/// Writes an overwritable "waiting" line to the terminal until the renderer clears progress.
struct TerminalProgress {
    stdout: Stdout,
    use_color: bool,
    visible: Arc<AtomicBool>,
    current: Arc<AtomicU64>,
    generation: u64,
}

impl ProgressSink for TerminalProgress {
    fn show_elapsed(&mut self, elapsed: Duration) -> io::Result<()> {
        let secs = elapsed.as_secs_f64();
        let mut out = self.stdout.lock();
        if self.current.load(Ordering::Acquire) != self.generation {
            return Ok(());
        }
        if self.use_color {
            write!(
                out,
                "{CLEAR_LINE}{ANSI_DIM}Waiting for response... {secs:.1}s{ANSI_RESET}"
            )?;
        } else {
            write!(out, "{CLEAR_LINE}Waiting for response... {secs:.1}s")?;
        }
        out.flush()?;
        self.visible.store(true, Ordering::Release);
        Ok(())
    }
}

/// Frames chat output as server-sent events.
///
/// Each answer chunk becomes `data: {"response": <chunk>, "done": false}` and a completed answer
/// ends with `data: {"response": "", "done": true, "elapsed": <seconds>, "history": [...]}`,
/// where `history` is the visible conversation so a stateless client can continue it.  Progress
/// is not framed.
pub struct EventStreamRenderer<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> EventStreamRenderer<W> {
    /// Creates a renderer writing events to `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn event(&mut self, payload: serde_json::Value) {
        let _ = write!(self.writer, "data: {payload}\n\n");
        let _ = self.writer.flush();
    }
}

impl<W: Write + Send> Renderer for EventStreamRenderer<W> {
    fn progress_sink(&self) -> Box<dyn ProgressSink> {
        Box::new(NullProgress)
    }

    fn clear_progress(&mut self) {}

    fn begin_answer(&mut self) {}

    fn print_text(&mut self, text: &str) {
        self.event(json!({"response": text, "done": false}));
    }

    fn finish_response(&mut self, elapsed: Duration, transcript: &Transcript) {
        let history: Vec<_> = transcript.visible_history().collect();
        self.event(json!({
            "response": "",
            "done": true,
            "elapsed": elapsed.as_secs_f64(),
            "history": history,
        }));
    }

    fn print_error(&mut self, error: &str) {
        self.event(json!({"error": error}));
    }

    fn print_info(&mut self, info: &str) {
        self.event(json!({"info": info}));
    }
}

//! Terminal helpers shared by the demo binaries.

use std::fmt::Display;
use std::io::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use strandline_core::{Agent, AgentResponse, TranscriptSource};

const BAR_CHAR: &str = "▎";

/// Loads `.env` if present and installs the log subscriber.
///
/// Logging is configured through `RUST_LOG`.
pub fn init() {
    // A missing `.env` is fine.
    let _ = dotenv::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

#[derive(Default)]
struct ConsoleState {
    spinner: Option<ProgressBar>,
    // An assistant line has been started and not yet terminated.
    streaming: bool,
}

/// Prints agent activity, with a spinner while the model is thinking.
#[derive(Clone, Default)]
pub struct Console {
    state: Arc<Mutex<ConsoleState>>,
}

impl Console {
    /// Creates a new console.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a callback for
    /// [`AgentBuilder::on_transcript`](strandline_core::AgentBuilder::on_transcript).
    pub fn transcript_handler(
        &self,
    ) -> impl Fn(&str, TranscriptSource) + Send + Sync + 'static {
        let console = self.clone();
        move |text, source| console.on_transcript(text, source)
    }

    /// Sends `prompt` to `agent` and prints the exchange.
    ///
    /// Failures are printed rather than returned, so callers can go on
    /// with their next prompt.
    pub async fn ask(
        &self,
        agent: &mut Agent,
        prompt: &str,
    ) -> Option<AgentResponse> {
        println!("{}🧑 {}", BAR_CHAR.bright_green(), prompt.bright_white());
        self.start_thinking();
        let result = agent.run(prompt).await;
        self.finish();

        match result {
            Ok(resp) => {
                if resp.text.is_empty() {
                    println!("{}🤖 (no answer)", BAR_CHAR.bright_cyan());
                }
                println!();
                Some(resp)
            }
            Err(err) => {
                print_error(&err);
                println!();
                None
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ConsoleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_thinking(&self) {
        let style = ProgressStyle::with_template("{spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.set_message("🤔 Thinking...");
        spinner.enable_steady_tick(Duration::from_millis(100));

        let mut state = self.lock();
        if let Some(old) = state.spinner.replace(spinner) {
            old.finish_and_clear();
        }
    }

    fn stop_spinner(state: &mut ConsoleState) {
        if let Some(spinner) = state.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn on_transcript(&self, text: &str, source: TranscriptSource) {
        let mut state = self.lock();
        match source {
            // Already printed by `ask`.
            TranscriptSource::User => {}
            TranscriptSource::Assistant => {
                Self::stop_spinner(&mut state);
                if !state.streaming {
                    print!("{}🤖 ", BAR_CHAR.bright_cyan());
                    state.streaming = true;
                }
                print!("{}", text.bright_white());
                std::io::stdout().flush().ok();
            }
            TranscriptSource::Tool => {
                Self::stop_spinner(&mut state);
                if state.streaming {
                    println!();
                    state.streaming = false;
                }
                println!("{}🔧 {}", BAR_CHAR.bright_yellow(), text.dimmed());
                drop(state);
                // The model is called again with the tool output.
                self.start_thinking();
            }
        }
    }

    fn finish(&self) {
        let mut state = self.lock();
        Self::stop_spinner(&mut state);
        if state.streaming {
            println!();
            state.streaming = false;
        }
    }
}

/// Prints an error line.
pub fn print_error(err: &dyn Display) {
    eprintln!("{}❌ {err}", BAR_CHAR.bright_red());
}

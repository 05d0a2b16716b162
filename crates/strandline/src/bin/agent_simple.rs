//! Asks a local Ollama model about agentic AI.

use strandline::cli::{self, Console, print_error};
use strandline::core::AgentBuilder;
use strandline_ollama_model::OllamaProvider;

const PROMPT: &str = "Tell me about agentic AI";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    cli::init();

    let provider = match OllamaProvider::from_env() {
        Ok(provider) => provider,
        Err(err) => {
            print_error(&err);
            return;
        }
    };

    let console = Console::new();
    let mut agent = AgentBuilder::with_model_provider(provider)
        .on_transcript(console.transcript_handler())
        .build();
    console.ask(&mut agent, PROMPT).await;
}

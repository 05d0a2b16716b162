//! A local Ollama agent equipped with a calculator and a clock.

use strandline::cli::{self, Console, print_error};
use strandline::core::AgentBuilder;
use strandline::tools::{CalculatorTool, CurrentTimeTool};
use strandline_ollama_model::OllamaProvider;

const SYSTEM_PROMPT: &str = "You are a helpful assistant. \
Use the `calculator` tool for any arithmetic and the `current_time` tool \
whenever the date or time matters. Answer briefly.";

const QUESTIONS: [&str; 2] = [
    "What is the square root of 1764?",
    "What time is it right now?",
];

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
        .with_system_prompt(SYSTEM_PROMPT)
        .with_tool(CalculatorTool::new())
        .with_tool(CurrentTimeTool::from_env())
        .on_transcript(console.transcript_handler())
        .build();

    for question in QUESTIONS {
        console.ask(&mut agent, question).await;
    }
}

//! Calls a Bedrock model directly, then reports the current time.

use strandline::cli::{self, print_error};
use strandline::core::Tool;
use strandline::invoke_bedrock;
use strandline::tools::{CurrentTimeParameters, CurrentTimeTool};

const QUESTION: &str = "What is the square root of 1764?";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    cli::init();

    // Failures are reported as the answer so that the time still prints.
    let answer = match invoke_bedrock(QUESTION).await {
        Ok(answer) => answer,
        Err(err) => err.to_string(),
    };
    println!("{answer}");

    let clock = CurrentTimeTool::from_env();
    match clock.execute(CurrentTimeParameters::default()).await {
        Ok(time) => println!("The current time is: {time}"),
        Err(err) => print_error(&err),
    }
}

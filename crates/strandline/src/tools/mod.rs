//! A set of built-in tools that models can use.

mod calculator;
mod current_time;
mod invoke_bedrock;

pub use calculator::{CalculatorParameters, CalculatorTool};
pub use current_time::{CurrentTimeParameters, CurrentTimeTool};
pub use invoke_bedrock::{InvokeBedrockParameters, InvokeBedrockTool};

use serde_json::json;
use strandline::core::AgentBuilder;
use strandline::tools::{CalculatorTool, CurrentTimeTool};
use strandline_model::{ModelMessage, ToolCallRequest};
use strandline_test_model::{PresetEvent, PresetResponse, TestModelProvider};

fn tool_results(messages: &[ModelMessage]) -> Vec<(String, bool)> {
    messages
        .iter()
        .filter_map(|msg| match msg {
            ModelMessage::Tool(result) => {
                Some((result.content.clone(), result.is_error))
            }
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_square_root_and_time() {
    let mut provider = TestModelProvider::default();
    provider.add_response_step(PresetResponse::with_events([
        PresetEvent::ToolCall(ToolCallRequest {
            id: "call_0".to_owned(),
            name: "calculator".to_owned(),
            arguments: json!({ "expression": "sqrt(1764)" }),
        }),
        PresetEvent::ToolCall(ToolCallRequest {
            id: "call_1".to_owned(),
            name: "current_time".to_owned(),
            arguments: json!({ "timezone": "+05:30" }),
        }),
    ]));
    provider.add_response_step(PresetResponse::with_text(
        "The square root of 1764 is 42.",
    ));

    let mut agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(CalculatorTool::new())
        .with_tool(CurrentTimeTool::new())
        .build();
    let resp = agent
        .run("What is the square root of 1764, and what time is it in India?")
        .await
        .unwrap();
    assert_eq!(resp.to_string(), "The square root of 1764 is 42.");

    let requests = provider.requests();
    let tool_names: Vec<_> =
        requests[0].tools.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(tool_names, ["calculator", "current_time"]);
    assert_eq!(
        requests[0].tools[0].parameters["properties"]["expression"]["type"],
        "string"
    );

    let results = tool_results(&requests[1].messages);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0], ("42".to_owned(), false));
    assert!(results[1].0.ends_with("+05:30"), "{}", results[1].0);
    assert!(!results[1].1);
}

#[tokio::test]
async fn test_bad_expression_is_reported_to_model() {
    let mut provider = TestModelProvider::default();
    provider.add_response_step(PresetResponse::with_events([
        PresetEvent::ToolCall(ToolCallRequest {
            id: "call_0".to_owned(),
            name: "calculator".to_owned(),
            arguments: json!({ "expression": "1 +" }),
        }),
    ]));
    provider.add_response_step(PresetResponse::with_events([
        PresetEvent::ToolCall(ToolCallRequest {
            id: "call_1".to_owned(),
            name: "calculator".to_owned(),
            arguments: json!({ "formula": "1 + 1" }),
        }),
    ]));
    provider.add_response_step(PresetResponse::with_text("Sorry, I failed."));

    let mut agent = AgentBuilder::with_model_provider(provider.clone())
        .with_tool(CalculatorTool::new())
        .build();
    let resp = agent.run("What is 1 plus?").await.unwrap();
    assert_eq!(resp.text, "Sorry, I failed.");
    assert_eq!(resp.tool_calls.len(), 2);

    let results = tool_results(&provider.requests()[2].messages);
    assert_eq!(results.len(), 2);
    assert!(results[0].1);
    assert!(results[0].0.starts_with("Execution error: "), "{}", results[0].0);
    assert!(results[1].1);
    assert!(results[1].0.starts_with("Invalid input: "), "{}", results[1].0);
}

use evalexpr::{
    EvalexprResult, HashMapContext, Value as ExprValue,
    context_map, eval_with_context,
};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use strandline_core::tool::{Error as ToolError, Tool, ToolResult};

/// Parameters of [`CalculatorTool`].
#[derive(Deserialize, JsonSchema)]
pub struct CalculatorParameters {
    /// The expression to evaluate.
    #[schemars(
        description = "Arithmetic expression, e.g. `sqrt(1764)` or `(2 + 3) * 4 ^ 2`."
    )]
    pub expression: String,
}

/// A tool evaluating arithmetic expressions.
pub struct CalculatorTool {
    parameter_schema: Value,
}

impl CalculatorTool {
    /// Creates a new calculator tool.
    #[inline]
    pub fn new() -> Self {
        CalculatorTool {
            parameter_schema: schema_for!(CalculatorParameters).to_value(),
        }
    }
}

impl Default for CalculatorTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for CalculatorTool {
    type Input = CalculatorParameters;

    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        r#"
Evaluates an arithmetic expression and returns the result.
Supports + - * / % ^, parentheses, and the functions sqrt, abs, ln, log10 and exp."#
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: CalculatorParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move { evaluate(&input.expression) }
    }
}

fn evaluate(expression: &str) -> ToolResult {
    let expression = expression.trim();
    if expression.is_empty() {
        return Err(
            ToolError::invalid_input().with_reason("`expression` is empty")
        );
    }

    let context = functions().map_err(|err| {
        ToolError::execution_error().with_reason(err.to_string())
    })?;
    let value =
        eval_with_context(&promote_integer_literals(expression), &context)
            .map_err(|err| {
                ToolError::execution_error().with_reason(err.to_string())
            })?;
    trace!("`{expression}` evaluated to {value:?}");

    match value {
        ExprValue::Float(value) => format_number(value),
        ExprValue::Int(value) => Ok(value.to_string()),
        ExprValue::Empty => Err(ToolError::execution_error()
            .with_reason("expression has no value")),
        value => Ok(value.to_string()),
    }
}

fn functions() -> EvalexprResult<HashMapContext> {
    context_map! {
        "sqrt" => Function::new(|argument| Ok(ExprValue::Float(argument.as_number()?.sqrt()))),
        "abs" => Function::new(|argument| Ok(ExprValue::Float(argument.as_number()?.abs()))),
        "ln" => Function::new(|argument| Ok(ExprValue::Float(argument.as_number()?.ln()))),
        "log10" => Function::new(|argument| Ok(ExprValue::Float(argument.as_number()?.log10()))),
        "exp" => Function::new(|argument| Ok(ExprValue::Float(argument.as_number()?.exp())))
    }
}

/// Rewrites integer literals as floats, so that `7 / 2` is `3.5` rather
/// than an integer division.
fn promote_integer_literals(expression: &str) -> String {
    let chars: Vec<char> = expression.chars().collect();
    let mut out = String::with_capacity(expression.len() + 8);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let starts_literal = c.is_ascii_digit()
            && (i == 0 || (!is_word_char(chars[i - 1]) && chars[i - 1] != '.'));
        if !starts_literal {
            out.push(c);
            i += 1;
            continue;
        }

        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        out.extend(&chars[start..i]);
        // `1.5`, `1e3` and the like are left alone.
        let is_integer = chars
            .get(i)
            .is_none_or(|next| *next != '.' && !is_word_char(*next));
        if is_integer {
            out.push_str(".0");
        }
    }
    out
}

#[inline]
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn format_number(value: f64) -> ToolResult {
    if !value.is_finite() {
        return Err(ToolError::execution_error()
            .with_reason(format!("result is not a finite number ({value})")));
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        Ok(format!("{}", value as i64))
    } else {
        Ok(format!("{value}"))
    }
}

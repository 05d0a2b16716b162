use std::env;

use chrono::{DateTime, FixedOffset, Local, SecondsFormat, Utc};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use strandline_core::tool::{Error as ToolError, Tool, ToolResult};

/// Parameters of [`CurrentTimeTool`].
#[derive(Default, Deserialize, JsonSchema)]
pub struct CurrentTimeParameters {
    /// Timezone of the returned timestamp.
    #[schemars(
        description = "`UTC`, `local`, or a fixed offset such as `+05:30`. Defaults to UTC."
    )]
    pub timezone: Option<String>,
}

/// A tool returning the current time as an ISO-8601 timestamp.
pub struct CurrentTimeTool {
    default_timezone: String,
    parameter_schema: Value,
}

impl CurrentTimeTool {
    /// Creates a new tool defaulting to UTC.
    #[inline]
    pub fn new() -> Self {
        Self::with_default_timezone("UTC")
    }

    /// Creates a new tool using `timezone` when the model does not name one.
    #[inline]
    pub fn with_default_timezone<S: Into<String>>(timezone: S) -> Self {
        CurrentTimeTool {
            default_timezone: timezone.into(),
            parameter_schema: schema_for!(CurrentTimeParameters).to_value(),
        }
    }

    /// Creates a new tool whose default timezone is read from
    /// `DEFAULT_TIMEZONE`, falling back to UTC.
    pub fn from_env() -> Self {
        match env::var("DEFAULT_TIMEZONE") {
            Ok(timezone) if !timezone.trim().is_empty() => {
                Self::with_default_timezone(timezone.trim())
            }
            _ => Self::new(),
        }
    }
}

impl Default for CurrentTimeTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for CurrentTimeTool {
    type Input = CurrentTimeParameters;

    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Returns the current date and time as an ISO-8601 timestamp."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: CurrentTimeParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        let timezone = input
            .timezone
            .filter(|tz| !tz.trim().is_empty())
            .unwrap_or_else(|| self.default_timezone.clone());
        async move {
            let timezone = Timezone::parse(&timezone)?;
            Ok(timezone.format(Utc::now()))
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Timezone {
    Utc,
    Local,
    Fixed(FixedOffset),
}

impl Timezone {
    fn parse(s: &str) -> Result<Self, ToolError> {
        let s = s.trim();
        if ["utc", "gmt", "z"].iter().any(|name| s.eq_ignore_ascii_case(name)) {
            return Ok(Timezone::Utc);
        }
        if s.eq_ignore_ascii_case("local") {
            return Ok(Timezone::Local);
        }
        parse_offset(s).map(Timezone::Fixed).ok_or_else(|| {
            ToolError::invalid_input().with_reason(format!(
                "unsupported timezone `{s}`, use `UTC`, `local` or an offset like `+05:30`"
            ))
        })
    }

    fn format(self, now: DateTime<Utc>) -> String {
        match self {
            Timezone::Utc => now.to_rfc3339_opts(SecondsFormat::Secs, false),
            Timezone::Local => now
                .with_timezone(&Local)
                .to_rfc3339_opts(SecondsFormat::Secs, false),
            Timezone::Fixed(offset) => now
                .with_timezone(&offset)
                .to_rfc3339_opts(SecondsFormat::Secs, false),
        }
    }
}

/// Parses `±HH:MM`, `±HHMM` or `±HH`.
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    if !rest.is_ascii() {
        return None;
    }
    let (hours, minutes) = match rest.len() {
        2 => (rest, "00"),
        4 => rest.split_at(2),
        5 if rest.as_bytes()[2] == b':' => (&rest[..2], &rest[3..]),
        _ => return None,
    };
    if !hours.bytes().chain(minutes.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

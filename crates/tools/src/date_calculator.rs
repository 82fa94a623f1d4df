//! Date arithmetic for notice periods, renewal windows and deadlines.
//!
//! Dates are ISO `YYYY-MM-DD`. Month and year arithmetic clamps to the end
//! of the month, so 2024-01-31 plus one month is 2024-02-29.

use async_trait::async_trait;
use chrono::{Datelike, Duration, Months, NaiveDate, Utc};
use contractlens_core::error::ToolError;
use contractlens_core::tool::{Tool, ToolResult};
use serde_json::{Value, json};

pub struct DateCalculatorTool;

#[async_trait]
impl Tool for DateCalculatorTool {
    fn name(&self) -> &str {
        "date_calculator"
    }

    fn description(&self) -> &str {
        "Compute with calendar dates. 'diff' counts days from start to end, \
         'add' shifts start (default today) by amount days/weeks/months/years, \
         'today' returns the current date. Dates are YYYY-MM-DD."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["diff", "add", "today"]
                },
                "start": {
                    "type": "string",
                    "description": "Start date, YYYY-MM-DD"
                },
                "end": {
                    "type": "string",
                    "description": "End date for 'diff', YYYY-MM-DD"
                },
                "amount": {
                    "type": "integer",
                    "description": "How many units to add; negative subtracts"
                },
                "unit": {
                    "type": "string",
                    "enum": ["days", "weeks", "months", "years"],
                    "description": "Unit for 'add' (default days)"
                }
            },
            "required": ["operation"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<ToolResult, ToolError> {
        let today = Utc::now().date_naive();
        match arguments["operation"].as_str() {
            Some("today") => Ok(ToolResult::ok(format!("Today is {today} ({}).", today.weekday()))
                .with_data(json!({ "date": today.to_string() }))),
            Some("diff") => {
                let start = required_date(&arguments, "start")?;
                let end = required_date(&arguments, "end")?;
                let days = (end - start).num_days();
                Ok(ToolResult::ok(format!(
                    "{days} days from {start} to {end} ({} weeks and {} days).",
                    days / 7,
                    days % 7
                ))
                .with_data(json!({ "days": days })))
            }
            Some("add") => {
                let start = match arguments["start"].as_str() {
                    Some(s) => parse_date("start", s)?,
                    None => today,
                };
                let amount = arguments["amount"]
                    .as_i64()
                    .or_else(|| arguments["amount"].as_f64().map(|f| f as i64))
                    .ok_or_else(|| ToolError::InvalidArguments("'add' requires 'amount'".into()))?;
                let unit = arguments["unit"].as_str().unwrap_or("days");
                let date = shift(start, amount, unit)?;
                Ok(ToolResult::ok(format!(
                    "{start} {amount:+} {unit} is {date} ({}).",
                    date.weekday()
                ))
                .with_data(json!({ "date": date.to_string() })))
            }
            other => Err(ToolError::InvalidArguments(format!(
                "unknown operation {other:?}; expected diff, add or today"
            ))),
        }
    }
}

fn required_date(arguments: &Value, field: &str) -> Result<NaiveDate, ToolError> {
    let raw = arguments[field]
        .as_str()
        .ok_or_else(|| ToolError::InvalidArguments(format!("'{field}' is required")))?;
    parse_date(field, raw)
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| {
            ToolError::InvalidArguments(format!("'{field}' is not a YYYY-MM-DD date ({raw}): {e}"))
        })
}

fn shift(start: NaiveDate, amount: i64, unit: &str) -> Result<NaiveDate, ToolError> {
    let out_of_range =
        || ToolError::InvalidArguments(format!("{start} {amount:+} {unit} is out of range"));
    let shifted = match unit {
        "days" => {
            start.checked_add_signed(Duration::try_days(amount).ok_or_else(out_of_range)?)
        }
        "weeks" => {
            start.checked_add_signed(Duration::try_weeks(amount).ok_or_else(out_of_range)?)
        }
        "months" | "years" => {
            let months = if unit == "years" {
                amount.checked_mul(12).ok_or_else(out_of_range)?
            } else {
                amount
            };
            let magnitude =
                Months::new(u32::try_from(months.unsigned_abs()).map_err(|_| out_of_range())?);
            if months >= 0 {
                start.checked_add_months(magnitude)
            } else {
                start.checked_sub_months(magnitude)
            }
        }
        other => return Err(ToolError::InvalidArguments(format!("unknown unit '{other}'"))),
    };
    shifted.ok_or_else(out_of_range)
}

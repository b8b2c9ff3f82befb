//! `parse-as-size :column [policy]` and `parse-as-duration :column [policy]`
//!
//! Convert text cells such as `"1.5GB"` or `"250ms"` into typed values.
//! Null cells and cells that already hold the target type pass through.
//! Anything else that fails to parse is a row error handled by `policy`
//! (default `fail-pipeline`).

use crate::directive::{Directive, ExecutorContext, RowPolicy};
use crate::error::DirectiveError;
use crate::row::{Row, Value};
use crate::token::{ByteSize, TimeDuration, TokenKind};
use crate::usage::{Arguments, UsageDefinition};

pub const SIZE_NAME: &str = "parse-as-size";
pub const DURATION_NAME: &str = "parse-as-duration";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Size,
    Duration,
}

#[derive(Debug)]
pub struct ParseAs {
    target: Target,
    column: String,
    policy: RowPolicy,
}

impl ParseAs {
    pub fn size() -> Self {
        Self::new(Target::Size)
    }

    pub fn duration() -> Self {
        Self::new(Target::Duration)
    }

    fn new(target: Target) -> Self {
        ParseAs {
            target,
            column: String::new(),
            policy: RowPolicy::FailPipeline,
        }
    }

    fn name(&self) -> &'static str {
        match self.target {
            Target::Size => SIZE_NAME,
            Target::Duration => DURATION_NAME,
        }
    }

    /// `Ok(None)` leaves the cell as it is.
    fn convert(&self, value: &Value) -> Result<Option<Value>, String> {
        match (self.target, value) {
            (_, Value::Null) => Ok(None),
            (Target::Size, Value::ByteSize(_)) => Ok(None),
            (Target::Duration, Value::TimeDuration(_)) => Ok(None),
            (Target::Size, Value::Text(s)) => ByteSize::parse(s)
                .map(|b| Some(Value::ByteSize(b)))
                .map_err(|e| e.to_string()),
            (Target::Duration, Value::Text(s)) => {
                let d = TimeDuration::parse(s).map_err(|e| e.to_string())?;
                // Durations accept any suffix at parse time; reject bad units here.
                d.unit().map_err(|e| e.to_string())?;
                Ok(Some(Value::TimeDuration(d)))
            }
            (_, other) => Err(format!(
                "cannot parse a {} value as {}",
                other.type_name(),
                match self.target {
                    Target::Size => "a byte size",
                    Target::Duration => "a time duration",
                }
            )),
        }
    }
}

impl Directive for ParseAs {
    fn define(&self) -> UsageDefinition {
        UsageDefinition::builder(self.name())
            .define("column", TokenKind::ColumnName)
            .define_optional("policy", TokenKind::Text)
            .build()
    }

    fn initialize(&mut self, args: &Arguments) -> Result<(), DirectiveError> {
        self.column = args
            .column_name("column")
            .ok_or_else(|| DirectiveError::InvalidArgument("column is required".into()))?
            .to_owned();
        self.policy = RowPolicy::from_args(args, "policy", RowPolicy::FailPipeline)?;
        Ok(())
    }

    fn execute(
        &mut self,
        rows: Vec<Row>,
        ctx: &mut ExecutorContext,
    ) -> Result<Vec<Row>, DirectiveError> {
        if !rows.is_empty() && rows.iter().all(|r| r.get(&self.column).is_none()) {
            return Err(DirectiveError::Configuration(format!(
                "column '{}' does not exist in any row",
                self.column
            )));
        }

        let mut out = Vec::with_capacity(rows.len());
        for (i, mut row) in rows.into_iter().enumerate() {
            let converted = match row.get(&self.column) {
                None => Err(format!("column '{}' is missing", self.column)),
                Some(value) => self.convert(value),
            };
            match converted {
                Ok(Some(value)) => {
                    row.set(self.column.as_str(), value);
                    out.push(row);
                }
                Ok(None) => out.push(row),
                Err(message) => ctx.reject_row(self.policy, i, row, &self.column, message)?,
            }
        }
        Ok(out)
    }
}

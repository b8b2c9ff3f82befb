//! `aggregate-stats :column <sum|avg|min|max> [:output]`
//!
//! Aggregates a byte-size or time-duration column over the whole batch and
//! appends the result to every row under `:output` (default
//! `<column>_<operation>`). The batch keeps its cardinality.
//!
//! Sizes are aggregated in bytes and durations in nanoseconds. `sum` and
//! `avg` produce a new token of the same kind (bytes as `B`, durations as
//! `ms`), so the result can itself be aggregated. `avg` is integer division
//! of the canonical sum by the number of typed values. `min` and `max`
//! return the extreme row's own token, first occurrence winning ties.

use rust_decimal::Decimal;
use std::fmt;

use crate::directive::{Directive, ExecutorContext};
use crate::error::DirectiveError;
use crate::row::{Row, Value};
use crate::token::{ByteSize, TimeDuration, TimeUnit, TokenKind};
use crate::usage::{Arguments, UsageDefinition};

pub const NAME: &str = "aggregate-stats";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Sum,
    Avg,
    Min,
    Max,
}

impl Operation {
    pub fn parse(name: &str) -> Option<Operation> {
        match name.to_ascii_lowercase().as_str() {
            "sum" => Some(Operation::Sum),
            "avg" => Some(Operation::Avg),
            "min" => Some(Operation::Min),
            "max" => Some(Operation::Max),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Sum => "sum",
            Operation::Avg => "avg",
            Operation::Min => "min",
            Operation::Max => "max",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct AggregateStats {
    column: String,
    operation: Option<Operation>,
    output: String,
}

impl AggregateStats {
    pub fn new() -> Self {
        Self::default()
    }
}

/// The typed values found in the column, with their canonical magnitude.
enum Samples<'a> {
    Sizes(Vec<(i64, &'a ByteSize)>),
    Durations(Vec<(i64, &'a TimeDuration)>),
}

impl AggregateStats {
    fn samples<'a>(&self, rows: &'a [Row]) -> Result<Samples<'a>, DirectiveError> {
        let first_typed = rows.iter().find_map(|r| match r.get(&self.column) {
            Some(Value::ByteSize(_)) => Some(TokenKind::ByteSize),
            Some(Value::TimeDuration(_)) => Some(TokenKind::TimeDuration),
            _ => None,
        });
        let canonical_err = |row: usize, e: crate::error::TokenError| {
            DirectiveError::Failed(format!("row {}, column '{}': {}", row, self.column, e))
        };

        match first_typed {
            Some(TokenKind::ByteSize) => {
                let mut out = Vec::new();
                for (i, row) in rows.iter().enumerate() {
                    if let Some(Value::ByteSize(b)) = row.get(&self.column) {
                        out.push((b.to_bytes().map_err(|e| canonical_err(i, e))?, b));
                    }
                }
                Ok(Samples::Sizes(out))
            }
            Some(_) => {
                let mut out = Vec::new();
                for (i, row) in rows.iter().enumerate() {
                    if let Some(Value::TimeDuration(d)) = row.get(&self.column) {
                        out.push((d.to_nanos().map_err(|e| canonical_err(i, e))?, d));
                    }
                }
                Ok(Samples::Durations(out))
            }
            None => Err(DirectiveError::Configuration(format!(
                "column '{}' does not contain byte size or time duration values",
                self.column
            ))),
        }
    }
}

/// Sum, average, or pick the extreme of `(canonical, token)` pairs.
/// `materialize` builds a token from a canonical sum or average.
fn aggregate<T: Clone>(
    op: Operation,
    values: &[(i64, &T)],
    materialize: impl Fn(i64) -> T,
) -> Result<T, DirectiveError> {
    let overflow = || DirectiveError::Failed(format!("{} overflows a 64-bit total", op));
    let sum = || {
        values
            .iter()
            .try_fold(0i64, |acc, (v, _)| acc.checked_add(*v))
            .ok_or_else(overflow)
    };
    // `values` is never empty: the column held at least one typed value.
    let pick = |better: fn(i64, i64) -> bool| {
        let mut best = &values[0];
        for v in &values[1..] {
            if better(v.0, best.0) {
                best = v;
            }
        }
        best.1.clone()
    };
    match op {
        Operation::Sum => Ok(materialize(sum()?)),
        Operation::Avg => {
            let count = i64::try_from(values.len()).map_err(|_| overflow())?;
            Ok(materialize(sum()? / count))
        }
        Operation::Min => Ok(pick(|a, b| a < b)),
        Operation::Max => Ok(pick(|a, b| a > b)),
    }
}

fn duration_from_nanos(nanos: i64) -> TimeDuration {
    let millis = Decimal::from(nanos) / Decimal::from(TimeUnit::Millis.nanos());
    TimeDuration::from_millis(millis.normalize())
}

impl Directive for AggregateStats {
    fn define(&self) -> UsageDefinition {
        UsageDefinition::builder(NAME)
            .define("column", TokenKind::ColumnName)
            .define("operation", TokenKind::Text)
            .define_optional("output", TokenKind::ColumnName)
            .build()
    }

    fn initialize(&mut self, args: &Arguments) -> Result<(), DirectiveError> {
        self.column = args
            .column_name("column")
            .ok_or_else(|| DirectiveError::InvalidArgument("column is required".into()))?
            .to_owned();
        let op_name = args.text("operation").unwrap_or_default();
        let op = Operation::parse(op_name).ok_or_else(|| {
            DirectiveError::InvalidArgument(format!(
                "unsupported operation '{}'; supported operations are: sum, avg, min, max",
                op_name
            ))
        })?;
        self.operation = Some(op);
        self.output = match args.column_name("output") {
            Some(out) => out.to_owned(),
            None => format!("{}_{}", self.column, op),
        };
        Ok(())
    }

    fn execute(
        &mut self,
        mut rows: Vec<Row>,
        _ctx: &mut ExecutorContext,
    ) -> Result<Vec<Row>, DirectiveError> {
        let op = self
            .operation
            .ok_or_else(|| DirectiveError::Failed("directive was not initialized".into()))?;
        if rows.is_empty() {
            return Ok(rows);
        }

        let result = match self.samples(&rows)? {
            Samples::Sizes(values) => {
                Value::ByteSize(aggregate(op, &values, ByteSize::from_bytes)?)
            }
            Samples::Durations(values) => {
                Value::TimeDuration(aggregate(op, &values, duration_from_nanos)?)
            }
        };
        tracing::debug!(
            column = %self.column,
            operation = %op,
            output = %self.output,
            result = %result,
            "aggregate computed"
        );
        for row in &mut rows {
            row.set(self.output.as_str(), result.clone());
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RecipeCompiler;
    use crate::directives::builtin_registry;
    use crate::error::ExecutionError;

    fn size(text: &str) -> Value {
        Value::ByteSize(ByteSize::parse(text).unwrap())
    }

    fn duration(text: &str) -> Value {
        Value::TimeDuration(TimeDuration::parse(text).unwrap())
    }

    fn run(recipe: &str, rows: Vec<Row>) -> Result<Vec<Row>, ExecutionError> {
        let reg = builtin_registry().unwrap();
        let compiled = RecipeCompiler::new(reg.catalog("default").unwrap())
            .compile(recipe)
            .unwrap();
        let out = compiled.pipeline().run(rows)?;
        Ok(out.rows)
    }

    #[test]
    fn sum_of_sizes_is_attached_to_every_row() {
        let rows = vec![
            Row::new().with("size", size("1024B")),
            Row::new().with("size", size("1KB")),
        ];
        let out = run("aggregate-stats :size sum", rows).unwrap();
        assert_eq!(out.len(), 2);
        let expected = size("2048B");
        assert_eq!(out[0].get("size_sum"), Some(&expected));
        assert_eq!(out[1].get("size_sum"), Some(&expected));
    }

    #[test]
    fn avg_of_durations_in_millis() {
        let rows = vec![
            Row::new().with("duration", duration("1000ms")),
            Row::new().with("duration", duration("2s")),
        ];
        let out = run("aggregate-stats :duration avg", rows).unwrap();
        let expected = duration("1500ms");
        assert_eq!(out[0].get("duration_avg"), Some(&expected));
        assert_eq!(out[1].get("duration_avg"), Some(&expected));

        let rows = vec![
            Row::new().with("duration", duration("1000ms")),
            Row::new().with("duration", duration("1s")),
        ];
        let out = run("aggregate-stats :duration avg", rows).unwrap();
        assert_eq!(out[0].get("duration_avg"), Some(&duration("1000ms")));
    }

    #[test]
    fn avg_truncates_to_whole_canonical_units() {
        let rows = vec![
            Row::new().with("size", size("1B")),
            Row::new().with("size", size("2B")),
        ];
        let out = run("aggregate-stats :size avg", rows).unwrap();
        assert_eq!(out[0].get("size_avg"), Some(&size("1B")));
    }

    #[test]
    fn max_returns_original_token() {
        let rows = vec![
            Row::new().with("size", size("1024B")),
            Row::new().with("size", size("1MB")),
            Row::new().with("size", size("512KB")),
        ];
        let out = run("aggregate-stats :size max", rows).unwrap();
        assert_eq!(out.len(), 3);
        for row in &out {
            match row.get("size_max") {
                Some(Value::ByteSize(b)) => assert_eq!(b.original(), "1MB"),
                other => panic!("expected byte size, got {:?}", other),
            }
        }
    }

    #[test]
    fn min_of_durations_and_custom_output() {
        let rows = vec![
            Row::new().with("t", duration("2m")),
            Row::new().with("t", duration("90s")),
            Row::new().with("t", Value::Null),
        ];
        let out = run("aggregate-stats :t min :fastest", rows).unwrap();
        assert_eq!(out[2].get("fastest"), Some(&duration("90s")));
        assert!(out[0].get("t_min").is_none());
    }

    #[test]
    fn result_can_be_reaggregated() {
        let rows = vec![
            Row::new().with("d", duration("1s")),
            Row::new().with("d", duration("500ms")),
        ];
        let out = run(
            "aggregate-stats :d sum :total\naggregate-stats :total max",
            rows,
        )
        .unwrap();
        assert_eq!(out[0].get("total_max"), Some(&duration("1500ms")));
    }

    #[test]
    fn untyped_column_is_a_configuration_error() {
        let rows = vec![Row::new().with("size", "invalid")];
        let err = run("aggregate-stats :size sum", rows).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.directive_name(), NAME);
    }

    #[test]
    fn unknown_operation_fails_initialize() {
        let err = run("aggregate-stats :size median", vec![Row::new()]).unwrap_err();
        assert!(matches!(err, ExecutionError::Initialize { .. }));
        assert!(err.to_string().contains("median"));
    }

    #[test]
    fn empty_batch_is_untouched() {
        assert!(run("aggregate-stats :size sum", vec![]).unwrap().is_empty());
    }
}

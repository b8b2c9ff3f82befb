//! `check-nulls :a[,:b ...] <policy>`
//!
//! A row whose listed columns are null or missing is handled by `policy`.

use crate::directive::{Directive, ExecutorContext, RowPolicy};
use crate::error::DirectiveError;
use crate::row::Row;
use crate::token::TokenKind;
use crate::usage::{Arguments, UsageDefinition};

pub const NAME: &str = "check-nulls";

#[derive(Debug)]
pub struct CheckNulls {
    columns: Vec<String>,
    policy: RowPolicy,
}

impl Default for CheckNulls {
    fn default() -> Self {
        CheckNulls {
            columns: Vec::new(),
            policy: RowPolicy::FailPipeline,
        }
    }
}

impl CheckNulls {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Directive for CheckNulls {
    fn define(&self) -> UsageDefinition {
        UsageDefinition::builder(NAME)
            .define_list("columns", TokenKind::ColumnName)
            .define("policy", TokenKind::Text)
            .build()
    }

    fn initialize(&mut self, args: &Arguments) -> Result<(), DirectiveError> {
        self.columns = args
            .column_names("columns")
            .into_iter()
            .map(str::to_owned)
            .collect();
        self.policy = RowPolicy::from_args(args, "policy", RowPolicy::FailPipeline)?;
        Ok(())
    }

    fn execute(
        &mut self,
        rows: Vec<Row>,
        ctx: &mut ExecutorContext,
    ) -> Result<Vec<Row>, DirectiveError> {
        if !rows.is_empty() {
            if let Some(absent) = self
                .columns
                .iter()
                .find(|c| rows.iter().all(|r| r.get(c).is_none()))
            {
                return Err(DirectiveError::Configuration(format!(
                    "column '{}' does not exist in any row",
                    absent
                )));
            }
        }

        let mut out = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            let offending = self
                .columns
                .iter()
                .find(|c| row.get(c).map_or(true, |v| v.is_null()));
            match offending {
                None => out.push(row),
                Some(column) => {
                    let message = format!("found null value in non nullable column '{}'", column);
                    ctx.reject_row(self.policy, i, row, column, message)?;
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RecipeCompiler;
    use crate::directives::builtin_registry;
    use crate::error::ExecutionError;
    use crate::pipeline::PipelineOutput;
    use crate::row::Value;

    fn run(recipe: &str) -> Result<PipelineOutput, ExecutionError> {
        let rows = vec![
            Row::new().with("id", 1i64).with("name", "a"),
            Row::new().with("id", 2i64).with("name", Value::Null),
            Row::new().with("id", 3i64),
            Row::new().with("id", 4i64).with("name", "d"),
        ];
        let reg = builtin_registry().unwrap();
        RecipeCompiler::new(reg.catalog("default").unwrap())
            .compile(recipe)
            .unwrap()
            .pipeline()
            .run(rows)
    }

    fn ids(out: &PipelineOutput) -> Vec<i64> {
        out.rows
            .iter()
            .filter_map(|r| match r.get("id") {
                Some(Value::Int(i)) => Some(*i),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn fail_pipeline_returns_no_rows() {
        let err = run("check-nulls :id,:name fail-pipeline").unwrap_err();
        assert_eq!(
            err,
            ExecutionError::RowFatal {
                directive: NAME.into(),
                column: "name".into(),
                row: 1,
                message: "found null value in non nullable column 'name'".into(),
            }
        );
    }

    #[test]
    fn skip_drops_offending_rows() {
        let out = run("check-nulls :name skip").unwrap();
        assert_eq!(ids(&out), vec![1, 4]);
        assert!(out.errors.is_empty());
    }

    #[test]
    fn send_to_error_collector_diverts_rows() {
        let out = run("check-nulls :name send-to-error-collector").unwrap();
        assert_eq!(ids(&out), vec![1, 4]);
        let diverted: Vec<usize> = out.errors.iter().map(|e| e.row_index).collect();
        assert_eq!(diverted, vec![1, 2]);
        assert_eq!(out.errors[0].directive, NAME);
    }

    #[test]
    fn error_pipeline_alias() {
        assert!(run("check-nulls :name error-pipeline").is_err());
    }

    #[test]
    fn absent_column_is_a_configuration_error_under_every_policy() {
        for policy in ["skip", "fail-pipeline", "send-to-error-collector"] {
            let err = run(&format!("check-nulls :name,:emial {}", policy)).unwrap_err();
            assert!(err.is_configuration(), "{}: {:?}", policy, err);
            assert_eq!(err.directive_name(), NAME);
        }
    }

    #[test]
    fn column_missing_from_some_rows_is_still_a_row_error() {
        // Row 3 lacks `name` but other rows carry it.
        let out = run("check-nulls :name send-to-error-collector").unwrap();
        assert_eq!(out.errors.len(), 2);
    }
}

//! Column housekeeping: `drop :a[,:b ...]` and `rename :old :new`.

use crate::directive::{Directive, ExecutorContext};
use crate::error::DirectiveError;
use crate::row::Row;
use crate::token::TokenKind;
use crate::usage::{Arguments, UsageDefinition};

pub const DROP: &str = "drop";
pub const RENAME: &str = "rename";

#[derive(Debug, Default)]
pub struct DropColumns {
    columns: Vec<String>,
}

impl DropColumns {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Directive for DropColumns {
    fn define(&self) -> UsageDefinition {
        UsageDefinition::builder(DROP)
            .define_list("columns", TokenKind::ColumnName)
            .build()
    }

    fn initialize(&mut self, args: &Arguments) -> Result<(), DirectiveError> {
        self.columns = args
            .column_names("columns")
            .into_iter()
            .map(str::to_owned)
            .collect();
        Ok(())
    }

    fn execute(
        &mut self,
        mut rows: Vec<Row>,
        _ctx: &mut ExecutorContext,
    ) -> Result<Vec<Row>, DirectiveError> {
        for row in &mut rows {
            for column in &self.columns {
                row.remove(column);
            }
        }
        Ok(rows)
    }
}

#[derive(Debug)]
pub struct Rename {
    name: String,
    from: String,
    to: String,
}

impl Rename {
    pub fn new() -> Self {
        Self::named(RENAME)
    }

    /// The same directive registered under another name.
    pub fn named(name: &str) -> Self {
        Rename {
            name: name.to_owned(),
            from: String::new(),
            to: String::new(),
        }
    }
}

impl Default for Rename {
    fn default() -> Self {
        Self::new()
    }
}

impl Directive for Rename {
    fn define(&self) -> UsageDefinition {
        UsageDefinition::builder(self.name.as_str())
            .define("old", TokenKind::ColumnName)
            .define("new", TokenKind::ColumnName)
            .build()
    }

    fn initialize(&mut self, args: &Arguments) -> Result<(), DirectiveError> {
        match (args.column_name("old"), args.column_name("new")) {
            (Some(from), Some(to)) => {
                self.from = from.to_owned();
                self.to = to.to_owned();
                Ok(())
            }
            _ => Err(DirectiveError::InvalidArgument(
                "rename needs an old and a new column".into(),
            )),
        }
    }

    fn execute(
        &mut self,
        mut rows: Vec<Row>,
        _ctx: &mut ExecutorContext,
    ) -> Result<Vec<Row>, DirectiveError> {
        for row in &mut rows {
            row.rename(&self.from, &self.to);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::RecipeCompiler;
    use crate::directives::builtin_registry;

    fn run(recipe: &str, rows: Vec<Row>) -> Vec<Row> {
        let reg = builtin_registry().unwrap();
        RecipeCompiler::new(reg.catalog("default").unwrap())
            .compile(recipe)
            .unwrap()
            .pipeline()
            .run(rows)
            .unwrap()
            .rows
    }

    #[test]
    fn drop_removes_listed_columns() {
        let rows = vec![Row::new().with("a", 1i64).with("b", 2i64).with("c", 3i64)];
        let out = run("drop :a, :c, :missing", rows);
        assert_eq!(out[0], Row::new().with("b", 2i64));
    }

    #[test]
    fn rename_then_use_new_name() {
        let rows = vec![Row::new().with("a", "1KB")];
        let out = run("rename :a :size\nparse-as-size :size", rows);
        let names: Vec<&str> = out[0].columns().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["size"]);
    }
}

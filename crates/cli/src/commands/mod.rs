pub(crate) mod check;
pub(crate) mod directives;
pub(crate) mod migrate;
pub(crate) mod run;
pub(crate) mod tokens;

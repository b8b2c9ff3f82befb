//! Rewrites legacy (version 1) recipe text into the current grammar.
//!
//! Version 1 recipes have no version pragma, do not terminate statements
//! with `;` and name columns without the `:` prefix. Migration:
//!
//! * prepends `#pragma version 2.0;`,
//! * prefixes bare identifiers in column-name parameter positions with `:`,
//! * terminates every directive line with `;`,
//! * copies blank, comment and pragma lines unchanged.
//!
//! Text that already carries a version pragma is returned as is, which
//! makes migration idempotent.

use crate::compiler::GRAMMAR_VERSION;
use crate::lexer::lex;
use crate::registry::UsageLookup;
use crate::token::{Spanned, Token, TokenKind};
use crate::usage::UsageDefinition;

pub fn is_current(text: &str) -> bool {
    text.lines().any(|line| {
        line.trim_start()
            .strip_prefix("#pragma")
            .is_some_and(|rest| rest.trim_start().starts_with("version"))
    })
}

pub fn migrate(text: &str, usages: &impl UsageLookup) -> String {
    if is_current(text) {
        return text.to_owned();
    }
    let mut out = format!("#pragma version {};\n", GRAMMAR_VERSION);
    for line in text.lines() {
        out.push_str(&migrate_line(line, usages));
        out.push('\n');
    }
    if !text.ends_with('\n') {
        out.pop();
    }
    out
}

fn migrate_line(line: &str, usages: &impl UsageLookup) -> String {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
        return line.to_owned();
    }
    let tokens = lex(line);
    let body: Vec<&Spanned> = tokens
        .iter()
        .filter(|s| !matches!(s.token, Token::Eof))
        .collect();
    let Some(last) = body.last() else {
        return line.to_owned();
    };

    let mut prefix_at = Vec::new();
    if let Some(Token::Identifier(name)) = body.first().map(|s| &s.token) {
        if let Some(usage) = usages.usage(name) {
            prefix_at = bare_column_offsets(&usage, &body[1..]);
        }
    }

    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len() + prefix_at.len() + 1);
    for (i, c) in chars.iter().enumerate() {
        if prefix_at.contains(&i) {
            out.push(':');
        }
        out.push(*c);
        if i + 1 == last.end && !last.token.is_delimiter(';') {
            out.push(';');
        }
    }
    out
}

/// Char offsets of identifier tokens sitting where `usage` expects a column
/// name. Matching mirrors the binder, except that a bare identifier is
/// accepted for a column-name parameter.
fn bare_column_offsets(usage: &UsageDefinition, args: &[&Spanned]) -> Vec<usize> {
    let accepts = |kind: TokenKind, token: &Token| match (kind, token) {
        (TokenKind::ColumnName, Token::Identifier(_)) => true,
        (TokenKind::Text, Token::Identifier(_)) => true,
        _ => token.kind() == kind,
    };
    let mut offsets = Vec::new();
    let mut pos = 0usize;
    for param in usage.params() {
        let Some(first) = args.get(pos) else {
            break;
        };
        if !accepts(param.kind, &first.token) {
            if param.optional {
                continue;
            }
            break;
        }
        let mut group = vec![*first];
        pos += 1;
        while param.list
            && args.get(pos).is_some_and(|s| s.token.is_delimiter(','))
            && args.get(pos + 1).is_some_and(|s| accepts(param.kind, &s.token))
        {
            group.push(args[pos + 1]);
            pos += 2;
        }
        if param.kind == TokenKind::ColumnName {
            offsets.extend(
                group
                    .iter()
                    .filter(|s| matches!(s.token, Token::Identifier(_)))
                    .map(|s| s.offset),
            );
        }
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directives::builtin_registry;

    fn migrate_builtin(text: &str) -> String {
        let reg = builtin_registry().unwrap();
        migrate(text, &reg.catalog("default").unwrap())
    }

    #[test]
    fn migrates_legacy_recipe() {
        let legacy = "// sizes\nparse-as-size size skip\ndrop a, b\nrename old new\naggregate-stats size sum total\n";
        assert_eq!(
            migrate_builtin(legacy),
            "#pragma version 2.0;\n// sizes\nparse-as-size :size skip;\ndrop :a, :b;\nrename :old :new;\naggregate-stats :size sum :total;\n"
        );
    }

    #[test]
    fn current_text_is_unchanged() {
        let current = "#pragma version 2.0;\ndrop :a;\n";
        assert_eq!(migrate_builtin(current), current);
        let once = migrate_builtin("drop a");
        assert_eq!(once, "#pragma version 2.0;\ndrop :a;");
        assert_eq!(migrate_builtin(&once), once);
    }

    #[test]
    fn already_prefixed_and_terminated_lines() {
        assert_eq!(
            migrate_builtin("drop :a;\n"),
            "#pragma version 2.0;\ndrop :a;\n"
        );
    }

    #[test]
    fn trailing_comment_stays_after_semicolon() {
        assert_eq!(
            migrate_builtin("drop a // gone"),
            "#pragma version 2.0;\ndrop :a; // gone"
        );
    }

    #[test]
    fn unknown_directives_only_get_terminated() {
        assert_eq!(
            migrate_builtin("custom thing 10"),
            "#pragma version 2.0;\ncustom thing 10;"
        );
    }

    #[test]
    fn closure_lookup() {
        let lookup = |name: &str| {
            (name == "keep").then(|| {
                UsageDefinition::builder("keep")
                    .define("column", TokenKind::ColumnName)
                    .build()
            })
        };
        assert_eq!(migrate("keep x", &lookup), "#pragma version 2.0;\nkeep :x;");
    }

    #[test]
    fn migrated_text_compiles() {
        let reg = builtin_registry().unwrap();
        let catalog = reg.catalog("default").unwrap();
        let migrated = migrate("check-nulls a,b skip\ndrop b", &catalog);
        let recipe = crate::compiler::RecipeCompiler::new(catalog)
            .compile(&migrated)
            .unwrap();
        assert_eq!(recipe.invocations.len(), 2);
        assert_eq!(recipe.version.as_deref(), Some(GRAMMAR_VERSION));
    }
}

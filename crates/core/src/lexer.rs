//! Recipe lexer.
//!
//! Lexing never fails: malformed input becomes a [`Token::Error`] and the
//! lexer resynchronizes, so a single pass reports every lexical problem in
//! a recipe. The returned stream always ends with [`Token::Eof`].

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::token::{ByteSize, ByteUnit, Spanned, TimeDuration, TimeUnit, Token};

const TWO_CHAR_OPERATORS: [&str; 6] = ["==", "!=", "<=", ">=", "&&", "||"];

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

fn single_operator(c: char) -> Option<&'static str> {
    Some(match c {
        '=' => "=",
        '<' => "<",
        '>' => ">",
        '+' => "+",
        '-' => "-",
        '*' => "*",
        '/' => "/",
        '%' => "%",
        '!' => "!",
        _ => return None,
    })
}

struct Cursor {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
}

impl Cursor {
    fn peek(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn text(&self, start: usize) -> String {
        self.chars[start..self.pos].iter().collect()
    }

    fn starts_with(&self, s: &str) -> bool {
        s.chars().enumerate().all(|(i, c)| self.peek(i) == Some(c))
    }

    fn skip_to_eol(&mut self) {
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            self.bump();
        }
    }
}

pub fn lex(src: &str) -> Vec<Spanned> {
    let mut cur = Cursor {
        chars: src.chars().collect(),
        pos: 0,
        line: 1,
        col: 1,
    };
    let mut tokens = Vec::new();

    while let Some(c) = cur.peek(0) {
        if c.is_whitespace() {
            cur.bump();
            continue;
        }

        // Line comments: `//` and `#`, but `#pragma` is a token.
        if cur.starts_with("//") || (c == '#' && !cur.starts_with("#pragma")) {
            cur.skip_to_eol();
            continue;
        }

        let (line, column, offset) = (cur.line, cur.col, cur.pos);
        let token = if cur.starts_with("#pragma") {
            for _ in 0.."#pragma".len() {
                cur.bump();
            }
            Token::Pragma
        } else if c == '"' || c == '\'' {
            lex_string(&mut cur, c)
        } else if c.is_ascii_digit()
            || (c == '-' && cur.peek(1).is_some_and(|n| n.is_ascii_digit()))
        {
            lex_number(&mut cur)
        } else if is_ident_start(c) {
            while cur.peek(0).is_some_and(is_ident_continue) {
                cur.bump();
            }
            match cur.text(offset).as_str() {
                "true" => Token::Bool(true),
                "false" => Token::Bool(false),
                "null" => Token::Null,
                word => Token::Identifier(word.to_owned()),
            }
        } else if c == ':' && cur.peek(1).is_some_and(is_ident_start) {
            cur.bump();
            let start = cur.pos;
            while cur
                .peek(0)
                .is_some_and(|n| is_ident_continue(n) || n == '.')
            {
                cur.bump();
            }
            Token::Column(cur.text(start))
        } else if let Some(op) = TWO_CHAR_OPERATORS.iter().find(|op| cur.starts_with(op)) {
            cur.bump();
            cur.bump();
            Token::Operator(*op)
        } else if let Some(op) = single_operator(c) {
            cur.bump();
            Token::Operator(op)
        } else if "(){}[],;.".contains(c) {
            cur.bump();
            Token::Delimiter(c)
        } else {
            cur.bump();
            Token::Error {
                text: c.to_string(),
                message: format!("unexpected character '{}'", c),
            }
        };
        tokens.push(Spanned {
            token,
            line,
            column,
            offset,
            end: cur.pos,
        });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        line: cur.line,
        column: cur.col,
        offset: cur.pos,
        end: cur.pos,
    });
    tokens
}

/// A quoted string. An unterminated literal swallows the rest of its line
/// into an error token.
fn lex_string(cur: &mut Cursor, quote: char) -> Token {
    let start = cur.pos;
    cur.bump();
    let mut s = String::new();
    loop {
        match cur.peek(0) {
            None | Some('\n') => {
                return Token::Error {
                    text: cur.text(start),
                    message: "unterminated string literal".to_owned(),
                };
            }
            Some(c) if c == quote => {
                cur.bump();
                return Token::Text(s);
            }
            Some('\\') => {
                cur.bump();
                match cur.peek(0) {
                    None | Some('\n') => continue,
                    Some(e) => {
                        cur.bump();
                        match e {
                            'n' => s.push('\n'),
                            't' => s.push('\t'),
                            '"' | '\'' | '\\' => s.push(e),
                            other => {
                                s.push('\\');
                                s.push(other);
                            }
                        }
                    }
                }
            }
            Some(c) => {
                cur.bump();
                s.push(c);
            }
        }
    }
}

/// Numbers, optionally followed by a unit suffix. A recognised byte unit
/// yields a byte size, a recognised time unit a duration; any other suffix
/// turns the whole run into an identifier.
fn lex_number(cur: &mut Cursor) -> Token {
    let start = cur.pos;
    if cur.peek(0) == Some('-') {
        cur.bump();
    }
    while cur.peek(0).is_some_and(|c| c.is_ascii_digit()) {
        cur.bump();
    }
    if cur.peek(0) == Some('.') && cur.peek(1).is_some_and(|c| c.is_ascii_digit()) {
        cur.bump();
        while cur.peek(0).is_some_and(|c| c.is_ascii_digit()) {
            cur.bump();
        }
    }
    let number = cur.text(start);

    if !cur.peek(0).is_some_and(|c| c.is_ascii_alphabetic()) {
        return match Decimal::from_str(&number) {
            Ok(n) => Token::Number(n),
            Err(_) => Token::Error {
                message: format!("number '{}' is out of range", number),
                text: number,
            },
        };
    }

    let suffix_start = cur.pos;
    while cur.peek(0).is_some_and(|c| c.is_ascii_alphabetic()) {
        cur.bump();
    }
    let suffix = cur.text(suffix_start);

    if cur.peek(0).is_some_and(is_ident_continue) {
        while cur.peek(0).is_some_and(is_ident_continue) {
            cur.bump();
        }
        return Token::Identifier(cur.text(start));
    }

    let literal = cur.text(start);
    if ByteUnit::from_suffix(&suffix).is_some() {
        if let Ok(size) = ByteSize::parse(&literal) {
            return Token::ByteSize(size);
        }
    } else if TimeUnit::from_suffix(&suffix).is_some() {
        if let Ok(duration) = TimeDuration::parse(&literal) {
            return Token::TimeDuration(duration);
        }
    }
    Token::Identifier(literal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        lex(src).into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn lexes_directive_statement() {
        let toks = tokens("aggregate-stats :size sum :total;");
        assert_eq!(
            toks,
            vec![
                Token::Identifier("aggregate-stats".into()),
                Token::Column("size".into()),
                Token::Identifier("sum".into()),
                Token::Column("total".into()),
                Token::Delimiter(';'),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn byte_size_units_are_case_insensitive() {
        for src in ["1kb", "1KB", "1Kb", "1kB"] {
            match &tokens(src)[0] {
                Token::ByteSize(b) => assert_eq!(b.to_bytes().unwrap(), 1024),
                other => panic!("expected byte size for {}, got {:?}", src, other),
            }
        }
    }

    #[test]
    fn unknown_units_fall_back_to_identifiers() {
        assert_eq!(tokens("1ZB")[0], Token::Identifier("1ZB".into()));
        assert_eq!(tokens("1XB")[0], Token::Identifier("1XB".into()));
        assert_eq!(tokens("1xs")[0], Token::Identifier("1xs".into()));
        assert_eq!(tokens("10MB2")[0], Token::Identifier("10MB2".into()));
    }

    #[test]
    fn durations_and_fractions() {
        match &tokens("1.5h")[0] {
            Token::TimeDuration(d) => assert_eq!(d.to_nanos().unwrap(), 5_400_000_000_000),
            other => panic!("expected duration, got {:?}", other),
        }
        match &tokens("1ms")[0] {
            Token::TimeDuration(d) => assert_eq!(d.to_millis().unwrap(), 1),
            other => panic!("expected duration, got {:?}", other),
        }
        assert_eq!(
            tokens("-2.5")[0],
            Token::Number(Decimal::from_str("-2.5").unwrap())
        );
    }

    #[test]
    fn keywords_operators_and_delimiters() {
        let toks = tokens("true false null == != <= && || ! ( ) , .");
        assert_eq!(toks[0], Token::Bool(true));
        assert_eq!(toks[1], Token::Bool(false));
        assert_eq!(toks[2], Token::Null);
        assert_eq!(toks[3], Token::Operator("=="));
        assert_eq!(toks[5], Token::Operator("<="));
        assert_eq!(toks[8], Token::Operator("!"));
        assert_eq!(toks[9], Token::Delimiter('('));
        assert_eq!(toks[12], Token::Delimiter('.'));
    }

    #[test]
    fn comments_skipped_but_pragma_kept() {
        let toks = tokens("// note\n# also a note\n#pragma version 2.0;");
        assert_eq!(toks[0], Token::Pragma);
        assert_eq!(toks[1], Token::Identifier("version".into()));
        assert_eq!(toks[2], Token::Number(Decimal::from_str("2.0").unwrap()));
    }

    #[test]
    fn strings_with_escapes() {
        assert_eq!(tokens(r#""a\"b""#)[0], Token::Text("a\"b".into()));
        assert_eq!(tokens(r"'it\'s'")[0], Token::Text("it's".into()));
    }

    #[test]
    fn errors_do_not_halt_lexing() {
        let spanned = lex("drop @ :a\nrename 'oops\nfoo");
        let errors: Vec<&Spanned> = spanned
            .iter()
            .filter(|s| matches!(s.token, Token::Error { .. }))
            .collect();
        assert_eq!(errors.len(), 2);
        assert_eq!((errors[0].line, errors[0].column, errors[0].offset), (1, 6, 5));
        assert_eq!(errors[1].line, 2);
        assert_eq!(
            errors[1].token,
            Token::Error {
                text: "'oops".into(),
                message: "unterminated string literal".into()
            }
        );
        assert_eq!(
            spanned[spanned.len() - 2].token,
            Token::Identifier("foo".into())
        );
    }

    #[test]
    fn display_round_trips() {
        let src = "x 'a\\'b' 1.5KB 250ms :col 42 true null ==";
        for tok in tokens(src) {
            if tok == Token::Eof {
                continue;
            }
            let relexed = tokens(&tok.to_string());
            assert_eq!(relexed[0], tok, "round trip of {}", tok);
        }
    }
}

//! Best-effort rewriting of view and trigger definitions into MySQL syntax.
//!
//! Works on the token stream only: identifiers are re-quoted with backticks,
//! string literals re-escaped, `RAISE(...)` becomes `SIGNAL SQLSTATE`, and
//! BEGIN/END blocks are reindented. Statement semantics are not checked.

use super::ddl_generator::DdlOutput;
use super::identifiers::quote_identifier;
use sqlparser::dialect::SQLiteDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace, Word};

const INDENT: &str = "    ";
const TRIGGER_WARNING: &str = "-- Warning: trigger may need manual adjustment for MySQL compatibility";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Begin,
    Case,
}

/// Rewrites views and triggers, optionally preceded by DROP ... IF EXISTS
#[derive(Debug, Clone)]
pub struct ObjectRewriter {
    drop_existing: bool,
}

impl ObjectRewriter {
    pub fn new(drop_existing: bool) -> Self {
        Self { drop_existing }
    }

    pub fn rewrite_view(&self, name: &str, sql: &str) -> DdlOutput {
        let mut output = DdlOutput::default();
        if self.drop_existing {
            output
                .statements
                .push(format!("DROP VIEW IF EXISTS {};", quote_identifier(name)));
        }

        let body = match rewrite_sql(sql, ObjectKindHint::View, &mut output.warnings) {
            Some(body) => body,
            None => {
                output.warnings.push(format!(
                    "View {} could not be tokenized; emitted unchanged",
                    name
                ));
                sql.trim().trim_end_matches(';').to_string()
            }
        };
        output.statements.push(format!("{};", body));
        output
    }

    pub fn rewrite_trigger(&self, name: &str, sql: &str) -> DdlOutput {
        let mut output = DdlOutput::default();
        if self.drop_existing {
            output
                .statements
                .push(format!("DROP TRIGGER IF EXISTS {};", quote_identifier(name)));
        }

        output.warnings.push(format!(
            "Trigger {} was rewritten syntactically and may need manual adjustment",
            name
        ));
        let body = match rewrite_sql(sql, ObjectKindHint::Trigger, &mut output.warnings) {
            Some(body) => body,
            None => {
                output.warnings.push(format!(
                    "Trigger {} could not be tokenized; emitted unchanged",
                    name
                ));
                sql.trim().trim_end_matches(';').to_string()
            }
        };
        output.statements.push(format!(
            "{}\nDELIMITER $$\n{}$$\nDELIMITER ;",
            TRIGGER_WARNING, body
        ));
        output
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObjectKindHint {
    View,
    Trigger,
}

/// Tokenize and rewrite; `None` when the text cannot be tokenized
fn rewrite_sql(sql: &str, kind: ObjectKindHint, warnings: &mut Vec<String>) -> Option<String> {
    let dialect = SQLiteDialect {};
    let mut tokens = Tokenizer::new(&dialect, sql).tokenize().ok()?;

    while matches!(
        tokens.last(),
        Some(Token::SemiColon) | Some(Token::Whitespace(_)) | Some(Token::EOF)
    ) {
        tokens.pop();
    }

    match kind {
        ObjectKindHint::View => strip_view_if_not_exists(&mut tokens, warnings),
        ObjectKindHint::Trigger => prepare_trigger_header(&mut tokens, warnings),
    }

    let mut out = Formatter::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        match token {
            Token::Word(word) if word.quote_style.is_none() && is_keyword(word, "RAISE") => {
                match match_raise(&tokens, i) {
                    Some((message, end)) => {
                        out.drop_trailing_word("SELECT");
                        out.push_text(&format!(
                            "SIGNAL SQLSTATE '45000' SET MESSAGE_TEXT = {}",
                            quote_literal(&message)
                        ));
                        i = end;
                    }
                    None => {
                        warnings.push("RAISE form without a MySQL equivalent left unchanged".to_string());
                        out.push_text(&word.value);
                    }
                }
            }
            Token::Word(word) if word.quote_style.is_none() && is_keyword(word, "BEGIN") => {
                out.push_text(&word.value);
                out.open(Block::Begin);
            }
            Token::Word(word) if word.quote_style.is_none() && is_keyword(word, "CASE") => {
                out.push_text(&word.value);
                out.blocks.push(Block::Case);
            }
            Token::Word(word) if word.quote_style.is_none() && is_keyword(word, "END") => {
                out.close(&word.value);
            }
            Token::Word(word) => match word.quote_style {
                Some('"') | Some('[') | Some('`') => out.push_text(&quote_identifier(&word.value)),
                _ => out.push_text(&token.to_string()),
            },
            Token::SingleQuotedString(s) => out.push_text(&quote_literal(s)),
            Token::SemiColon => out.semicolon(),
            Token::Whitespace(Whitespace::SingleLineComment { comment, prefix }) => {
                out.push_text(&format!("{}{}", prefix, comment.trim_end()));
                out.newline();
            }
            Token::Whitespace(_) => out.space(),
            Token::EOF => {}
            other => out.push_text(&other.to_string()),
        }
        i += 1;
    }

    Some(out.finish())
}

fn is_keyword(word: &Word, keyword: &str) -> bool {
    word.value.eq_ignore_ascii_case(keyword)
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

fn next_significant(tokens: &[Token], mut i: usize) -> Option<usize> {
    while i < tokens.len() {
        if !matches!(tokens[i], Token::Whitespace(_)) {
            return Some(i);
        }
        i += 1;
    }
    None
}

/// Match `RAISE ( ABORT|ROLLBACK|FAIL , 'message' )` starting at `start`.
/// Returns the message and the index of the closing parenthesis.
fn match_raise(tokens: &[Token], start: usize) -> Option<(String, usize)> {
    let open = next_significant(tokens, start + 1)?;
    if tokens[open] != Token::LParen {
        return None;
    }
    let action = next_significant(tokens, open + 1)?;
    match &tokens[action] {
        Token::Word(w)
            if ["ABORT", "ROLLBACK", "FAIL"]
                .iter()
                .any(|a| w.value.eq_ignore_ascii_case(a)) => {}
        _ => return None,
    }
    let comma = next_significant(tokens, action + 1)?;
    if tokens[comma] != Token::Comma {
        return None;
    }
    let message_at = next_significant(tokens, comma + 1)?;
    let message = match &tokens[message_at] {
        Token::SingleQuotedString(s) => s.clone(),
        _ => return None,
    };
    let close = next_significant(tokens, message_at + 1)?;
    if tokens[close] != Token::RParen {
        return None;
    }
    Some((message, close))
}

/// MySQL has no `CREATE VIEW IF NOT EXISTS`
fn strip_view_if_not_exists(tokens: &mut Vec<Token>, warnings: &mut Vec<String>) {
    let words: Vec<(usize, String)> = tokens
        .iter()
        .enumerate()
        .filter_map(|(i, t)| match t {
            Token::Word(w) if w.quote_style.is_none() => Some((i, w.value.to_ascii_uppercase())),
            Token::Whitespace(_) => None,
            _ => Some((i, String::new())),
        })
        .take(6)
        .collect();

    let Some(view_at) = words.iter().position(|(_, w)| w == "VIEW") else {
        return;
    };
    let tail: Vec<&str> = words[view_at + 1..].iter().map(|(_, w)| w.as_str()).collect();
    if tail.len() >= 3 && tail[..3] == ["IF", "NOT", "EXISTS"] {
        let from = words[view_at + 1].0;
        let to = words[view_at + 3].0;
        tokens.drain(from..=to);
        warnings.push("IF NOT EXISTS removed from CREATE VIEW".to_string());
    }
}

/// Insert `FOR EACH ROW` before the body when missing and flag WHEN clauses
fn prepare_trigger_header(tokens: &mut Vec<Token>, warnings: &mut Vec<String>) {
    let Some(begin_at) = tokens.iter().position(|t| match t {
        Token::Word(w) => w.quote_style.is_none() && is_keyword(w, "BEGIN"),
        _ => false,
    }) else {
        return;
    };

    let header: Vec<String> = tokens[..begin_at]
        .iter()
        .filter_map(|t| match t {
            Token::Word(w) if w.quote_style.is_none() => Some(w.value.to_ascii_uppercase()),
            _ => None,
        })
        .collect();

    if header.iter().any(|w| w == "WHEN") {
        warnings.push("Trigger WHEN clause is not supported by MySQL and must be moved into the body".to_string());
    }

    let has_for_each_row = header
        .windows(3)
        .any(|w| w[0] == "FOR" && w[1] == "EACH" && w[2] == "ROW");
    if !has_for_each_row {
        let insert: Vec<Token> = vec![
            Token::make_keyword("FOR"),
            Token::Whitespace(Whitespace::Space),
            Token::make_keyword("EACH"),
            Token::Whitespace(Whitespace::Space),
            Token::make_keyword("ROW"),
            Token::Whitespace(Whitespace::Space),
        ];
        tokens.splice(begin_at..begin_at, insert);
    }
}

/// Accumulates output text with BEGIN/CASE/END aware indentation
#[derive(Default)]
struct Formatter {
    out: String,
    blocks: Vec<Block>,
    at_line_start: bool,
}

impl Formatter {
    fn depth(&self) -> usize {
        self.blocks.iter().filter(|b| **b == Block::Begin).count()
    }

    fn push_text(&mut self, text: &str) {
        if self.at_line_start {
            for _ in 0..self.depth() {
                self.out.push_str(INDENT);
            }
            self.at_line_start = false;
        }
        self.out.push_str(text);
    }

    fn space(&mut self) {
        if !self.at_line_start && !self.out.is_empty() && !self.out.ends_with(' ') {
            self.out.push(' ');
        }
    }

    fn newline(&mut self) {
        let trimmed = self.out.trim_end_matches(' ').len();
        self.out.truncate(trimmed);
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        self.at_line_start = true;
    }

    fn open(&mut self, block: Block) {
        self.blocks.push(block);
        if block == Block::Begin {
            self.newline();
        }
    }

    fn close(&mut self, keyword: &str) {
        match self.blocks.pop() {
            Some(Block::Begin) => {
                self.newline();
                self.push_text(keyword);
            }
            _ => self.push_text(keyword),
        }
    }

    /// Remove `word` when it is the last thing written, e.g. `SELECT` before a SIGNAL
    fn drop_trailing_word(&mut self, word: &str) {
        let trimmed = self.out.trim_end_matches(' ');
        if trimmed.len() >= word.len() {
            let start = trimmed.len() - word.len();
            let boundary = start == 0 || !trimmed[..start].ends_with(|c: char| c.is_alphanumeric() || c == '_');
            if boundary && trimmed.is_char_boundary(start) && trimmed[start..].eq_ignore_ascii_case(word) {
                self.out.truncate(start);
            }
        }
    }

    fn semicolon(&mut self) {
        let trimmed = self.out.trim_end_matches(' ').len();
        self.out.truncate(trimmed);
        self.push_text(";");
        if self.blocks.last() == Some(&Block::Begin) {
            self.newline();
        }
    }

    fn finish(mut self) -> String {
        let trimmed = self.out.trim_end().len();
        self.out.truncate(trimmed);
        self.out
    }
}

//! Tolerant lexer for edit calls.
//!
//! Edit text is free-form model output, so this is not a strict grammar.
//! The parser finds call sites by name, cuts each call's argument text, and
//! lexes it into tokens. Anything it cannot place is skipped. A broken
//! object literal drops only that token, never the whole call.

use std::sync::LazyLock;

use regex::Regex;

use super::loose::parse_loose_object;
use super::{Diagnostic, EditOp, RowData};
use crate::cell_id::DataCol;

static CALL_SITE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(insertRow|updateRow|deleteRow)\s*\(").expect("call-site pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Bare non-negative integer.
    Number(usize),
    /// Quoted string, or any other literal that is not an index.
    StringLit(String),
    /// Object literal with numeric keys only.
    Mapping(RowData),
}

/// One call site and its lexed arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCall {
    pub op: EditOp,
    /// Byte offset of the call name, relative to the start of the turn's
    /// edit text.
    pub offset: usize,
    /// The call text as written, for diagnostics.
    pub source: String,
    pub tokens: Vec<Token>,
}

/// Find and lex every call in `text`. `base_offset` is added to each call's
/// offset so calls from several spans keep a single ordering.
pub fn parse_calls(text: &str, base_offset: usize) -> (Vec<ParsedCall>, Vec<Diagnostic>) {
    let sites: Vec<(usize, usize, EditOp)> = CALL_SITE
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let op = EditOp::from_call_name(caps.get(1)?.as_str())?;
            Some((whole.start(), whole.end(), op))
        })
        .collect();

    let mut calls = Vec::with_capacity(sites.len());
    let mut diagnostics = Vec::new();

    for (i, &(start, args_start, op)) in sites.iter().enumerate() {
        let segment_end = sites.get(i + 1).map(|s| s.0).unwrap_or(text.len());
        let segment = &text[start..segment_end];
        let open = args_start - start - 1;

        let Some(close) = find_call_end(segment, open) else {
            diagnostics.push(Diagnostic::MalformedCall {
                call: segment.trim().to_string(),
                reason: "missing closing parenthesis".into(),
            });
            continue;
        };

        let source = segment[..=close].to_string();
        let args = &segment[open + 1..close];
        let tokens = tokenize(args, &source, &mut diagnostics);
        calls.push(ParsedCall { op, offset: base_offset + start, source, tokens });
    }

    (calls, diagnostics)
}

/// Index of the `)` closing the call whose `(` is at `open`. Falls back to
/// the last `)` in the segment when quotes or braces do not balance.
fn find_call_end(segment: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in segment[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && c == ')' {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }

    segment.rfind(')').filter(|&i| i > open)
}

/// Index of the `}` closing the object literal at `start`. Falls back to the
/// last `}` in the text.
fn find_object_end(args: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in args[start..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i);
                }
            }
            _ => {}
        }
    }

    args.rfind('}').filter(|&i| i > start)
}

fn tokenize(args: &str, call: &str, diagnostics: &mut Vec<Diagnostic>) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = args.char_indices().peekable();

    while let Some(&(i, c)) = chars.peek() {
        match c {
            '"' | '\'' => {
                chars.next();
                let mut end = None;
                for (j, d) in chars.by_ref() {
                    if d == c {
                        end = Some(j);
                        break;
                    }
                }
                match end {
                    Some(j) => tokens.push(Token::StringLit(args[i + 1..j].to_string())),
                    // Stray quote with nothing after it
                    None => break,
                }
            }
            '{' => {
                let Some(end) = find_object_end(args, i) else {
                    diagnostics.push(Diagnostic::DroppedMapping {
                        call: call.to_string(),
                        text: args[i..].to_string(),
                    });
                    break;
                };
                let raw = &args[i..=end];
                match parse_loose_object(raw) {
                    Some(entries) => tokens.push(Token::Mapping(numeric_keys(entries))),
                    None => diagnostics.push(Diagnostic::DroppedMapping {
                        call: call.to_string(),
                        text: raw.to_string(),
                    }),
                }
                while chars.peek().is_some_and(|&(j, _)| j <= end) {
                    chars.next();
                }
            }
            '-' | '0'..='9' => {
                chars.next();
                let mut end = i + c.len_utf8();
                while let Some(&(j, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = j + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &args[i..end];
                match literal.parse::<usize>() {
                    Ok(n) => tokens.push(Token::Number(n)),
                    Err(_) if literal == "-" => {}
                    Err(_) => tokens.push(Token::StringLit(literal.to_string())),
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                // Identifiers (a model writing `tableIndex=0`, `true`) carry no data.
                while chars.peek().is_some_and(|&(_, d)| d.is_alphanumeric() || d == '_') {
                    chars.next();
                }
            }
            _ => {
                chars.next();
            }
        }
    }

    tokens
}

fn numeric_keys(entries: Vec<(String, crate::cell::CellValue)>) -> RowData {
    let mut data = RowData::new();
    for (key, value) in entries {
        if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(col) = key.parse::<usize>() {
                data.insert(DataCol(col), value);
                continue;
            }
        }
        log::debug!("dropping non-numeric column key {:?}", key);
    }
    data
}

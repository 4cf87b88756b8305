use regex::{Captures, Regex};
use std::collections::BTreeSet;

use super::{clean_docs, group, BlockKind, BlockParser, SpecBlock};
use crate::{
    error::{DocbindError, ParseError},
    model::{split_top_level, Arg, BlockEntry, MethodModel, SignalModel},
};

/// A signature as written in the documentation, before it is split into a method or a signal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub args: Vec<Arg>,
    pub returns: Vec<String>,
    pub docs: String,
    pub errors: BTreeSet<String>,
}

/// The grammar shared by method and signal blocks.
///
/// Strict: `<ret, …> Name(<type> <name>, …)[ annotations]`.
/// Loose: `Name(<type> <name>, …)[ -> (<ret>, …)]`, with `→` accepted for `->`.
///
/// The argument list may wrap over several non-blank lines.
#[derive(Debug, Clone)]
pub struct SignatureParser {
    strict: Regex,
    loose: Regex,
    errors_line: Regex,
    error_ident: Regex,
}

impl SignatureParser {
    pub fn new() -> Result<SignatureParser, DocbindError> {
        let strict = Regex::new(
            r"(?s)^[ \t]*(?P<rets>[a-z][^\n(]*?)[ \t]+(?P<name>[A-Z][A-Za-z0-9_]*)[ \t]*\((?P<args>[^)\n]*(?:\n[ \t]*[^)\s][^)\n]*)*)\s*\)(?P<tail>[^\n]*)(?:\n(?P<docs>.*))?$",
        )?;
        let loose = Regex::new(
            r"(?s)^[ \t]*(?P<name>[A-Z][A-Za-z0-9_]*)[ \t]*\((?P<args>[^)\n]*(?:\n[ \t]*[^)\s][^)\n]*)*)\s*\)[ \t]*(?:(?:->|→)[ \t]*\(?(?P<rets>[^)\n]*)\)?)?(?P<tail>[^\n]*)(?:\n(?P<docs>.*))?$",
        )?;
        let errors_line = Regex::new(r"(?i)possible\s+errors\s*:(?P<rest>.*)")?;
        let error_ident = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)+$")?;
        Ok(SignatureParser {
            strict,
            loose,
            errors_line,
            error_ident,
        })
    }

    pub fn parse(&self, block: &SpecBlock) -> Result<Signature, ParseError> {
        let caps = self
            .strict
            .captures(&block.text)
            .or_else(|| self.loose.captures(&block.text))
            .ok_or_else(|| block.no_match())?;
        Ok(self.build(&caps))
    }

    fn build(&self, caps: &Captures) -> Signature {
        let args = split_top_level(&collapse_ws(group(caps, "args")), ',')
            .iter()
            .filter(|part| part.as_str() != "void")
            .enumerate()
            .map(|(idx, part)| {
                let (ty, name) = split_type_and_name(part);
                Arg::new(ty, name.unwrap_or_else(|| format!("arg{idx}")))
            })
            .collect();

        let returns = split_top_level(group(caps, "rets"), ',')
            .iter()
            .map(|part| split_type_and_name(part).0)
            .filter(|ty| ty != "void")
            .collect();

        let raw_docs = group(caps, "docs");
        let errors = self.collect_errors(raw_docs);
        let mut docs = clean_docs(raw_docs);
        let tail = group(caps, "tail").trim();
        if !tail.is_empty() {
            docs = if docs.is_empty() {
                tail.to_string()
            } else {
                format!("{tail} {docs}")
            };
        }

        Signature {
            name: group(caps, "name").to_string(),
            args,
            returns,
            docs,
            errors,
        }
    }

    /// Error identifiers listed after `Possible errors:` and on the continuation lines that
    /// follow it.
    fn collect_errors(&self, docs: &str) -> BTreeSet<String> {
        let mut errors = BTreeSet::new();
        let mut in_list = false;
        for line in docs.lines() {
            if let Some(caps) = self.errors_line.captures(line) {
                let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or_default();
                errors.extend(
                    error_tokens(rest)
                        .filter(|t| self.error_ident.is_match(t))
                        .map(String::from),
                );
                in_list = true;
                continue;
            }
            if !in_list {
                continue;
            }
            let tokens: Vec<&str> = error_tokens(line).collect();
            if !tokens.is_empty() && tokens.iter().all(|t| self.error_ident.is_match(t)) {
                errors.extend(tokens.into_iter().map(String::from));
            } else {
                in_list = false;
            }
        }
        errors
    }
}

/// Join a wrapped list back onto one line.
fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<&str>>().join(" ")
}

fn error_tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
}

/// Split `array{object, dict} items` into its type and optional name at the last whitespace
/// outside braces.
fn split_type_and_name(part: &str) -> (String, Option<String>) {
    let mut depth = 0usize;
    let mut split_at = None;
    for (idx, ch) in part.char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => split_at = Some(idx),
            _ => {}
        }
    }
    match split_at {
        Some(idx) => {
            let ty = part[..idx].trim();
            let name = part[idx..].trim();
            if ty.is_empty() {
                (name.to_string(), None)
            } else {
                (ty.to_string(), Some(name.to_string()))
            }
        }
        None => (part.trim().to_string(), None),
    }
}

#[derive(Debug, Clone)]
pub struct MethodParser(SignatureParser);

impl MethodParser {
    pub fn new() -> Result<MethodParser, DocbindError> {
        Ok(MethodParser(SignatureParser::new()?))
    }

    pub fn parse(&self, block: &SpecBlock) -> Result<MethodModel, ParseError> {
        let sig = self.0.parse(block)?;
        Ok(MethodModel {
            name: sig.name,
            args: sig.args,
            returns: sig.returns,
            docs: sig.docs,
            errors: sig.errors,
        })
    }
}

impl BlockParser for MethodParser {
    fn kind(&self) -> BlockKind {
        BlockKind::Method
    }

    fn parse_entry(&self, block: &SpecBlock) -> Result<BlockEntry, ParseError> {
        self.parse(block).map(BlockEntry::Method)
    }
}

/// Signals share the method grammar; a return list on a signal line is ignored.
#[derive(Debug, Clone)]
pub struct SignalParser(SignatureParser);

impl SignalParser {
    pub fn new() -> Result<SignalParser, DocbindError> {
        Ok(SignalParser(SignatureParser::new()?))
    }

    pub fn parse(&self, block: &SpecBlock) -> Result<SignalModel, ParseError> {
        let sig = self.0.parse(block)?;
        Ok(SignalModel {
            name: sig.name,
            args: sig.args,
            docs: sig.docs,
            errors: sig.errors,
        })
    }
}

impl BlockParser for SignalParser {
    fn kind(&self) -> BlockKind {
        BlockKind::Signal
    }

    fn parse_entry(&self, block: &SpecBlock) -> Result<BlockEntry, ParseError> {
        self.parse(block).map(BlockEntry::Signal)
    }
}

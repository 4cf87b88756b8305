//! Interface documentation parsing.
//!
//! A documentation file is split into [`SpecUnit`]s, one per interface. Each unit carries its
//! header (`Service`, `Interface`, `Object path`) and the raw [`SpecBlock`]s found under its
//! `Methods`, `Signals` and `Properties` sections. Blocks are turned into model entries by the
//! [`BlockParser`] implementations:
//!
//! - [`PropertyParser`] - `<type> <Name> [flags]` plus a docs paragraph
//! - [`MethodParser`] - `<returns> Name(args)` or `Name(args) -> (returns)`
//! - [`SignalParser`] - the method grammar without returns
//!
//! Every parser tries a strict grammar alternative first and falls back to a looser one. A block
//! neither alternative matches yields [`ParseError::NoMatch`]; whether that skips the block or
//! aborts the corpus is decided by the caller's [`ParsePolicy`].

use regex::Captures;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{
    error::{DocbindError, ParseError},
    model::{BlockEntry, InterfaceModel},
};

pub mod diagnostic;
pub mod method;
pub mod property;

pub use diagnostic::ParseDiagnostic;
pub use method::{MethodParser, SignalParser};
pub use property::PropertyParser;

const TAB_WIDTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BlockKind {
    Property,
    Method,
    Signal,
}

impl Display for BlockKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            BlockKind::Property => write!(f, "property"),
            BlockKind::Method => write!(f, "method"),
            BlockKind::Signal => write!(f, "signal"),
        }
    }
}

impl BlockKind {
    fn from_section(keyword: &str) -> Option<BlockKind> {
        match keyword {
            "Methods" => Some(BlockKind::Method),
            "Signals" => Some(BlockKind::Signal),
            "Properties" => Some(BlockKind::Property),
            _ => None,
        }
    }
}

/// What to do with a block no grammar alternative matches.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParsePolicy {
    /// Record a [`ParseDiagnostic::Skipped`] and continue.
    #[default]
    SkipMalformed,
    /// Fail the whole corpus on the first malformed block.
    Abort,
}

/// One raw block of documentation text. `line` is the 1-based line of its signature in the source
/// file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecBlock {
    pub kind: BlockKind,
    pub text: String,
    pub line: usize,
}

impl SpecBlock {
    pub fn new<S: Into<String>>(kind: BlockKind, text: S) -> SpecBlock {
        SpecBlock {
            kind,
            text: text.into(),
            line: 1,
        }
    }

    /// The signature line, shortened for error messages.
    pub fn snippet(&self) -> String {
        let first = self.text.lines().next().unwrap_or_default().trim();
        if first.chars().count() > 60 {
            format!("{}...", first.chars().take(60).collect::<String>())
        } else {
            first.to_string()
        }
    }

    pub(crate) fn no_match(&self) -> ParseError {
        ParseError::NoMatch {
            kind: self.kind,
            line: self.line,
            snippet: self.snippet(),
        }
    }
}

/// Turns one [`SpecBlock`] into one model entry.
pub trait BlockParser: Send + Sync {
    fn kind(&self) -> BlockKind;

    fn parse_entry(&self, block: &SpecBlock) -> Result<BlockEntry, ParseError>;
}

/// The three block parsers, dispatched by block kind.
#[derive(Debug, Clone)]
pub struct BlockParsers {
    pub property: PropertyParser,
    pub method: MethodParser,
    pub signal: SignalParser,
}

impl BlockParsers {
    pub fn new() -> Result<BlockParsers, DocbindError> {
        Ok(BlockParsers {
            property: PropertyParser::new()?,
            method: MethodParser::new()?,
            signal: SignalParser::new()?,
        })
    }

    pub fn parser(&self, kind: BlockKind) -> &dyn BlockParser {
        match kind {
            BlockKind::Property => &self.property,
            BlockKind::Method => &self.method,
            BlockKind::Signal => &self.signal,
        }
    }

    pub fn parse(&self, block: &SpecBlock) -> Result<BlockEntry, ParseError> {
        self.parser(block.kind).parse_entry(block)
    }

    /// Parse every block of `unit`. Under [`ParsePolicy::SkipMalformed`] failing blocks are
    /// reported through `diagnostics` and left out of the result.
    pub fn parse_unit(
        &self,
        unit: &SpecUnit,
        policy: ParsePolicy,
        diagnostics: &mut Vec<ParseDiagnostic>,
    ) -> Result<Vec<BlockEntry>, ParseError> {
        let mut entries = Vec::with_capacity(unit.blocks.len());
        for block in unit.blocks.iter() {
            match self.parse(block) {
                Ok(entry) => {
                    tracing::debug!(
                        "[BlockParsers] {}: parsed {} '{}' (line {})",
                        unit.interface,
                        block.kind,
                        entry.name(),
                        block.line
                    );
                    entries.push(entry);
                }
                Err(e) => match policy {
                    ParsePolicy::Abort => return Err(e),
                    ParsePolicy::SkipMalformed => {
                        tracing::warn!("[BlockParsers] {}: skipping block. {}", unit.interface, e);
                        diagnostics.push(ParseDiagnostic::Skipped {
                            source: unit.source_name.clone(),
                            interface: unit.interface.clone(),
                            kind: block.kind,
                            line: block.line,
                            reason: e.to_string(),
                        });
                    }
                },
            }
        }
        Ok(entries)
    }
}

/// The part of a documentation file describing one interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecUnit {
    pub source_name: String,
    pub title: String,
    pub service: String,
    pub interface: String,
    pub object_path: String,
    pub docs: String,
    pub blocks: Vec<SpecBlock>,
}

impl SpecUnit {
    /// An [`InterfaceModel`] carrying this unit's header and no members.
    pub fn header(&self) -> InterfaceModel {
        InterfaceModel {
            name: self.interface.clone(),
            title: self.title.clone(),
            service: self.service.clone(),
            object_path: self.object_path.clone(),
            docs: self.docs.clone(),
            ..Default::default()
        }
    }
}

struct Line {
    number: usize,
    text: String,
}

impl Line {
    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    fn indent(&self) -> usize {
        leading_ws(&self.text)
    }
}

fn leading_ws(s: &str) -> usize {
    s.bytes().take_while(|b| *b == b' ' || *b == b'\t').count()
}

fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut column = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = TAB_WIDTH - column % TAB_WIDTH;
            out.extend(std::iter::repeat_n(' ', pad));
            column += pad;
        } else {
            out.push(ch);
            column += 1;
        }
    }
    out.trim_end().to_string()
}

fn is_underline(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c == '=')
}

fn is_unit_title(lines: &[Line], idx: usize) -> bool {
    let title = lines[idx].text.trim().to_ascii_lowercase();
    (title.ends_with("hierarchy") || title.ends_with("hierarchies"))
        && lines.get(idx + 1).is_some_and(|next| is_underline(&next.text))
}

/// `Keyword<ws>value` at column 0, for the unit header lines.
fn header_value<'a>(text: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(keyword)?;
    if rest.is_empty() {
        return Some(rest);
    }
    if rest.starts_with(' ') {
        Some(rest.trim())
    } else {
        None
    }
}

/// A section keyword at column 0, with or without a trailing colon; returns the kind and the line
/// with the keyword blanked out so that the first signature keeps its column.
fn section_start(text: &str) -> Option<(BlockKind, String)> {
    let keyword: String = text.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let kind = BlockKind::from_section(&keyword)?;
    let mut consumed = keyword.len();
    let mut rest = &text[consumed..];
    if let Some(stripped) = rest.strip_prefix(':') {
        rest = stripped;
        consumed += 1;
    }
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some((kind, format!("{}{rest}", " ".repeat(consumed))))
}

/// Text of a named capture group, empty when the group did not participate.
pub(crate) fn group<'a>(caps: &'a Captures, name: &str) -> &'a str {
    caps.name(name).map(|m| m.as_str()).unwrap_or_default()
}

/// Dedent a docs paragraph by its common indentation and trim it.
pub fn clean_docs(raw: &str) -> String {
    let indent = raw
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(leading_ws)
        .min()
        .unwrap_or(0);
    raw.lines()
        .map(|l| {
            if l.trim().is_empty() {
                ""
            } else {
                l[indent..].trim_end()
            }
        })
        .collect::<Vec<&str>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Split a section body into blocks. A block starts at the first non-blank line, and again at
/// every non-blank line that follows a blank line and is indented no deeper than the section's
/// first signature.
fn split_blocks(kind: BlockKind, lines: &[Line]) -> Vec<SpecBlock> {
    let Some(first) = lines.iter().find(|l| !l.is_blank()) else {
        return Vec::new();
    };
    let sig_indent = first.indent();
    let mut blocks = Vec::new();
    let mut current: Option<(usize, Vec<&str>)> = None;
    let mut after_blank = true;
    for line in lines.iter() {
        if line.is_blank() {
            if let Some((_, body)) = current.as_mut() {
                body.push("");
            }
            after_blank = true;
            continue;
        }
        if after_blank && line.indent() <= sig_indent {
            if let Some((number, body)) = current.take() {
                blocks.push(finish_block(kind, number, body, sig_indent));
            }
            current = Some((line.number, Vec::new()));
        }
        if let Some((_, body)) = current.as_mut() {
            body.push(&line.text);
        }
        after_blank = false;
    }
    if let Some((number, body)) = current.take() {
        blocks.push(finish_block(kind, number, body, sig_indent));
    }
    blocks
}

fn finish_block(kind: BlockKind, line: usize, body: Vec<&str>, indent: usize) -> SpecBlock {
    let text = body
        .iter()
        .map(|l| {
            let strip = indent.min(leading_ws(l));
            &l[strip..]
        })
        .collect::<Vec<&str>>()
        .join("\n");
    SpecBlock {
        kind,
        text: text.trim_end().to_string(),
        line,
    }
}

/// Split a documentation file into [`SpecUnit`]s. A unit starts at a `<Title> hierarchy` (or
/// `hierarchies`, any case) line underlined with `=`; a file without such a title is a single
/// unit. Units without an `Interface` header, or with a second one, are malformed.
pub fn split_units(source_name: &str, content: &str) -> Result<Vec<SpecUnit>, ParseError> {
    let lines: Vec<Line> = content
        .lines()
        .enumerate()
        .map(|(idx, text)| Line {
            number: idx + 1,
            text: expand_tabs(text),
        })
        .collect();

    let starts: Vec<usize> = (0..lines.len())
        .filter(|idx| is_unit_title(&lines, *idx))
        .collect();
    let ranges: Vec<(usize, usize)> = if starts.is_empty() {
        vec![(0, lines.len())]
    } else {
        starts
            .iter()
            .enumerate()
            .map(|(i, start)| (*start, starts.get(i + 1).copied().unwrap_or(lines.len())))
            .collect()
    };

    let mut units = Vec::new();
    for (start, end) in ranges {
        let unit = split_unit(source_name, &lines[start..end])?;
        if let Some(unit) = unit {
            units.push(unit);
        }
    }
    Ok(units)
}

fn split_unit(source_name: &str, lines: &[Line]) -> Result<Option<SpecUnit>, ParseError> {
    let mut unit = SpecUnit {
        source_name: source_name.to_string(),
        ..Default::default()
    };
    let mut body_start = 0;
    if !lines.is_empty() && is_unit_title(lines, 0) {
        unit.title = lines[0].text.trim().to_string();
        body_start = 2;
    }

    let mut docs: Vec<&str> = Vec::new();
    let mut sections: Vec<(BlockKind, Vec<Line>)> = Vec::new();
    for line in lines[body_start..].iter() {
        if let Some((kind, text)) = section_start(&line.text) {
            sections.push((
                kind,
                vec![Line {
                    number: line.number,
                    text,
                }],
            ));
            continue;
        }
        if let Some((_, section)) = sections.last_mut() {
            if let Some(value) = header_value(&line.text, "Interface") {
                return Err(second_interface(source_name, &unit, value, line.number));
            }
            section.push(Line {
                number: line.number,
                text: line.text.clone(),
            });
            continue;
        }
        if let Some(value) = header_value(&line.text, "Service") {
            unit.service = value.to_string();
        } else if let Some(value) = header_value(&line.text, "Interface") {
            if !unit.interface.is_empty() {
                return Err(second_interface(source_name, &unit, value, line.number));
            }
            let value = match value.find('[') {
                Some(idx) => value[..idx].trim(),
                None => value,
            };
            unit.interface = value.to_string();
        } else if let Some(value) = header_value(&line.text, "Object path") {
            unit.object_path = value.to_string();
        } else {
            docs.push(&line.text);
        }
    }

    if unit.interface.is_empty() {
        if unit.title.is_empty() && sections.is_empty() {
            // Prose-only files (api overviews, changelogs) carry no interface.
            return Ok(None);
        }
        return Err(malformed(source_name, &unit, "missing Interface header".to_string()));
    }

    unit.docs = clean_docs(&docs.join("\n"));
    for (kind, section) in sections.iter() {
        unit.blocks.extend(split_blocks(*kind, section));
    }
    Ok(Some(unit))
}

fn malformed(source_name: &str, unit: &SpecUnit, reason: String) -> ParseError {
    ParseError::MalformedUnit {
        source_name: source_name.to_string(),
        unit: if unit.title.is_empty() {
            "<untitled>".to_string()
        } else {
            unit.title.clone()
        },
        reason,
    }
}

/// Two interfaces without a unit title between them would otherwise merge into one unit.
fn second_interface(source_name: &str, unit: &SpecUnit, value: &str, line: usize) -> ParseError {
    let reason = if unit.interface.is_empty() {
        format!("Interface header '{value}' at line {line} follows a section")
    } else {
        format!(
            "second Interface header '{value}' at line {line} (unit already declares '{}')",
            unit.interface
        )
    };
    malformed(source_name, unit, reason)
}

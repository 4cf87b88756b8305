use regex::{Captures, Regex};

use super::{clean_docs, group, BlockKind, BlockParser, SpecBlock};
use crate::{
    error::{DocbindError, ParseError},
    model::{BlockEntry, Flag, FlagSet, PropertyModel},
};

/// Type keywords a property block may start with. `array{…}` and `dict{…}` allow one level of
/// nested braces.
pub(crate) const TYPE_PATTERN: &str = r"(?:array\{(?:[^{}\n]|\{[^{}\n]*\})*\}|dict(?:\{(?:[^{}\n]|\{[^{}\n]*\})*\})?|boolean|bool|byte|string|int16|uint16_t|uint16|int32|uint32|int64|uint64|double|object|variant|fd)";

const OPTIONAL: &str = "(optional)";

/// Parses `<type> <Name>[ (optional)] [<flags>]` blocks.
#[derive(Debug, Clone)]
pub struct PropertyParser {
    strict: Regex,
    loose: Regex,
}

impl PropertyParser {
    pub fn new() -> Result<PropertyParser, DocbindError> {
        let strict = Regex::new(&format!(
            r"(?s)^[ \t]*(?P<ty>{TYPE_PATTERN})[ \t]+(?P<name>[A-Z][^\[\n]*?)[ \t]*(?P<flags>\[[^\n]*)(?:\n(?P<docs>.*))?$"
        ))?;
        let loose = Regex::new(&format!(
            r"(?s)^[ \t]*(?P<ty>{TYPE_PATTERN})[ \t]+(?P<name>[A-Z][^\n]*?)[ \t]*(?:\n(?P<docs>.*))?$"
        ))?;
        Ok(PropertyParser { strict, loose })
    }

    pub fn parse(&self, block: &SpecBlock) -> Result<PropertyModel, ParseError> {
        // Order matters: blocks without a flag list only match the loose form.
        let caps = self
            .strict
            .captures(&block.text)
            .or_else(|| self.loose.captures(&block.text))
            .ok_or_else(|| block.no_match())?;
        Ok(build_property(&caps))
    }
}

impl BlockParser for PropertyParser {
    fn kind(&self) -> BlockKind {
        BlockKind::Property
    }

    fn parse_entry(&self, block: &SpecBlock) -> Result<BlockEntry, ParseError> {
        self.parse(block).map(BlockEntry::Property)
    }
}

fn build_property(caps: &Captures) -> PropertyModel {
    let raw_name = group(caps, "name");
    let raw_flags = group(caps, "flags");
    let mut optional = false;

    let mut name_text = raw_name.to_string();
    if name_text.contains("optional") && name_text.contains(OPTIONAL) {
        name_text = name_text.replacen(OPTIONAL, "", 1);
        optional = true;
    }
    if raw_flags.contains(OPTIONAL) {
        optional = true;
    }

    let name_text = name_text.trim();
    let (name, annotation) = match name_text.find(char::is_whitespace) {
        Some(idx) => (&name_text[..idx], name_text[idx..].trim()),
        None => (name_text, ""),
    };

    let mut docs = clean_docs(group(caps, "docs"));
    if !annotation.is_empty() {
        docs = join_docs(annotation, &docs);
    }
    if optional {
        docs = join_docs(OPTIONAL, &docs);
    }

    PropertyModel {
        ty: group(caps, "ty").to_string(),
        name: name.to_string(),
        flags: parse_flags(raw_flags),
        docs,
    }
}

fn join_docs(front: &str, docs: &str) -> String {
    if docs.is_empty() {
        front.to_string()
    } else {
        format!("{front} {docs}")
    }
}

/// Map the bracketed flag list to a [`FlagSet`]. Unknown tokens are dropped; when both readonly
/// and readwrite appear the last one wins.
pub fn parse_flags(raw: &str) -> FlagSet {
    let mut flags = FlagSet::new();
    let inner = raw.trim_matches(|c: char| c == '[' || c == ']' || c.is_whitespace());
    for token in inner.split(',') {
        let token = token.split(']').next().unwrap_or_default().trim();
        match token.to_ascii_lowercase().as_str() {
            "readonly" => {
                flags.remove(Flag::ReadWrite);
                flags.insert(Flag::ReadOnly);
            }
            "readwrite" => {
                flags.remove(Flag::ReadOnly);
                flags.insert(Flag::ReadWrite);
            }
            "experimental" => {
                flags.insert(Flag::Experimental);
            }
            _ => {}
        }
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn parse(text: &str) -> Result<PropertyModel, ParseError> {
        PropertyParser::new()
            .unwrap()
            .parse(&SpecBlock::new(BlockKind::Property, text))
    }

    #[test]
    fn strict_form_with_flags() {
        let prop = parse("object Device [readonly]\n\n        Device object which the transport is connected to.").unwrap();
        assert_eq!(prop.ty, "object");
        assert_eq!(prop.name, "Device");
        assert_eq!(prop.flags, FlagSet::only(Flag::ReadOnly));
        assert_eq!(
            prop.docs,
            "Device object which the transport is connected to."
        );
    }

    #[test]
    fn readwrite_never_with_readonly() {
        let prop = parse("uint16 Volume [readwrite]\n        Volume level.").unwrap();
        assert_eq!(prop.flags, FlagSet::only(Flag::ReadWrite));

        let prop = parse("uint16 Volume [readonly, readwrite]").unwrap();
        assert_eq!(prop.flags, FlagSet::only(Flag::ReadWrite));
    }

    #[test]
    fn optional_migrates_to_docs() {
        let prop = parse("uint16 Handle (optional) [readwrite]\n\n        Characteristic handle.").unwrap();
        assert_eq!(prop.name, "Handle");
        assert_eq!(prop.docs, "(optional) Characteristic handle.");
        assert!(prop.is_optional());
    }

    #[test]
    fn loose_form_without_flags() {
        let prop = parse("array{string} Includes\n\n        Services included.").unwrap();
        assert_eq!(prop.ty, "array{string}");
        assert_eq!(prop.name, "Includes");
        assert!(prop.flags.is_empty());
        assert_eq!(prop.docs, "Services included.");
    }

    #[test]
    fn loose_annotation_moves_to_docs() {
        let prop = parse("boolean Primary (Server Only)\n        Primary service.").unwrap();
        assert_eq!(prop.name, "Primary");
        assert_eq!(prop.docs, "(Server Only) Primary service.");
    }

    #[test]
    fn malformed_flag_fragments_and_unknown_tokens() {
        let prop = parse("string Name [readonly], experimental]").unwrap();
        assert_eq!(prop.flags, Flag::ReadOnly | Flag::Experimental);

        let prop = parse("dict ManufacturerData [readonly, optional, Experimental]").unwrap();
        assert_eq!(prop.ty, "dict");
        assert_eq!(prop.flags, Flag::ReadOnly | Flag::Experimental);
    }

    #[test]
    fn no_match_reports_line() {
        let err = parse("This is prose, not a property.").unwrap_err();
        match err {
            ParseError::NoMatch { kind, line, .. } => {
                assert_eq!(kind, BlockKind::Property);
                assert_eq!(line, 1);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(parse("quaternion Orientation [readonly]").is_err());
    }
}

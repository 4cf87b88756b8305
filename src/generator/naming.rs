const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// `MediaTransport1` -> `media_transport1`, `UUIDs` -> `uuids`, `IOCapability` -> `io_capability`.
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + 4);
    for (i, ch) in chars.iter().copied().enumerate() {
        if ch.is_uppercase() {
            let prev = i.checked_sub(1).and_then(|p| chars.get(p)).copied();
            let next = chars.get(i + 1).copied();
            let after = chars.get(i + 2).copied();
            // A trailing lowercase `s` after an acronym is a plural, not a new word.
            let plural = next == Some('s') && !after.is_some_and(|c| c.is_lowercase());
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => {
                    next.is_some_and(|n| n.is_lowercase()) && !plural
                }
                _ => false,
            };
            if boundary && !result.ends_with('_') {
                result.push('_');
            }
            result.extend(ch.to_lowercase());
        } else if ch.is_alphanumeric() {
            result.push(ch);
        } else if !result.is_empty() && !result.ends_with('_') {
            result.push('_');
        }
    }
    result.trim_end_matches('_').to_string()
}

pub fn to_upper_snake_case(s: &str) -> String {
    to_snake_case(s).to_ascii_uppercase()
}

pub fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

/// A plain identifier: `[A-Za-z_][A-Za-z0-9_]*`, not `_` alone.
pub fn is_valid_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    s != "_" && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Snake-case `name` and move it off the keyword list.
pub fn field_ident(name: &str) -> String {
    let ident = to_snake_case(name);
    if is_keyword(&ident) {
        format!("{ident}_")
    } else {
        ident
    }
}

/// Lowercase path segment usable as a module name.
pub fn module_ident(segment: &str) -> String {
    let mut ident: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if is_keyword(&ident) {
        ident.push('_');
    }
    ident
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn snake_case_conventions() {
        assert_eq!(to_snake_case("MediaTransport1"), "media_transport1");
        assert_eq!(to_snake_case("UUIDs"), "uuids");
        assert_eq!(to_snake_case("UUID"), "uuid");
        assert_eq!(to_snake_case("RSSI"), "rssi");
        assert_eq!(to_snake_case("TxPower"), "tx_power");
        assert_eq!(to_snake_case("IOCapability"), "io_capability");
        assert_eq!(to_snake_case("LEAdvertisingManager1"), "le_advertising_manager1");
        assert_eq!(to_snake_case("ServiceUUIDs"), "service_uuids");
        assert_eq!(to_snake_case("Obex1Transfer"), "obex1_transfer");
        assert_eq!(to_upper_snake_case("PropertyChanged"), "PROPERTY_CHANGED");
    }

    #[test]
    fn identifiers() {
        assert_eq!(field_ident("Type"), "type_");
        assert_eq!(field_ident("Class"), "class");
        assert!(is_valid_ident("media_transport1"));
        assert!(!is_valid_ident("1st"));
        assert!(!is_valid_ident("_"));
        assert!(!is_valid_ident("has-dash"));
        assert_eq!(module_ident("BlueZ"), "bluez");
        assert_eq!(module_ident("mod"), "mod_");
        assert_eq!(module_ident("3d"), "_3d");
    }
}

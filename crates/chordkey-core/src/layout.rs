//! Chord layout files.
//!
//! ```text
//! ; Layout name
//! [chords]
//! 0,0,1 1,0,0 = char r
//! [singles]
//! 0,2,0 = keycode 115 End
//! 1,0,0 = mod 64 ❖
//! 1,2,1 = char a +1
//! 0,4,1 = command hide Hide
//! ```
//!
//! Keys are `side,col,row`. Right of `=` comes the action kind, its
//! payload, an optional label and, for typing actions, `+<code>` modifiers
//! locked around that one key press. Quoted tokens accept `\\`, `\"`,
//! `\n` and `\t`.

use crate::action::{keysym_from_name, Action, Command};
use crate::chord::{ChordMapping, ChordMappingBuilder, ConflictError};
use crate::grid::Dimensions;
use crate::types::{KeyCoord, ModCode, Side};
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

const BUILTIN_LAYOUT: &str = include_str!("../layouts/default.chords");

/// Host callbacks that `command` entries can refer to by name.
pub type CommandTable = HashMap<String, Command>;

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: unknown keysym \"{name}\"")]
    UnknownKeysym { line: usize, name: String },
    #[error("line {line}: unknown command \"{name}\"")]
    UnknownCommand { line: usize, name: String },
    #[error("line {line}: key {key} is outside the keyboard")]
    KeyOutOfRange { line: usize, key: KeyCoord },
    #[error("line {line}: {source}")]
    Conflict {
        line: usize,
        #[source]
        source: ConflictError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Chords,
    Singles,
}

pub fn load_layout<P: AsRef<Path>>(
    path: P,
    dimensions: &Dimensions,
    commands: &CommandTable,
) -> anyhow::Result<ChordMapping> {
    let raw = std::fs::read(path)?;
    let text = decode_layout_bytes(&raw);
    Ok(parse_layout_content(text.as_ref(), dimensions, commands)?)
}

/// The layout shipped with the crate, for the default 5x2 panes.
pub fn builtin_layout() -> Result<ChordMapping, LayoutError> {
    parse_layout_content(BUILTIN_LAYOUT, &Dimensions::default(), &CommandTable::new())
}

fn decode_layout_bytes(raw: &[u8]) -> Cow<'_, str> {
    // 1. Check BOM
    if let Some((enc, bom_len)) = encoding_rs::Encoding::for_bom(raw) {
        debug!("Decoded using BOM: {}", enc.name());
        let (cow, _, had_errors) = enc.decode(&raw[bom_len..]);
        if had_errors {
            warn!("Decode had errors (replacement characters used)");
        }
        return cow;
    }

    // 2. Try UTF-8
    match std::str::from_utf8(raw) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => {
            // 3. Older layouts were saved as Latin-1
            debug!("UTF-8 decode failed, falling back to windows-1252");
            let (cow, _, _) = encoding_rs::WINDOWS_1252.decode(raw);
            cow
        }
    }
}

pub fn parse_layout_content(
    content: &str,
    dimensions: &Dimensions,
    commands: &CommandTable,
) -> Result<ChordMapping, LayoutError> {
    let mut builder = ChordMapping::builder();
    let mut name: Option<String> = None;
    let mut section: Option<SectionKind> = None;
    let mut entries = 0usize;

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();

        if line.starts_with(';') {
            if name.is_none() && section.is_none() {
                let n = line.trim_start_matches(';').trim();
                if !n.is_empty() {
                    name = Some(n.to_string());
                }
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }

        if line.starts_with('[') && line.ends_with(']') {
            section = match &line[1..line.len() - 1] {
                "chords" => Some(SectionKind::Chords),
                "singles" => Some(SectionKind::Singles),
                other => {
                    return Err(syntax(line_no, format!("unknown section [{}]", other)));
                }
            };
            continue;
        }

        let Some(kind) = section else {
            return Err(syntax(line_no, "entry outside of a section"));
        };
        let Some((lhs, rhs)) = line.split_once('=') else {
            return Err(syntax(line_no, "expected '='"));
        };

        let keys = lhs
            .split_whitespace()
            .map(|s| parse_key(s, line_no))
            .collect::<Result<Vec<_>, _>>()?;
        for key in &keys {
            if !dimensions.contains(*key) {
                return Err(LayoutError::KeyOutOfRange {
                    line: line_no,
                    key: *key,
                });
            }
        }

        let tokens = tokenize(rhs.trim()).map_err(|m| syntax(line_no, m))?;
        let action = parse_action(&tokens, line_no, commands)?;

        add_entry(&mut builder, kind, &keys, action, line_no)?;
        entries += 1;
    }

    let mut mapping_builder = builder;
    if let Some(n) = name {
        mapping_builder = mapping_builder.name(n);
    }
    let mapping = mapping_builder.build();
    info!(
        "Layout {:?} loaded with {} entries.",
        mapping.name().unwrap_or("<unnamed>"),
        entries
    );
    Ok(mapping)
}

fn add_entry(
    builder: &mut ChordMappingBuilder,
    kind: SectionKind,
    keys: &[KeyCoord],
    action: Action,
    line: usize,
) -> Result<(), LayoutError> {
    let result = match (kind, keys) {
        (SectionKind::Singles, [k]) => builder.single(*k, action).map(|_| ()),
        (SectionKind::Chords, [k1, k2]) => builder.pair(*k1, *k2, action).map(|_| ()),
        (SectionKind::Singles, _) => return Err(syntax(line, "[singles] entries take one key")),
        (SectionKind::Chords, _) => return Err(syntax(line, "[chords] entries take two keys")),
    };
    result.map_err(|source| LayoutError::Conflict { line, source })
}

fn syntax(line: usize, message: impl Into<String>) -> LayoutError {
    LayoutError::Syntax {
        line,
        message: message.into(),
    }
}

fn parse_key(raw: &str, line: usize) -> Result<KeyCoord, LayoutError> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    let [side, col, row] = parts.as_slice() else {
        return Err(syntax(line, format!("bad key \"{}\", expected side,col,row", raw)));
    };
    let num = |s: &str| {
        s.parse::<u8>()
            .map_err(|_| syntax(line, format!("bad number \"{}\" in key \"{}\"", s, raw)))
    };
    let side = Side::from_index(num(*side)?)
        .ok_or_else(|| syntax(line, format!("side must be 0 or 1 in \"{}\"", raw)))?;
    Ok(KeyCoord::new(side, num(*col)?, num(*row)?))
}

fn tokenize(raw: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut chars = raw.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut tok = String::new();
        if c == '"' {
            chars.next();
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => match chars.next() {
                        Some('n') => tok.push('\n'),
                        Some('t') => tok.push('\t'),
                        Some(other) => tok.push(other),
                        None => return Err("dangling escape".to_string()),
                    },
                    other => tok.push(other),
                }
            }
            if !closed {
                return Err("unterminated quote".to_string());
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                tok.push(c);
                chars.next();
            }
        }
        tokens.push(tok);
    }
    Ok(tokens)
}

fn parse_number(raw: &str) -> Option<u32> {
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => raw.parse().ok(),
    }
}

fn parse_action(
    tokens: &[String],
    line: usize,
    commands: &CommandTable,
) -> Result<Action, LayoutError> {
    let [kind, payload, rest @ ..] = tokens else {
        return Err(syntax(line, "expected action kind and value"));
    };

    let mut label: Option<&str> = None;
    let mut mods: Vec<ModCode> = Vec::new();
    for tok in rest {
        if let Some(code) = tok.strip_prefix('+').and_then(parse_number) {
            mods.push(code);
        } else if label.is_none() {
            label = Some(tok.as_str());
        } else {
            return Err(syntax(line, format!("unexpected \"{}\"", tok)));
        }
    }

    let action = match kind.as_str() {
        "char" => {
            let mut chars = payload.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                return Err(syntax(line, format!("char takes one character, got \"{}\"", payload)));
            };
            Action::char(c)
        }
        "keysym" => {
            let sym = keysym_from_name(payload)
                .or_else(|| parse_number(payload))
                .ok_or_else(|| LayoutError::UnknownKeysym {
                    line,
                    name: payload.clone(),
                })?;
            Action::keysym(payload.as_str(), sym)
        }
        "keycode" => {
            let code = parse_number(payload)
                .ok_or_else(|| syntax(line, format!("bad keycode \"{}\"", payload)))?;
            Action::keycode(payload.as_str(), code)
        }
        "text" => Action::text(payload.as_str(), payload.as_str()),
        "mod" => {
            let code = parse_number(payload)
                .ok_or_else(|| syntax(line, format!("bad modifier code \"{}\"", payload)))?;
            Action::modifier(format!("Mod{}", code), code)
        }
        "command" => {
            let cmd = commands
                .get(payload.as_str())
                .cloned()
                .ok_or_else(|| LayoutError::UnknownCommand {
                    line,
                    name: payload.clone(),
                })?;
            Action::command(payload.as_str(), cmd)
        }
        other => return Err(syntax(line, format!("unknown action kind \"{}\"", other))),
    };

    if !mods.is_empty() && !matches!(action, Action::Type(_)) {
        return Err(syntax(line, format!("{} actions take no modifiers", kind)));
    }

    let action = action.with_modifiers(&mods);
    Ok(match label {
        Some(l) => relabel(action, l),
        None => action,
    })
}

fn relabel(mut action: Action, new_label: &str) -> Action {
    match &mut action {
        Action::Generic { label, .. } => *label = new_label.to_string(),
        Action::Type(t) => t.label = new_label.to_string(),
        Action::Modifier(m) => m.label = new_label.to_string(),
    }
    action
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Symbol;
    use crate::types::mod_codes::{MOD4, SHIFT};

    fn parse(content: &str) -> Result<ChordMapping, LayoutError> {
        parse_layout_content(content, &Dimensions::default(), &CommandTable::new())
    }

    #[test]
    fn test_parse_entries() {
        let m = parse(
            "; Test layout
[chords]
0,0,1 1,0,0 = char r
0,1,0 1,2,1 = char \"\\\"\"
[singles]
0,2,0 = keycode 115 End
1,4,1 = keysym space \"⸤  ⸥\"
1,0,0 = mod 64 ❖
1,1,1 = char a +1 +0x40
",
        )
        .unwrap();

        assert_eq!(m.name(), Some("Test layout"));
        assert_eq!(
            m.lookup(&[KeyCoord::right(0, 0), KeyCoord::left(0, 1)]).unwrap().label(),
            "r"
        );
        assert_eq!(
            m.lookup(&[KeyCoord::left(1, 0), KeyCoord::right(2, 1)]).unwrap().label(),
            "\""
        );
        assert_eq!(m.lookup(&[KeyCoord::left(2, 0)]).unwrap().label(), "End");
        assert_eq!(
            **m.lookup(&[KeyCoord::right(4, 1)]).unwrap(),
            relabel(Action::keysym("space", 0x20), "⸤  ⸥")
        );
        assert_eq!(
            **m.lookup(&[KeyCoord::right(0, 0)]).unwrap(),
            Action::modifier("❖", MOD4)
        );
        match &**m.lookup(&[KeyCoord::right(1, 1)]).unwrap() {
            Action::Type(t) => {
                assert_eq!(t.symbol, Symbol::Char('a'));
                assert_eq!(t.modifiers, vec![SHIFT, MOD4]);
            }
            other => panic!("Expected type action, got {:?}", other),
        }
    }

    #[test]
    fn test_commands_resolve_by_name() {
        let mut commands = CommandTable::new();
        commands.insert("hide".into(), Command::new("hide", || false));
        let m = parse_layout_content(
            "[singles]\n0,4,1 = command hide Hide\n",
            &Dimensions::default(),
            &commands,
        )
        .unwrap();
        assert_eq!(m.lookup(&[KeyCoord::left(4, 1)]).unwrap().label(), "Hide");

        let err = parse("[singles]\n0,4,1 = command quit\n").unwrap_err();
        assert!(matches!(err, LayoutError::UnknownCommand { line: 2, .. }));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        assert!(matches!(
            parse("0,0,0 = char a"),
            Err(LayoutError::Syntax { line: 1, .. })
        ));
        assert!(matches!(
            parse("[singles]\n\n0,9,0 = char a"),
            Err(LayoutError::KeyOutOfRange { line: 3, .. })
        ));
        assert!(matches!(
            parse("[singles]\n0,0,0 = keysym NoSuchKey"),
            Err(LayoutError::UnknownKeysym { line: 2, .. })
        ));
        assert!(matches!(
            parse("[chords]\n0,0,0 = char a"),
            Err(LayoutError::Syntax { line: 2, .. })
        ));
        assert!(matches!(
            parse("[singles]\n0,0,0 = char ab"),
            Err(LayoutError::Syntax { line: 2, .. })
        ));
        assert!(matches!(
            parse("[singles]\n0,0,0 = mod 1 Shift +4"),
            Err(LayoutError::Syntax { line: 2, .. })
        ));
        assert!(matches!(
            parse("[singles]\n2,0,0 = char a"),
            Err(LayoutError::Syntax { line: 2, .. })
        ));
        assert!(matches!(
            parse("[singles]\n0,0,0 = text \"open"),
            Err(LayoutError::Syntax { line: 2, .. })
        ));
    }

    #[test]
    fn test_conflicting_entries() {
        let err = parse("[chords]\n0,0,0 1,0,0 = char a\n1,0,0 0,0,0 = char b\n").unwrap_err();
        assert!(matches!(err, LayoutError::Conflict { line: 3, .. }));
    }

    #[test]
    fn test_builtin_layout() {
        let m = builtin_layout().unwrap();
        assert_eq!(m.name(), Some("Default chord layout"));
        // 100 pairs stored in both orders, 20 singles.
        assert_eq!(m.len(), 220);
        assert_eq!(m.lookup(&[KeyCoord::left(2, 0)]).unwrap().label(), "End");
        assert_eq!(
            m.lookup(&[KeyCoord::left(0, 1), KeyCoord::right(0, 0)]).unwrap().label(),
            "r"
        );
        assert_eq!(
            m.lookup(&[KeyCoord::left(3, 0), KeyCoord::right(0, 0)]).unwrap().label(),
            "~"
        );
        assert_eq!(
            m.lookup(&[KeyCoord::left(4, 0), KeyCoord::right(2, 1)]).unwrap().label(),
            "Å"
        );
        assert_eq!(m.lookup(&[KeyCoord::right(4, 1)]).unwrap().label(), "⸤  ⸥");
    }

    #[test]
    fn test_decode_latin1() {
        // "åäö" in windows-1252
        let decoded = decode_layout_bytes(&[0xE5, 0xE4, 0xF6]);
        assert_eq!(decoded, "åäö");
    }

    #[test]
    fn test_decode_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("; x".as_bytes());
        assert_eq!(decode_layout_bytes(&bytes), "; x");
    }
}

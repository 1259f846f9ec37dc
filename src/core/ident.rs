// Identifier sanitization and sibling-group name uniqueness.
// Sanitized names are idempotent under re-sanitization and never exceed MAX_LENGTH.
use std::collections::HashSet;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::Regex;

use crate::core::error::{Error, ErrorKind};

pub const FILLER: char = '_';
pub const MAX_LENGTH: usize = 128;
pub const EMPTY_NAME: &str = "_empty";

static INVALID_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\p{L}\p{Nd}\p{Nl}\p{Mn}\p{Mc}\p{Cf}\p{Pc}]").expect("identifier class")
});
static FILLER_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_{2,}").expect("filler run pattern"));
static LEADING_LETTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{L}").expect("leading letter pattern"));

// Strict and reserved keywords; `r#` escapes are not emitted.
const RESERVED: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

/// Maps an arbitrary string to a safe symbolic name.
///
/// The result is non-empty, starts with a letter or `_`, contains only
/// identifier characters and is never a reserved word.
pub fn sanitize(raw: &str) -> String {
    let truncated: String = raw.chars().take(MAX_LENGTH).collect();
    let replaced = INVALID_CHARS.replace_all(&truncated, "_");
    let collapsed = FILLER_RUNS.replace_all(&replaced, "_");
    if collapsed == EMPTY_NAME {
        return EMPTY_NAME.to_string();
    }

    let stripped = collapsed.trim_start_matches(FILLER);
    if stripped.is_empty() {
        return EMPTY_NAME.to_string();
    }

    let mut name = String::with_capacity(stripped.len() + 2);
    if LEADING_LETTER.is_match(stripped) {
        name.push_str(stripped);
    } else {
        name.push(FILLER);
        name.extend(stripped.chars().take(MAX_LENGTH - 1));
    }

    if is_reserved(&name) {
        name.push(FILLER);
    }
    name
}

/// True when `name` is something `sanitize` could have produced.
pub fn is_valid_identifier(name: &str) -> bool {
    let Some(first) = name.chars().next() else {
        return false;
    };
    if first != FILLER && !LEADING_LETTER.is_match(name) {
        return false;
    }
    !INVALID_CHARS.is_match(name) && !is_reserved(name)
}

/// Renames later duplicates in a sibling group with the smallest free numeric suffix.
///
/// Groups are visited in order of first appearance and the first member of each
/// group keeps its name. Every minted name is registered before the next one is
/// chosen, so suffixes never collide with existing or earlier-minted names.
pub fn make_names_unique<T>(
    items: &mut [T],
    name_of: impl Fn(&T) -> &str,
    mut rename: impl FnMut(&mut T, String),
) -> Result<(), Error> {
    let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();
    for (idx, item) in items.iter().enumerate() {
        groups.entry(name_of(item).to_string()).or_default().push(idx);
    }

    let mut used: HashSet<String> = groups.keys().cloned().collect();
    for (name, members) in groups.iter().filter(|(_, members)| members.len() > 1) {
        for &idx in members.iter().skip(1) {
            let fresh = (1..=u64::MAX)
                .map(|n| format!("{name}{n}"))
                .find(|candidate| !used.contains(candidate))
                .ok_or_else(|| {
                    Error::new(ErrorKind::NameCollisionExhausted)
                        .with_message(format!("no free suffix for name `{name}`"))
                })?;
            used.insert(fresh.clone());
            rename(&mut items[idx], fresh);
        }
    }
    Ok(())
}

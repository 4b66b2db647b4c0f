//! URL list splitting and literal-prefix regex quoting.

/// Split a `;`/`,` separated list. Blank input yields no entries; otherwise
/// the split is exact, so empty segments are kept.
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(s) if !s.trim().is_empty() => s.split([';', ',']).map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

/// Quote `literal` so the engine matches it as an exact prefix: `\Q<literal>\E.*`.
///
/// An embedded `\E` would end the quoted span early, so it is closed, emitted
/// escaped and reopened, which keeps every character literal.
pub fn literal_prefix(literal: &str) -> String {
    let mut quoted = String::with_capacity(literal.len() + 6);
    quoted.push_str("\\Q");
    quoted.push_str(&literal.replace("\\E", "\\E\\\\E\\Q"));
    quoted.push_str("\\E.*");
    quoted
}

//! Static evaluation of probe expressions
//!
//! Probes are property paths rooted at a page global, written the way they
//! would be in the page itself: `window.universal_variable?.listing?.items`.
//! Without a script engine the HTTP fetcher answers them by locating the
//! JSON literal assigned to the root global inside the page's scripts and
//! walking the remaining path through it.

use crate::fetcher::ProbeError;
use serde_json::Value;

/// A parsed probe expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePath {
    root: String,
    segments: Vec<String>,
}

impl ProbePath {
    /// Parses `window.a?.b.c` style expressions
    ///
    /// A leading `window.` and a trailing `;` are optional. Optional
    /// chaining markers are accepted and ignored, since a missing link
    /// already resolves to `null`.
    pub fn parse(script: &str) -> Result<Self, ProbeError> {
        let expr = script.trim().trim_end_matches(';').trim();
        let expr = expr.strip_prefix("window.").unwrap_or(expr);

        let mut parts = expr
            .split('.')
            .map(|segment| segment.trim().trim_end_matches('?').trim().to_string());

        let root = parts
            .next()
            .filter(|root| is_identifier(root))
            .ok_or_else(|| ProbeError::InvalidScript(script.to_string()))?;

        let segments: Vec<String> = parts.collect();
        if segments.iter().any(|s| !is_identifier(s) && s.parse::<usize>().is_err()) {
            return Err(ProbeError::InvalidScript(script.to_string()));
        }

        Ok(Self { root, segments })
    }

    /// Name of the global the path starts from
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Resolves the path below the root; missing links yield `Value::Null`
    pub fn resolve(&self, root_value: &Value) -> Value {
        let mut current = root_value;
        for segment in &self.segments {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Value::Null,
            }
        }
        current.clone()
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(is_identifier_char)
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Finds the object or array literal assigned to global `name` in a script
///
/// Matches `name = {...}`, `window.name = [...]`, `var name = {...}` and
/// similar forms, skipping comparisons (`==`) and longer identifiers that
/// merely contain `name`.
pub fn find_global_assignment<'a>(script: &'a str, name: &str) -> Option<&'a str> {
    let mut search_from = 0;

    while let Some(offset) = script[search_from..].find(name) {
        let start = search_from + offset;
        let end = start + name.len();
        search_from = end;

        let preceded_by_ident = script[..start]
            .chars()
            .next_back()
            .map(is_identifier_char)
            .unwrap_or(false);
        if preceded_by_ident {
            continue;
        }

        let Some(after_eq) = script[end..].trim_start().strip_prefix('=') else {
            continue;
        };
        if after_eq.starts_with('=') {
            continue;
        }

        if let Some(literal) = balanced_literal(after_eq.trim_start()) {
            return Some(literal);
        }
    }

    None
}

/// Returns the prefix of `text` forming one balanced `{...}` or `[...]`
///
/// Brackets inside string literals are ignored.
fn balanced_literal(text: &str) -> Option<&str> {
    let mut chars = text.char_indices();
    match chars.next() {
        Some((_, '{')) | Some((_, '[')) => {}
        _ => return None,
    }

    let mut depth = 1usize;
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for (index, c) in chars {
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                in_string = None;
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => in_string = Some(c),
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..index + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_optional_chain() {
        let path = ProbePath::parse("window.universal_variable?.listing?.items").unwrap();
        assert_eq!(path.root(), "universal_variable");
        assert_eq!(path.segments, vec!["listing", "items"]);
    }

    #[test]
    fn test_parse_without_window_prefix() {
        let path = ProbePath::parse("__NEXT_DATA__.props.pageProps;").unwrap();
        assert_eq!(path.root(), "__NEXT_DATA__");
        assert_eq!(path.segments, vec!["props", "pageProps"]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(ProbePath::parse("").is_err());
        assert!(ProbePath::parse("window.").is_err());
        assert!(ProbePath::parse("document.querySelector('x')").is_err());
    }

    #[test]
    fn test_resolve() {
        let path = ProbePath::parse("window.uv?.listing?.items").unwrap();
        let state = json!({ "listing": { "items": [{ "id": 1 }] } });
        assert_eq!(path.resolve(&state), json!([{ "id": 1 }]));

        let missing = json!({ "listing": {} });
        assert_eq!(path.resolve(&missing), Value::Null);
    }

    #[test]
    fn test_resolve_array_index() {
        let path = ProbePath::parse("uv.items.1.id").unwrap();
        let state = json!({ "items": [{ "id": "a" }, { "id": "b" }] });
        assert_eq!(path.resolve(&state), json!("b"));
    }

    #[test]
    fn test_find_window_assignment() {
        let script = r#"
            window.dataLayer = window.dataLayer || [];
            window.universal_variable = {"listing": {"items": [{"id": 1, "name": "a } tricky"}]}};
            init();
        "#;

        let literal = find_global_assignment(script, "universal_variable").unwrap();
        let value: Value = serde_json::from_str(literal).unwrap();
        assert_eq!(value["listing"]["items"][0]["name"], "a } tricky");
    }

    #[test]
    fn test_find_var_assignment() {
        let script = "var universal_variable={\"page\":{\"type\":\"listing\"}};";
        assert_eq!(
            find_global_assignment(script, "universal_variable"),
            Some("{\"page\":{\"type\":\"listing\"}}")
        );
    }

    #[test]
    fn test_skips_comparisons_and_longer_names() {
        let script = r#"
            if (universal_variable == null) {}
            my_universal_variable = {"wrong": true};
            universal_variable_v2 = {"wrong": true};
        "#;
        assert_eq!(find_global_assignment(script, "universal_variable"), None);
    }

    #[test]
    fn test_unbalanced_literal() {
        assert_eq!(find_global_assignment("uv = {\"a\": [1, 2", "uv"), None);
    }
}

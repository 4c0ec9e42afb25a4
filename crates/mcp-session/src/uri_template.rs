//! RFC 6570 level-1 URI template matching for resource templates (§4.8).
//!
//! Level 1 covers simple string expansion only: `{var}` substitutes one
//! path segment's worth of unreserved text, with no operators (`+`, `#`,
//! `.`, `/`, `;`, `?`, `&`) and no prefix/explode modifiers. That is the
//! full expressiveness `resources/templates` needs — templates are simple
//! identifiers like `file:///logs/{date}.log`, not full URI construction.

use std::collections::HashMap;

/// A parsed level-1 URI template, precompiled into literal/variable
/// segments for matching against candidate URIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    source: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

impl UriTemplate {
    /// Parse a template string. Never fails: an unparenthesized `{`/`}`
    /// imbalance is treated as literal text, matching the forgiving style
    /// of the reference RFC 6570 implementations this crate's ecosystem
    /// uses for path routing.
    #[must_use]
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(ch) = chars.next() {
            if ch == '{' {
                let mut name = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == '}' {
                        closed = true;
                        break;
                    }
                    name.push(next);
                }
                if closed && !name.is_empty() {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Variable(name));
                } else {
                    literal.push('{');
                    literal.push_str(&name);
                    if closed {
                        literal.push('}');
                    }
                }
            } else {
                literal.push(ch);
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            source: template.to_string(),
            segments,
        }
    }

    /// The original template string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match `uri` against this template, returning the captured variable
    /// bindings if it matches. Level 1 semantics: each `{var}` greedily
    /// captures up to the next literal boundary (or to the end of the
    /// string for a trailing variable), and never crosses a `/`.
    #[must_use]
    pub fn matches(&self, uri: &str) -> Option<HashMap<String, String>> {
        let mut bindings = HashMap::new();
        let mut rest = uri;

        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(text) => {
                    rest = rest.strip_prefix(text.as_str())?;
                }
                Segment::Variable(name) => {
                    let next_literal = self.segments.get(index + 1).and_then(|segment| match segment {
                        Segment::Literal(text) => Some(text.as_str()),
                        Segment::Variable(_) => None,
                    });
                    let (value, remainder) = match next_literal {
                        Some(boundary) if !boundary.is_empty() => {
                            let end = rest.find(boundary)?;
                            (&rest[..end], &rest[end..])
                        }
                        _ => {
                            let end = rest.find('/').unwrap_or(rest.len());
                            (&rest[..end], &rest[end..])
                        }
                    };
                    if value.is_empty() {
                        return None;
                    }
                    bindings.insert(name.clone(), value.to_string());
                    rest = remainder;
                }
            }
        }

        if rest.is_empty() {
            Some(bindings)
        } else {
            None
        }
    }

    /// Expand this template by substituting each variable with a binding
    /// from `values`. Returns `None` if any variable is unbound.
    #[must_use]
    pub fn expand(&self, values: &HashMap<String, String>) -> Option<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => out.push_str(values.get(name)?),
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_single_variable_between_literals() {
        let template = UriTemplate::parse("file:///logs/{date}.log");
        let bindings = template.matches("file:///logs/2026-07-28.log").unwrap();
        assert_eq!(bindings.get("date"), Some(&"2026-07-28".to_string()));
    }

    #[test]
    fn rejects_non_matching_uri() {
        let template = UriTemplate::parse("file:///logs/{date}.log");
        assert!(template.matches("file:///other/2026-07-28.log").is_none());
    }

    #[test]
    fn variable_never_crosses_a_slash() {
        let template = UriTemplate::parse("db://{table}/rows");
        assert!(template.matches("db://users/extra/rows").is_none());
        assert!(template.matches("db://users/rows").is_some());
    }

    #[test]
    fn trailing_variable_captures_to_end() {
        let template = UriTemplate::parse("mem://cache/{key}");
        let bindings = template.matches("mem://cache/session-42").unwrap();
        assert_eq!(bindings.get("key"), Some(&"session-42".to_string()));
    }

    #[test]
    fn expand_round_trips_a_matched_uri() {
        let template = UriTemplate::parse("file:///logs/{date}.log");
        let bindings = template.matches("file:///logs/2026-07-28.log").unwrap();
        assert_eq!(template.expand(&bindings).as_deref(), Some("file:///logs/2026-07-28.log"));
    }

    #[test]
    fn rejects_empty_variable_capture() {
        let template = UriTemplate::parse("file:///logs/{date}.log");
        assert!(template.matches("file:///logs/.log").is_none());
    }
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Placeholder expansion.
//!
//! Configuration values may carry `%(name)s` placeholders. Expansion is a
//! single pass over the template: substituted text is never re-scanned, so a
//! value that itself contains a placeholder is emitted as-is.

use std::collections::BTreeMap;

/// Variables visible to placeholder expansion.
///
/// Holds the capture map of a group match plus whatever the event supplies,
/// e.g., `author`, `repos_basename`, `revision`, and `propname`.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Construct empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set variable, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Set variable only if it is not already present.
    pub fn set_default(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.entry(name.into()).or_insert_with(|| value.into());
    }

    /// Extend with every entry of a capture map. Existing names are replaced.
    pub fn extend<'a>(&mut self, vars: impl IntoIterator<Item = (&'a String, &'a String)>) {
        for (name, value) in vars {
            self.vars.insert(name.clone(), value.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

impl<K, V> FromIterator<(K, V)> for Environment
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// Result of expanding a template.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// Expanded text. Unknown placeholders stay in their literal form.
    pub text: String,

    /// Names of placeholders that had no value in the environment.
    pub unresolved: Vec<String>,
}

/// Expand `%(name)s` placeholders in `template` using `env`.
///
/// A `%%` pair yields a single `%`. Malformed placeholders, e.g., a missing
/// closing parenthesis or a conversion other than `s`, are copied through
/// untouched.
pub fn expand(template: &str, env: &Environment) -> Expansion {
    let mut out = Expansion {
        text: String::with_capacity(template.len()),
        unresolved: Vec::new(),
    };
    let mut rest = template;

    while let Some(start) = rest.find('%') {
        out.text.push_str(&rest[..start]);
        let tail = &rest[start..];

        if tail.starts_with("%%") {
            out.text.push('%');
            rest = &tail[2..];
            continue;
        }

        match placeholder(tail) {
            Some((name, len)) => {
                match env.get(name) {
                    Some(value) => out.text.push_str(value),
                    None => {
                        out.text.push_str(&tail[..len]);
                        if !out.unresolved.iter().any(|seen| seen == name) {
                            out.unresolved.push(name.to_string());
                        }
                    }
                }
                rest = &tail[len..];
            }
            None => {
                out.text.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.text.push_str(rest);

    out
}

// Recognize `%(name)s` at the head of `text`, returning the name and the
// byte length of the whole token.
fn placeholder(text: &str) -> Option<(&str, usize)> {
    let body = text.strip_prefix("%(")?;
    let close = body.find(')')?;
    let name = &body[..close];
    if name.is_empty() || name.contains('%') {
        return None;
    }

    body[close + 1..].starts_with('s').then_some((name, close + 4))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn env() -> Environment {
        [("author", "alice"), ("p", "alpha"), ("repos_basename", "asf")]
            .into_iter()
            .collect()
    }

    #[test_case("%(p)s-commits@example.org", "alpha-commits@example.org"; "capture")]
    #[test_case("%(author)s via %(repos_basename)s", "alice via asf"; "event keys")]
    #[test_case("100%% done", "100% done"; "escaped percent")]
    #[test_case("50% off", "50% off"; "lone percent")]
    #[test_case("%(p)d", "%(p)d"; "wrong conversion")]
    #[test_case("%(p", "%(p"; "unterminated")]
    #[test]
    fn expand_known_placeholders(template: &str, expect: &str) {
        let result = expand(template, &env());
        pretty_assertions::assert_eq!(result.text, expect);
        assert!(result.unresolved.is_empty());
    }

    #[test]
    fn expand_keeps_unknown_placeholder_literal() {
        let result = expand("to %(nobody)s and %(nobody)s, from %(author)s", &env());
        assert_eq!(result.text, "to %(nobody)s and %(nobody)s, from alice");
        assert_eq!(result.unresolved, vec!["nobody".to_string()]);
    }

    #[test]
    fn expand_is_single_pass() {
        let mut env = env();
        env.set("nested", "%(author)s");
        let result = expand("[%(nested)s]", &env);
        assert_eq!(result.text, "[%(author)s]");
    }
}

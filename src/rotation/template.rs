//! Reversible path templates
//!
//! A template such as `{baseurl}/db_{date}{ext}` is rendered into an object
//! key by substituting placeholders, and compiled into a [`KeyMatcher`] that
//! recognises keys produced by the same template and extracts the variable
//! fields back out of them.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::error::{SpinError, SpinResult};

/// The placeholder every template must carry
pub const DATE: &str = "date";

/// Optional clock-of-day placeholder
pub const TIME: &str = "time";

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder pattern is valid"))
}

/// An immutable key pattern made of literal text and `{name}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    pattern: String,
}

impl PathTemplate {
    /// Create a template, rejecting patterns without a `{date}` placeholder
    pub fn new(pattern: impl Into<String>) -> SpinResult<Self> {
        let pattern = pattern.into();
        if !pattern.contains("{date}") {
            return Err(SpinError::Config(format!(
                "Path template '{}' must contain {{date}}",
                pattern
            )));
        }
        Ok(Self { pattern })
    }

    /// The raw pattern string
    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    /// Substitute every placeholder named in `args`
    ///
    /// Placeholders absent from `args` are left in place. Values are inserted
    /// verbatim in a single pass, so a value that itself looks like a
    /// placeholder is never expanded.
    pub fn render(&self, args: &[(&str, &str)]) -> String {
        placeholder_regex()
            .replace_all(&self.pattern, |caps: &Captures| {
                let name = &caps[1];
                args.iter()
                    .find(|(key, _)| *key == name)
                    .map(|(_, value)| (*value).to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            })
            .into_owned()
    }

    /// Produce a new template with the fixed placeholders in `args` substituted
    pub fn bind(&self, args: &[(&str, &str)]) -> SpinResult<Self> {
        Self::new(self.render(args))
    }

    /// Names of the placeholders in order of appearance (duplicates included)
    pub fn placeholders(&self) -> Vec<&str> {
        placeholder_regex()
            .captures_iter(&self.pattern)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Leading key segments that contain no placeholder, joined by `/`
    ///
    /// Used as the listing prefix so the store only enumerates the part of the
    /// namespace backups can live in.
    pub fn prefix(&self) -> String {
        self.pattern
            .split('/')
            .take_while(|segment| !placeholder_regex().is_match(segment))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Compile the template into a whole-string matcher
    ///
    /// Each placeholder named in `variables` becomes a named capture group
    /// around its regex fragment. Every other character, including unbound
    /// placeholders, must match literally.
    pub fn compile(&self, variables: &[(&str, &str)]) -> SpinResult<KeyMatcher> {
        let mut source = String::from("^");
        let mut captured: Vec<&str> = Vec::new();
        let mut last = 0;

        for caps in placeholder_regex().captures_iter(&self.pattern) {
            let (Some(token), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            source.push_str(&regex::escape(&self.pattern[last..token.start()]));
            last = token.end();

            let name = name.as_str();
            match variables.iter().find(|(key, _)| *key == name) {
                // Group names must be unique; repeats only have to match the shape
                Some((_, fragment)) if captured.contains(&name) => {
                    source.push_str(&format!("(?:{})", fragment));
                }
                Some((_, fragment)) => {
                    source.push_str(&format!("(?P<{}>{})", name, fragment));
                    captured.push(name);
                }
                None => source.push_str(&regex::escape(token.as_str())),
            }
        }
        source.push_str(&regex::escape(&self.pattern[last..]));
        source.push('$');

        let regex = Regex::new(&source).map_err(|e| {
            SpinError::Config(format!(
                "Path template '{}' does not compile: {}",
                self.pattern, e
            ))
        })?;

        Ok(KeyMatcher { regex })
    }
}

/// A compiled template that recognises keys and extracts their fields
#[derive(Debug, Clone)]
pub struct KeyMatcher {
    regex: Regex,
}

impl KeyMatcher {
    /// Match `key` against the whole template
    ///
    /// Returns `None` for keys the template did not produce; listings routinely
    /// contain unrelated objects, so this is an ordinary outcome.
    pub fn parse(&self, key: &str) -> Option<BTreeMap<String, String>> {
        let caps = self.regex.captures(key)?;
        let fields = self
            .regex
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();
        Some(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATE_FRAGMENT: &str = r"\d{4}-\d{2}-\d{2}";
    const TIME_FRAGMENT: &str = r"\d{2}\.\d{2}\.\d{2}";

    fn default_template() -> PathTemplate {
        PathTemplate::new("{baseurl}/db_{date}{ext}").unwrap()
    }

    #[test]
    fn test_render_and_parse_default_template() {
        let template = default_template();
        let key = template.render(&[
            ("baseurl", "site.com"),
            ("ext", ".sql"),
            ("date", "2024-03-15"),
        ]);
        assert_eq!(key, "site.com/db_2024-03-15.sql");

        let bound = template
            .bind(&[("baseurl", "site.com"), ("ext", ".sql")])
            .unwrap();
        let matcher = bound.compile(&[(DATE, DATE_FRAGMENT)]).unwrap();
        let fields = matcher.parse(&key).unwrap();

        assert_eq!(fields.len(), 1);
        assert_eq!(fields["date"], "2024-03-15");
    }

    #[test]
    fn test_missing_date_rejected() {
        let err = PathTemplate::new("{baseurl}/db{ext}").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        let template = default_template();
        let key = template.render(&[("date", "2024-03-15")]);
        assert_eq!(key, "{baseurl}/db_2024-03-15{ext}");
    }

    #[test]
    fn test_render_does_not_expand_inserted_values() {
        let template = PathTemplate::new("{basepath}/{date}").unwrap();
        let key = template.render(&[("basepath", "{date}"), ("date", "2024-03-15")]);
        assert_eq!(key, "{date}/2024-03-15");
    }

    #[test]
    fn test_literal_dot_is_escaped() {
        let template = PathTemplate::new("backups/db_{date}.sql").unwrap();
        let matcher = template.compile(&[(DATE, DATE_FRAGMENT)]).unwrap();

        assert!(matcher.parse("backups/db_2024-03-15.sql").is_some());
        assert!(matcher.parse("backups/db_2024-03-15Xsql").is_none());
    }

    #[test]
    fn test_match_is_anchored() {
        let template = PathTemplate::new("backups/db_{date}.sql").unwrap();
        let matcher = template.compile(&[(DATE, DATE_FRAGMENT)]).unwrap();

        assert!(matcher.parse("old/backups/db_2024-03-15.sql").is_none());
        assert!(matcher.parse("backups/db_2024-03-15.sql.bak").is_none());
    }

    #[test]
    fn test_unrelated_keys_do_not_match() {
        let matcher = PathTemplate::new("backups/db_{date}.sql")
            .unwrap()
            .compile(&[(DATE, DATE_FRAGMENT)])
            .unwrap();

        for key in ["", "backups/", "backups/readme.txt", "backups/db_latest.sql"] {
            assert!(matcher.parse(key).is_none(), "{} should not match", key);
        }
    }

    #[test]
    fn test_capture_order_independent_of_pattern_order() {
        let template = PathTemplate::new("dumps/{time}_{date}.sql").unwrap();
        let matcher = template
            .compile(&[(DATE, DATE_FRAGMENT), (TIME, TIME_FRAGMENT)])
            .unwrap();

        let fields = matcher.parse("dumps/02.30.00_2024-03-15.sql").unwrap();
        assert_eq!(fields["date"], "2024-03-15");
        assert_eq!(fields["time"], "02.30.00");
    }

    #[test]
    fn test_repeated_placeholder_captured_once() {
        let template = PathTemplate::new("{date}/db_{date}.sql").unwrap();
        let matcher = template.compile(&[(DATE, DATE_FRAGMENT)]).unwrap();

        let fields = matcher.parse("2024-03-15/db_2024-03-15.sql").unwrap();
        assert_eq!(fields["date"], "2024-03-15");
    }

    #[test]
    fn test_unbound_placeholder_matches_literally() {
        let template = PathTemplate::new("{basepath}/db_{date}.sql").unwrap();
        let matcher = template.compile(&[(DATE, DATE_FRAGMENT)]).unwrap();

        assert!(matcher.parse("{basepath}/db_2024-03-15.sql").is_some());
        assert!(matcher.parse("x/db_2024-03-15.sql").is_none());
    }

    #[test]
    fn test_prefix() {
        let cases = [
            ("{baseurl}/db_{date}{ext}", ""),
            ("backups/db_{date}.sql", "backups"),
            ("backups/mysite/{date}/db.sql", "backups/mysite"),
            ("db_{date}.sql", ""),
        ];
        for (pattern, expected) in cases {
            assert_eq!(PathTemplate::new(pattern).unwrap().prefix(), expected);
        }
    }

    #[test]
    fn test_placeholders() {
        let template = default_template();
        assert_eq!(template.placeholders(), vec!["baseurl", "date", "ext"]);
    }
}

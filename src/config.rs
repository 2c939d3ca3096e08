// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Mailer configuration model.
//!
//! The configuration file decides who hears about which changes. It is made
//! of sections, and every section is resolved at load time into exactly one
//! [`SectionKind`]:
//!
//! - `[defaults]` holds the global parameter layer.
//! - `[general]` is a legacy global layer consulted after `[defaults]`.
//! - `[maps]` lists value indirections, e.g., `from_addr = [authors]` turns
//!   the expanded `from_addr` value into a key of the `[authors]` section.
//! - A section setting `for_paths` or `for_repos` is a __group__. Groups
//!   receive their own message for the changed paths they route.
//! - Any other section is a __named parameter set__ that groups pull in by
//!   listing it in their `params` key, unless a map names it, in which case
//!   it is a plain value table.
//!
//! # Parameter Resolution
//!
//! [`Config::get`] looks a parameter up on the group, then on each named set
//! the group lists (in order), then in `[defaults]`, then in `[general]`. The
//! value found is expanded once with [`expand`], and finally passed through
//! any map registered for the parameter.

pub mod expand;
pub mod ini;
pub mod params;

pub use expand::{expand, Environment, Expansion};
pub use ini::{Document, Section, SyntaxError};

use regex::Regex;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Display, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::Path,
    str::FromStr,
};
use tracing::{debug, instrument, warn};

/// Variables captured by a group's path expression.
pub type Captures = BTreeMap<String, String>;

/// What a configuration section is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Defaults,
    General,
    Maps,
    Group,
    ParamSet,
    ValueMap,
}

/// Identity of a group that can receive a message.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    /// Group declared in the configuration file.
    Named(String),

    /// Synthetic group built from `[defaults]` for paths no group claimed.
    Defaults,
}

impl GroupKey {
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) => name.as_str(),
            Self::Defaults => "defaults",
        }
    }
}

impl Display for GroupKey {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.name())
    }
}

/// Compiled regular expression that compares by its source text.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    fn compile(origin: &str, section: &str, key: &str, line: usize, source: &str) -> Result<Self> {
        Regex::new(source)
            .map(Self)
            .map_err(|err| ConfigError::BadRegex {
                origin: origin.to_string(),
                line,
                section: section.to_string(),
                key: key.to_string(),
                source: err,
            })
    }

    /// Search text, returning named captures on a match.
    pub fn captures(&self, text: &str) -> Option<Captures> {
        let found = self.0.captures(text)?;
        let captures = self
            .0
            .capture_names()
            .flatten()
            .filter_map(|name| {
                found
                    .name(name)
                    .map(|value| (name.to_string(), value.as_str().to_string()))
            })
            .collect();

        Some(captures)
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Pattern {}

/// Ordered parameter mapping of a single section.
pub type Params = BTreeMap<String, String>;

/// Group definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub for_repos: Option<Pattern>,
    pub for_paths: Option<Pattern>,
    pub exclude_paths: Option<Pattern>,

    /// Named parameter sets pulled in through `params`, in lookup order.
    pub sets: Vec<String>,
    pub params: Params,
}

impl Group {
    /// Route a single changed path through this group.
    ///
    /// Returns the captures of `for_paths`, or an empty map when the group
    /// has no path expression. Returns `None` when the path does not match
    /// or is excluded.
    pub fn route_path(&self, path: &str) -> Option<Captures> {
        let captures = match &self.for_paths {
            Some(pattern) => pattern.captures(path)?,
            None => Captures::new(),
        };

        if self
            .exclude_paths
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(path))
        {
            return None;
        }

        Some(captures)
    }

    /// Check group against repository basename.
    ///
    /// Returns captures of `for_repos` on success, or an empty map when the
    /// group applies to every repository.
    pub fn route_repos(&self, repos_basename: &str) -> Option<Captures> {
        match &self.for_repos {
            Some(pattern) => pattern.captures(repos_basename),
            None => Some(Captures::new()),
        }
    }
}

/// Loaded mailer configuration.
///
/// Read-only after loading, so a single value can be threaded through the
/// whole pipeline by shared reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    document: Document,
    defaults: Params,
    general: Params,
    groups: Vec<Group>,
    sets: BTreeMap<String, Params>,
    maps: BTreeMap<String, String>,
    tables: BTreeMap<String, Params>,
}

impl Config {
    /// Load configuration from file.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if the file cannot be read.
    /// - Return any other [`ConfigError`] if the contents are invalid.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("load configuration from {}", path.display());
        let source = read_to_string(path).map_err(|err| ConfigError::Read {
            source: err,
            path: path.display().to_string(),
        })?;

        Self::from_document(Document::parse(&source, path.display().to_string())?)
    }

    /// Build configuration model from parsed document.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::BadKey`] for keys outside the key grammar.
    /// - Return [`ConfigError::BadRegex`] for expressions that fail to compile.
    /// - Return [`ConfigError::UnknownParamSet`] for `params` references to
    ///   sections that are not named parameter sets.
    /// - Return [`ConfigError::UnknownMapSection`] for maps naming missing
    ///   sections.
    pub fn from_document(document: Document) -> Result<Self> {
        let origin = document.origin.as_str();
        let mut maps = BTreeMap::new();
        if let Some(section) = document.section("maps") {
            for entry in &section.entries {
                let target = entry
                    .value
                    .trim()
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .trim()
                    .to_string();
                if document.section(&target).is_none() {
                    return Err(ConfigError::UnknownMapSection {
                        origin: origin.to_string(),
                        line: entry.line,
                        param: entry.key.clone(),
                        section: target,
                    });
                }
                maps.insert(entry.key.clone(), target);
            }
        }
        let table_names = maps.values().cloned().collect::<BTreeSet<_>>();

        let mut config = Self {
            defaults: Params::new(),
            general: Params::new(),
            groups: Vec::new(),
            sets: BTreeMap::new(),
            maps,
            tables: BTreeMap::new(),
            document: Document::default(),
        };

        for section in &document.sections {
            let kind = classify(section, &table_names);
            if kind != SectionKind::ValueMap {
                validate_keys(origin, section)?;
                validate_values(origin, section)?;
            }

            let params = section
                .entries
                .iter()
                .map(|entry| (entry.key.clone(), entry.value.clone()))
                .collect::<Params>();

            match kind {
                SectionKind::Defaults => config.defaults = params,
                SectionKind::General => config.general = params,
                SectionKind::Maps => {}
                SectionKind::ValueMap => {
                    config.tables.insert(section.name.clone(), params);
                }
                SectionKind::ParamSet => {
                    config.sets.insert(section.name.clone(), params);
                }
                SectionKind::Group => config.groups.push(build_group(origin, section, params)?),
            }
        }

        for group in &config.groups {
            for set in &group.sets {
                if !config.sets.contains_key(set) {
                    let line = document
                        .section(&group.name)
                        .and_then(|section| {
                            section
                                .entries
                                .iter()
                                .find(|entry| entry.key == "params")
                                .map(|entry| entry.line)
                        })
                        .unwrap_or_default();
                    return Err(ConfigError::UnknownParamSet {
                        origin: origin.to_string(),
                        line,
                        group: group.name.clone(),
                        set: set.clone(),
                    });
                }
            }
        }

        config.document = document;
        Ok(config)
    }

    /// Kind of a section, if the section exists.
    pub fn section_kind(&self, name: &str) -> Option<SectionKind> {
        let section = self.document.section(name)?;
        let tables = self.maps.values().cloned().collect::<BTreeSet<_>>();
        Some(classify(section, &tables))
    }

    /// Groups in declaration order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Lookup group by name.
    pub fn group(&self, name: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.name == name)
    }

    /// Underlying parsed document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Check whether `[defaults]` or `[general]` set a parameter.
    pub fn has_default(&self, param: &str) -> bool {
        self.defaults
            .get(param)
            .or_else(|| self.general.get(param))
            .is_some_and(|value| !value.trim().is_empty())
    }

    /// Lookup raw, unexpanded value of parameter for group.
    ///
    /// Follows the resolution order: group, its named sets, `[defaults]`,
    /// then `[general]`. Returns `None` if no layer sets the parameter.
    pub fn get_raw<'a>(&'a self, param: &str, group: &'a GroupKey) -> Option<&'a str> {
        self.layers(group)
            .find_map(|layer| layer.get(param))
            .map(String::as_str)
    }

    /// Resolve and expand parameter for group.
    ///
    /// Placeholders are expanded with `env`, falling back to the raw values
    /// of other parameters visible to the same group. Unresolved placeholders
    /// are kept literally and logged. Returns `None` if the parameter is not
    /// set anywhere.
    pub fn get(&self, param: &str, group: &GroupKey, env: &Environment) -> Option<String> {
        let raw = self.get_raw(param, group)?;
        let mut scope = env.clone();
        for layer in self.layers(group) {
            for (name, value) in layer {
                scope.set_default(name.clone(), value.clone());
            }
        }

        let expansion = expand(raw, &scope);
        for name in &expansion.unresolved {
            warn!("group {group}: parameter {param} references undefined variable %({name})s");
        }

        Some(self.apply_map(param, expansion.text))
    }

    /// Resolve parameter and parse it into a typed value.
    ///
    /// Values that fail to parse after expansion are logged and treated as
    /// unset, so callers fall back to their default.
    pub fn get_parsed<T>(&self, param: &str, group: &GroupKey, env: &Environment) -> Option<T>
    where
        T: FromStr<Err = String>,
    {
        let value = self.get(param, group, env)?;
        match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(reason) => {
                warn!("group {group}: ignoring {param}: {reason}");
                None
            }
        }
    }

    /// Resolve parameter, substituting an empty string when unset.
    pub fn get_or_empty(&self, param: &str, group: &GroupKey, env: &Environment) -> String {
        self.get(param, group, env).unwrap_or_default()
    }

    /// Groups routing a single path, with captures, in declaration order.
    ///
    /// Only path rules are considered here; filtering on `for_repos` is the
    /// router's business. Revision property changes route the empty path.
    /// When `propname` is supplied it is made visible to expansion as the
    /// `propname` capture.
    pub fn which_groups(&self, path: &str, propname: Option<&str>) -> Vec<(&Group, Captures)> {
        self.groups
            .iter()
            .filter_map(|group| {
                let mut captures = group.route_path(path)?;
                if let Some(propname) = propname {
                    captures
                        .entry("propname".to_string())
                        .or_insert_with(|| propname.to_string());
                }
                Some((group, captures))
            })
            .collect()
    }

    fn layers<'a>(&'a self, group: &'a GroupKey) -> impl Iterator<Item = &'a Params> + 'a {
        let (own, sets): (Option<&Params>, &[String]) = match group {
            GroupKey::Named(name) => match self.group(name) {
                Some(group) => (Some(&group.params), group.sets.as_slice()),
                None => (None, &[]),
            },
            GroupKey::Defaults => (None, &[]),
        };

        own.into_iter()
            .chain(sets.iter().filter_map(|set| self.sets.get(set)))
            .chain([&self.defaults, &self.general])
    }

    fn apply_map(&self, param: &str, value: String) -> String {
        let Some(table) = self.maps.get(param).and_then(|name| self.tables.get(name)) else {
            return value;
        };

        match table.get(value.trim()) {
            Some(mapped) => {
                debug!("map {param} value {value:?} to {mapped:?}");
                mapped.clone()
            }
            None => value,
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        Self::from_document(Document::parse(data, "<string>")?)
    }
}

impl Display for Config {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        self.document.fmt(fmt)
    }
}

fn classify(section: &Section, tables: &BTreeSet<String>) -> SectionKind {
    match section.name.as_str() {
        "defaults" => SectionKind::Defaults,
        "general" => SectionKind::General,
        "maps" => SectionKind::Maps,
        name if tables.contains(name) => SectionKind::ValueMap,
        _ if section.contains("for_paths") || section.contains("for_repos") => SectionKind::Group,
        _ => SectionKind::ParamSet,
    }
}

fn validate_keys(origin: &str, section: &Section) -> Result<()> {
    for entry in &section.entries {
        let mut chars = entry.key.chars();
        let valid = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(ConfigError::BadKey {
                origin: origin.to_string(),
                line: entry.line,
                key: entry.key.clone(),
            });
        }
    }

    Ok(())
}

fn validate_values(origin: &str, section: &Section) -> Result<()> {
    // INVARIANT: Values with placeholders are checked after expansion instead.
    for entry in section.entries.iter().filter(|entry| !entry.value.contains("%(")) {
        params::validate(&entry.key, &entry.value).map_err(|reason| ConfigError::BadValue {
            origin: origin.to_string(),
            line: entry.line,
            key: entry.key.clone(),
            reason,
        })?;
    }

    Ok(())
}

fn build_group(origin: &str, section: &Section, params: Params) -> Result<Group> {
    let pattern = |key: &str| -> Result<Option<Pattern>> {
        let Some(entry) = section.entries.iter().find(|entry| entry.key == key) else {
            return Ok(None);
        };
        Pattern::compile(origin, &section.name, key, entry.line, &entry.value).map(Some)
    };

    Ok(Group {
        name: section.name.clone(),
        for_repos: pattern("for_repos")?,
        for_paths: pattern("for_paths")?,
        exclude_paths: pattern("exclude_paths")?,
        sets: section
            .get("params")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
        params,
    })
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file cannot be read.
    #[error("failed to read configuration file {path}")]
    Read {
        #[source]
        source: std::io::Error,
        path: String,
    },

    /// Configuration file is syntactically malformed.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// Key does not follow key grammar.
    #[error("{origin}:{line}: invalid key {key:?}")]
    BadKey {
        origin: String,
        line: usize,
        key: String,
    },

    /// Parameter with a fixed value set holds something else.
    #[error("{origin}:{line}: invalid value for {key}: {reason}")]
    BadValue {
        origin: String,
        line: usize,
        key: String,
        reason: String,
    },

    /// Regular expression fails to compile.
    #[error("{origin}:{line}: bad regular expression for {key} in [{section}]")]
    BadRegex {
        origin: String,
        line: usize,
        section: String,
        key: String,
        #[source]
        source: regex::Error,
    },

    /// Group lists a parameter set that does not exist.
    #[error("{origin}:{line}: group [{group}] lists unknown parameter set {set:?}")]
    UnknownParamSet {
        origin: String,
        line: usize,
        group: String,
        set: String,
    },

    /// Map points at a section that does not exist.
    #[error("{origin}:{line}: map for {param} names unknown section [{section}]")]
    UnknownMapSection {
        origin: String,
        line: usize,
        param: String,
        section: String,
    },
}

/// Friendly result alias :3
pub type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    const FIXTURE: &str = indoc! {r#"
        [general]
        smtp_hostname = mail.example.org

        [defaults]
        from_addr = %(author)s
        to_addr = commits@example.org
        subject_prefix = [svn]
        generate_diffs = add copy modify

        [maps]
        from_addr = [authors]

        [authors]
        alice = Alice Liddell <alice@example.org>
        j.random = J. Random <jrandom@example.org>

        [apache_lists]
        to_addr = %(project)s-commits@apache.org
        reply_to = dev@%(project)s.apache.org

        [projects]
        for_paths = ^/(?P<project>[^/]+)/(trunk|branches)/
        exclude_paths = /site/
        params = apache_lists

        [infra]
        for_repos = ^infra$
        to_addr = root@example.org
        subject_prefix = [infra]
    "#};

    fn env() -> Environment {
        [("author", "alice"), ("project", "httpd")].into_iter().collect()
    }

    #[test]
    fn classify_sections() -> anyhow::Result<()> {
        let config: Config = FIXTURE.parse()?;
        let kinds = ["general", "defaults", "maps", "authors", "apache_lists", "projects", "infra"]
            .map(|name| config.section_kind(name));
        let expect = [
            SectionKind::General,
            SectionKind::Defaults,
            SectionKind::Maps,
            SectionKind::ValueMap,
            SectionKind::ParamSet,
            SectionKind::Group,
            SectionKind::Group,
        ]
        .map(Some);
        assert_eq!(kinds, expect);
        assert_eq!(
            config.groups().iter().map(|g| g.name.as_str()).collect::<Vec<_>>(),
            vec!["projects", "infra"]
        );

        Ok(())
    }

    #[test]
    fn resolution_order() -> anyhow::Result<()> {
        let config: Config = FIXTURE.parse()?;
        let projects = GroupKey::Named("projects".into());
        let infra = GroupKey::Named("infra".into());

        // Named set beats defaults.
        assert_eq!(
            config.get("to_addr", &projects, &env()).as_deref(),
            Some("httpd-commits@apache.org")
        );
        // Group beats defaults.
        assert_eq!(config.get("subject_prefix", &infra, &env()).as_deref(), Some("[infra]"));
        // Defaults, then general.
        assert_eq!(config.get("subject_prefix", &projects, &env()).as_deref(), Some("[svn]"));
        assert_eq!(
            config.get("smtp_hostname", &GroupKey::Defaults, &env()).as_deref(),
            Some("mail.example.org")
        );
        assert_eq!(config.get("mail_command", &projects, &env()), None);

        Ok(())
    }

    #[test]
    fn raw_lookup_skips_expansion() -> anyhow::Result<()> {
        let config: Config = FIXTURE.parse()?;
        let raw = {
            let projects = GroupKey::Named("projects".into());
            config.get_raw("to_addr", &projects).map(str::to_string)
        };
        assert_eq!(raw.as_deref(), Some("%(project)s-commits@apache.org"));
        assert_eq!(config.get_raw("from_addr", &GroupKey::Defaults), Some("%(author)s"));
        assert_eq!(config.get_raw("diff_add", &GroupKey::Defaults), None);

        Ok(())
    }

    #[test]
    fn maps_redirect_values_through_tables() -> anyhow::Result<()> {
        let config: Config = FIXTURE.parse()?;
        let result = config.get("from_addr", &GroupKey::Defaults, &env());
        assert_eq!(result.as_deref(), Some("Alice Liddell <alice@example.org>"));

        // Unknown keys fall through unchanged.
        let mut env = env();
        env.set("author", "bob");
        let result = config.get("from_addr", &GroupKey::Defaults, &env);
        assert_eq!(result.as_deref(), Some("bob"));

        // Value map keys follow looser grammar.
        env.set("author", "j.random");
        let result = config.get("from_addr", &GroupKey::Defaults, &env);
        assert_eq!(result.as_deref(), Some("J. Random <jrandom@example.org>"));

        Ok(())
    }

    #[test]
    fn which_groups_applies_path_rules() -> anyhow::Result<()> {
        let config: Config = FIXTURE.parse()?;

        let result = config
            .which_groups("/httpd/trunk/server/core.c", None)
            .into_iter()
            .map(|(group, captures)| (group.name.clone(), captures))
            .collect::<Vec<_>>();
        let expect = vec![
            (
                "projects".to_string(),
                Captures::from([("project".to_string(), "httpd".to_string())]),
            ),
            ("infra".to_string(), Captures::new()),
        ];
        assert_eq!(result, expect);

        // Excluded path only leaves the group without path rules.
        let result = config.which_groups("/httpd/trunk/site/index.html", None);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].0.name, "infra");

        Ok(())
    }

    #[test]
    fn reject_unknown_param_set() {
        let result = "[g]\nfor_paths = .*\nparams = nope\n".parse::<Config>();
        assert!(matches!(
            result,
            Err(ConfigError::UnknownParamSet { line: 3, .. })
        ));
    }

    #[test]
    fn reject_bad_regex() {
        let result = "[g]\nfor_paths = (unclosed\n".parse::<Config>();
        assert!(matches!(result, Err(ConfigError::BadRegex { line: 2, .. })));
    }

    #[test]
    fn reject_bad_key_outside_value_maps() {
        let result = "[defaults]\nto-addr = x\n".parse::<Config>();
        assert!(matches!(result, Err(ConfigError::BadKey { line: 2, .. })));
    }

    #[test]
    fn reject_bad_literal_value() {
        let result = "[defaults]\nsmtp_use_ssl = sometimes\n".parse::<Config>();
        assert!(matches!(result, Err(ConfigError::BadValue { line: 2, .. })));

        // Placeholders defer the check until expansion.
        let config: Config = "[defaults]\ntruncate_subject = %(limit)s\n".parse().unwrap();
        let result = config.get_parsed::<params::Positive>(
            params::TRUNCATE_SUBJECT,
            &GroupKey::Defaults,
            &Environment::new(),
        );
        assert_eq!(result, None);
    }

    #[test]
    fn reject_map_to_missing_section() {
        let result = "[maps]\nfrom_addr = [authors]\n".parse::<Config>();
        assert!(matches!(result, Err(ConfigError::UnknownMapSection { .. })));
    }

    #[test]
    fn round_trip_through_display() -> anyhow::Result<()> {
        let first: Config = FIXTURE.parse()?;
        let second: Config = first.to_string().parse()?;

        assert_eq!(first.groups(), second.groups());
        assert_eq!(first.to_string(), second.to_string());
        for param in ["to_addr", "reply_to", "from_addr", "subject_prefix"] {
            let group = GroupKey::Named("projects".into());
            assert_eq!(first.get(param, &group, &env()), second.get(param, &group, &env()));
        }

        Ok(())
    }
}

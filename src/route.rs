// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Group routing.
//!
//! Decides which groups hear about an event, and with which paths. Routing
//! is a pure function of the configuration and the event, so running the
//! mailer twice over the same input always yields the same matches in the
//! same order:
//!
//! 1. Groups whose `for_repos` rejects the repository basename drop out.
//! 2. Every changed path is run through every remaining group's
//!    `for_paths` and `exclude_paths`.
//! 3. Matched paths are bucketed by group and capture map.
//! 4. Buckets come out in group declaration order, and by capture map
//!    within a group.
//! 5. Paths no group claimed land in a synthetic `[defaults]` bucket, but
//!    only if `[defaults]` says where to send it.
//!
//! Paths that do not match are simply not routed. Routing never fails.

use crate::config::{Captures, Config, GroupKey};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// One group's share of an event.
///
/// Every match produces exactly one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMatch {
    pub group: GroupKey,
    pub captures: Captures,
    pub paths: BTreeSet<String>,
}

/// Route event paths to groups.
///
/// The empty path stands in for events without paths of their own, e.g.,
/// revision property changes.
pub fn route(
    config: &Config,
    repos_basename: &str,
    paths: &[String],
    propname: Option<&str>,
) -> Vec<GroupMatch> {
    let survivors = config
        .groups()
        .iter()
        .enumerate()
        .filter_map(|(index, group)| match group.route_repos(repos_basename) {
            Some(captures) => Some((group.name.as_str(), (index, captures))),
            None => {
                debug!("group {} skipped for repository {repos_basename}", group.name);
                None
            }
        })
        .collect::<HashMap<_, _>>();

    let mut buckets: BTreeMap<(usize, Captures), BTreeSet<String>> = BTreeMap::new();
    let mut unclaimed = BTreeSet::new();

    for path in paths {
        let mut claimed = false;
        for (group, captures) in config.which_groups(path, propname) {
            let Some((index, repos_captures)) = survivors.get(group.name.as_str()) else {
                continue;
            };

            let mut merged = repos_captures.clone();
            merged.extend(captures);
            debug!("path {path:?} routed to group {} with {merged:?}", group.name);
            buckets
                .entry((*index, merged))
                .or_default()
                .insert(path.clone());
            claimed = true;
        }

        if !claimed {
            unclaimed.insert(path.clone());
        }
    }

    let groups = config.groups();
    let mut matches = buckets
        .into_iter()
        .map(|((index, captures), paths)| GroupMatch {
            group: GroupKey::Named(groups[index].name.clone()),
            captures,
            paths,
        })
        .collect::<Vec<_>>();

    if !unclaimed.is_empty() {
        if config.has_default("to_addr") {
            let mut captures = Captures::new();
            if let Some(propname) = propname {
                captures.insert("propname".into(), propname.into());
            }
            matches.push(GroupMatch {
                group: GroupKey::Defaults,
                captures,
                paths: unclaimed,
            });
        } else {
            debug!("{} paths matched no group, and defaults have no to_addr", unclaimed.len());
        }
    }

    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|path| path.to_string()).collect()
    }

    fn set(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|path| path.to_string()).collect()
    }

    #[test]
    fn multi_group_routing() -> anyhow::Result<()> {
        let config: Config = indoc! {r#"
            [DOCS]
            for_paths = ^/docs/
            to_addr = docs@example.org

            [CODE]
            for_paths = ^/(trunk|branches)/
            to_addr = code@example.org
        "#}
        .parse()?;

        let result = route(&config, "repo", &paths(&["/docs/a.txt", "/trunk/b.c"]), None);
        let expect = vec![
            GroupMatch {
                group: GroupKey::Named("DOCS".into()),
                captures: Captures::new(),
                paths: set(&["/docs/a.txt"]),
            },
            GroupMatch {
                group: GroupKey::Named("CODE".into()),
                captures: Captures::new(),
                paths: set(&["/trunk/b.c"]),
            },
        ];
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn capture_buckets_sorted_within_group() -> anyhow::Result<()> {
        let config: Config = indoc! {r#"
            [projects]
            for_paths = ^/projects/(?P<p>[^/]+)/
            to_addr = %(p)s@example.org
        "#}
        .parse()?;

        let result = route(
            &config,
            "repo",
            &paths(&["/projects/beta/y", "/projects/alpha/x", "/projects/alpha/z"]),
            None,
        );
        let captures = result
            .iter()
            .map(|m| (m.captures["p"].clone(), m.paths.len()))
            .collect::<Vec<_>>();
        assert_eq!(captures, vec![("alpha".to_string(), 2), ("beta".to_string(), 1)]);

        Ok(())
    }

    #[test]
    fn repos_filter_exclusion_and_defaults_bucket() -> anyhow::Result<()> {
        let config: Config = indoc! {r#"
            [defaults]
            to_addr = catchall@example.org

            [site]
            for_repos = ^(?P<repo>www)$
            for_paths = ^/site/
            exclude_paths = \.tmp$
        "#}
        .parse()?;
        let changed = paths(&["/site/index.html", "/site/scratch.tmp", "/trunk/x"]);

        let result = route(&config, "www", &changed, None);
        let expect = vec![
            GroupMatch {
                group: GroupKey::Named("site".into()),
                captures: Captures::from([("repo".to_string(), "www".to_string())]),
                paths: set(&["/site/index.html"]),
            },
            GroupMatch {
                group: GroupKey::Defaults,
                captures: Captures::new(),
                paths: set(&["/site/scratch.tmp", "/trunk/x"]),
            },
        ];
        assert_eq!(result, expect);

        // Group does not apply to other repositories at all.
        let result = route(&config, "code", &changed, None);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].group, GroupKey::Defaults);
        assert_eq!(result[0].paths.len(), 3);

        Ok(())
    }

    #[test]
    fn no_defaults_bucket_without_recipients() -> anyhow::Result<()> {
        let config: Config = indoc! {r#"
            [defaults]
            from_addr = svn@example.org

            [docs]
            for_paths = ^/docs/
        "#}
        .parse()?;

        let result = route(&config, "repo", &paths(&["/trunk/x"]), None);
        assert_eq!(result, Vec::new());

        Ok(())
    }

    #[test]
    fn every_routed_path_matches_and_is_not_excluded() -> anyhow::Result<()> {
        let config: Config = indoc! {r#"
            [a]
            for_paths = ^/(?P<top>[^/]+)/
            exclude_paths = /vendor/

            [b]
            for_paths = \.c$
        "#}
        .parse()?;
        let changed = paths(&[
            "/trunk/main.c",
            "/trunk/vendor/lib.c",
            "/docs/readme",
            "/branches/1.x/vendor/x",
        ]);

        for found in route(&config, "repo", &changed, None) {
            let group = config.group(found.group.name()).unwrap();
            for path in &found.paths {
                assert!(group.for_paths.as_ref().unwrap().is_match(path));
                assert!(!group
                    .exclude_paths
                    .as_ref()
                    .is_some_and(|pattern| pattern.is_match(path)));
            }
        }

        Ok(())
    }
}

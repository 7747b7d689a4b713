use std::collections::BTreeSet;

use crate::ir::TypeRef;

/// The scope a reference is written in: a package, and the chain of message names within it.
#[derive(Debug, Clone, Copy)]
pub(super) struct Site<'a> {
    pub package: &'a str,
    /// The scope relative to `package`.
    pub scope: &'a str,
    /// The fully-qualified scope, used when checking that a name resolves.
    pub full_scope: &'a str,
    /// Every name visible from the site. Empty if unknown.
    pub names: &'a BTreeSet<String>,
}

impl<'a> Site<'a> {
    /// A site at the top level of `package`.
    pub fn top_level(package: &'a str, names: &'a BTreeSet<String>) -> Self {
        Site {
            package,
            scope: "",
            full_scope: package,
            names,
        }
    }

    /// A site within the declaration named `full_name`.
    pub fn within(package: &'a str, full_name: &'a str, names: &'a BTreeSet<String>) -> Self {
        Site {
            package,
            scope: strip_package(package, full_name),
            full_scope: full_name,
            names,
        }
    }

    fn segments(self) -> impl Iterator<Item = &'a str> {
        self.scope.split('.').filter(|segment| !segment.is_empty())
    }

    /// Finds the declaration `name` refers to when written at this site.
    ///
    /// The first component of `name` is looked up in the innermost scope first, then in each
    /// enclosing scope. The rest of the name must then exist within whatever it found.
    fn resolve(self, name: &str) -> Option<String> {
        let (first, rest) = match name.split_once('.') {
            Some((first, rest)) => (first, Some(rest)),
            None => (name, None),
        };

        let mut scope = self.full_scope;
        loop {
            let candidate = join(scope, first);
            if self.names.contains(&candidate) {
                let full_name = match rest {
                    Some(rest) => join(&candidate, rest),
                    None => candidate,
                };
                return Some(full_name).filter(|full_name| self.names.contains(full_name));
            }

            if scope.is_empty() {
                return None;
            }
            scope = match scope.rsplit_once('.') {
                Some((parent, _)) => parent,
                None => "",
            };
        }
    }
}

/// Writes a reference to `target` as seen from `site`.
///
/// Targets in another package are written with their full name. Within the same package, the
/// leading segments shared with the site are dropped, always keeping at least the target's own
/// name.
///
/// If that name would resolve to some other declaration from `site`, longer names are tried,
/// up to the full name. A name with a leading dot is written if even that is shadowed.
pub(super) fn shorten(target: &TypeRef, site: Site<'_>) -> String {
    let mut candidates = Vec::new();
    if target.package == site.package {
        let relative = strip_package(&target.package, &target.full_name);
        let segments: Vec<&str> = relative.split('.').collect();

        let shared = segments
            .iter()
            .zip(site.segments())
            .take_while(|(target, site)| *target == site)
            .count()
            .min(segments.len() - 1);

        candidates.extend((0..=shared).rev().map(|start| segments[start..].join(".")));
    }
    candidates.push(target.full_name.clone());

    if !site.names.contains(&target.full_name) {
        return candidates.swap_remove(0);
    }

    candidates
        .into_iter()
        .find(|name| site.resolve(name).as_deref() == Some(target.full_name.as_str()))
        .unwrap_or_else(|| format!(".{}", target.full_name))
}

fn join(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_owned()
    } else {
        format!("{}.{}", scope, name)
    }
}

fn strip_package<'a>(package: &str, full_name: &'a str) -> &'a str {
    if package.is_empty() {
        return full_name;
    }

    match full_name.strip_prefix(package) {
        Some(rest) => rest.strip_prefix('.').unwrap_or(full_name),
        None => full_name,
    }
}

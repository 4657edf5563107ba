use std::collections::{BTreeMap, BTreeSet};

use phylum_ci_core::{Package, PackageId, PackageOrigin};
use serde::Serialize;

/// Set difference between the dependencies of a change and its base.
///
/// Packages are compared by `(ecosystem, name, version)`; duplicates within a
/// side collapse to their first occurrence.
///
/// # Examples
///
/// ```
/// use phylum_ci_core::{Ecosystem, Package, PackageOrigin};
/// use phylum_ci_analysis::DependencyDiff;
///
/// let base = vec![Package::new("a", "1.0.0", Ecosystem::Npm)];
/// let current = vec![
///     Package::new("a", "1.0.0", Ecosystem::Npm),
///     Package::new("b", "2.0.0", Ecosystem::Npm),
/// ];
/// let diff = DependencyDiff::compute(&current, &base);
/// assert_eq!(diff.new.len(), 1);
/// assert_eq!(diff.new[0].name, "b");
/// assert_eq!(diff.new[0].origin, PackageOrigin::New);
/// assert_eq!(diff.existing.len(), 1);
/// assert!(diff.removed.is_empty());
/// ```
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyDiff {
    /// In the current set only.
    pub new: Vec<Package>,
    /// In both sets.
    pub existing: Vec<Package>,
    /// In the base set only.
    pub removed: Vec<Package>,
}

impl DependencyDiff {
    pub fn compute(current: &[Package], base: &[Package]) -> Self {
        let current = dedup(current);
        let base = dedup(base);
        let base_ids: BTreeSet<&PackageId> = base.keys().collect();

        let mut diff = DependencyDiff::default();
        for (id, pkg) in &current {
            let mut pkg = (*pkg).clone();
            if base_ids.contains(id) {
                pkg.origin = PackageOrigin::Existing;
                diff.existing.push(pkg);
            } else {
                pkg.origin = PackageOrigin::New;
                diff.new.push(pkg);
            }
        }
        diff.removed = base
            .iter()
            .filter(|(id, _)| !current.contains_key(*id))
            .map(|(_, pkg)| (*pkg).clone())
            .collect();
        diff
    }

    /// `true` when the change introduces at least one dependency.
    pub fn has_new(&self) -> bool {
        !self.new.is_empty()
    }

    /// Every dependency of the current set, new first.
    pub fn current(&self) -> Vec<Package> {
        self.new.iter().chain(&self.existing).cloned().collect()
    }
}

fn dedup(packages: &[Package]) -> BTreeMap<PackageId, &Package> {
    let mut map = BTreeMap::new();
    for pkg in packages {
        map.entry(pkg.id()).or_insert(pkg);
    }
    map
}

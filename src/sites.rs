//! Binding-site set operations.
//!
//! Sites are produced by the scoring backend; these helpers only reshape
//! the lists for display (equivalence, de-duplication, and the "diff only"
//! view against a reference sequence).

use std::collections::{BTreeMap, HashSet};

use crate::model::BindingSite;

/// Two sites are equivalent when their gap-free substrings match or they
/// span the same coordinates.
pub fn is_equivalent(a: &BindingSite, b: &BindingSite) -> bool {
    a.ungapped() == b.ungapped() || (a.start == b.start && a.end == b.end)
}

/// Returns true if any site in `others` is equivalent to `site`.
pub fn has_equivalent(site: &BindingSite, others: &[BindingSite]) -> bool {
    others.iter().any(|other| is_equivalent(site, other))
}

/// Keeps only the first occurrence of every gap-free substring across all
/// sequences, visiting sequences in key order.
pub fn dedupe_by_substring(sites: &mut BTreeMap<String, Vec<BindingSite>>) {
    let mut seen = HashSet::new();
    for list in sites.values_mut() {
        list.retain(|site| seen.insert(site.ungapped()));
    }
}

/// Rewrites every non-reference list as its difference to the reference.
///
/// Sites missing from the reference stay flagged as added; reference sites
/// missing from the sequence are appended with `is_added = false`. The
/// reference list itself is emptied.
pub fn diff_against_reference(sites: &mut BTreeMap<String, Vec<BindingSite>>, reference: &str) {
    let Some(ref_sites) = sites.get(reference).cloned() else {
        return;
    };

    for (name, list) in sites.iter_mut() {
        if name == reference {
            list.clear();
            continue;
        }
        let removed: Vec<BindingSite> = ref_sites
            .iter()
            .filter(|site| !has_equivalent(site, list))
            .map(|site| BindingSite {
                is_added: false,
                ..site.clone()
            })
            .collect();
        list.retain(|site| !has_equivalent(site, &ref_sites));
        list.extend(removed);
    }
}

/// Drops sequences left without any site after a diff.
pub fn drop_empty(sites: &mut BTreeMap<String, Vec<BindingSite>>) {
    sites.retain(|_, list| !list.is_empty());
}

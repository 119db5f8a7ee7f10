//! Reduce nested candidates to the outermost ones

use std::collections::HashSet;
use std::path::Path;

use super::types::DirectoryAggregate;

/// Keep only candidates that have no ancestor among the candidates
///
/// Shallower paths are accepted first (ties broken by path), so when both
/// `/a` and `/a/b` qualify only `/a` is kept. Matching is by whole path
/// components: `/ab` is not inside `/a`. The result is ordered by depth,
/// then path.
pub fn select_top_level(candidates: &[DirectoryAggregate]) -> Vec<DirectoryAggregate> {
    let mut ordered: Vec<&DirectoryAggregate> = candidates.iter().collect();
    ordered.sort_by(|a, b| {
        depth(&a.path)
            .cmp(&depth(&b.path))
            .then_with(|| a.path.cmp(&b.path))
    });

    let mut accepted: HashSet<&Path> = HashSet::new();
    let mut selected = Vec::new();

    for candidate in ordered {
        let covered = candidate
            .path
            .ancestors()
            .any(|ancestor| accepted.contains(ancestor));
        if covered {
            continue;
        }
        accepted.insert(candidate.path.as_path());
        selected.push(candidate.clone());
    }

    selected
}

fn depth(path: &Path) -> usize {
    path.components().count()
}

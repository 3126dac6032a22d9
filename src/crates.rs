//! Crate hierarchy from hyphen-delimited crate names.
//!
//! "Swing - Fast - Uptempo" is the path ["Swing", "Fast", "Uptempo"]. Every
//! intermediate prefix becomes a node even when no crate carries exactly that
//! name, and a crate whose path is a strict prefix of another is structural
//! only: it is kept out of leaf enumeration so hierarchical charts do not count
//! its songs twice.

use std::collections::BTreeMap;

use crate::models::{CrateNode, CrateRow};

/// Path separator used for display
pub const PATH_SEPARATOR: &str = " / ";

/// Split a crate name on "-" into trimmed, non-empty segments.
pub fn split_crate_name(name: &str) -> Vec<String> {
    name.split('-')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// "Swing - Fast" → "Swing / Fast"
pub fn display_path(name: &str) -> String {
    split_crate_name(name).join(PATH_SEPARATOR)
}

#[derive(Clone, Debug, Default)]
pub struct CrateHierarchy {
    nodes: Vec<CrateNode>,
}

impl CrateHierarchy {
    /// Build the hierarchy. Crates resolving to the same path have their song
    /// counts summed; crates with no usable segment are ignored.
    pub fn resolve(crates: &[CrateRow]) -> Self {
        // segments → (explicit, own songs)
        let mut paths: BTreeMap<Vec<String>, (bool, u64)> = BTreeMap::new();

        for row in crates {
            let segments = split_crate_name(&row.name);
            if segments.is_empty() {
                continue;
            }
            for depth in 1..segments.len() {
                paths.entry(segments[..depth].to_vec()).or_insert((false, 0));
            }
            let entry = paths.entry(segments).or_insert((false, 0));
            entry.0 = true;
            entry.1 += row.song_count;
        }

        let keys: Vec<&Vec<String>> = paths.keys().collect();
        let nodes = paths
            .iter()
            .map(|(segments, &(explicit, own_songs))| {
                let is_descendant =
                    |other: &Vec<String>| other.len() > segments.len() && other.starts_with(segments);
                let is_leaf = !keys.iter().any(|other| is_descendant(*other));
                let cumulative_songs = own_songs
                    + paths
                        .iter()
                        .filter(|(other, _)| is_descendant(*other))
                        .map(|(_, &(_, n))| n)
                        .sum::<u64>();
                CrateNode {
                    path: segments.join(PATH_SEPARATOR),
                    segments: segments.clone(),
                    explicit,
                    is_leaf,
                    own_songs,
                    cumulative_songs,
                }
            })
            .collect();

        Self { nodes }
    }

    /// Every node, sorted by path
    pub fn nodes(&self) -> &[CrateNode] {
        &self.nodes
    }

    pub fn leaves(&self) -> impl Iterator<Item = &CrateNode> {
        self.nodes.iter().filter(|n| n.is_leaf)
    }

    /// Explicit crates that are prefixes of other crates
    pub fn structural(&self) -> impl Iterator<Item = &CrateNode> {
        self.nodes.iter().filter(|n| n.explicit && !n.is_leaf)
    }

    pub fn get(&self, path: &str) -> Option<&CrateNode> {
        self.nodes.iter().find(|n| n.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, name: &str, song_count: u64) -> CrateRow {
        CrateRow {
            id,
            name: name.to_string(),
            song_count,
        }
    }

    #[test]
    fn test_prefix_crate_is_structural() {
        let h = CrateHierarchy::resolve(&[row(1, "Swing", 3), row(2, "Swing - Fast", 5)]);
        let swing = h.get("Swing").unwrap();
        assert!(swing.explicit);
        assert!(!swing.is_leaf);
        let fast = h.get("Swing / Fast").unwrap();
        assert!(fast.is_leaf);

        let leaves: Vec<&str> = h.leaves().map(|n| n.path.as_str()).collect();
        assert_eq!(leaves, vec!["Swing / Fast"]);
        assert_eq!(h.structural().count(), 1);
    }

    #[test]
    fn test_intermediate_prefixes_synthesized() {
        let h = CrateHierarchy::resolve(&[row(1, "Swing - Fast - Uptempo", 4)]);
        let paths: Vec<&str> = h.nodes().iter().map(|n| n.path.as_str()).collect();
        assert_eq!(paths, vec!["Swing", "Swing / Fast", "Swing / Fast / Uptempo"]);
        assert!(!h.get("Swing").unwrap().explicit);
        assert!(!h.get("Swing / Fast").unwrap().explicit);
        assert_eq!(h.leaves().count(), 1);
    }

    #[test]
    fn test_cumulative_counts() {
        let h = CrateHierarchy::resolve(&[
            row(1, "Swing", 3),
            row(2, "Swing - Fast", 5),
            row(3, "Swing - Slow", 2),
            row(4, "Swing - Fast - Uptempo", 1),
            row(5, "Blues", 7),
        ]);
        assert_eq!(h.get("Swing").unwrap().cumulative_songs, 11);
        assert_eq!(h.get("Swing").unwrap().own_songs, 3);
        assert_eq!(h.get("Swing / Fast").unwrap().cumulative_songs, 6);
        assert_eq!(h.get("Blues").unwrap().cumulative_songs, 7);
    }

    #[test]
    fn test_sibling_name_prefix_is_not_descendant() {
        let h = CrateHierarchy::resolve(&[row(1, "Swing", 1), row(2, "Swingout", 2)]);
        assert!(h.get("Swing").unwrap().is_leaf);
        assert_eq!(h.get("Swing").unwrap().cumulative_songs, 1);
    }

    #[test]
    fn test_split_and_display() {
        assert_eq!(split_crate_name(" Swing -Fast- "), vec!["Swing", "Fast"]);
        assert_eq!(display_path("Blues - Slow - Late Night"), "Blues / Slow / Late Night");
        assert!(CrateHierarchy::resolve(&[row(1, " - ", 2)]).is_empty());
    }

    #[test]
    fn test_duplicate_paths_merge() {
        let h = CrateHierarchy::resolve(&[row(1, "Swing-Fast", 2), row(2, "Swing - Fast", 3)]);
        assert_eq!(h.get("Swing / Fast").unwrap().own_songs, 5);
    }
}

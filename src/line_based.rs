//! Whole-subtree line-based fallback merge, used when a child list cannot be
//! resolved structurally (§4.8 step 4's un-closeable conflict, §4.10 failure
//! semantics) and for the per-revision retry in root-conflict recovery.
//! Delegates to `diffy_imara`, the same crate the COMMENT_CONTENT
//! content-conflict handler uses (§4.6).

use diffy_imara::{Algorithm, ConflictStyle, MergeOptions};

use crate::settings::DisplaySettings;

/// The outcome of a line-based merge attempt over raw source text.
pub struct LineMerge {
    pub contents: String,
    pub has_conflicts: bool,
}

pub fn line_based_merge(base: &str, left: &str, right: &str, settings: &DisplaySettings) -> LineMerge {
    let result = MergeOptions::new()
        .set_conflict_marker_length(settings.conflict_marker_size)
        .set_conflict_style(if settings.diff3 {
            ConflictStyle::Diff3
        } else {
            ConflictStyle::Merge
        })
        .set_algorithm(Algorithm::Histogram)
        .merge(base, left, right);
    match result {
        Ok(contents) => LineMerge { contents, has_conflicts: false },
        Err(contents) => LineMerge { contents, has_conflicts: true },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disjoint_additions_merge_cleanly() {
        let result = line_based_merge("a\n", "a\nb\n", "c\na\n", &DisplaySettings::default());
        assert!(!result.has_conflicts);
    }

    #[test]
    fn overlapping_edits_conflict() {
        let result = line_based_merge("x\n", "y\n", "z\n", &DisplaySettings::default());
        assert!(result.has_conflicts);
    }
}

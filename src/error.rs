//! The error type surfaced across the merge pipeline (§7).
//!
//! `RoleAmbiguity` and `InvariantViolation` are fatal: the driver (§4.10)
//! aborts the whole merge on either of them rather than attempting to
//! recover, since both indicate the output tree can no longer be trusted.
//! The others are recorded against individual nodes and rendered as
//! conflicts by the printer; they do not abort the merge.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    /// A structural conflict (§3.4, §4.4) that no structural-conflict
    /// handler (§4.7) could resolve.
    #[error("unresolved structural conflict on {0}")]
    Conflict(String),

    /// A child list could not be linearized into a single order, and no
    /// handler applied; the owning subtree falls back to a line-based merge
    /// (§4.8.1).
    #[error("unresolvable child list under {0}")]
    UnresolvableChildList(String),

    /// A node was moved to two incompatible locations across revisions
    /// (§4.8, "move conflict").
    #[error("move conflict on {0}")]
    MoveConflict(String),

    /// A node ended up eligible for more than one role under its resolved
    /// parent, with no way to prefer one (§4.9 step 3). Fatal.
    #[error("ambiguous role for {0} under {1}")]
    RoleAmbiguity(String, String),

    /// An internal invariant was violated (§8); indicates a bug rather than
    /// a legitimate conflict. Fatal.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

//! Interpretation of identity-oracle outcomes.

use crate::services::OracleError;
use crate::types::Candidate;
use serde::Serialize;
use std::fmt;

/// Outcome of one recognition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityResult {
    /// Best match belongs to the named group.
    Matched(String),
    /// A face was searched but nothing in the reference database matched.
    Unmatched,
    /// No face in frame or no result; routine.
    Indeterminate,
    /// The oracle itself is broken; kept apart from `Indeterminate` for diagnostics.
    Error(String),
}

impl IdentityResult {
    /// Classify a raw oracle response.
    pub fn from_oracle(outcome: Result<Vec<Candidate>, OracleError>) -> Self {
        match outcome {
            Ok(candidates) => match candidates.first() {
                None => IdentityResult::Unmatched,
                Some(best) => match group_label(&best.identity_path) {
                    Some(label) => IdentityResult::Matched(label.to_string()),
                    None => IdentityResult::Error(format!(
                        "sample path has no enclosing group: {}",
                        best.identity_path
                    )),
                },
            },
            Err(OracleError::NoFace) => IdentityResult::Indeterminate,
            Err(OracleError::Service(reason)) => IdentityResult::Error(reason),
        }
    }

    /// The identity the render loop should label faces with after this result.
    pub fn current_identity(&self) -> CurrentIdentity {
        match self {
            IdentityResult::Matched(label) => CurrentIdentity::Known(label.clone()),
            IdentityResult::Unmatched => CurrentIdentity::Unknown,
            IdentityResult::Indeterminate | IdentityResult::Error(_) => CurrentIdentity::None,
        }
    }

    pub fn is_match_for(&self, admin_id: &str) -> bool {
        matches!(self, IdentityResult::Matched(label) if label == admin_id)
    }
}

/// Most recent identity seen by the security loop.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", content = "label", rename_all = "lowercase")]
pub enum CurrentIdentity {
    /// Nothing usable yet, or the last attempt failed.
    #[default]
    None,
    Unknown,
    Known(String),
}

impl fmt::Display for CurrentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrentIdentity::None => f.write_str("None"),
            CurrentIdentity::Unknown => f.write_str("Unknown"),
            CurrentIdentity::Known(label) => f.write_str(label),
        }
    }
}

/// Name of the folder enclosing a reference sample, e.g. `dataset/admin/01.jpg` → `admin`.
///
/// Accepts both `/` and `\` separators.
pub fn group_label(sample_path: &str) -> Option<&str> {
    let mut parts = sample_path.rsplit(['/', '\\']);
    let _file = parts.next()?;
    parts.next().filter(|label| !label.is_empty())
}

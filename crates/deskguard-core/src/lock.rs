//! Authoritative lock state. Written only by the security loop.

use crate::identity::IdentityResult;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    Locked,
    Unlocked,
}

/// Result of an unlock attempt. `Unlocked` is returned exactly once per session.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    Unlocked,
    NoChange,
}

/// Lock flag plus the administrator allowed to clear it.
///
/// There is no re-lock: the state only moves `Locked → Unlocked`.
#[derive(Debug)]
pub struct LockState {
    locked: AtomicBool,
    admin_id: String,
}

impl LockState {
    /// A new session always starts locked.
    pub fn new(admin_id: impl Into<String>) -> Self {
        Self {
            locked: AtomicBool::new(true),
            admin_id: admin_id.into(),
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub fn status(&self) -> LockStatus {
        if self.is_locked() {
            LockStatus::Locked
        } else {
            LockStatus::Unlocked
        }
    }

    pub fn admin_id(&self) -> &str {
        &self.admin_id
    }

    /// Unlock iff currently locked and `identity` is the administrator.
    pub(crate) fn try_unlock(&self, identity: &IdentityResult) -> UnlockOutcome {
        if !identity.is_match_for(&self.admin_id) {
            return UnlockOutcome::NoChange;
        }
        match self
            .locked
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => UnlockOutcome::Unlocked,
            Err(_) => UnlockOutcome::NoChange,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_locked() {
        let lock = LockState::new("admin");
        assert!(lock.is_locked());
        assert_eq!(lock.status(), LockStatus::Locked);
    }

    #[test]
    fn test_admin_unlocks_once() {
        let lock = LockState::new("admin");
        let admin = IdentityResult::Matched("admin".into());
        assert_eq!(lock.try_unlock(&admin), UnlockOutcome::Unlocked);
        assert!(!lock.is_locked());
        assert_eq!(lock.try_unlock(&admin), UnlockOutcome::NoChange);
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_other_identities_never_unlock() {
        let lock = LockState::new("admin");
        for identity in [
            IdentityResult::Matched("alice".into()),
            IdentityResult::Unmatched,
            IdentityResult::Indeterminate,
            IdentityResult::Error("down".into()),
        ] {
            assert_eq!(lock.try_unlock(&identity), UnlockOutcome::NoChange);
        }
        assert!(lock.is_locked());
    }
}

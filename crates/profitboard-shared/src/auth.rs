//! Admin authorization decision table.
//!
//! Kept free of I/O so the server can feed it whatever it resolved for the
//! current request (identity, profile role, passcode match) and every
//! admin-only route gets exactly the same answer.

use crate::types::Role;

/// How an admin request was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantSource {
    /// The caller's profile has `role = admin`.
    Role,
    /// The break-glass passcode matched.
    Override,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminDecision {
    Granted(GrantSource),
    /// No identity and no valid override.
    Unauthorized,
    /// Identity present but not an admin, and no valid override.
    Forbidden,
}

/// Evaluate the admin gate.
///
/// * `has_identity` -- whether the bearer credential resolved to a user.
/// * `role` -- that user's profile role, `None` if they have no profile.
/// * `override_ok` -- whether a configured passcode was presented and matched.
///
/// A real role wins over the override so audit logs only show the override
/// when it actually made the difference.
pub fn authorize_admin(has_identity: bool, role: Option<Role>, override_ok: bool) -> AdminDecision {
    match (has_identity, role, override_ok) {
        (true, Some(Role::Admin), _) => AdminDecision::Granted(GrantSource::Role),
        (_, _, true) => AdminDecision::Granted(GrantSource::Override),
        (false, _, false) => AdminDecision::Unauthorized,
        (true, _, false) => AdminDecision::Forbidden,
    }
}

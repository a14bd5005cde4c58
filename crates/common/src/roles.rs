//! Caller roles and the role/action capability table.
//!
//! Authentication itself lives upstream; the call core only consumes the
//! resulting role. Permissions are kept in one explicit table rather than
//! scattered inline checks so the admission rules stay auditable.

use serde::{Deserialize, Serialize};

/// Role of the caller as asserted by the upstream auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    ProjectAdmin,
    Manager,
    Kiosk,
}

/// Actions a caller can perform on call sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallAction {
    /// Create a new waiting session.
    Initiate,

    /// Claim a waiting session (transition to connected).
    Answer,

    /// Broadcast-end competing waiting sessions.
    Decline,

    /// End a session. Kiosks may only end their own device's sessions.
    End,

    /// Post/purge signaling messages. Kiosks only on their own sessions.
    Signal,
}

/// The capability table: which actions each role is allowed.
///
/// Kiosk-role callers never answer or decline; ownership of the target
/// session is checked separately at the handler for End/Signal/Initiate.
const CAPABILITIES: &[(Role, &[CallAction])] = &[
    (
        Role::SuperAdmin,
        &[
            CallAction::Initiate,
            CallAction::Answer,
            CallAction::Decline,
            CallAction::End,
            CallAction::Signal,
        ],
    ),
    (
        Role::ProjectAdmin,
        &[
            CallAction::Initiate,
            CallAction::Answer,
            CallAction::Decline,
            CallAction::End,
            CallAction::Signal,
        ],
    ),
    (
        Role::Manager,
        &[
            CallAction::Initiate,
            CallAction::Answer,
            CallAction::Decline,
            CallAction::End,
            CallAction::Signal,
        ],
    ),
    (
        Role::Kiosk,
        &[CallAction::Initiate, CallAction::End, CallAction::Signal],
    ),
];

impl Role {
    /// Returns the string representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::ProjectAdmin => "project_admin",
            Role::Manager => "manager",
            Role::Kiosk => "kiosk",
        }
    }

    /// Parse a role string from the upstream auth layer.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "super_admin" => Some(Role::SuperAdmin),
            "project_admin" => Some(Role::ProjectAdmin),
            "manager" => Some(Role::Manager),
            "kiosk" => Some(Role::Kiosk),
            _ => None,
        }
    }

    /// Whether this role is a staff role (may claim and decline calls).
    #[must_use]
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Kiosk)
    }

    /// Look up the capability table for this role/action pair.
    #[must_use]
    pub fn allows(&self, action: CallAction) -> bool {
        CAPABILITIES
            .iter()
            .find(|(role, _)| role == self)
            .is_some_and(|(_, actions)| actions.contains(&action))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_round_trip() {
        for role in [
            Role::SuperAdmin,
            Role::ProjectAdmin,
            Role::Manager,
            Role::Kiosk,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("receptionist"), None);
    }

    #[test]
    fn test_staff_roles_may_answer_and_decline() {
        for role in [Role::SuperAdmin, Role::ProjectAdmin, Role::Manager] {
            assert!(role.allows(CallAction::Answer), "{role:?} should answer");
            assert!(role.allows(CallAction::Decline), "{role:?} should decline");
            assert!(role.is_staff());
        }
    }

    #[test]
    fn test_kiosk_never_answers_or_declines() {
        assert!(!Role::Kiosk.allows(CallAction::Answer));
        assert!(!Role::Kiosk.allows(CallAction::Decline));
        assert!(!Role::Kiosk.is_staff());
    }

    #[test]
    fn test_kiosk_may_initiate_end_and_signal() {
        assert!(Role::Kiosk.allows(CallAction::Initiate));
        assert!(Role::Kiosk.allows(CallAction::End));
        assert!(Role::Kiosk.allows(CallAction::Signal));
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&Role::ProjectAdmin).unwrap();
        assert_eq!(json, "\"project_admin\"");

        let role: Role = serde_json::from_str("\"super_admin\"").unwrap();
        assert_eq!(role, Role::SuperAdmin);
    }
}

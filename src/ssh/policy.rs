// file: src/ssh/policy.rs
// version: 1.0.0
// guid: sshpol01-2345-6789-abcd-ef0123456789

//! Password authentication decision

use serde::Serialize;

/// What the operator asked for regarding password logins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PasswordAuthIntent {
    NotRequested,
    Requested,
    /// Disable even without evidence of working key access
    Forced,
}

impl PasswordAuthIntent {
    pub fn from_flags(disable_password_auth: bool, force_unsafe: bool) -> Self {
        match (disable_password_auth, force_unsafe) {
            (false, _) => PasswordAuthIntent::NotRequested,
            (true, false) => PasswordAuthIntent::Requested,
            (true, true) => PasswordAuthIntent::Forced,
        }
    }
}

/// Final password authentication setting and how it was reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordAuthDecision {
    pub intent: PasswordAuthIntent,
    pub password_auth_enabled: bool,
    /// The request to disable was refused for lack of key evidence
    pub downgraded: bool,
    pub warning: Option<String>,
}

/// Resolve the password authentication policy from intent and key evidence
pub fn resolve_password_auth(intent: PasswordAuthIntent, has_authorized_keys: bool) -> PasswordAuthDecision {
    match (intent, has_authorized_keys) {
        (PasswordAuthIntent::NotRequested, _) => PasswordAuthDecision {
            intent,
            password_auth_enabled: true,
            downgraded: false,
            warning: None,
        },
        (PasswordAuthIntent::Requested, true) => PasswordAuthDecision {
            intent,
            password_auth_enabled: false,
            downgraded: false,
            warning: None,
        },
        (PasswordAuthIntent::Requested, false) => PasswordAuthDecision {
            intent,
            password_auth_enabled: true,
            downgraded: true,
            warning: Some(
                "No non-empty authorized_keys found for root or any login account; \
                 keeping password authentication enabled to avoid a lockout. \
                 Install a key or pass --force-unsafe-ssh to override."
                    .to_string(),
            ),
        },
        (PasswordAuthIntent::Forced, evidence) => PasswordAuthDecision {
            intent,
            password_auth_enabled: false,
            downgraded: false,
            warning: (!evidence).then(|| {
                "Password authentication disabled by force with no authorized_keys found; \
                 remote login may only be possible through the console."
                    .to_string()
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_from_flags() {
        assert_eq!(PasswordAuthIntent::from_flags(false, false), PasswordAuthIntent::NotRequested);
        assert_eq!(PasswordAuthIntent::from_flags(false, true), PasswordAuthIntent::NotRequested);
        assert_eq!(PasswordAuthIntent::from_flags(true, false), PasswordAuthIntent::Requested);
        assert_eq!(PasswordAuthIntent::from_flags(true, true), PasswordAuthIntent::Forced);
    }

    #[test]
    fn test_not_requested_keeps_passwords() {
        for evidence in [true, false] {
            let d = resolve_password_auth(PasswordAuthIntent::NotRequested, evidence);
            assert!(d.password_auth_enabled);
            assert!(!d.downgraded);
            assert!(d.warning.is_none());
        }
    }

    #[test]
    fn test_requested_with_keys_disables() {
        let d = resolve_password_auth(PasswordAuthIntent::Requested, true);
        assert!(!d.password_auth_enabled);
        assert!(d.warning.is_none());
    }

    #[test]
    fn test_requested_without_keys_downgrades() {
        let d = resolve_password_auth(PasswordAuthIntent::Requested, false);
        assert!(d.password_auth_enabled);
        assert!(d.downgraded);
        assert!(d.warning.is_some());
    }

    #[test]
    fn test_forced_always_disables() {
        let d = resolve_password_auth(PasswordAuthIntent::Forced, false);
        assert!(!d.password_auth_enabled);
        assert!(d.warning.is_some());

        let d = resolve_password_auth(PasswordAuthIntent::Forced, true);
        assert!(!d.password_auth_enabled);
        assert!(d.warning.is_none());
    }
}

// file: src/ssh/evidence.rs
// version: 1.0.0
// guid: sshevd01-2345-6789-abcd-ef0123456789

//! Authorized-keys evidence scan

use crate::host::Host;
use std::path::PathBuf;
use tracing::debug;

pub const ROOT_AUTHORIZED_KEYS: &str = "/root/.ssh/authorized_keys";
pub const PASSWD: &str = "/etc/passwd";

/// First uid handed out to regular accounts
const MIN_HUMAN_UID: u32 = 1000;
/// `nobody`
const NOBODY_UID: u32 = 65534;

/// A local account that can plausibly log in over SSH
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginAccount {
    pub name: String,
    pub uid: u32,
    pub home: String,
    pub shell: String,
}

/// Non-empty authorized_keys files found on the host
#[derive(Debug, Clone, Default)]
pub struct KeyEvidence {
    pub key_files: Vec<PathBuf>,
}

impl KeyEvidence {
    pub fn has_authorized_keys(&self) -> bool {
        !self.key_files.is_empty()
    }
}

/// Scan root and every human login account for a non-empty authorized_keys
pub async fn scan_authorized_keys(host: &Host) -> KeyEvidence {
    let mut candidates = vec![PathBuf::from(ROOT_AUTHORIZED_KEYS)];

    if let Some(passwd) = host.read_file(PASSWD).await {
        for account in login_accounts(&passwd) {
            if !host.path(&account.home).is_dir() {
                debug!("Skipping {}: home {} missing", account.name, account.home);
                continue;
            }
            candidates.push(PathBuf::from(&account.home).join(".ssh/authorized_keys"));
        }
    }

    let mut evidence = KeyEvidence::default();
    for candidate in candidates {
        match host.read_file(&candidate).await {
            Some(content) if has_key_material(&content) => {
                debug!("Found authorized keys in {}", candidate.display());
                evidence.key_files.push(candidate);
            }
            _ => {}
        }
    }
    evidence
}

/// Accounts from passwd content with a human uid and a login shell
pub fn login_accounts(passwd: &str) -> Vec<LoginAccount> {
    passwd
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 7 {
                return None;
            }
            Some(LoginAccount {
                name: fields[0].to_string(),
                uid: fields[2].parse().ok()?,
                home: fields[5].to_string(),
                shell: fields[6].trim().to_string(),
            })
        })
        .filter(|a| a.uid >= MIN_HUMAN_UID && a.uid < NOBODY_UID)
        .filter(|a| !a.home.is_empty() && has_login_shell(&a.shell))
        .collect()
}

fn has_login_shell(shell: &str) -> bool {
    !shell.is_empty() && !shell.ends_with("nologin") && !shell.ends_with("/false")
}

/// Anything other than whitespace counts
fn has_key_material(content: &str) -> bool {
    !content.trim().is_empty()
}

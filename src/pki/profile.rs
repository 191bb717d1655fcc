//! Subject alternative names per role.
//!
//! Host names and addresses depend on the cluster topology, so nothing here
//! has built-in values: the caller fills the policy from its own model.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::Role;

/// A single SAN entry. Strings that parse as an IP address become
/// [`SanEntry::Ip`], anything else [`SanEntry::Dns`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SanEntry {
    Dns(String),
    Ip(IpAddr),
}

impl FromStr for SanEntry {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty subject alternative name".to_string());
        }
        match s.parse::<IpAddr>() {
            Ok(ip) => Ok(SanEntry::Ip(ip)),
            Err(_) => Ok(SanEntry::Dns(s.to_string())),
        }
    }
}

impl TryFrom<String> for SanEntry {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SanEntry> for String {
    fn from(entry: SanEntry) -> Self {
        entry.to_string()
    }
}

impl fmt::Display for SanEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SanEntry::Dns(name) => f.write_str(name),
            SanEntry::Ip(ip) => write!(f, "{ip}"),
        }
    }
}

/// SANs for the roles that serve or identify a host.
///
/// Admin and etcd-client certificates identify a user, not a host, and never
/// carry SANs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanPolicy {
    pub api_server: Vec<SanEntry>,
    pub worker: Vec<SanEntry>,
    pub etcd: Vec<SanEntry>,
}

impl SanPolicy {
    pub fn for_role(&self, role: Role) -> &[SanEntry] {
        match role {
            Role::ApiServer => &self.api_server,
            Role::Worker => &self.worker,
            Role::Etcd => &self.etcd,
            Role::Ca | Role::Admin | Role::EtcdClient => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_classified() {
        assert_eq!(
            "10.3.0.1".parse::<SanEntry>().unwrap(),
            SanEntry::Ip("10.3.0.1".parse().unwrap())
        );
        assert_eq!(
            "kubernetes.default".parse::<SanEntry>().unwrap(),
            SanEntry::Dns("kubernetes.default".to_string())
        );
        assert!("  ".parse::<SanEntry>().is_err());
    }

    #[test]
    fn policy_deserializes_from_plain_strings() {
        let policy: SanPolicy =
            serde_json::from_str(r#"{"api_server": ["kubernetes", "10.3.0.1"]}"#).unwrap();
        assert_eq!(policy.api_server.len(), 2);
        assert!(policy.etcd.is_empty());
        assert!(policy.for_role(Role::Admin).is_empty());

        let json = serde_json::to_string(&policy).unwrap();
        assert!(json.contains("\"10.3.0.1\""));
    }
}

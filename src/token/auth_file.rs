//! The static token file read by the API server.
//!
//! One record per line: `token,user,uid[,"group1,group2"]`.

use std::path::Path;

use crate::error::{Error, Result};

pub const BOOTSTRAP_USER: &str = "kubelet-bootstrap";
pub const BOOTSTRAP_UID: &str = "10001";
pub const BOOTSTRAP_GROUP: &str = "system:kubelet-bootstrap";

/// One line of the token file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub token: String,
    pub user: String,
    pub uid: String,
    pub groups: Vec<String>,
}

impl TokenRecord {
    fn parse(line: &str) -> std::result::Result<Self, String> {
        let mut fields = line.splitn(4, ',');
        let mut required = |name: &str| match fields.next().map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(format!("missing {name} field")),
        };
        let token = required("token")?;
        let user = required("user")?;
        let uid = required("uid")?;

        let groups = fields
            .next()
            .map(|raw| raw.trim().trim_matches('"'))
            .filter(|raw| !raw.is_empty())
            .map(|raw| raw.split(',').map(|g| g.trim().to_string()).collect())
            .unwrap_or_default();

        Ok(Self {
            token,
            user,
            uid,
            groups,
        })
    }
}

/// Validated content of the token file. The original text is kept as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthTokens {
    content: String,
    records: Vec<TokenRecord>,
}

impl AuthTokens {
    /// Validates `content`, read from `path`.
    ///
    /// # Errors
    /// `Parse` naming the line when a record lacks a token, user or uid.
    pub fn parse(path: &Path, content: String) -> Result<Self> {
        let records = content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                TokenRecord::parse(line).map_err(|e| Error::parse(path, format!("line {}: {e}", i + 1)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { content, records })
    }

    pub fn records(&self) -> &[TokenRecord] {
        &self.records
    }

    pub fn contains_token(&self, token: &str) -> bool {
        self.records.iter().any(|r| r.token == token)
    }

    /// Adds the kubelet bootstrap record for `token` unless the token is
    /// already listed. Returns whether a line was added.
    pub fn ensure_bootstrap_entry(&mut self, token: &str) -> bool {
        if self.contains_token(token) {
            return false;
        }
        if !self.content.is_empty() && !self.content.ends_with('\n') {
            self.content.push('\n');
        }
        self.content.push_str(&bootstrap_entry(token));
        self.content.push('\n');
        self.records.push(TokenRecord {
            token: token.to_string(),
            user: BOOTSTRAP_USER.to_string(),
            uid: BOOTSTRAP_UID.to_string(),
            groups: vec![BOOTSTRAP_GROUP.to_string()],
        });
        true
    }

    pub fn as_str(&self) -> &str {
        &self.content
    }

    pub fn into_string(self) -> String {
        self.content
    }
}

/// `<token>,kubelet-bootstrap,10001,"system:kubelet-bootstrap"`
pub fn bootstrap_entry(token: &str) -> String {
    format!("{token},{BOOTSTRAP_USER},{BOOTSTRAP_UID},\"{BOOTSTRAP_GROUP}\"")
}

//! 证书角色及其在缓存目录中的文件命名。

use std::fmt;

/// The role a key/certificate pair plays in the cluster.
///
/// The role decides the subject, the extended key usage and the cache file
/// names of the pair. [`Role::Ca`] signs every other role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Ca,
    ApiServer,
    Admin,
    Worker,
    Etcd,
    EtcdClient,
}

/// Extended key usage granted to a leaf certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    ServerAuth,
    ClientAuth,
}

impl Role {
    /// All roles, CA first.
    pub const ALL: [Role; 6] = [
        Role::Ca,
        Role::ApiServer,
        Role::Admin,
        Role::Worker,
        Role::Etcd,
        Role::EtcdClient,
    ];

    /// Roles signed by the CA.
    pub const LEAVES: [Role; 5] = [
        Role::ApiServer,
        Role::Admin,
        Role::Worker,
        Role::Etcd,
        Role::EtcdClient,
    ];

    /// File stem shared by every cache file of this role.
    pub fn file_stem(self) -> &'static str {
        match self {
            Role::Ca => "ca",
            Role::ApiServer => "apiserver",
            Role::Admin => "admin",
            Role::Worker => "worker",
            Role::Etcd => "etcd",
            Role::EtcdClient => "etcd-client",
        }
    }

    /// `<stem>-key.pem`
    pub fn key_file(self) -> String {
        format!("{}-key.pem", self.file_stem())
    }

    /// `<stem>.pem`
    pub fn cert_file(self) -> String {
        format!("{}.pem", self.file_stem())
    }

    /// `<stem>-key.pem.enc`
    pub fn encrypted_key_file(self) -> String {
        format!("{}-key.pem.enc", self.file_stem())
    }

    pub fn common_name(self) -> &'static str {
        match self {
            Role::Ca => "kube-ca",
            Role::ApiServer => "kube-apiserver",
            Role::Admin => "kube-admin",
            Role::Worker => "kube-worker",
            Role::Etcd => "kube-etcd",
            Role::EtcdClient => "kube-etcd-client",
        }
    }

    /// Organization placed in the subject. The admin certificate is mapped to
    /// the cluster's superuser group through it.
    pub fn organization(self) -> Option<&'static str> {
        match self {
            Role::Admin => Some("system:masters"),
            _ => None,
        }
    }

    /// Extended key usages of a leaf. Empty for the CA.
    pub fn usages(self) -> &'static [Usage] {
        match self {
            Role::Ca => &[],
            Role::ApiServer => &[Usage::ServerAuth],
            // etcd members also dial each other as peers
            Role::Etcd => &[Usage::ServerAuth, Usage::ClientAuth],
            Role::Admin | Role::Worker | Role::EtcdClient => &[Usage::ClientAuth],
        }
    }

    pub fn is_ca(self) -> bool {
        self == Role::Ca
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

/// One value per [`Role`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PerRole<T> {
    pub ca: T,
    pub api_server: T,
    pub admin: T,
    pub worker: T,
    pub etcd: T,
    pub etcd_client: T,
}

impl<T> PerRole<T> {
    /// Builds the set by calling `f` once per role, in [`Role::ALL`] order,
    /// stopping at the first error.
    pub fn try_from_fn<E>(mut f: impl FnMut(Role) -> Result<T, E>) -> Result<Self, E> {
        Ok(Self {
            ca: f(Role::Ca)?,
            api_server: f(Role::ApiServer)?,
            admin: f(Role::Admin)?,
            worker: f(Role::Worker)?,
            etcd: f(Role::Etcd)?,
            etcd_client: f(Role::EtcdClient)?,
        })
    }

    pub fn get(&self, role: Role) -> &T {
        match role {
            Role::Ca => &self.ca,
            Role::ApiServer => &self.api_server,
            Role::Admin => &self.admin,
            Role::Worker => &self.worker,
            Role::Etcd => &self.etcd,
            Role::EtcdClient => &self.etcd_client,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &T)> {
        Role::ALL.into_iter().map(move |role| (role, self.get(role)))
    }

    pub fn map<U>(&self, mut f: impl FnMut(Role, &T) -> U) -> PerRole<U> {
        PerRole {
            ca: f(Role::Ca, &self.ca),
            api_server: f(Role::ApiServer, &self.api_server),
            admin: f(Role::Admin, &self.admin),
            worker: f(Role::Worker, &self.worker),
            etcd: f(Role::Etcd, &self.etcd),
            etcd_client: f(Role::EtcdClient, &self.etcd_client),
        }
    }
}

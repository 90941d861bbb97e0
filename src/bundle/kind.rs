use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of entity kinds a bundle can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Folder,
    Policy,
    Service,
    Encass,
    ListenPort,
    IdentityProvider,
    JdbcConnection,
    TrustedCert,
    StoredPassword,
    PrivateKey,
    ScheduledTask,
    JmsDestination,
    PolicyBackedService,
    ClusterProperty,
}

impl EntityKind {
    pub const ALL: [EntityKind; 14] = [
        EntityKind::Folder,
        EntityKind::Policy,
        EntityKind::Service,
        EntityKind::Encass,
        EntityKind::ListenPort,
        EntityKind::IdentityProvider,
        EntityKind::JdbcConnection,
        EntityKind::TrustedCert,
        EntityKind::StoredPassword,
        EntityKind::PrivateKey,
        EntityKind::ScheduledTask,
        EntityKind::JmsDestination,
        EntityKind::PolicyBackedService,
        EntityKind::ClusterProperty,
    ];

    /// Type tag used by the gateway management protocol
    pub fn wire_type(&self) -> &'static str {
        match self {
            Self::Folder => "FOLDER",
            Self::Policy => "POLICY",
            Self::Service => "SERVICE",
            Self::Encass => "ENCAPSULATED_ASSERTION",
            Self::ListenPort => "SSG_CONNECTOR",
            Self::IdentityProvider => "ID_PROVIDER_CONFIG",
            Self::JdbcConnection => "JDBC_CONNECTION",
            Self::TrustedCert => "TRUSTED_CERT",
            Self::StoredPassword => "SECURE_PASSWORD",
            Self::PrivateKey => "SSG_KEY_ENTRY",
            Self::ScheduledTask => "SCHEDULED_TASK",
            Self::JmsDestination => "JMS_ENDPOINT",
            Self::PolicyBackedService => "POLICY_BACKED_SERVICE",
            Self::ClusterProperty => "CLUSTER_PROPERTY",
        }
    }

    pub fn from_wire_type(tag: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.wire_type() == tag)
    }

    /// Only these kinds live inside the folder hierarchy
    pub fn is_folderable(&self) -> bool {
        matches!(self, Self::Folder | Self::Policy | Self::Service)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Folder => "folder",
            Self::Policy => "policy",
            Self::Service => "service",
            Self::Encass => "encass",
            Self::ListenPort => "listen port",
            Self::IdentityProvider => "identity provider",
            Self::JdbcConnection => "jdbc connection",
            Self::TrustedCert => "trusted cert",
            Self::StoredPassword => "stored password",
            Self::PrivateKey => "private key",
            Self::ScheduledTask => "scheduled task",
            Self::JmsDestination => "jms destination",
            Self::PolicyBackedService => "policy backed service",
            Self::ClusterProperty => "cluster property",
        };
        f.write_str(label)
    }
}

//! Azure resource identifiers.
//!
//! Provides [`ResourceId`], a structured form of the path-like identifiers Azure
//! hands back (`/subscriptions/../resourceGroups/../providers/..`), and
//! [`ResourceKind`] for the handful of resource types the migrations touch.

use crate::config;
use regex::Regex;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

static RESOURCE_ID_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_resource_id_regex() -> &'static Regex {
    RESOURCE_ID_REGEX.get_or_init(|| {
        Regex::new(
            r"(?i)^/subscriptions/([^/]+)/resourceGroups/([^/]+)/providers/([^/]+)/([^/]+)/([^/]+)((?:/[^/]+/[^/]+)*)/?$",
        )
        .expect("Invalid Regex")
    })
}

/// Resource types handled by the migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    VirtualMachine,
    Disk,
    Snapshot,
    NetworkInterface,
    PublicIpAddress,
    LoadBalancer,
}

impl ResourceKind {
    /// Provider namespace, e.g. `Microsoft.Compute`.
    pub fn namespace(&self) -> &'static str {
        match self {
            ResourceKind::VirtualMachine | ResourceKind::Disk | ResourceKind::Snapshot => {
                "Microsoft.Compute"
            }
            ResourceKind::NetworkInterface
            | ResourceKind::PublicIpAddress
            | ResourceKind::LoadBalancer => "Microsoft.Network",
        }
    }

    /// Top level resource type segment, e.g. `virtualMachines`.
    pub fn resource_type(&self) -> &'static str {
        match self {
            ResourceKind::VirtualMachine => "virtualMachines",
            ResourceKind::Disk => "disks",
            ResourceKind::Snapshot => "snapshots",
            ResourceKind::NetworkInterface => "networkInterfaces",
            ResourceKind::PublicIpAddress => "publicIPAddresses",
            ResourceKind::LoadBalancer => "loadBalancers",
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            ResourceKind::VirtualMachine => config::COMPUTE_API_VERSION,
            ResourceKind::Disk | ResourceKind::Snapshot => config::DISK_API_VERSION,
            _ => config::NETWORK_API_VERSION,
        }
    }

    /// Look up the kind from a namespace/type pair, ignoring case.
    pub fn from_type(namespace: &str, resource_type: &str) -> Option<ResourceKind> {
        [
            ResourceKind::VirtualMachine,
            ResourceKind::Disk,
            ResourceKind::Snapshot,
            ResourceKind::NetworkInterface,
            ResourceKind::PublicIpAddress,
            ResourceKind::LoadBalancer,
        ]
        .into_iter()
        .find(|k| {
            k.namespace().eq_ignore_ascii_case(namespace)
                && k.resource_type().eq_ignore_ascii_case(resource_type)
        })
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::VirtualMachine => "virtual machine",
            ResourceKind::Disk => "disk",
            ResourceKind::Snapshot => "snapshot",
            ResourceKind::NetworkInterface => "network interface",
            ResourceKind::PublicIpAddress => "public IP address",
            ResourceKind::LoadBalancer => "load balancer",
        };
        write!(f, "{name}")
    }
}

/// Resource named by the operator: resource group plus name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub resource_group: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(resource_group: &str, name: &str) -> ResourceRef {
        ResourceRef {
            resource_group: resource_group.to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.resource_group, self.name)
    }
}

/// A parsed Azure resource identifier.
///
/// Child segments (`ipConfigurations/ipconfig1`, `backendAddressPools/pool`) are kept
/// as ordered `(type, name)` pairs.
#[derive(Debug, Clone, Eq)]
pub struct ResourceId {
    pub subscription_id: String,
    pub resource_group: String,
    pub provider_namespace: String,
    pub resource_type: String,
    pub name: String,
    pub children: Vec<(String, String)>,
}

impl ResourceId {
    /// Parse an identifier such as
    /// `/subscriptions/s/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm1`.
    pub fn parse(id: &str) -> Result<ResourceId, Box<dyn Error>> {
        let id = id.trim();
        let caps = get_resource_id_regex()
            .captures(id)
            .ok_or_else(|| format!("Invalid resource id: '{id}'"))?;

        let mut children = Vec::new();
        let child_path = caps.get(6).map(|m| m.as_str()).unwrap_or("");
        let segments: Vec<&str> = child_path.split('/').filter(|s| !s.is_empty()).collect();
        for pair in segments.chunks(2) {
            if let [child_type, child_name] = pair {
                children.push((child_type.to_string(), child_name.to_string()));
            }
        }

        Ok(ResourceId {
            subscription_id: caps[1].to_string(),
            resource_group: caps[2].to_string(),
            provider_namespace: caps[3].to_string(),
            resource_type: caps[4].to_string(),
            name: caps[5].to_string(),
            children,
        })
    }

    /// Build the identifier of a top level resource.
    pub fn new(
        subscription_id: &str,
        resource_group: &str,
        kind: ResourceKind,
        name: &str,
    ) -> ResourceId {
        ResourceId {
            subscription_id: subscription_id.to_string(),
            resource_group: resource_group.to_string(),
            provider_namespace: kind.namespace().to_string(),
            resource_type: kind.resource_type().to_string(),
            name: name.to_string(),
            children: vec![],
        }
    }

    /// Identifier of a child resource (e.g. a load balancer's backend pool).
    pub fn child(&self, child_type: &str, child_name: &str) -> ResourceId {
        let mut id = self.clone();
        id.children.push((child_type.to_string(), child_name.to_string()));
        id
    }

    /// The top level resource owning this (possibly child) identifier.
    pub fn top_level(&self) -> ResourceId {
        ResourceId {
            children: vec![],
            ..self.clone()
        }
    }

    /// Name of the last segment: the child name if any, else the resource name.
    pub fn leaf_name(&self) -> &str {
        self.children
            .last()
            .map(|(_, name)| name.as_str())
            .unwrap_or(&self.name)
    }

    pub fn kind(&self) -> Option<ResourceKind> {
        ResourceKind::from_type(&self.provider_namespace, &self.resource_type)
    }

    pub fn is_kind(&self, kind: ResourceKind) -> bool {
        self.kind() == Some(kind)
    }

    pub fn to_ref(&self) -> ResourceRef {
        ResourceRef::new(&self.resource_group, &self.name)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}",
            self.subscription_id,
            self.resource_group,
            self.provider_namespace,
            self.resource_type,
            self.name
        )?;
        for (child_type, child_name) in &self.children {
            write!(f, "/{child_type}/{child_name}")?;
        }
        Ok(())
    }
}

impl FromStr for ResourceId {
    type Err = Box<dyn Error>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceId::parse(s)
    }
}

/// Azure is case-insensitive about identifiers but not consistent about how it
/// spells them back, so equality ignores ASCII case.
impl PartialEq for ResourceId {
    fn eq(&self, other: &ResourceId) -> bool {
        self.to_string().eq_ignore_ascii_case(&other.to_string())
    }
}

impl std::hash::Hash for ResourceId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_string().to_ascii_lowercase().hash(state);
    }
}

impl Serialize for ResourceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D>(deserializer: D) -> Result<ResourceId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ResourceId::parse(&s).map_err(|e| de::Error::custom(e.to_string()))
    }
}

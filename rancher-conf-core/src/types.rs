//! Metadata record types as served by the Rancher metadata service.
//!
//! Records are flat and loosely joined by name/UUID; the
//! [`context`](crate::context) module turns them into a linked graph.
//! Unknown JSON fields are ignored; absent and `null` fields take their
//! defaults.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Well-known labels
// ---------------------------------------------------------------------------

/// Label naming the launch config a container was created from.
pub const LAUNCH_CONFIG_LABEL: &str = "io.rancher.service.launch.config";

/// Value of [`LAUNCH_CONFIG_LABEL`] carried by primary containers.
pub const PRIMARY_LAUNCH_CONFIG: &str = "io.rancher.service.primary.launch.config";

/// Label grouping a primary container with its sidekicks.
pub const DEPLOYMENT_UNIT_LABEL: &str = "io.rancher.service.deployment.unit";

// ---------------------------------------------------------------------------
// Label / metadata maps
// ---------------------------------------------------------------------------

/// Key-unique string → string mapping (labels, links).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelMap(pub BTreeMap<String, String>);

impl LabelMap {
    /// Value for `key`, or the empty string when absent.
    pub fn get_value(&self, key: &str) -> &str {
        self.0.get(key).map(String::as_str).unwrap_or("")
    }

    /// Value for `key`, or `default` when absent.
    pub fn value_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.0.get(key).map(String::as_str).unwrap_or(default)
    }

    pub fn exists(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for LabelMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Key-unique string → arbitrary JSON mapping (service metadata).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataMap(pub BTreeMap<String, Value>);

impl MetadataMap {
    /// Dotted-path lookup: `get_path("a.b.c")` walks nested objects.
    ///
    /// Numeric segments index into arrays.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.0.get(first)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Flatten nested objects into dotted keys. Scalars and arrays are leaves.
    pub fn flatten(&self) -> BTreeMap<String, Value> {
        let mut out = BTreeMap::new();
        for (key, value) in &self.0 {
            flatten_into(key, value, &mut out);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn flatten_into(prefix: &str, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                flatten_into(&format!("{prefix}.{key}"), nested, out);
            }
        }
        other => {
            out.insert(prefix.to_string(), other.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// ServicePort
// ---------------------------------------------------------------------------

/// A parsed port mapping: `[bind:]public:internal/protocol`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    pub bind_address: Option<String>,
    pub public_port: String,
    pub internal_port: String,
    pub protocol: String,
}

impl ServicePort {
    /// Parse a single port entry. Returns `None` for malformed input.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw.split(':').collect();
        let (bind_address, public, target) = match parts.as_slice() {
            [public, target] => (None, *public, *target),
            [bind, public, target] => (Some((*bind).to_string()), *public, *target),
            _ => return None,
        };
        let (internal, protocol) = target.split_once('/')?;
        if protocol.contains('/') {
            return None;
        }
        Some(ServicePort {
            bind_address,
            public_port: public.to_string(),
            internal_port: internal.to_string(),
            protocol: protocol.to_string(),
        })
    }

    /// Parse every entry, dropping malformed ones with a warning.
    pub fn parse_all(raw: &[String]) -> Vec<ServicePort> {
        raw.iter()
            .filter_map(|entry| {
                let parsed = ServicePort::parse(entry);
                if parsed.is_none() {
                    tracing::warn!(port = %entry, "unexpected format of service port; dropped");
                }
                parsed
            })
            .collect()
    }
}

impl fmt::Display for ServicePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(bind) = &self.bind_address {
            write!(f, "{bind}:")?;
        }
        write!(
            f,
            "{}:{}/{}",
            self.public_port, self.internal_port, self.protocol
        )
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Decode JSON `null` as the field's default, like an absent field.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A stack record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StackRecord {
    #[serde(deserialize_with = "null_default")]
    pub uuid: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub environment_name: String,
    #[serde(deserialize_with = "null_default")]
    pub environment_uuid: String,
    #[serde(deserialize_with = "null_default")]
    pub system: bool,
}

/// A host record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostRecord {
    #[serde(deserialize_with = "null_default")]
    pub uuid: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub hostname: String,
    #[serde(deserialize_with = "null_default")]
    pub agent_ip: String,
    #[serde(deserialize_with = "null_default")]
    pub labels: LabelMap,
}

/// A service record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceRecord {
    #[serde(deserialize_with = "null_default")]
    pub uuid: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub stack_name: String,
    #[serde(deserialize_with = "null_default")]
    pub stack_uuid: String,
    #[serde(deserialize_with = "null_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_default")]
    pub hostname: String,
    #[serde(deserialize_with = "null_default")]
    pub vip: String,
    #[serde(deserialize_with = "null_default")]
    pub fqdn: String,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub scale: u32,
    #[serde(deserialize_with = "null_default")]
    pub ports: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub labels: LabelMap,
    #[serde(deserialize_with = "null_default")]
    pub links: LabelMap,
    #[serde(deserialize_with = "null_default")]
    pub metadata: MetadataMap,
    #[serde(deserialize_with = "null_default")]
    pub sidekicks: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub primary_service_name: String,
    #[serde(deserialize_with = "null_default")]
    pub external_ips: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub system: bool,
}

impl ServiceRecord {
    /// `stack.service` compound key.
    pub fn key(&self) -> String {
        service_key(&self.stack_name, &self.name)
    }

    /// A service is primary when it names itself as its primary launch
    /// config. Records without a primary name are standalone primaries.
    pub fn is_primary(&self) -> bool {
        self.primary_service_name.is_empty() || self.primary_service_name == self.name
    }
}

/// A container record. Also used for the "self" identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerRecord {
    #[serde(deserialize_with = "null_default")]
    pub uuid: String,
    #[serde(deserialize_with = "null_default")]
    pub name: String,
    #[serde(deserialize_with = "null_default")]
    pub service_name: String,
    #[serde(deserialize_with = "null_default")]
    pub service_uuid: String,
    #[serde(deserialize_with = "null_default")]
    pub stack_name: String,
    #[serde(deserialize_with = "null_default")]
    pub stack_uuid: String,
    #[serde(deserialize_with = "null_default")]
    pub host_uuid: String,
    #[serde(deserialize_with = "null_default")]
    pub primary_ip: String,
    #[serde(deserialize_with = "null_default")]
    pub ips: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub ports: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub labels: LabelMap,
    #[serde(deserialize_with = "null_default")]
    pub links: LabelMap,
    #[serde(deserialize_with = "null_default")]
    pub state: String,
    #[serde(deserialize_with = "null_default")]
    pub health_state: String,
    #[serde(deserialize_with = "null_default")]
    pub create_index: u64,
    #[serde(deserialize_with = "null_default")]
    pub start_count: u64,
    #[serde(deserialize_with = "null_default")]
    pub external_id: String,
    #[serde(deserialize_with = "null_default")]
    pub dns: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub system: bool,
}

impl ContainerRecord {
    /// `stack.service` key of the owning service.
    pub fn service_key(&self) -> String {
        service_key(&self.stack_name, &self.service_name)
    }

    pub fn is_primary(&self) -> bool {
        self.labels.get_value(LAUNCH_CONFIG_LABEL) == PRIMARY_LAUNCH_CONFIG
    }

    /// Deployment unit this container belongs to, if labelled.
    pub fn deployment_unit(&self) -> Option<&str> {
        self.labels
            .0
            .get(DEPLOYMENT_UNIT_LABEL)
            .map(String::as_str)
            .filter(|unit| !unit.is_empty())
    }
}

/// `stack.service` compound key.
pub fn service_key(stack: &str, service: &str) -> String {
    format!("{stack}.{service}")
}

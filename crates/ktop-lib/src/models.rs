//! Core data models for the ktop engine

use crate::error::ConfigError;
use crate::quantity::{cpu_cores, memory_in, MemoryUnit, RawQuantity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Metric used to rank entities, fixed for a display session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKey {
    Cpu,
    #[default]
    Memory,
}

impl FromStr for MetricKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(MetricKey::Cpu),
            "memory" | "mem" => Ok(MetricKey::Memory),
            _ => Err(ConfigError::InvalidMetricKey(s.to_string())),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKey::Cpu => f.write_str("cpu"),
            MetricKey::Memory => f.write_str("memory"),
        }
    }
}

/// Which kind of entity is polled and displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Nodes,
    Pods,
}

impl FromStr for DisplayMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nodes" | "node" => Ok(DisplayMode::Nodes),
            "pods" | "pod" => Ok(DisplayMode::Pods),
            _ => Err(ConfigError::InvalidDisplayMode(s.to_string())),
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayMode::Nodes => f.write_str("nodes"),
            DisplayMode::Pods => f.write_str("pods"),
        }
    }
}

/// Fixed capacity baseline of an entity (node allocatable)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawCapacity {
    pub cpu: RawQuantity,
    pub memory: RawQuantity,
}

/// An inventory item returned by the cluster listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRef {
    pub name: String,
    pub namespace: Option<String>,
    pub capacity: Option<RawCapacity>,
}

impl EntityRef {
    /// A cluster-scoped entity such as a node
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            capacity: None,
        }
    }

    /// A namespaced entity such as a pod
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            capacity: None,
        }
    }

    pub fn with_capacity(mut self, capacity: RawCapacity) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// `namespace/name` for namespaced entities, `name` otherwise
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}/{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

/// Raw usage returned by a per-entity metric fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMetric {
    pub cpu: RawQuantity,
    pub memory: RawQuantity,
}

/// One polled entity after quantity conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetric {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub cpu_cores: f64,
    pub memory_mib: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_cpu_cores: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_memory_gib: Option<f64>,
}

impl EntityMetric {
    /// Convert a raw fetch result for `entity` into display units
    pub fn from_raw(entity: &EntityRef, raw: &RawMetric) -> Self {
        Self {
            name: entity.name.clone(),
            namespace: entity.namespace.clone(),
            cpu_cores: cpu_cores(raw.cpu),
            memory_mib: memory_in(raw.memory, MemoryUnit::MiB),
            capacity_cpu_cores: entity.capacity.map(|c| cpu_cores(c.cpu)),
            capacity_memory_gib: entity
                .capacity
                .map(|c| memory_in(c.memory, MemoryUnit::GiB)),
        }
    }

    /// Value of the ranking key
    pub fn key(&self, key: MetricKey) -> f64 {
        match key {
            MetricKey::Cpu => self.cpu_cores,
            MetricKey::Memory => self.memory_mib,
        }
    }

    pub fn memory_gib(&self) -> f64 {
        self.memory_mib / 1024.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_key_parse() {
        assert_eq!("cpu".parse::<MetricKey>(), Ok(MetricKey::Cpu));
        assert_eq!("Memory".parse::<MetricKey>(), Ok(MetricKey::Memory));
        assert_eq!("mem".parse::<MetricKey>(), Ok(MetricKey::Memory));
        assert_eq!(
            "disk".parse::<MetricKey>(),
            Err(ConfigError::InvalidMetricKey("disk".to_string()))
        );
    }

    #[test]
    fn test_display_mode_parse() {
        assert_eq!("pods".parse::<DisplayMode>(), Ok(DisplayMode::Pods));
        assert_eq!("NODES".parse::<DisplayMode>(), Ok(DisplayMode::Nodes));
        assert!("deployments".parse::<DisplayMode>().is_err());
    }

    #[test]
    fn test_from_raw_node_with_capacity() {
        let entity = EntityRef::cluster("worker-1").with_capacity(RawCapacity {
            cpu: RawQuantity::Base(4),
            memory: RawQuantity::Base(16 * 1024 * 1024 * 1024),
        });
        let raw = RawMetric {
            cpu: RawQuantity::Milli(1500),
            memory: RawQuantity::Base(2 * 1024 * 1024 * 1024),
        };

        let metric = EntityMetric::from_raw(&entity, &raw);

        assert_eq!(metric.name, "worker-1");
        assert_eq!(metric.namespace, None);
        assert_eq!(metric.cpu_cores, 1.5);
        assert_eq!(metric.memory_mib, 2048.0);
        assert_eq!(metric.memory_gib(), 2.0);
        assert_eq!(metric.capacity_cpu_cores, Some(4.0));
        assert_eq!(metric.capacity_memory_gib, Some(16.0));
    }

    #[test]
    fn test_from_raw_pod_without_capacity() {
        let entity = EntityRef::namespaced("default", "web-0");
        let raw = RawMetric {
            cpu: RawQuantity::Milli(250),
            memory: RawQuantity::Base(64 * 1024 * 1024),
        };

        let metric = EntityMetric::from_raw(&entity, &raw);

        assert_eq!(metric.namespace.as_deref(), Some("default"));
        assert_eq!(metric.key(MetricKey::Cpu), 0.25);
        assert_eq!(metric.key(MetricKey::Memory), 64.0);
        assert!(metric.capacity_cpu_cores.is_none());
        assert_eq!(entity.qualified_name(), "default/web-0");
    }
}

//! Kubernetes metrics source
//!
//! Lists nodes or pods through the core API and reads per-entity usage from
//! the `metrics.k8s.io/v1beta1` aggregated API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::{Api, Client, Config, ResourceExt};
use ktop_lib::collector::MetricsSource;
use ktop_lib::quantity::RawQuantity;
use ktop_lib::{DisplayMode, EntityRef, RawCapacity, RawMetric, RetrievalError};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

const METRICS_GROUP: &str = "metrics.k8s.io";
const METRICS_VERSION: &str = "v1beta1";

/// Metrics source backed by a live cluster
pub struct KubeSource {
    client: Client,
    mode: DisplayMode,
    node_metrics: ApiResource,
    pod_metrics: ApiResource,
}

impl KubeSource {
    /// Connect using `kubeconfig`, or the inferred configuration when absent
    pub async fn connect(kubeconfig: Option<&Path>, mode: DisplayMode) -> Result<Self> {
        let config = match kubeconfig {
            Some(path) => {
                let kubeconfig = Kubeconfig::read_from(path)
                    .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
                Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .context("Failed to load Kubernetes configuration")?
            }
            None => Config::infer()
                .await
                .context("Failed to infer Kubernetes configuration")?,
        };

        info!(cluster_url = %config.cluster_url, mode = %mode, "Connecting to cluster");
        let client = Client::try_from(config).context("Failed to initialize Kubernetes client")?;

        Ok(Self::new(client, mode))
    }

    pub fn new(client: Client, mode: DisplayMode) -> Self {
        let node_gvk = GroupVersionKind::gvk(METRICS_GROUP, METRICS_VERSION, "NodeMetrics");
        let pod_gvk = GroupVersionKind::gvk(METRICS_GROUP, METRICS_VERSION, "PodMetrics");

        Self {
            client,
            mode,
            node_metrics: ApiResource::from_gvk_with_plural(&node_gvk, "nodes"),
            pod_metrics: ApiResource::from_gvk_with_plural(&pod_gvk, "pods"),
        }
    }

    async fn list_nodes(&self) -> Result<Vec<EntityRef>, RetrievalError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&ListParams::default())
            .await
            .map_err(|e| RetrievalError::Inventory(e.to_string()))?;

        Ok(list
            .items
            .iter()
            .map(|node| {
                let name = node.name_any();
                let capacity = node
                    .status
                    .as_ref()
                    .and_then(|status| status.allocatable.as_ref())
                    .and_then(|allocatable| match allocatable_capacity(allocatable) {
                        Ok(capacity) => Some(capacity),
                        Err(e) => {
                            debug!(node = %name, error = %e, "Ignoring node allocatable");
                            None
                        }
                    });

                let entity = EntityRef::cluster(name);
                match capacity {
                    Some(capacity) => entity.with_capacity(capacity),
                    None => entity,
                }
            })
            .collect())
    }

    async fn list_pods(&self) -> Result<Vec<EntityRef>, RetrievalError> {
        let pods: Api<Pod> = Api::all(self.client.clone());
        let list = pods
            .list(&ListParams::default())
            .await
            .map_err(|e| RetrievalError::Inventory(e.to_string()))?;

        Ok(list
            .items
            .iter()
            .map(|pod| {
                let namespace = pod.namespace().unwrap_or_else(|| "default".to_string());
                EntityRef::namespaced(namespace, pod.name_any())
            })
            .collect())
    }

    async fn get_metrics(&self, entity: &EntityRef) -> Result<DynamicObject, kube::Error> {
        let api: Api<DynamicObject> = match (&self.mode, &entity.namespace) {
            (DisplayMode::Pods, Some(namespace)) => {
                Api::namespaced_with(self.client.clone(), namespace, &self.pod_metrics)
            }
            (DisplayMode::Pods, None) => Api::all_with(self.client.clone(), &self.pod_metrics),
            (DisplayMode::Nodes, _) => Api::all_with(self.client.clone(), &self.node_metrics),
        };
        api.get(&entity.name).await
    }
}

#[async_trait]
impl MetricsSource for KubeSource {
    async fn list_entities(&self) -> Result<Vec<EntityRef>, RetrievalError> {
        match self.mode {
            DisplayMode::Nodes => self.list_nodes().await,
            DisplayMode::Pods => self.list_pods().await,
        }
    }

    async fn fetch_metric(&self, entity: &EntityRef) -> Result<RawMetric, RetrievalError> {
        let object = self
            .get_metrics(entity)
            .await
            .map_err(|e| RetrievalError::Metric {
                entity: entity.qualified_name(),
                message: e.to_string(),
            })?;

        match self.mode {
            DisplayMode::Nodes => node_usage(&object.data),
            DisplayMode::Pods => pod_usage(&object.data),
        }
    }
}

/// CPU and memory from a node's allocatable resources
fn allocatable_capacity(
    allocatable: &BTreeMap<String, Quantity>,
) -> Result<RawCapacity, RetrievalError> {
    let get = |resource: &str| {
        allocatable
            .get(resource)
            .ok_or_else(|| RetrievalError::Quantity(format!("missing allocatable {resource}")))
            .and_then(|quantity| RawQuantity::parse(&quantity.0))
    };

    Ok(RawCapacity {
        cpu: get("cpu")?,
        memory: get("memory")?,
    })
}

/// Usage of a `NodeMetrics` object
fn node_usage(data: &Value) -> Result<RawMetric, RetrievalError> {
    let usage = data
        .get("usage")
        .ok_or_else(|| RetrievalError::Quantity("missing usage".to_string()))?;
    usage_from_value(usage)
}

/// Usage of a `PodMetrics` object, summed across its containers
fn pod_usage(data: &Value) -> Result<RawMetric, RetrievalError> {
    let containers = data
        .get("containers")
        .and_then(Value::as_array)
        .ok_or_else(|| RetrievalError::Quantity("missing containers".to_string()))?;

    containers.iter().try_fold(
        RawMetric {
            cpu: RawQuantity::default(),
            memory: RawQuantity::default(),
        },
        |total, container| {
            let usage = container
                .get("usage")
                .ok_or_else(|| RetrievalError::Quantity("missing container usage".to_string()))?;
            let usage = usage_from_value(usage)?;
            Ok(RawMetric {
                cpu: total.cpu.add(usage.cpu),
                memory: total.memory.add(usage.memory),
            })
        },
    )
}

fn usage_from_value(value: &Value) -> Result<RawMetric, RetrievalError> {
    let quantity = |resource: &str| {
        value
            .get(resource)
            .and_then(Value::as_str)
            .ok_or_else(|| RetrievalError::Quantity(format!("missing {resource} usage")))
            .and_then(RawQuantity::parse)
    };

    Ok(RawMetric {
        cpu: quantity("cpu")?,
        memory: quantity("memory")?,
    })
}

//! Session integration tests
//!
//! Drive complete sessions against in-memory sources and a recording sink.

use ktop_lib::collector::{async_trait, MetricsSource};
use ktop_lib::quantity::RawQuantity;
use ktop_lib::{
    snapshot, ConfigError, DisplayMode, EntityRef, FetchMetrics, Frame, MetricKey, RawCapacity,
    RawMetric, RenderError, RenderSink, RetrievalError, Session, TopConfig, TopError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

const MIB: u64 = 1024 * 1024;
const GIB: u64 = 1024 * MIB;

struct FixedSource {
    entities: Vec<EntityRef>,
    usage: HashMap<String, RawMetric>,
    list_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    inventory_down: bool,
}

impl FixedSource {
    fn pods(memory_mib: &[(&str, u64)]) -> Self {
        Self {
            entities: memory_mib
                .iter()
                .map(|(name, _)| EntityRef::namespaced("default", *name))
                .collect(),
            usage: memory_mib
                .iter()
                .map(|(name, mib)| {
                    (
                        name.to_string(),
                        RawMetric {
                            cpu: RawQuantity::Milli(250),
                            memory: RawQuantity::Base(mib * MIB),
                        },
                    )
                })
                .collect(),
            list_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            inventory_down: false,
        }
    }

    fn unreachable() -> Self {
        Self {
            inventory_down: true,
            ..Self::pods(&[])
        }
    }
}

#[async_trait]
impl MetricsSource for FixedSource {
    async fn list_entities(&self) -> Result<Vec<EntityRef>, RetrievalError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.inventory_down {
            return Err(RetrievalError::Inventory("connection refused".to_string()));
        }
        Ok(self.entities.clone())
    }

    async fn fetch_metric(&self, entity: &EntityRef) -> Result<RawMetric, RetrievalError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.usage
            .get(&entity.name)
            .copied()
            .ok_or_else(|| RetrievalError::Metric {
                entity: entity.qualified_name(),
                message: "not found".to_string(),
            })
    }
}

#[derive(Clone, Default)]
struct RecordingSink {
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl RenderSink for RecordingSink {
    fn render(&mut self, frame: &Frame) -> Result<(), RenderError> {
        self.frames.lock().unwrap().push(frame.clone());
        Ok(())
    }
}

fn pods_config(top_k: usize) -> TopConfig {
    TopConfig {
        metric_key: MetricKey::Memory,
        display_mode: DisplayMode::Pods,
        top_k,
        refresh_period: Duration::from_millis(20),
        poll_period: Duration::from_secs(60),
        jitter_max: Duration::from_millis(10),
        ..TopConfig::default()
    }
}

#[tokio::test]
async fn test_session_ranks_top_two_by_memory() {
    let source = Arc::new(FixedSource::pods(&[("a", 500), ("b", 900), ("c", 100)]));
    let sink = RecordingSink::default();
    let frames = sink.frames.clone();

    let session = Session::builder()
        .config(pods_config(2))
        .source(source)
        .sink(sink)
        .build()
        .unwrap();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(session.run(shutdown_rx));

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown_tx.send(()).unwrap();
    let summary = task.await.unwrap().unwrap();
    assert!(summary.renders >= 2);

    let frames = frames.lock().unwrap();
    let first = frames.first().unwrap();
    assert!(first.rows.len() <= 2);

    let last = frames.last().unwrap();
    assert_eq!(last.collected, 3);
    let labels: Vec<&str> = last.rows.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["b", "a"]);
    assert!(last.rows[0].cells[2].starts_with("900.00 "));
    assert!(last.rows[1].cells[2].starts_with("500.00 "));
}

#[tokio::test]
async fn test_entity_count_never_shrinks_within_cycle() {
    let pods: Vec<(String, u64)> = (0..40).map(|i| (format!("pod-{i}"), i * 10)).collect();
    let refs: Vec<(&str, u64)> = pods.iter().map(|(n, m)| (n.as_str(), *m)).collect();
    let sink = RecordingSink::default();
    let frames = sink.frames.clone();

    let config = TopConfig {
        jitter_max: Duration::from_millis(150),
        refresh_period: Duration::from_millis(10),
        ..pods_config(5)
    };
    let session = Session::builder()
        .config(config)
        .source(Arc::new(FixedSource::pods(&refs)))
        .sink(sink)
        .build()
        .unwrap();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let task = tokio::spawn(session.run(shutdown_rx));
    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown_tx.send(()).unwrap();
    task.await.unwrap().unwrap();

    let frames = frames.lock().unwrap();
    let counts: Vec<usize> = frames.iter().map(|f| f.collected).collect();
    assert!(counts.windows(2).all(|w| w[0] <= w[1]), "{counts:?}");
    assert_eq!(*counts.last().unwrap(), 40);
    assert!(frames.iter().all(|f| f.rows.len() <= 5));
}

#[tokio::test]
async fn test_invalid_config_fails_before_any_fetch() {
    let source = Arc::new(FixedSource::pods(&[("a", 1)]));

    let result = Session::builder()
        .config(TopConfig {
            top_k: 0,
            ..TopConfig::default()
        })
        .source(source.clone())
        .sink(RecordingSink::default())
        .build();

    assert!(matches!(
        result,
        Err(TopError::Config(ConfigError::NonPositiveTopK))
    ));
    assert_eq!(source.list_calls.load(Ordering::SeqCst), 0);
    assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_initial_inventory_failure_aborts_session() {
    let sink = RecordingSink::default();
    let frames = sink.frames.clone();
    let session = Session::builder()
        .config(pods_config(10))
        .source(Arc::new(FixedSource::unreachable()))
        .sink(sink)
        .build()
        .unwrap();

    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let result = session.run(shutdown_rx).await;

    assert!(matches!(
        result,
        Err(TopError::Retrieval(RetrievalError::Inventory(_)))
    ));
    assert!(frames.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_sink_is_rejected() {
    let result = Session::<RecordingSink>::builder()
        .source(Arc::new(FixedSource::pods(&[])))
        .build();

    assert!(matches!(result, Err(TopError::Incomplete("render sink"))));
}

#[tokio::test]
async fn test_snapshot_joins_all_fetches() {
    let source = Arc::new(FixedSource::pods(&[("a", 500), ("b", 900), ("c", 100)]));
    let metrics = FetchMetrics::new().unwrap();

    let view = snapshot(&pods_config(2), source, Some(metrics.clone()))
        .await
        .unwrap();

    let memory: Vec<f64> = view.rows.iter().map(|m| m.memory_mib).collect();
    assert_eq!(memory, vec![900.0, 500.0]);
    assert_eq!(view.collected, 3);
    assert_eq!(metrics.fetch_success(), 3);
}

#[tokio::test]
async fn test_snapshot_nodes_by_cpu_with_capacity() {
    let node = |name: &str, cpu_milli: u64| {
        (
            EntityRef::cluster(name).with_capacity(RawCapacity {
                cpu: RawQuantity::Base(4),
                memory: RawQuantity::Base(16 * GIB),
            }),
            RawMetric {
                cpu: RawQuantity::Milli(cpu_milli),
                memory: RawQuantity::Base(2 * GIB),
            },
        )
    };
    let nodes = [node("n1", 500), node("n2", 3500), node("n3", 1500)];
    let source = Arc::new(FixedSource {
        entities: nodes.iter().map(|(e, _)| e.clone()).collect(),
        usage: nodes.iter().map(|(e, m)| (e.name.clone(), *m)).collect(),
        ..FixedSource::pods(&[])
    });
    let config = TopConfig {
        metric_key: MetricKey::Cpu,
        display_mode: DisplayMode::Nodes,
        jitter_max: Duration::ZERO,
        ..TopConfig::default()
    };

    let view = snapshot(&config, source, None).await.unwrap();

    let names: Vec<&str> = view.rows.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["n2", "n3", "n1"]);
    assert_eq!(view.rows[0].cpu_cores, 3.5);
    assert_eq!(view.rows[0].capacity_cpu_cores, Some(4.0));
    assert_eq!(view.rows[0].capacity_memory_gib, Some(16.0));
}

//! Scrape orchestration and metric publication
//!
//! One [`PortStatsCollector`] is built at startup and shared by reference with
//! the exposition layer. Each [`PortStatsCollector::collect`] call runs a full
//! fetch, parse and publish cycle while holding the scrape lock, so concurrent
//! scrape requests are served one after another.
//! [`PortStatsCollector::collect_and_gather`] also encodes the registry before
//! the lock is released.
//!
//! Every cycle starts by clearing the per-port series. Only ports reported by
//! the current cycle are exposed, and a failed cycle exposes none.

use crate::device::PortStatsSource;
use crate::encoding::{encode_link, encode_state};
use crate::error::{PortstatsError, Result};
use crate::parser::parse_port_statistics;
use crate::types::PortStatistics;
use prometheus::core::{Collector, Desc};
use prometheus::{Counter, Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error};

const PORT_LABEL: &str = "port";

/// Terminal state of one scrape cycle
#[derive(Debug, Clone, PartialEq)]
pub enum ScrapeOutcome {
    /// Device data was fetched, parsed and published
    Published { ports: usize, duration: Duration },
    /// The cycle was aborted; no port series are exposed until the next success
    Failed,
}

/// Per-port gauges plus scrape meta-metrics for one switch
pub struct PortStatsCollector {
    source: Box<dyn PortStatsSource>,

    // Per-port gauges
    port_state: GaugeVec,
    port_link_status: GaugeVec,
    port_tx_good_pkt: GaugeVec,
    port_rx_good_pkt: GaugeVec,
    port_tx_good_bytes: GaugeVec,
    port_rx_good_bytes: GaugeVec,

    // Meta-metrics
    last_scrape_duration: Gauge,
    scrape_errors_total: Counter,

    registry: Registry,
    scrape_lock: Mutex<()>,
}

fn port_gauge(registry: &Registry, name: &str, help: &str) -> Result<GaugeVec> {
    let gauge = GaugeVec::new(Opts::new(name, help), &[PORT_LABEL])?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

impl PortStatsCollector {
    /// Create a collector scraping `source`, with its own registry
    pub fn new(source: Box<dyn PortStatsSource>) -> Result<Self> {
        let registry = Registry::new();

        let port_state = port_gauge(&registry, "port_state", "State of the port")?;
        let port_link_status =
            port_gauge(&registry, "port_link_status", "Link status of the port")?;
        let port_tx_good_pkt = port_gauge(
            &registry,
            "port_tx_good_pkt",
            "Number of good packets transmitted on the port",
        )?;
        let port_rx_good_pkt = port_gauge(
            &registry,
            "port_rx_good_pkt",
            "Number of good packets received on the port",
        )?;
        let port_tx_good_bytes = port_gauge(
            &registry,
            "port_tx_good_bytes",
            "Number of good bytes transmitted on the port",
        )?;
        let port_rx_good_bytes = port_gauge(
            &registry,
            "port_rx_good_bytes",
            "Number of good bytes received on the port",
        )?;

        let last_scrape_duration = Gauge::new(
            "exporter_last_scrape_duration_seconds",
            "Duration of the last scrape",
        )?;
        registry.register(Box::new(last_scrape_duration.clone()))?;

        let scrape_errors_total = Counter::new(
            "exporter_scrape_errors_total",
            "Total number of scrape errors",
        )?;
        registry.register(Box::new(scrape_errors_total.clone()))?;

        Ok(Self {
            source,
            port_state,
            port_link_status,
            port_tx_good_pkt,
            port_rx_good_pkt,
            port_tx_good_bytes,
            port_rx_good_bytes,
            last_scrape_duration,
            scrape_errors_total,
            registry,
            scrape_lock: Mutex::new(()),
        })
    }

    /// Static descriptors of the per-port metrics; never contacts the device
    pub fn describe(&self) -> Vec<&Desc> {
        [
            &self.port_state,
            &self.port_link_status,
            &self.port_tx_good_pkt,
            &self.port_rx_good_pkt,
            &self.port_tx_good_bytes,
            &self.port_rx_good_bytes,
        ]
        .into_iter()
        .flat_map(|gauge| gauge.desc())
        .collect()
    }

    /// Run one scrape cycle
    ///
    /// Failures are counted and logged, never returned: the exposition layer
    /// always serves whatever the registry holds.
    pub async fn collect(&self) -> ScrapeOutcome {
        let _guard = self.scrape_lock.lock().await;
        self.run_cycle().await
    }

    /// Run one scrape cycle and encode the registry under the same lock
    ///
    /// The encoded text always reflects exactly this cycle, even when other
    /// scrapes are waiting on the lock.
    pub async fn collect_and_gather(&self) -> (ScrapeOutcome, Result<String>) {
        let _guard = self.scrape_lock.lock().await;
        let outcome = self.run_cycle().await;
        (outcome, self.gather())
    }

    async fn run_cycle(&self) -> ScrapeOutcome {
        self.reset_ports();

        let start = Instant::now();
        let stats = match self.scrape().await {
            Ok(stats) => stats,
            Err(e) => {
                self.scrape_errors_total.inc();
                error!(error = %e, "portstatsd: Error fetching port statistics");
                return ScrapeOutcome::Failed;
            }
        };

        let ports = stats.len();
        self.publish(&stats);

        let duration = start.elapsed();
        self.last_scrape_duration.set(duration.as_secs_f64());
        debug!(
            ports,
            duration_ms = duration.as_millis() as u64,
            "portstatsd: Scrape complete"
        );

        ScrapeOutcome::Published { ports, duration }
    }

    async fn scrape(&self) -> Result<PortStatistics> {
        let document = self.source.fetch().await?;
        let stats = parse_port_statistics(&document)?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            if let Ok(json) = serde_json::to_string(&stats) {
                debug!(stats = %json, "portstatsd: Parsed port statistics");
            }
        }
        Ok(stats)
    }

    fn reset_ports(&self) {
        self.port_state.reset();
        self.port_link_status.reset();
        self.port_tx_good_pkt.reset();
        self.port_rx_good_pkt.reset();
        self.port_tx_good_bytes.reset();
        self.port_rx_good_bytes.reset();
    }

    fn publish(&self, stats: &PortStatistics) {
        for port in stats.iter() {
            let labels = [port.name.as_str()];
            self.port_state
                .with_label_values(&labels)
                .set(encode_state(&port.state));
            self.port_link_status
                .with_label_values(&labels)
                .set(encode_link(&port.link_status));
            self.port_tx_good_pkt
                .with_label_values(&labels)
                .set(port.tx_good_packets as f64);
            self.port_rx_good_pkt
                .with_label_values(&labels)
                .set(port.rx_good_packets as f64);
            self.port_tx_good_bytes
                .with_label_values(&labels)
                .set(port.tx_good_bytes as f64);
            self.port_rx_good_bytes
                .with_label_values(&labels)
                .set(port.rx_good_bytes as f64);
        }
    }

    /// Total failed scrape cycles
    pub fn scrape_errors(&self) -> u64 {
        self.scrape_errors_total.get() as u64
    }

    /// Duration of the last successful scrape in seconds
    pub fn last_scrape_duration(&self) -> f64 {
        self.last_scrape_duration.get()
    }

    /// Encode all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| {
            PortstatsError::Metrics(prometheus::Error::Msg(format!(
                "metrics output is not UTF-8: {}",
                e
            )))
        })
    }

    /// Content type of [`gather`](Self::gather) output
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MockPortStatsSource;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const ONE_PORT: &str = "<table>\
        <tr><td>Port</td><td>State</td><td>Link</td><td>Tx</td><td>Rx</td><td>RxB</td><td>TxB</td></tr>\
        <tr><td>1</td><td>Enable</td><td>Link Up</td><td>100</td><td>200</td><td>300</td><td>400</td></tr>\
        </table>";

    const TWO_PORTS: &str = "<table>\
        <tr><td>Port</td><td>State</td><td>Link</td><td>Tx</td><td>Rx</td><td>RxB</td><td>TxB</td></tr>\
        <tr><td>1</td><td>Enable</td><td>Link Up</td><td>1</td><td>1</td><td>1</td><td>1</td></tr>\
        <tr><td>2</td><td>Enable</td><td>Link Up</td><td>2</td><td>2</td><td>2</td><td>2</td></tr>\
        </table>";

    fn static_source(document: &'static str) -> MockPortStatsSource {
        let mut source = MockPortStatsSource::new();
        source
            .expect_fetch()
            .returning(move || Ok(document.to_string()));
        source
    }

    fn gauge_value(gauge: &GaugeVec, port: &str) -> f64 {
        gauge.with_label_values(&[port]).get()
    }

    /// Sleeps for a fixed time per fetch and records how many fetches overlap
    struct SlowSource {
        delay: Duration,
        in_flight: AtomicUsize,
        max_in_flight: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PortStatsSource for SlowSource {
        async fn fetch(&self) -> Result<String> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(ONE_PORT.to_string())
        }
    }

    /// Reports a single port named after the call number, after a short sleep
    struct NumberedSource {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PortStatsSource for NumberedSource {
        async fn fetch(&self) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            Ok(format!(
                "<table><tr><td>h</td></tr>\
                 <tr><td>{n}</td><td>Enable</td><td>Link Up</td><td>{n}</td><td>0</td><td>0</td><td>0</td></tr>\
                 </table>"
            ))
        }
    }

    #[test]
    fn test_describe_lists_port_metrics() {
        let collector = PortStatsCollector::new(Box::new(MockPortStatsSource::new())).unwrap();
        let names: Vec<&str> = collector
            .describe()
            .iter()
            .map(|d| d.fq_name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "port_state",
                "port_link_status",
                "port_tx_good_pkt",
                "port_rx_good_pkt",
                "port_tx_good_bytes",
                "port_rx_good_bytes",
            ]
        );
        assert!(
            collector
                .describe()
                .iter()
                .all(|d| d.variable_labels == vec![PORT_LABEL.to_string()])
        );
    }

    #[tokio::test]
    async fn test_collect_publishes_port_gauges() {
        let collector = PortStatsCollector::new(Box::new(static_source(ONE_PORT))).unwrap();

        let outcome = collector.collect().await;
        assert!(matches!(outcome, ScrapeOutcome::Published { ports: 1, .. }));

        assert_eq!(gauge_value(&collector.port_state, "1"), 1.0);
        assert_eq!(gauge_value(&collector.port_link_status, "1"), 1.0);
        assert_eq!(gauge_value(&collector.port_tx_good_pkt, "1"), 100.0);
        assert_eq!(gauge_value(&collector.port_rx_good_pkt, "1"), 200.0);
        assert_eq!(gauge_value(&collector.port_rx_good_bytes, "1"), 300.0);
        assert_eq!(gauge_value(&collector.port_tx_good_bytes, "1"), 400.0);
        assert_eq!(collector.scrape_errors(), 0);
    }

    #[tokio::test]
    async fn test_gather_text_format() {
        let collector = PortStatsCollector::new(Box::new(static_source(ONE_PORT))).unwrap();
        collector.collect().await;

        let output = collector.gather().unwrap();
        assert!(output.contains("# HELP port_state State of the port"));
        assert!(output.contains("# TYPE port_state gauge"));
        assert!(output.contains("port_state{port=\"1\"} 1"));
        assert!(output.contains("port_link_status{port=\"1\"} 1"));
        assert!(output.contains("port_tx_good_pkt{port=\"1\"} 100"));
        assert!(output.contains("port_rx_good_pkt{port=\"1\"} 200"));
        assert!(output.contains("port_rx_good_bytes{port=\"1\"} 300"));
        assert!(output.contains("port_tx_good_bytes{port=\"1\"} 400"));
        assert!(output.contains("exporter_scrape_errors_total 0"));
        assert!(output.contains("exporter_last_scrape_duration_seconds"));
    }

    #[tokio::test]
    async fn test_transport_error_counts_and_publishes_nothing() {
        let mut source = MockPortStatsSource::new();
        source
            .expect_fetch()
            .times(1)
            .returning(|| Err(PortstatsError::Transport("request timed out".to_string())));
        let collector = PortStatsCollector::new(Box::new(source)).unwrap();

        let outcome = collector.collect().await;
        assert_eq!(outcome, ScrapeOutcome::Failed);
        assert_eq!(collector.scrape_errors(), 1);

        let output = collector.gather().unwrap();
        assert!(!output.contains("port=\""));
        assert!(output.contains("exporter_scrape_errors_total 1"));
    }

    #[tokio::test]
    async fn test_parse_error_counts_as_scrape_error() {
        let collector =
            PortStatsCollector::new(Box::new(static_source("<html>login required</html>")))
                .unwrap();

        assert_eq!(collector.collect().await, ScrapeOutcome::Failed);
        assert_eq!(collector.collect().await, ScrapeOutcome::Failed);
        assert_eq!(collector.scrape_errors(), 2);
    }

    #[tokio::test]
    async fn test_failed_cycle_after_success_exposes_no_ports() {
        let mut source = MockPortStatsSource::new();
        let mut seq = mockall::Sequence::new();
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(ONE_PORT.to_string()));
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(PortstatsError::Transport("connection refused".to_string())));
        let collector = PortStatsCollector::new(Box::new(source)).unwrap();

        assert!(matches!(
            collector.collect().await,
            ScrapeOutcome::Published { .. }
        ));
        assert!(collector.gather().unwrap().contains("port_tx_good_pkt{port=\"1\"} 100"));
        let duration_after_success = collector.last_scrape_duration();

        assert_eq!(collector.collect().await, ScrapeOutcome::Failed);
        assert_eq!(collector.scrape_errors(), 1);

        let output = collector.gather().unwrap();
        assert!(!output.contains("port=\""), "{}", output);
        assert!(output.contains("exporter_scrape_errors_total 1"));
        // Duration gauge is only updated by successful cycles
        assert_eq!(collector.last_scrape_duration(), duration_after_success);
    }

    #[tokio::test]
    async fn test_vanished_port_is_dropped() {
        let mut source = MockPortStatsSource::new();
        let mut seq = mockall::Sequence::new();
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(TWO_PORTS.to_string()));
        source
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(ONE_PORT.to_string()));
        let collector = PortStatsCollector::new(Box::new(source)).unwrap();

        assert!(matches!(
            collector.collect().await,
            ScrapeOutcome::Published { ports: 2, .. }
        ));
        assert!(collector.gather().unwrap().contains("port_tx_good_pkt{port=\"2\"} 2"));

        assert!(matches!(
            collector.collect().await,
            ScrapeOutcome::Published { ports: 1, .. }
        ));
        let output = collector.gather().unwrap();
        assert!(!output.contains("port=\"2\""), "{}", output);
        assert!(output.contains("port_tx_good_pkt{port=\"1\"} 100"));
        assert!(output.contains("port_state{port=\"1\"} 1"));
    }

    #[tokio::test]
    async fn test_collect_and_gather_returns_cycle_output() {
        let collector = PortStatsCollector::new(Box::new(static_source(ONE_PORT))).unwrap();

        let (outcome, body) = collector.collect_and_gather().await;
        assert!(matches!(outcome, ScrapeOutcome::Published { ports: 1, .. }));
        let body = body.unwrap();
        assert!(body.contains("port_rx_good_bytes{port=\"1\"} 300"));
        assert!(body.contains("exporter_scrape_errors_total 0"));
    }

    #[tokio::test]
    async fn test_duration_not_set_when_first_cycle_fails() {
        let mut source = MockPortStatsSource::new();
        source
            .expect_fetch()
            .returning(|| Err(PortstatsError::Transport("timeout".to_string())));
        let collector = PortStatsCollector::new(Box::new(source)).unwrap();

        collector.collect().await;
        assert_eq!(collector.last_scrape_duration(), 0.0);
    }

    #[tokio::test]
    async fn test_unknown_state_text_encodes_zero() {
        let collector = PortStatsCollector::new(Box::new(static_source(
            "<table><tr><td>h</td></tr>\
             <tr><td>2</td><td>N/A</td><td>Link Down</td><td>x</td></tr></table>",
        )))
        .unwrap();
        collector.collect().await;

        assert_eq!(gauge_value(&collector.port_state, "2"), 0.0);
        assert_eq!(gauge_value(&collector.port_link_status, "2"), 0.0);
        assert_eq!(gauge_value(&collector.port_tx_good_pkt, "2"), 0.0);
    }

    #[tokio::test]
    async fn test_concurrent_collects_are_serialized() {
        let delay = Duration::from_millis(100);
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let source = SlowSource {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: max_in_flight.clone(),
        };
        let collector = Arc::new(PortStatsCollector::new(Box::new(source)).unwrap());

        let start = Instant::now();
        let (a, b) = tokio::join!(
            {
                let collector = collector.clone();
                async move { collector.collect().await }
            },
            {
                let collector = collector.clone();
                async move { collector.collect().await }
            }
        );
        let elapsed = start.elapsed();

        assert!(matches!(a, ScrapeOutcome::Published { .. }));
        assert!(matches!(b, ScrapeOutcome::Published { .. }));
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        assert!(elapsed >= delay * 2, "elapsed {:?}", elapsed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_collects_serialized_across_threads() {
        let delay = Duration::from_millis(50);
        let max_in_flight = Arc::new(AtomicUsize::new(0));
        let source = SlowSource {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: max_in_flight.clone(),
        };
        let collector = Arc::new(PortStatsCollector::new(Box::new(source)).unwrap());

        let start = Instant::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let collector = collector.clone();
                tokio::spawn(async move { collector.collect().await })
            })
            .collect();
        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                ScrapeOutcome::Published { .. }
            ));
        }

        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() >= delay * 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_gathers_see_one_complete_cycle() {
        let source = NumberedSource {
            delay: Duration::from_millis(20),
            calls: AtomicUsize::new(0),
        };
        let collector = Arc::new(PortStatsCollector::new(Box::new(source)).unwrap());

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let collector = collector.clone();
                tokio::spawn(async move { collector.collect_and_gather().await })
            })
            .collect();

        let mut seen = Vec::new();
        for handle in handles {
            let (outcome, body) = handle.await.unwrap();
            assert!(matches!(outcome, ScrapeOutcome::Published { ports: 1, .. }));
            let body = body.unwrap();
            let lines: Vec<&str> = body
                .lines()
                .filter(|line| line.starts_with("port_tx_good_pkt{"))
                .collect();
            assert_eq!(lines.len(), 1, "{}", body);
            seen.push(lines[0].to_string());
        }

        // Each response carries its own cycle's port
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 6);
    }
}

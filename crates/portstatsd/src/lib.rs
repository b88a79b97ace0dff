//! Port Statistics Exporter
//!
//! Polls the web management UI of switches that offer no SNMP, extracts
//! per-port counters and link status from the status page table and
//! publishes them as Prometheus gauges.

pub mod auth;
pub mod collector;
pub mod config;
pub mod device;
pub mod encoding;
pub mod error;
pub mod metrics_server;
pub mod parser;
pub mod types;

pub use auth::session_digest;
pub use collector::{PortStatsCollector, ScrapeOutcome};
pub use config::{DEFAULT_CONFIG_PATH, PortstatsConfig};
pub use device::{DeviceClient, PortStatsSource};
pub use encoding::{AdminState, LinkState, encode_link, encode_state};
pub use error::*;
pub use metrics_server::{METRICS_PATH, MetricsServer, router};
pub use parser::parse_port_statistics;
pub use types::{Port, PortStatistics};

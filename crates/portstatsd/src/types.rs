//! Port records scraped from the switch status page

use serde::Serialize;

/// One row of the device's port statistics table
///
/// Counters are absolute values as reported by the device on each scrape.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Port {
    /// Port name as shown by the device (e.g., "1" or "Port 1")
    #[serde(rename = "port")]
    pub name: String,
    /// Administrative state text ("Enable" / "Disable")
    pub state: String,
    /// Link state text ("Link Up" / "Link Down")
    pub link_status: String,
    #[serde(rename = "tx_good_pkt")]
    pub tx_good_packets: u64,
    #[serde(rename = "rx_good_pkt")]
    pub rx_good_packets: u64,
    pub rx_good_bytes: u64,
    pub tx_good_bytes: u64,
}

/// Ports from a single scrape, in device row order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PortStatistics {
    #[serde(rename = "port_statistics")]
    pub ports: Vec<Port>,
}

impl PortStatistics {
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Port> {
        self.ports.iter()
    }
}

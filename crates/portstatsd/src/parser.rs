//! Port statistics table extraction
//!
//! The status page is a plain HTML table. Rows are matched with `table tr`
//! across the whole document; the first match is the column header and is
//! dropped by position, whatever it contains. Cells are read positionally:
//!
//! | index | field             |
//! |-------|-------------------|
//! | 0     | name (raw text)   |
//! | 1     | state (raw text)  |
//! | 2     | link status (raw) |
//! | 3     | tx good packets   |
//! | 4     | rx good packets   |
//! | 5     | rx good bytes     |
//! | 6     | tx good bytes     |
//!
//! Counter cells that are empty or not numeric become 0. Short rows keep the
//! defaults for the cells they lack; extra cells are ignored.

use crate::error::{PortstatsError, Result};
use crate::types::{Port, PortStatistics};
use scraper::{ElementRef, Html, Selector};
use tracing::trace;

const TABLE_SELECTOR: &str = "table";
const ROW_SELECTOR: &str = "table tr";
const CELL_SELECTOR: &str = "td";

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| PortstatsError::Parse(format!("invalid selector {:?}: {}", css, e)))
}

/// Parse the device's status page into port records
///
/// Fails only when the document contains no table at all.
pub fn parse_port_statistics(document: &str) -> Result<PortStatistics> {
    let html = Html::parse_document(document);
    let table = selector(TABLE_SELECTOR)?;
    let row = selector(ROW_SELECTOR)?;
    let cell = selector(CELL_SELECTOR)?;

    if html.select(&table).next().is_none() {
        return Err(PortstatsError::Parse(
            "no table found in device response".to_string(),
        ));
    }

    let ports = html
        .select(&row)
        .skip(1)
        .map(|tr| parse_row(tr, &cell))
        .collect();

    Ok(PortStatistics { ports })
}

fn parse_row(row: ElementRef<'_>, cell: &Selector) -> Port {
    let mut port = Port::default();

    for (index, td) in row.select(cell).enumerate() {
        let text: String = td.text().collect();
        match index {
            0 => port.name = text,
            1 => port.state = text,
            2 => port.link_status = text,
            3 => port.tx_good_packets = parse_counter(&text),
            4 => port.rx_good_packets = parse_counter(&text),
            5 => port.rx_good_bytes = parse_counter(&text),
            6 => port.tx_good_bytes = parse_counter(&text),
            _ => break,
        }
    }

    port
}

/// Lenient unsigned decimal parse; anything unparsable is 0
pub fn parse_counter(text: &str) -> u64 {
    let trimmed = text.trim();
    // u64::from_str accepts a leading '+', the device never sends one
    if trimmed.starts_with('+') {
        trace!(cell = trimmed, "portstatsd: Counter cell defaulted to 0");
        return 0;
    }
    match trimmed.parse::<u64>() {
        Ok(value) => value,
        Err(_) => {
            trace!(cell = trimmed, "portstatsd: Counter cell defaulted to 0");
            0
        }
    }
}

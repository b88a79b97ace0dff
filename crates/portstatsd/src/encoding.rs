//! Gauge encodings for textual port fields
//!
//! Matching is exact. Anything the table does not know, including empty,
//! padded or localized text, encodes as 0.0 rather than an error.

/// Administrative state as reported by the device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminState {
    Enable,
    Disable,
    Unknown,
}

impl AdminState {
    pub fn from_device(text: &str) -> Self {
        match text {
            "Enable" => AdminState::Enable,
            "Disable" => AdminState::Disable,
            _ => AdminState::Unknown,
        }
    }

    pub fn gauge_value(self) -> f64 {
        match self {
            AdminState::Enable => 1.0,
            AdminState::Disable | AdminState::Unknown => 0.0,
        }
    }
}

/// Link state as reported by the device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkState {
    Up,
    Down,
    Unknown,
}

impl LinkState {
    pub fn from_device(text: &str) -> Self {
        match text {
            "Link Up" => LinkState::Up,
            "Link Down" => LinkState::Down,
            _ => LinkState::Unknown,
        }
    }

    pub fn gauge_value(self) -> f64 {
        match self {
            LinkState::Up => 1.0,
            LinkState::Down | LinkState::Unknown => 0.0,
        }
    }
}

/// Encode the port state column (1.0 = enabled)
pub fn encode_state(state: &str) -> f64 {
    AdminState::from_device(state).gauge_value()
}

/// Encode the link status column (1.0 = link up)
pub fn encode_link(status: &str) -> f64 {
    LinkState::from_device(status).gauge_value()
}

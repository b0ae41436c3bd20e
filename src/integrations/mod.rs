//! Carrier integrations.

pub mod carrier_client {
    pub use crate::carrier_client::*;
}

pub mod formatters {
    pub use crate::formatters::*;
}

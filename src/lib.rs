//! Library crate for port-banner-scan exposing reusable modules.
pub mod aggregator;
pub mod banner;
pub mod error;
pub mod ports;
pub mod probe;
pub mod report;
pub mod resolver;
pub mod scanner;
pub mod types;

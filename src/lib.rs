pub mod configuration;
pub mod connection;
pub mod domain;
pub mod smoke_check;
pub mod subscriber_store;
pub mod telemetry;
pub mod utils;

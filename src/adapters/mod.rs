//! Concrete adapters implementing the port traits.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod file_notifier;
pub mod paper_broker;
pub mod sqlite_store;

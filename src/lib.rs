//! # Netbroker
//!
//! Async fan-out broker for network device automation.
//!
//! Netbroker takes a validated device inventory and runs operations
//! (commands, configuration pushes, liveness probes) against every device
//! in parallel, through pluggable per-device drivers, and hands back
//! uniform typed results that serialize cleanly to JSON.
//!
//! ## Features
//!
//! - Validated JSON inventories with closed schemas
//! - Pluggable driver registry (built-in exec-mode SSH driver via russh)
//! - Declarative per-device driver option overrides
//! - Parallel fan-out with per-device timeouts and failure isolation
//! - Batch (inventory-order) and streaming (completion-order) collection
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use netbroker::{Broker, Inventory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netbroker::Error> {
//!     let broker = Broker::with_builtin_drivers();
//!
//!     let inventory = Inventory::from_json_validated(
//!         r#"{
//!             "inventory_nodes": [
//!                 {"name": "r1", "attributes": {"host": "10.0.0.1", "user": "admin", "password": "secret"}},
//!                 {"name": "r2", "attributes": {"host": "10.0.0.2", "user": "admin", "password": "secret"}}
//!             ]
//!         }"#,
//!         broker.registry(),
//!     )?;
//!
//!     let commands = vec!["show version".to_string()];
//!     let results = broker.run_commands(&inventory, &commands, None).await?;
//!
//!     for result in &results {
//!         println!("{}", serde_json::to_string_pretty(result).unwrap());
//!     }
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod device;
pub mod driver;
pub mod error;
pub mod platforms;

// Re-export main types for convenience
pub use broker::{
    Broker, CommandResult, CommandResults, PingResult, PingResults, ResultStream,
};
pub use device::{Device, Inventory};
pub use driver::{DEFAULT_DRIVER, Driver, DriverFactory, DriverRegistry};
pub use error::{Error, ErrorKind, Result};

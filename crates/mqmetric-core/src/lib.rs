//! mqmetric-core - resource statistics discovery and collection for
//! message queue managers.
//!
//! Provides:
//! - `transport` - queue manager and PCF codec abstractions, plus a scripted mock
//! - `pcf` - PCF message model and parsing
//! - `catalog` - the discovered class/type/element tree and its values
//! - `discovery` - building the catalog from metadata topics
//! - `selector` - queue name pattern lists
//! - `inquire` - command server inquiries with reply buffer growth
//! - `queues` - tracked queues and their resolution
//! - `subscription` - data subscription reconciliation
//! - `publication` - draining publications into the catalog
//! - `verify` - reply queue checks
//! - `config` - monitor configuration
//! - `monitor` - the `Monitor` tying it all together

pub mod catalog;
pub mod config;
pub mod discovery;
pub mod error;
pub mod inquire;
pub mod monitor;
pub mod pcf;
pub mod publication;
pub mod queues;
pub mod selector;
pub mod subscription;
pub mod transport;
pub mod verify;

pub use catalog::{Datatype, ElementNode, MetricCatalog, ObjectKey, normalise};
pub use config::MonitorConfig;
pub use error::{MonitorError, MqReturn, PatternError, PcfError, Result};
pub use monitor::Monitor;
pub use publication::CycleStats;
pub use selector::read_patterns;
pub use verify::ConfigStatus;

//! Vendor Portal
//!
//! Application layer over `portal-client`: the order state controller,
//! transient notices, logging and environment configuration.

pub mod config;
pub mod logger;
pub mod notice;
pub mod orders;

pub use config::AppConfig;
pub use notice::{Notice, NoticeKind};
pub use orders::{OrderError, OrderFilter, OrderStateController, OrderStats};

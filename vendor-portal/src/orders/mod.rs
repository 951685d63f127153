//! Vendor order screens: state, commands, filtering and stats
//!
//! - [`controller`]: [`OrderStateController`]
//! - [`assignment`]: delivery assignment draft and preconditions
//! - [`filter`]: search / status / payment / date filters
//! - [`stats`]: per-status counts and today's revenue

pub mod assignment;
pub mod controller;
pub mod error;
pub mod filter;
pub mod stats;

pub use assignment::AssignmentDraft;
pub use controller::{OrderStateController, OrdersState};
pub use error::{OrderError, OrderResult};
pub use filter::{DateFilter, OrderFilter};
pub use stats::{OrderStats, todays_revenue};

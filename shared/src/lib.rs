//! Shared types for the vendor portal
//!
//! Data model shared by the REST client, the push-notification client and
//! the order controller: orders, delivery roster, vendor profile and the
//! backend's response envelopes.

pub mod delivery;
pub mod error;
pub mod order;
pub mod response;
pub mod vendor;

// Re-exports
pub use delivery::{DeliveryRoster, DeliveryTeamMember};
pub use error::{ShapeError, ShapeResult};
pub use order::{Order, OrderStatus, PaymentStatus};
pub use response::{Envelope, OneOrMany};
pub use vendor::{DeliveryModel, VendorProfile};

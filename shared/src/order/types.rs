//! Normalized order view shared by the REST client, the push channel and the
//! order controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::vendor::DeliveryModel;

// ============================================================================
// Order Status
// ============================================================================

/// Order status as mirrored from the backend.
///
/// The backend owns the lifecycle; the transition table below only describes
/// which vendor actions the portal offers for each status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Packed,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    Returned,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Packed,
        OrderStatus::Shipped,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Packed => "packed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }

    /// Statuses a vendor may move an order to from this status.
    ///
    /// `packed`, `shipped` and `out_for_delivery` are advanced by the delivery
    /// side, so they expose nothing here.
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Confirmed, OrderStatus::Cancelled],
            OrderStatus::Confirmed => &[OrderStatus::Processing, OrderStatus::Cancelled],
            OrderStatus::Processing => &[OrderStatus::Packed, OrderStatus::Cancelled],
            OrderStatus::Packed
            | OrderStatus::Shipped
            | OrderStatus::OutForDelivery
            | OrderStatus::Delivered
            | OrderStatus::Cancelled
            | OrderStatus::Returned => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_transitions().contains(&next)
    }

    /// No further change is possible, by anyone.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Returned
        )
    }

    /// Whether a delivery person may be assigned while the order is in this status.
    pub fn accepts_delivery_assignment(&self) -> bool {
        matches!(
            self,
            OrderStatus::Confirmed | OrderStatus::Processing | OrderStatus::Packed
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Unrecognized status string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// ============================================================================
// Payment Status
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 6] = [
        PaymentStatus::Pending,
        PaymentStatus::Processing,
        PaymentStatus::Completed,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
        PaymentStatus::PartiallyRefunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

// ============================================================================
// Delivery
// ============================================================================

/// Who carries the parcel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryPartner {
    /// Platform courier network
    LalajiNetwork,
    /// Vendor's own delivery team
    VendorSelf,
    /// Not decided yet
    #[default]
    Pending,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DeliveryInfo {
    pub partner: DeliveryPartner,
    /// Assigned delivery person id
    pub delivery_boy: Option<String>,
    pub delivery_boy_name: String,
    pub delivery_boy_phone: Option<String>,
    pub estimated_time: Option<String>,
    pub tracking_number: Option<String>,
    pub current_location: Option<GeoPoint>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl DeliveryInfo {
    pub fn is_assigned(&self) -> bool {
        self.delivery_boy.is_some()
    }
}

// ============================================================================
// Order
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Customer {
    pub name: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    /// Unit price
    pub price: f64,
    /// Line total
    pub total: f64,
    pub sku: Option<String>,
    pub image: Option<String>,
    pub status: OrderStatus,
}

/// One vendor's slice of a multi-vendor order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct VendorShare {
    pub vendor: String,
    pub vendor_name: String,
    pub delivery_model: DeliveryModel,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub subtotal: f64,
}

/// Client-side order record.
///
/// Built by [`normalize_order`](super::normalize_order) from whatever shape
/// the backend or the push stream delivered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub customer: Customer,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<String>,
    pub delivery: DeliveryInfo,
    pub vendors: Vec<VendorShare>,
    pub order_date: Option<DateTime<Utc>>,
    pub shipping_address: Option<String>,
}

impl Order {
    /// The slice belonging to `vendor_id`, if this is a multi-vendor order.
    pub fn vendor_share(&self, vendor_id: &str) -> Option<&VendorShare> {
        self.vendors.iter().find(|share| share.vendor == vendor_id)
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

//! Vendor profile

use serde::{Deserialize, Serialize};

/// How a vendor's orders reach the customer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryModel {
    /// Vendor runs its own delivery team
    #[serde(alias = "vendor_self")]
    SelfDelivery,
    /// Platform courier network
    LalajiNetwork,
    #[default]
    #[serde(other)]
    Unknown,
}

impl DeliveryModel {
    pub fn from_wire(value: &str) -> Self {
        serde_json::from_value(serde_json::Value::String(value.to_ascii_lowercase()))
            .unwrap_or_default()
    }

    pub fn is_self_delivery(&self) -> bool {
        matches!(self, DeliveryModel::SelfDelivery)
    }
}

/// Signed-in vendor, as returned by the profile endpoint and stored under
/// the `vendor_user` session key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VendorProfile {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: String,
    #[serde(alias = "storeName", alias = "name", default)]
    pub business_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(alias = "phoneNumber", default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub delivery_model: DeliveryModel,
}

//! Delivery assignment: draft state and precondition checks

use shared::{DeliveryModel, Order};

use super::error::{OrderError, OrderResult};

/// An open "assign delivery" dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentDraft {
    pub order_id: String,
    pub selected: Option<String>,
}

impl AssignmentDraft {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            selected: None,
        }
    }
}

/// The vendor's delivery model for `order`.
///
/// The order's own vendor entry wins; otherwise the vendor profile decides.
pub fn effective_delivery_model(
    order: &Order,
    vendor_id: Option<&str>,
    profile_model: DeliveryModel,
) -> DeliveryModel {
    vendor_id
        .and_then(|id| order.vendor_share(id))
        .map(|share| share.delivery_model)
        .filter(|model| *model != DeliveryModel::Unknown)
        .unwrap_or(profile_model)
}

/// Checks run before any assignment request is sent.
pub fn validate_assignment(
    order_id: &str,
    order: Option<&Order>,
    delivery_boy_id: &str,
    vendor_id: Option<&str>,
    profile_model: DeliveryModel,
) -> OrderResult<()> {
    if delivery_boy_id.trim().is_empty() {
        return Err(OrderError::Validation(
            "Please select a delivery boy".to_string(),
        ));
    }

    let order = order.ok_or_else(|| OrderError::NotFound(order_id.to_string()))?;

    if !effective_delivery_model(order, vendor_id, profile_model).is_self_delivery() {
        return Err(OrderError::Validation(
            "Delivery assignment is only available for self-delivery vendors".to_string(),
        ));
    }

    if !order.status.accepts_delivery_assignment() {
        return Err(OrderError::Validation(format!(
            "Cannot assign delivery to an order that is {}",
            order.status
        )));
    }

    Ok(())
}

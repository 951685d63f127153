//! Order normalization
//!
//! Orders reach the portal from two places (the list endpoint and the push
//! stream) and in several historical backend layouts. Every record goes
//! through [`normalize_order`], which flattens the known field paths and
//! fills placeholders, so downstream code only ever sees [`Order`].

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use super::types::{
    Customer, DeliveryInfo, DeliveryPartner, GeoPoint, Order, OrderItem, OrderStatus,
    PaymentStatus, VendorShare,
};
use crate::error::ShapeResult;
use crate::response::{Envelope, OneOrMany};
use crate::vendor::DeliveryModel;

pub const UNKNOWN_CUSTOMER: &str = "Unknown";
pub const MISSING_CONTACT: &str = "N/A";
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";
pub const UNKNOWN_VENDOR: &str = "Unknown Vendor";
pub const NOT_ASSIGNED: &str = "Not Assigned";

// ============================================================================
// Entry points
// ============================================================================

/// Normalizes a list-orders response.
///
/// Accepts `{success, data: [..]}`, `{success, data: {..}}`,
/// `{success, data: {orders: [..]}}`, a bare array, or a bare order object.
/// `success: false` is returned as an error. An object without an order id
/// is searched for an `orders` or `data` array; failing that it yields no
/// orders.
pub fn normalize_orders(payload: Value) -> ShapeResult<Vec<Order>> {
    let records = match Envelope::<OneOrMany<Value>>::from_value(payload)?.into_data()? {
        None => Vec::new(),
        Some(OneOrMany::Many(records)) => records,
        Some(OneOrMany::One(Value::Null)) => Vec::new(),
        Some(OneOrMany::One(record)) if has_order_id(&record) => vec![record],
        Some(OneOrMany::One(record)) => nested_records(&record),
    };

    Ok(records.iter().map(normalize_order).collect())
}

/// Whether `raw` carries `_id`, `id` or `orderId`.
pub fn has_order_id(raw: &Value) -> bool {
    order_id(raw).is_some()
}

fn order_id(raw: &Value) -> Option<String> {
    text(raw, &["/_id", "/id", "/orderId"])
}

fn nested_records(raw: &Value) -> Vec<Value> {
    for key in ["orders", "data"] {
        if let Some(Value::Array(records)) = raw.get(key) {
            return records.clone();
        }
    }
    tracing::warn!("Order payload has no order id and no order list, ignoring it");
    Vec::new()
}

/// Flattens one backend or push-event order record.
pub fn normalize_order(raw: &Value) -> Order {
    let id = order_id(raw).unwrap_or_default();
    let order_number = text(raw, &["/orderNumber", "/orderId"]).unwrap_or_else(|| id.clone());
    let status = status_at(raw, &["/status", "/orderStatus"], OrderStatus::Pending);

    let mut items = items_at(raw, "/items", status);
    let vendors = vendors_at(raw, status);
    if items.is_empty() {
        items = vendors.iter().flat_map(|v| v.items.iter().cloned()).collect();
    }

    let total_amount = number(
        raw,
        &["/pricing/total", "/totalAmount", "/total", "/grandTotal"],
    )
    .unwrap_or_else(|| items.iter().map(|item| item.total).sum());

    Order {
        customer: customer_at(raw),
        total_amount,
        payment_status: payment_status_at(raw),
        payment_method: text(raw, &["/paymentMethod", "/payment/method"]),
        delivery: delivery_at(raw),
        order_date: date(raw, &["/createdAt", "/orderDate"]),
        shipping_address: address_at(raw),
        id,
        order_number,
        items,
        status,
        vendors,
    }
}

// ============================================================================
// Sections
// ============================================================================

fn customer_at(raw: &Value) -> Customer {
    Customer {
        name: text(
            raw,
            &["/customerInfo/name", "/customer/name", "/shippingAddress/name"],
        )
        .unwrap_or_else(|| UNKNOWN_CUSTOMER.to_string()),
        phone: text(
            raw,
            &[
                "/customerInfo/phone",
                "/customer/phone",
                "/customer/phoneNumber",
                "/shippingAddress/phone",
            ],
        )
        .unwrap_or_else(|| MISSING_CONTACT.to_string()),
        email: text(raw, &["/customerInfo/email", "/customer/email"])
            .unwrap_or_else(|| MISSING_CONTACT.to_string()),
    }
}

fn items_at(raw: &Value, pointer: &str, order_status: OrderStatus) -> Vec<OrderItem> {
    match raw.pointer(pointer) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| normalize_item(item, order_status))
            .collect(),
        _ => Vec::new(),
    }
}

fn normalize_item(item: &Value, order_status: OrderStatus) -> OrderItem {
    let quantity = number(item, &["/quantity", "/qty"])
        .map(|q| q.max(0.0).round() as u32)
        .unwrap_or(1);
    let price = number(
        item,
        &["/price", "/unitPrice", "/product/price", "/productId/price"],
    )
    .unwrap_or(0.0);
    let total = number(item, &["/total", "/totalPrice", "/subtotal"])
        .unwrap_or(price * f64::from(quantity));

    OrderItem {
        name: text(
            item,
            &["/name", "/productName", "/product/name", "/productId/name"],
        )
        .unwrap_or_else(|| UNKNOWN_PRODUCT.to_string()),
        quantity,
        price,
        total,
        sku: text(item, &["/sku", "/product/sku", "/productId/sku"]),
        image: text(
            item,
            &[
                "/image",
                "/product/images/0",
                "/product/images/0/url",
                "/productId/images/0",
                "/productId/images/0/url",
                "/product/image",
            ],
        ),
        status: status_at(item, &["/status"], order_status),
    }
}

fn vendors_at(raw: &Value, order_status: OrderStatus) -> Vec<VendorShare> {
    let Some(Value::Array(vendors)) = raw.pointer("/vendors") else {
        return Vec::new();
    };

    vendors
        .iter()
        .map(|entry| {
            let status = status_at(entry, &["/status"], order_status);
            let items = items_at(entry, "/items", status);
            let subtotal = number(entry, &["/subtotal", "/total"])
                .unwrap_or_else(|| items.iter().map(|item| item.total).sum());
            VendorShare {
                vendor: text(entry, &["/vendor", "/vendor/_id", "/vendor/id", "/vendorId"])
                    .unwrap_or_default(),
                vendor_name: text(
                    entry,
                    &["/vendorName", "/vendor/businessName", "/vendor/storeName", "/vendor/name"],
                )
                .unwrap_or_else(|| UNKNOWN_VENDOR.to_string()),
                delivery_model: text(entry, &["/deliveryModel", "/vendor/deliveryModel"])
                    .map(|m| DeliveryModel::from_wire(&m))
                    .unwrap_or_default(),
                items,
                status,
                subtotal,
            }
        })
        .collect()
}

fn delivery_at(raw: &Value) -> DeliveryInfo {
    let partner = match text(raw, &["/delivery/partner", "/deliveryPartner"])
        .map(|p| p.to_ascii_lowercase())
        .as_deref()
    {
        Some("lalaji_network" | "platform") => DeliveryPartner::LalajiNetwork,
        Some("vendor_self" | "self" | "self_delivery") => DeliveryPartner::VendorSelf,
        _ => DeliveryPartner::Pending,
    };

    DeliveryInfo {
        partner,
        delivery_boy: text(
            raw,
            &[
                "/delivery/deliveryBoy",
                "/delivery/deliveryBoy/_id",
                "/delivery/deliveryBoy/id",
            ],
        ),
        delivery_boy_name: text(
            raw,
            &["/delivery/deliveryBoyName", "/delivery/deliveryBoy/name"],
        )
        .unwrap_or_else(|| NOT_ASSIGNED.to_string()),
        delivery_boy_phone: text(
            raw,
            &[
                "/delivery/deliveryBoyPhone",
                "/delivery/deliveryBoy/phoneNumber",
                "/delivery/deliveryBoy/phone",
            ],
        ),
        estimated_time: text(
            raw,
            &["/delivery/estimatedTime", "/delivery/estimatedDeliveryTime"],
        ),
        tracking_number: text(raw, &["/delivery/trackingNumber", "/trackingNumber"]),
        current_location: raw.pointer("/delivery/currentLocation").and_then(geo_point),
        delivered_at: date(raw, &["/delivery/deliveredAt", "/deliveredAt"]),
    }
}

fn geo_point(value: &Value) -> Option<GeoPoint> {
    let lat = number(value, &["/lat", "/latitude"]);
    let lng = number(value, &["/lng", "/longitude"]);
    if let (Some(lat), Some(lng)) = (lat, lng) {
        return Some(GeoPoint { lat, lng });
    }
    // GeoJSON point: [lng, lat]
    let lng = number(value, &["/coordinates/0"])?;
    let lat = number(value, &["/coordinates/1"])?;
    Some(GeoPoint { lat, lng })
}

fn address_at(raw: &Value) -> Option<String> {
    match raw.pointer("/shippingAddress")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        address @ Value::Object(_) => {
            let parts: Vec<String> = [
                "/street",
                "/address",
                "/addressLine1",
                "/city",
                "/state",
                "/pincode",
                "/zipCode",
            ]
            .iter()
            .filter_map(|p| text(address, &[p]))
            .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

fn status_at(raw: &Value, paths: &[&str], fallback: OrderStatus) -> OrderStatus {
    match text(raw, paths) {
        None => fallback,
        Some(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown order status '{}', using {}", value, fallback);
            fallback
        }),
    }
}

fn payment_status_at(raw: &Value) -> PaymentStatus {
    match text(raw, &["/paymentStatus", "/payment/status"]) {
        None => PaymentStatus::Pending,
        Some(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown payment status '{}', using pending", value);
            PaymentStatus::Pending
        }),
    }
}

// ============================================================================
// Field access
// ============================================================================

/// First non-empty string (or stringified number) among the JSON pointers.
fn text(raw: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| match raw.pointer(path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First number (or numeric string) among the JSON pointers.
fn number(raw: &Value, paths: &[&str]) -> Option<f64> {
    paths.iter().find_map(|path| match raw.pointer(path)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// RFC 3339, naive `YYYY-MM-DD HH:MM:SS` (UTC), or epoch milliseconds.
fn date(raw: &Value, paths: &[&str]) -> Option<DateTime<Utc>> {
    paths.iter().find_map(|path| match raw.pointer(path)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    })
}

//! Delivery team roster

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ShapeResult;
use crate::response::Envelope;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryBoyInfo {
    #[serde(default)]
    pub is_available: bool,
    #[serde(default)]
    pub vehicle_type: Option<String>,
    #[serde(default)]
    pub vehicle_number: Option<String>,
    /// Order currently being carried, if any
    #[serde(default)]
    pub current_order_id: Option<String>,
}

/// Member of a vendor's own delivery team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryTeamMember {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(alias = "phone", default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub delivery_boy_info: DeliveryBoyInfo,
}

impl DeliveryTeamMember {
    /// Active, marked available, and not already carrying an order.
    pub fn is_selectable(&self) -> bool {
        self.is_active
            && self.delivery_boy_info.is_available
            && self
                .delivery_boy_info
                .current_order_id
                .as_deref()
                .is_none_or(str::is_empty)
    }
}

/// Roster split used by the assignment dialog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryRoster {
    pub all: Vec<DeliveryTeamMember>,
    pub available: Vec<DeliveryTeamMember>,
}

impl DeliveryRoster {
    pub fn from_members(all: Vec<DeliveryTeamMember>) -> Self {
        let available = all.iter().filter(|m| m.is_selectable()).cloned().collect();
        Self { all, available }
    }

    pub fn is_available(&self, member_id: &str) -> bool {
        self.available.iter().any(|m| m.id == member_id)
    }
}

/// Normalizes a delivery-team response.
///
/// Accepts an envelope or bare payload whose data is either the member array
/// or an object holding it under `deliveryBoys`, `deliveryTeam` or `members`.
pub fn normalize_roster(payload: Value) -> ShapeResult<Vec<DeliveryTeamMember>> {
    let members = match Envelope::<Value>::from_value(payload)?.into_data()? {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(mut map)) => ["deliveryBoys", "deliveryTeam", "members"]
            .iter()
            .find_map(|key| map.remove(*key))
            .unwrap_or(Value::Array(Vec::new())),
        Some(other) => other,
    };
    Ok(serde_json::from_value(members)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: &str, active: bool, available: bool, current: Option<&str>) -> DeliveryTeamMember {
        DeliveryTeamMember {
            id: id.to_string(),
            name: format!("Rider {id}"),
            is_active: active,
            delivery_boy_info: DeliveryBoyInfo {
                is_available: available,
                current_order_id: current.map(str::to_string),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_selectable_requires_all_three_conditions() {
        assert!(member("a", true, true, None).is_selectable());
        assert!(!member("b", false, true, None).is_selectable());
        assert!(!member("c", true, false, None).is_selectable());
        assert!(!member("d", true, true, Some("o1")).is_selectable());
        // blank id from the backend means "no order"
        assert!(member("e", true, true, Some("")).is_selectable());
    }

    #[test]
    fn test_roster_split() {
        let roster = DeliveryRoster::from_members(vec![
            member("a", true, true, None),
            member("b", true, false, None),
            member("c", true, true, Some("o9")),
        ]);
        assert_eq!(roster.all.len(), 3);
        assert_eq!(roster.available.len(), 1);
        assert!(roster.is_available("a"));
        assert!(!roster.is_available("c"));
    }

    #[test]
    fn test_member_from_backend_json() {
        let m: DeliveryTeamMember = serde_json::from_str(
            r#"{"_id":"d1","name":"Ravi","phoneNumber":"98","isActive":true,
                "deliveryBoyInfo":{"isAvailable":true,"vehicleType":"bike","currentOrderId":null}}"#,
        )
        .unwrap();
        assert_eq!(m.id, "d1");
        assert_eq!(m.delivery_boy_info.vehicle_type.as_deref(), Some("bike"));
        assert!(m.is_selectable());
    }

    #[test]
    fn test_roster_shapes() {
        let member = serde_json::json!({"_id": "d1", "isActive": true});
        let wrapped = normalize_roster(serde_json::json!({"success": true, "data": [member.clone()]}));
        let keyed = normalize_roster(serde_json::json!({"success": true, "data": {"deliveryBoys": [member.clone()]}}));
        let bare = normalize_roster(serde_json::json!([member]));
        assert_eq!(wrapped.unwrap().len(), 1);
        assert_eq!(keyed.unwrap().len(), 1);
        assert_eq!(bare.unwrap().len(), 1);
        assert!(normalize_roster(serde_json::json!({"success": false})).is_err());
    }
}

use serde::{Deserialize, Serialize};

use crate::identifiers::{PostingNumber, ShopId};

/// Entities that carry a unique natural key.
pub trait Keyed {
    fn entity_key(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentProduct {
    pub sku: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub offer_id: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// A fulfillable unit of an order as returned by the packing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub posting_number: PostingNumber,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub shop_id: Option<ShopId>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub operation_status: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub label_printed_at: Option<String>,
    #[serde(default)]
    pub in_process_at: Option<String>,
    #[serde(default)]
    pub products: Vec<ShipmentProduct>,
}

impl Shipment {
    pub fn new(posting_number: impl Into<PostingNumber>) -> Self {
        Self {
            posting_number: posting_number.into(),
            order_number: None,
            shop_id: None,
            status: String::new(),
            operation_status: None,
            tracking_number: None,
            label_printed_at: None,
            in_process_at: None,
            products: Vec::new(),
        }
    }

    pub fn is_label_printed(&self) -> bool {
        self.label_printed_at
            .as_deref()
            .is_some_and(|value| !value.trim().is_empty())
    }
}

impl Keyed for Shipment {
    fn entity_key(&self) -> &str {
        self.posting_number.as_str()
    }
}

impl Keyed for PostingNumber {
    fn entity_key(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::{Keyed, Shipment};

    #[test]
    fn shipment_decodes_with_sparse_payload() {
        let shipment: Shipment = serde_json::from_value(serde_json::json!({
            "posting_number": "1000-1",
            "status": "awaiting_deliver",
            "products": [{ "sku": "42" }]
        }))
        .expect("decode sparse shipment");

        assert_eq!(shipment.entity_key(), "1000-1");
        assert_eq!(shipment.products[0].quantity, 1);
        assert!(!shipment.is_label_printed());
    }

    #[test]
    fn blank_label_timestamp_is_not_printed() {
        let mut shipment = Shipment::new("1000-2");
        shipment.label_printed_at = Some("  ".to_owned());
        assert!(!shipment.is_label_printed());

        shipment.label_printed_at = Some("2026-10-01T10:00:00Z".to_owned());
        assert!(shipment.is_label_printed());
    }
}

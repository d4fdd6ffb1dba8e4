// crates/interval-store-core/src/runtime/schema.rs
// ============================================================================
// Module: Attribute Schema
// Description: Mapping between interval records and stored attribute maps.
// Purpose: Keep attribute naming out of the record model.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Key attribute names belong to the backend; the non-key attributes an
//! interval record occupies (end instant and payload) are named here so the
//! same runtime can target tables with different column names.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::IntervalRecord;
use crate::core::Payload;
use crate::interfaces::AttributeValue;
use crate::interfaces::Attributes;
use crate::interfaces::StoreItem;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default end-instant attribute name.
pub const DEFAULT_END_ATTRIBUTE: &str = "LastDay";
/// Default payload attribute name.
pub const DEFAULT_PAYLOAD_ATTRIBUTE: &str = "Data";

// ============================================================================
// SECTION: Attribute Schema
// ============================================================================

/// Names of the non-key attributes holding an interval record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSchema {
    /// Numeric end-instant attribute; also the store's TTL attribute.
    pub end_attribute: String,
    /// Payload attribute.
    pub payload_attribute: String,
}

impl Default for AttributeSchema {
    fn default() -> Self {
        Self {
            end_attribute: DEFAULT_END_ATTRIBUTE.to_string(),
            payload_attribute: DEFAULT_PAYLOAD_ATTRIBUTE.to_string(),
        }
    }
}

impl AttributeSchema {
    /// Converts a record into a store item.
    #[must_use]
    pub fn to_item(&self, record: &IntervalRecord) -> StoreItem {
        let payload = match &record.payload {
            Payload::Text(text) => AttributeValue::String(text.clone()),
            Payload::Binary(bytes) => AttributeValue::Binary(bytes.clone()),
        };
        let mut attributes = Attributes::new();
        attributes.insert(self.end_attribute.clone(), AttributeValue::Number(record.end_unix));
        attributes.insert(self.payload_attribute.clone(), payload);
        StoreItem {
            key: record.key(),
            attributes,
        }
    }

    /// Converts a store item back into a record.
    ///
    /// # Errors
    ///
    /// Returns a reason string when the end or payload attribute is missing
    /// or has the wrong type.
    pub fn to_record(&self, item: StoreItem) -> Result<IntervalRecord, String> {
        let StoreItem {
            key,
            mut attributes,
        } = item;
        let end_unix = attributes
            .get(&self.end_attribute)
            .and_then(AttributeValue::as_number)
            .ok_or_else(|| format!("attribute {} is missing or not numeric", self.end_attribute))?;
        let payload = match attributes.remove(&self.payload_attribute) {
            Some(AttributeValue::String(text)) => Payload::Text(text),
            Some(AttributeValue::Binary(bytes)) => Payload::Binary(bytes),
            Some(AttributeValue::Number(_)) | None => {
                return Err(format!(
                    "attribute {} is missing or not a string or binary value",
                    self.payload_attribute
                ));
            }
        };
        Ok(IntervalRecord {
            owner: key.owner,
            sort_key: key.sort_key,
            end_unix,
            payload,
        })
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::null_as_default;
use crate::error::ValidationError;

// ============================================================================
// Restaurant Settings - one row per tenant in `restaurants`
// ============================================================================

pub const TABLE_COUNT_RANGE: std::ops::RangeInclusive<u32> = 1..=100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestaurantSettings {
    pub id: i64,
    pub restaurant_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tax_enabled: bool,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dark_mode: bool,
    #[serde(default)]
    pub theme_color: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_bar: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_restaurant: bool,
    /// Percent
    #[serde(default, rename = "vat", alias = "vat_rate", deserialize_with = "null_as_default")]
    pub vat_rate: Decimal,
    /// Percent
    #[serde(default, rename = "igst", alias = "igst_rate", deserialize_with = "null_as_default")]
    pub igst_rate: Decimal,
    /// Percent
    #[serde(default, rename = "cgst", alias = "cgst_rate", deserialize_with = "null_as_default")]
    pub cgst_rate: Decimal,
    #[serde(default)]
    pub table_count: Option<u32>,
}

impl RestaurantSettings {
    /// Settings used before the tenant row has been fetched
    pub fn placeholder(restaurant_id: i64) -> Self {
        Self {
            id: restaurant_id,
            restaurant_name: "My Restaurant".to_string(),
            address: None,
            phone: None,
            tax_enabled: false,
            tax_id: None,
            dark_mode: false,
            theme_color: None,
            is_bar: false,
            is_restaurant: true,
            vat_rate: Decimal::ZERO,
            igst_rate: Decimal::ZERO,
            cgst_rate: Decimal::ZERO,
            table_count: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.restaurant_name.trim().is_empty() {
            return Err(ValidationError::MissingField("restaurant_name"));
        }

        for (field, rate) in [
            ("vat_rate", self.vat_rate),
            ("igst_rate", self.igst_rate),
            ("cgst_rate", self.cgst_rate),
        ] {
            if rate.is_sign_negative() && !rate.is_zero() {
                return Err(ValidationError::InvalidNumber {
                    field,
                    reason: "rate cannot be negative",
                });
            }
        }

        if let Some(count) = self.table_count {
            if !TABLE_COUNT_RANGE.contains(&count) {
                return Err(ValidationError::InvalidNumber {
                    field: "table_count",
                    reason: "must be between 1 and 100",
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_columns_read_as_defaults() {
        let json = r#"{
            "id": 4,
            "restaurant_name": "Spice Route",
            "tax_enabled": null,
            "vat": 5,
            "cgst_rate": null,
            "table_count": 12
        }"#;

        let settings: RestaurantSettings = serde_json::from_str(json).unwrap();

        assert!(!settings.tax_enabled);
        assert_eq!(settings.vat_rate, Decimal::from(5));
        assert_eq!(settings.cgst_rate, Decimal::ZERO);
        assert_eq!(settings.table_count, Some(12));
    }

    #[test]
    fn test_validate_rejects_negative_rates() {
        let mut settings = RestaurantSettings::placeholder(1);
        settings.cgst_rate = Decimal::from(-1);

        assert!(matches!(
            settings.validate(),
            Err(ValidationError::InvalidNumber { field: "cgst_rate", .. })
        ));
    }

    #[test]
    fn test_validate_requires_name() {
        let mut settings = RestaurantSettings::placeholder(1);
        settings.restaurant_name = "  ".to_string();

        assert!(matches!(
            settings.validate(),
            Err(ValidationError::MissingField("restaurant_name"))
        ));
    }

    #[test]
    fn test_validate_table_count_range() {
        let mut settings = RestaurantSettings::placeholder(1);
        for (count, ok) in [(0, false), (1, true), (100, true), (101, false)] {
            settings.table_count = Some(count);
            assert_eq!(settings.validate().is_ok(), ok, "table_count {count}");
        }

        settings.table_count = None;
        assert!(settings.validate().is_ok());
    }
}

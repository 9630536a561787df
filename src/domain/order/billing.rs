use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::value_objects::OrderItem;
use crate::domain::settings::RestaurantSettings;

// ============================================================================
// Billing Calculator
// ============================================================================
//
// compute(items, discount, policy) -> Bill
//
// - subtotal = Σ price × quantity (zero-quantity lines contribute nothing)
// - tax      = subtotal × effective rate
// - total    = subtotal + tax − discount, never below zero
//
// Pure: same input, same Bill.
//
// ============================================================================

/// How tax is derived from the subtotal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaxPolicy {
    /// One rate as a fraction (0.10 = 10%)
    Flat { rate: Decimal },
    /// Percent rates that are summed before applying to the subtotal
    Components {
        cgst: Decimal,
        igst: Decimal,
        vat: Decimal,
    },
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self::flat_percent(Decimal::TEN)
    }
}

impl TaxPolicy {
    pub fn flat_percent(percent: Decimal) -> Self {
        Self::Flat {
            rate: percent / Decimal::ONE_HUNDRED,
        }
    }

    /// Component rates when tax settings are enabled, the deployment default otherwise
    pub fn from_settings(settings: &RestaurantSettings, default: &TaxPolicy) -> Self {
        if !settings.tax_enabled {
            return default.clone();
        }

        let (cgst, igst) = if settings.is_restaurant {
            (settings.cgst_rate, settings.igst_rate)
        } else {
            (Decimal::ZERO, Decimal::ZERO)
        };
        let vat = if settings.is_bar {
            settings.vat_rate
        } else {
            Decimal::ZERO
        };

        Self::Components { cgst, igst, vat }
    }

    /// Effective rate as a fraction of the subtotal
    pub fn effective_rate(&self) -> Decimal {
        match self {
            Self::Flat { rate } => *rate,
            Self::Components { cgst, igst, vat } => (*cgst + *igst + *vat) / Decimal::ONE_HUNDRED,
        }
    }

    /// Human label, e.g. "Tax (10%)" or "Tax (CGST 9% + IGST 9%)"
    pub fn label(&self) -> String {
        match self {
            Self::Flat { rate } => format!("Tax ({}%)", percent(*rate * Decimal::ONE_HUNDRED)),
            Self::Components { cgst, igst, vat } => {
                let parts: Vec<String> = [("CGST", cgst), ("IGST", igst), ("VAT", vat)]
                    .into_iter()
                    .filter(|(_, rate)| !rate.is_zero())
                    .map(|(name, rate)| format!("{} {}%", name, percent(*rate)))
                    .collect();

                if parts.is_empty() {
                    "Tax (0%)".to_string()
                } else {
                    format!("Tax ({})", parts.join(" + "))
                }
            }
        }
    }
}

fn percent(value: Decimal) -> Decimal {
    value.normalize()
}

/// Money summary of an order
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bill {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

pub fn compute(items: &[OrderItem], discount: Decimal, policy: &TaxPolicy) -> Bill {
    let subtotal: Decimal = items
        .iter()
        .filter(|line| line.quantity > 0)
        .map(OrderItem::line_total)
        .sum();

    let tax = subtotal * policy.effective_rate();
    let total = (subtotal + tax - discount).max(Decimal::ZERO);

    Bill {
        subtotal,
        tax,
        discount,
        total,
    }
}

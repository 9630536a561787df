use rust_decimal::Decimal;

use crate::domain::menu::{GroupedMenuItem, MenuItem, MenuItemId};
use crate::domain::order::{DeliveryDetails, OrderId, SwitchTarget};
use crate::domain::user::NewAccount;
use crate::error::ValidationError;

// ============================================================================
// Dialog State Machines
// ============================================================================
//
// Each dialog is opened with its input, edited in place and consumed by a
// final `confirm`/`submit` that either yields the result or a
// ValidationError. A failed submit leaves the dialog open and unchanged.
//
// ============================================================================

pub const CUSTOM_CATEGORY: &str = "Custom";

// ============================================================================
// Portion Picker
// ============================================================================

#[derive(Debug, Clone)]
pub struct PortionPicker {
    group: GroupedMenuItem,
    selected: MenuItem,
}

impl PortionPicker {
    /// Opens on the first portion. None when the dish has nothing to pick.
    pub fn open(group: GroupedMenuItem) -> Option<Self> {
        let selected = group.portions.first()?.clone();
        Some(Self { group, selected })
    }

    pub fn title(&self) -> String {
        format!("Select Portion for {}", self.group.name)
    }

    pub fn options(&self) -> &[MenuItem] {
        &self.group.portions
    }

    pub fn selected(&self) -> &MenuItem {
        &self.selected
    }

    /// Select by portion label; unknown labels keep the current choice
    pub fn select(&mut self, portion: &str) -> bool {
        match self
            .group
            .portions
            .iter()
            .find(|item| item.portion.as_deref() == Some(portion))
        {
            Some(item) => {
                self.selected = item.clone();
                true
            }
            None => false,
        }
    }

    pub fn confirm(self) -> MenuItem {
        self.selected
    }
}

// ============================================================================
// Delivery Details Form
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryDetailsForm {
    pub phone_no: String,
    pub flat_no: String,
    pub building_no: String,
    pub address: String,
}

impl DeliveryDetailsForm {
    /// Prefilled from details already on the order
    pub fn from_details(details: Option<&DeliveryDetails>) -> Self {
        let Some(details) = details else {
            return Self::default();
        };

        Self {
            phone_no: details.phone_no.clone(),
            flat_no: details.flat_no.clone(),
            building_no: details.building_no.clone().unwrap_or_default(),
            address: details.address.clone().unwrap_or_default(),
        }
    }

    pub fn submit(&self) -> Result<DeliveryDetails, ValidationError> {
        let phone_no = self.phone_no.trim();
        let flat_no = self.flat_no.trim();

        if phone_no.is_empty() {
            return Err(ValidationError::MissingField("phone_no"));
        }
        if flat_no.is_empty() {
            return Err(ValidationError::MissingField("flat_no"));
        }

        let optional = |value: &str| Some(value.trim().to_string()).filter(|v| !v.is_empty());

        Ok(DeliveryDetails {
            phone_no: phone_no.to_string(),
            flat_no: flat_no.to_string(),
            building_no: optional(&self.building_no),
            address: optional(&self.address),
        })
    }
}

// ============================================================================
// Custom Item Form
// ============================================================================

/// An off-menu line. The price is kept as typed until submit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomItemForm {
    pub name: String,
    pub price: String,
}

impl CustomItemForm {
    pub fn new(name: impl Into<String>, price: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            price: price.into(),
        }
    }

    /// Build the menu item. `id` must be negative so it never matches a
    /// catalog item.
    pub fn submit(&self, id: MenuItemId) -> Result<MenuItem, ValidationError> {
        debug_assert!(id < 0);

        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingField("name"));
        }

        let price: Decimal = self
            .price
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidNumber {
                field: "price",
                reason: "not a number",
            })?;
        if price <= Decimal::ZERO {
            return Err(ValidationError::InvalidNumber {
                field: "price",
                reason: "must be greater than zero",
            });
        }

        Ok(MenuItem::new(id, name, price, CUSTOM_CATEGORY))
    }
}

// ============================================================================
// Sign-up Form
// ============================================================================

#[derive(Clone, Default, PartialEq)]
pub struct SignUpForm {
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub password: String,
}

impl SignUpForm {
    pub fn submit(&self) -> Result<NewAccount, ValidationError> {
        let required = |field: &'static str, value: &str| {
            let value = value.trim();
            if value.is_empty() {
                return Err(ValidationError::MissingField(field));
            }
            Ok(value.to_string())
        };

        let name = required("name", &self.name)?;
        let username = required("username", &self.username)?;
        let email = required("email", &self.email)?;
        let phone = required("phone", &self.phone)?
            .parse::<i64>()
            .map_err(|_| ValidationError::InvalidNumber {
                field: "phone",
                reason: "not a phone number",
            })?;
        if self.password.is_empty() {
            return Err(ValidationError::MissingField("password"));
        }

        Ok(NewAccount {
            name,
            username,
            email,
            phone: Some(phone),
            password: self.password.clone(),
        })
    }
}

// ============================================================================
// Switch Request
// ============================================================================

/// A context switch that would drop unconfirmed items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchRequest {
    pub target: SwitchTarget,
    pub discarding: OrderId,
}

impl SwitchRequest {
    pub fn message(&self) -> &'static str {
        "The current order has not been confirmed. Switching will discard its items."
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn biryani() -> GroupedMenuItem {
        GroupedMenuItem {
            name: "Biryani".to_string(),
            category: "Mains".to_string(),
            base_price: Decimal::from(8),
            portions: vec![
                MenuItem::new(1, "Biryani", Decimal::from(8), "Mains").with_portion("Regular"),
                MenuItem::new(2, "Biryani", Decimal::from(14), "Mains").with_portion("Large"),
            ],
        }
    }

    #[test]
    fn test_portion_picker_defaults_to_first() {
        let picker = PortionPicker::open(biryani()).unwrap();
        assert_eq!(picker.title(), "Select Portion for Biryani");
        assert_eq!(picker.selected().id, 1);
    }

    #[test]
    fn test_portion_picker_select_and_confirm() {
        let mut picker = PortionPicker::open(biryani()).unwrap();

        assert!(!picker.select("Family Pack"));
        assert!(picker.select("Large"));
        assert_eq!(picker.confirm().id, 2);
    }

    #[test]
    fn test_empty_group_has_no_picker() {
        let mut group = biryani();
        group.portions.clear();
        assert!(PortionPicker::open(group).is_none());
    }

    #[test]
    fn test_delivery_form_requires_phone_and_flat() {
        let mut form = DeliveryDetailsForm {
            phone_no: " ".to_string(),
            flat_no: "4B".to_string(),
            ..Default::default()
        };
        assert_eq!(form.submit(), Err(ValidationError::MissingField("phone_no")));

        form.phone_no = "555-0101".to_string();
        let details = form.submit().unwrap();
        assert_eq!(details.flat_no, "4B");
        assert_eq!(details.building_no, None);
    }

    #[test]
    fn test_delivery_form_prefills() {
        let details = DeliveryDetails {
            phone_no: "1".to_string(),
            flat_no: "2".to_string(),
            building_no: Some("Rose Court".to_string()),
            address: None,
        };

        let form = DeliveryDetailsForm::from_details(Some(&details));
        assert_eq!(form.building_no, "Rose Court");
        assert_eq!(form.submit().unwrap(), details);
    }

    #[test]
    fn test_custom_item_validation() {
        assert_eq!(
            CustomItemForm::new("", "5").submit(-1),
            Err(ValidationError::MissingField("name"))
        );
        assert!(matches!(
            CustomItemForm::new("Cake", "abc").submit(-1),
            Err(ValidationError::InvalidNumber { field: "price", .. })
        ));
        assert!(matches!(
            CustomItemForm::new("Cake", "0").submit(-1),
            Err(ValidationError::InvalidNumber { field: "price", .. })
        ));

        let item = CustomItemForm::new(" Birthday Cake ", "12.50").submit(-3).unwrap();
        assert_eq!(item.id, -3);
        assert_eq!(item.name, "Birthday Cake");
        assert_eq!(item.price, Decimal::new(1250, 2));
        assert_eq!(item.category, CUSTOM_CATEGORY);
    }

    #[test]
    fn test_sign_up_form() {
        let mut form = SignUpForm {
            name: " Asha ".to_string(),
            username: "asha".to_string(),
            email: "asha@example.com".to_string(),
            phone: "555 0100".to_string(),
            password: "secret".to_string(),
        };
        assert!(matches!(
            form.submit(),
            Err(ValidationError::InvalidNumber { field: "phone", .. })
        ));

        form.phone = "5550100".to_string();
        let account = form.submit().unwrap();
        assert_eq!(account.name, "Asha");
        assert_eq!(account.phone, Some(5550100));

        form.username = String::new();
        assert_eq!(form.submit(), Err(ValidationError::MissingField("username")));
    }
}

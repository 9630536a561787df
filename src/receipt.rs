use std::fmt::Write;

use rust_decimal::Decimal;

use crate::domain::order::{Order, OrderType};
use crate::domain::settings::RestaurantSettings;

// ============================================================================
// Receipt - fixed-width plain text for 58mm thermal paper
// ============================================================================

pub const WIDTH: usize = 32;

fn money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn rule(out: &mut String) {
    out.push_str(&"-".repeat(WIDTH));
    out.push('\n');
}

fn centered(out: &mut String, text: &str) {
    let _ = writeln!(out, "{text:^WIDTH$}");
}

/// Label left, amount right, on one line when they fit
fn columns(out: &mut String, left: &str, right: &str) {
    let used = left.chars().count() + right.chars().count();
    if used < WIDTH {
        let _ = writeln!(out, "{left}{}{right}", " ".repeat(WIDTH - used));
    } else {
        let _ = writeln!(out, "{left}");
        let _ = writeln!(out, "{right:>WIDTH$}");
    }
}

pub fn render(order: &Order, settings: &RestaurantSettings) -> String {
    let mut out = String::new();

    centered(&mut out, &settings.restaurant_name);
    centered(&mut out, &format!("Order {}", order.id));
    centered(&mut out, &order.created_at.format("%Y-%m-%d %H:%M").to_string());
    let context = match (order.order_type, order.table_number) {
        (OrderType::DineIn, Some(table)) => format!("Table: {}", table.0),
        (order_type, _) => format!("Type: {order_type}"),
    };
    centered(&mut out, &context);

    rule(&mut out);
    columns(&mut out, "Item", "Amount");
    for line in &order.items {
        let _ = writeln!(out, "{}", line.item.display_name());
        columns(
            &mut out,
            &format!("  {} x {}", line.quantity, money(line.item.price)),
            &money(line.line_total()),
        );
    }
    rule(&mut out);

    columns(&mut out, "Subtotal", &money(order.subtotal));
    columns(&mut out, &order.tax_label(), &money(order.tax));
    if order.discount > Decimal::ZERO {
        columns(&mut out, "Discount", &format!("-{}", money(order.discount)));
    }
    rule(&mut out);
    columns(&mut out, "Total:", &format!("Rs.{}", money(order.total)));
    rule(&mut out);

    let method = order
        .payment_method
        .map(|method| method.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    centered(&mut out, &format!("Paid via: {method}"));
    centered(&mut out, "Thank you for your visit!");
    if let Some(address) = settings.address.as_deref().filter(|a| !a.is_empty()) {
        centered(&mut out, address);
    }

    out
}

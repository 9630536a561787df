use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::order::Order;

// ============================================================================
// Dashboard - sales figures over completed orders
// ============================================================================

const TREND_DAYS: u64 = 7;
const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySales {
    pub date: NaiveDate,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySales {
    pub category: String,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesSummary {
    pub total_revenue: Decimal,
    pub order_count: usize,
    pub average_order_value: Decimal,
    /// Last seven days ending `today`, oldest first; days without sales are zero
    pub daily: Vec<DailySales>,
    /// Line revenue per menu category, largest first
    pub categories: Vec<CategorySales>,
}

/// Figures over `completed`, with the daily trend ending on `today`.
/// Orders are bucketed by the UTC date they were created.
pub fn summarize(completed: &[Order], today: NaiveDate) -> SalesSummary {
    let total_revenue: Decimal = completed.iter().map(|order| order.total).sum();
    let order_count = completed.len();
    let average_order_value = if order_count == 0 {
        Decimal::ZERO
    } else {
        total_revenue / Decimal::from(order_count)
    };

    SalesSummary {
        total_revenue,
        order_count,
        average_order_value,
        daily: daily_sales(completed, today),
        categories: category_sales(completed),
    }
}

fn daily_sales(completed: &[Order], today: NaiveDate) -> Vec<DailySales> {
    let mut by_day: HashMap<NaiveDate, Decimal> = HashMap::new();
    for order in completed {
        *by_day.entry(order.created_at.date_naive()).or_default() += order.total;
    }

    (0..TREND_DAYS)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .map(|date| DailySales {
            date,
            total: by_day.get(&date).copied().unwrap_or_default(),
        })
        .collect()
}

fn category_sales(completed: &[Order]) -> Vec<CategorySales> {
    let mut by_category: HashMap<&str, Decimal> = HashMap::new();
    for line in completed.iter().flat_map(|order| &order.items) {
        let category = match line.item.category.trim() {
            "" => UNCATEGORIZED,
            category => category,
        };
        *by_category.entry(category).or_default() += line.line_total();
    }

    let mut categories: Vec<CategorySales> = by_category
        .into_iter()
        .map(|(category, revenue)| CategorySales {
            category: category.to_string(),
            revenue,
        })
        .collect();

    // Name breaks ties so the order is stable
    categories.sort_by(|a, b| b.revenue.cmp(&a.revenue).then_with(|| a.category.cmp(&b.category)));
    categories
}

// ============================================================================
// Pagination
// ============================================================================

/// One page of a list (1-based)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Slice out `page`. Pages past the end, page 0 and `per_page == 0` give no items.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let total = items.len();
    let total_pages = if per_page == 0 { 0 } else { total.div_ceil(per_page) };

    let slice = match page.checked_sub(1) {
        Some(index) if per_page > 0 => items
            .iter()
            .skip(index.saturating_mul(per_page))
            .take(per_page)
            .cloned()
            .collect(),
        _ => Vec::new(),
    };

    Page {
        items: slice,
        page,
        per_page,
        total,
        total_pages,
    }
}

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use restaurant_pos::domain::menu::MenuItem;
use restaurant_pos::domain::order::{PaymentMethod, TableNumber};
use restaurant_pos::domain::user::User;
use restaurant_pos::metrics::Metrics;
use restaurant_pos::remote::{PgChangeFeed, PostgrestBackend};
use restaurant_pos::rest::RestClient;
use restaurant_pos::store::FileStorage;
use restaurant_pos::{Config, Session, SessionDeps, SwitchOutcome};

const DEFAULT_RESTAURANT_ID: i64 = 1;

// How long to keep draining change notifications after the demo
const DRAIN_WINDOW: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO with debug for this crate, override with RUST_LOG
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,restaurant_pos=debug")),
        )
        .init();

    tracing::info!("Starting restaurant POS");

    // === 1. Configuration and collaborators ===
    let config = Config::from_env();
    let metrics = Arc::new(Metrics::new()?);
    let storage = Arc::new(FileStorage::open(&config.data_dir).await?);

    let mut deps = SessionDeps::offline(storage, metrics.clone()).with_default_tax(config.tax_policy());

    if let Some(backend) = &config.backend {
        let client = RestClient::new(&backend.url, backend.api_key.clone())?;
        deps = deps.with_backend(Arc::new(PostgrestBackend::new(client)));
        tracing::info!(url = %backend.url, "Using remote backend");
    }

    if let Some(database_url) = &config.database_url {
        let feed = PgChangeFeed::new(database_url.clone());
        match feed.install_schema().await {
            Ok(()) => deps = deps.with_feed(Arc::new(feed)),
            Err(e) => tracing::warn!(error = %e, "Realtime unavailable, continuing without change feed"),
        }
    }

    // === 2. Session ===
    let mut session = match Session::restore(deps.clone()).await? {
        Some(session) => session,
        None => {
            let user = User {
                id: 1,
                username: "demo".to_string(),
                role: "admin".to_string(),
                name: "Demo".to_string(),
                phone: None,
                email: String::new(),
                restaurant_id: config.restaurant_id.unwrap_or(DEFAULT_RESTAURANT_ID),
            };
            Session::login(deps, user).await?
        }
    };

    let mut changes = session.subscribe_changes().await?;

    // === 3. Demonstrate an order lifecycle ===
    if session.menu().is_empty() {
        for (name, price, category) in [
            ("Masala Dosa", Decimal::new(450, 2), "Mains"),
            ("Filter Coffee", Decimal::new(120, 2), "Drinks"),
        ] {
            session
                .create_menu_item(MenuItem::new(0, name, price, category))
                .await?;
        }
    }

    if let SwitchOutcome::NeedsConfirmation(request) = session.select_table(TableNumber(1)).await? {
        tracing::info!(prompt = request.message(), "Discarding leftover order");
        session.confirm_switch().await?;
    }

    let item_ids: Vec<i64> = session.menu().orderable().map(|item| item.id).take(2).collect();
    for id in &item_ids {
        session.add_item(*id).await?;
    }
    if let Some(first) = item_ids.first() {
        session.add_item(*first).await?;
    }

    // A restored session may already hold a confirmed order for the table
    let ticket = match session.current_order() {
        Some(order) if order.is_confirmed() => order.id,
        _ => session.confirm_order().await?,
    };
    tracing::info!(order_id = %ticket, bill = ?session.bill(), "Order sent to kitchen");

    let paid = session.complete_order(PaymentMethod::Cash).await?;
    println!("{}", session.receipt(&paid));

    // === 4. Apply whatever the backend reported meanwhile ===
    while let Ok(Some(event)) = tokio::time::timeout(DRAIN_WINDOW, changes.next()).await {
        if let Err(e) = session.handle_change(&event).await {
            tracing::warn!(table = event.table.as_str(), error = %e, "Failed to apply change");
        }
    }

    let summary = session.sales_summary();
    tracing::info!(
        orders = summary.order_count,
        revenue = %summary.total_revenue,
        average = %summary.average_order_value,
        "Sales summary"
    );

    println!("{}", metrics.encode_text()?);
    Ok(())
}

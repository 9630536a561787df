use std::sync::Arc;

use futures_util::StreamExt;
use rust_decimal::Decimal;

use restaurant_pos::dialogs::{CustomItemForm, DeliveryDetailsForm, PortionPicker};
use restaurant_pos::domain::kitchen::KitchenStatus;
use restaurant_pos::domain::menu::MenuItem;
use restaurant_pos::domain::order::{OrderType, PaymentMethod, TableNumber};
use restaurant_pos::domain::user::User;
use restaurant_pos::metrics::Metrics;
use restaurant_pos::remote::{InMemoryBackend, RemoteBackend};
use restaurant_pos::store::MemoryStorage;
use restaurant_pos::sync::Refetch;
use restaurant_pos::{Session, SessionDeps, SwitchOutcome};

const RESTAURANT: i64 = 3;

fn cashier(id: i64) -> User {
    User {
        id,
        username: format!("cashier{id}"),
        role: "staff".to_string(),
        name: format!("Cashier {id}"),
        phone: None,
        email: format!("cashier{id}@example.com"),
        restaurant_id: RESTAURANT,
    }
}

async fn backend() -> Arc<InMemoryBackend> {
    let backend = Arc::new(InMemoryBackend::new());
    for item in [
        MenuItem::new(0, "Biryani", Decimal::new(800, 2), "Mains").with_portion("Regular"),
        MenuItem::new(0, "Biryani", Decimal::new(1400, 2), "Mains").with_portion("Family Pack"),
        MenuItem::new(0, "Lassi", Decimal::new(250, 2), "Drinks"),
    ] {
        backend.add_menu_item(RESTAURANT, &item).await.unwrap();
    }
    backend
}

async fn terminal(backend: &Arc<InMemoryBackend>, user_id: i64) -> Session {
    let metrics = Arc::new(Metrics::new().unwrap());
    let deps = SessionDeps::offline(Arc::new(MemoryStorage::new()), metrics)
        .with_backend(backend.clone())
        .with_feed(backend.clone());
    Session::login(deps, cashier(user_id)).await.unwrap()
}

fn lassi(session: &Session) -> i64 {
    session
        .menu()
        .items()
        .iter()
        .find(|item| item.name == "Lassi")
        .map(|item| item.id)
        .unwrap()
}

#[tokio::test]
async fn dine_in_order_from_table_to_receipt() {
    let backend = backend().await;
    let mut session = terminal(&backend, 1).await;

    session.select_table(TableNumber(5)).await.unwrap();

    let group = session.menu().group("Biryani").unwrap();
    let mut picker = PortionPicker::open(group).unwrap();
    assert!(picker.select("Family Pack"));
    session.add_portion(picker).await.unwrap();
    session.add_item(lassi(&session)).await.unwrap();
    session.add_item(lassi(&session)).await.unwrap();
    session
        .add_custom_item(&CustomItemForm::new("Birthday candle", "1"))
        .await
        .unwrap();

    // 14 + 2 x 2.50 + 1 = 20, 10% tax
    let bill = session.bill();
    assert_eq!(bill.subtotal, Decimal::from(20));
    assert_eq!(bill.total, Decimal::from(22));

    let ticket = session.confirm_order().await.unwrap();
    assert!(session.occupied_tables().contains(&TableNumber(5)));
    assert_eq!(session.kitchen().preparing().count(), 1);

    let kitchen_id = session.kitchen().all()[0].id;
    session
        .set_kitchen_status(kitchen_id, KitchenStatus::Ready)
        .await
        .unwrap();

    let paid = session.complete_order(PaymentMethod::Card).await.unwrap();
    assert_eq!(paid.id, ticket);
    assert!(!session.occupied_tables().contains(&TableNumber(5)));

    let receipt = session.receipt(&paid);
    assert!(receipt.contains(&format!("Order {ticket}")));
    assert!(receipt.contains("Birthday candle"));
    assert!(receipt.contains("Paid via: Card"));

    let remote_history = backend.completed_orders(RESTAURANT).await.unwrap();
    assert_eq!(remote_history.len(), 1);
    assert_eq!(session.sales_summary().total_revenue, Decimal::from(22));

    let metrics = session.metrics().encode_text().unwrap();
    assert!(metrics.contains("pos_orders_completed_total"));
}

#[tokio::test]
async fn second_terminal_sees_confirmed_orders() {
    let backend = backend().await;
    let mut front = terminal(&backend, 1).await;
    let mut bar = terminal(&backend, 2).await;
    let mut bar_changes = bar.subscribe_changes().await.unwrap();

    front.select_table(TableNumber(2)).await.unwrap();
    front.add_item(lassi(&front)).await.unwrap();
    let ticket = front.confirm_order().await.unwrap();

    // Order insert and kitchen insert
    for _ in 0..2 {
        let event = bar_changes.next().await.unwrap();
        bar.handle_change(&event).await.unwrap();
    }

    assert!(bar.active_orders().iter().any(|order| order.id == ticket));
    assert_eq!(bar.kitchen().len(), 1);
    assert!(bar.occupied_tables().contains(&TableNumber(2)));

    // The bar picks the order up and adds to it
    assert_eq!(bar.select_order(ticket).await.unwrap(), SwitchOutcome::Switched);
    bar.add_item(lassi(&bar)).await.unwrap();

    front.refetch(Refetch::Orders).await.unwrap();
    let seen = front.current_order().unwrap();
    assert_eq!(seen.id, ticket);
    assert_eq!(seen.item_count(), 2);
}

#[tokio::test]
async fn delivery_order_with_pending_switch() {
    let backend = backend().await;
    let mut session = terminal(&backend, 1).await;

    session.set_order_type(OrderType::Delivery).await.unwrap();
    session.add_item(lassi(&session)).await.unwrap();

    // Walking away from unconfirmed items asks first
    let outcome = session.select_table(TableNumber(1)).await.unwrap();
    assert!(matches!(outcome, SwitchOutcome::NeedsConfirmation(_)));
    assert!(session.cancel_switch());

    let form = DeliveryDetailsForm {
        phone_no: "5550101".to_string(),
        flat_no: "12".to_string(),
        building_no: "Palm Court".to_string(),
        address: String::new(),
    };
    session.set_delivery_details(&form).await.unwrap();
    let ticket = session.confirm_order().await.unwrap();

    let remote = backend.active_orders(RESTAURANT).await.unwrap();
    let stored = remote.iter().find(|order| order.id == ticket).unwrap();
    assert_eq!(stored.order_type, OrderType::Delivery);
    assert_eq!(
        stored.delivery.as_ref().and_then(|d| d.building_no.as_deref()),
        Some("Palm Court")
    );
}

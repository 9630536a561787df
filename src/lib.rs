// ============================================================================
// Restaurant POS core
// ============================================================================
//
// domain         : orders (aggregate, billing, slots), menu, kitchen, settings
// event_sourcing : aggregate and event-envelope abstractions
// store          : local persistence of orders and the signed-in user
// remote, rest   : hosted backend, change feed and the REST helper
// session        : application state of one signed-in terminal
// kitchen, menu, dialogs, dashboard, receipt : what the screens read
//
// ============================================================================

pub mod config;
pub mod dashboard;
pub mod dialogs;
pub mod domain;
pub mod error;
pub mod event_sourcing;
pub mod kitchen;
pub mod menu;
pub mod metrics;
pub mod receipt;
pub mod remote;
pub mod rest;
pub mod session;
pub mod store;
pub mod sync;

pub use config::Config;
pub use error::{PosError, PosResult};
pub use session::{Session, SessionDeps, SwitchOutcome};

//! HTTP routes
//!
//! `/` serves the embedded landing page, `/webhook` accepts callbacks and
//! describes itself on GET.

pub mod webhook;

use axum::{Router, routing};

use crate::SharedState;
use crate::ui::root;

pub use webhook::{handle_webhook, webhook_info};

/// Build the application router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/", routing::get(root))
        .route("/webhook", routing::post(handle_webhook).get(webhook_info))
        .with_state(state)
}

//! Router

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::handlers::{account, coffee, download, orders, products, upload, webhook};
use crate::state::AppState;

/// API routes without static files or middleware
pub fn api() -> Router<AppState> {
    Router::new()
        // Health & session
        .route("/health", get(account::health_check))
        .route("/api/me", get(account::me))
        // Catalogue
        .route(
            "/api/products",
            get(products::list_products).post(products::create_product),
        )
        .route("/api/products/{id}", get(products::get_product))
        .route("/api/products/{id}/publish", post(products::publish_product))
        .route("/api/seller/products", get(products::seller_products))
        // Admin review
        .route("/api/admin/products", get(products::admin_products))
        .route(
            "/api/admin/products/{id}/approve",
            post(products::approve_product),
        )
        .route(
            "/api/admin/products/{id}/reject",
            post(products::reject_product),
        )
        // Purchases
        .route("/api/checkout", post(orders::create_checkout))
        .route("/api/orders", get(orders::list_orders))
        .route(
            "/api/download",
            get(download::download).post(download::trailer),
        )
        .route("/api/upload", post(upload::upload))
        // Donations
        .route(
            "/api/coffee/link",
            get(coffee::get_link).post(coffee::generate_link),
        )
        .route("/api/coffee/payments", get(coffee::recent_payments))
        .route("/api/coffee/{slug}", get(coffee::public_link))
        .route("/api/create-payment", post(coffee::create_payment))
        .route("/api/payment-status", get(coffee::payment_status))
        // Gateway notifications
        .route("/webhook", post(webhook::paychangu_webhook))
        .route("/api/paychangu-webhook", post(webhook::paychangu_webhook))
}

/// Full application: API, WASM frontend, CORS and request tracing
pub fn app(state: AppState, static_dir: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Client-side routes fall back to the SPA shell
    let frontend = ServeDir::new(static_dir)
        .fallback(ServeFile::new(format!("{static_dir}/index.html")));

    api()
        .fallback_service(frontend)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

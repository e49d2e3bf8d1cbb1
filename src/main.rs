mod cache;
mod config;
mod database;
mod error;
mod gateway;
mod handlers;
mod middleware;
mod models;
mod state;
mod stock;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use dotenvy::dotenv;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use cache::ListCache;
use config::Config;
use database::create_database_pool;
use gateway::MpesaGateway;
use state::AppState;

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    let config = Config::from_env().expect("DATABASE_URL and JWT_SECRET must be set");

    let db = create_database_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    log::info!("Database connection successful");

    let state = AppState {
        db,
        cache: ListCache::new(Duration::from_secs(15 * 60)),
        gateway: MpesaGateway::new(config.mpesa.clone()),
        config: Arc::new(config),
    };

    let addr = format!("0.0.0.0:{}", state.config.port);
    let app = create_router(state);

    log::info!("onepoint server starting on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");
    axum::serve(listener, app).await.expect("Server error");
}

fn create_router(state: AppState) -> Router {
    Router::new()
        // Auth (no token required)
        .route("/signup", post(handlers::auth::signup))
        .route("/login", post(handlers::auth::login))
        // Products
        .route(
            "/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route(
            "/products/:id",
            get(handlers::products::get_product)
                .put(handlers::products::update_product)
                .patch(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )
        .route("/products/:id/sale", post(handlers::products::sell_product))
        .route(
            "/vehicles",
            get(handlers::products::list_vehicles).post(handlers::products::create_vehicle),
        )
        // Sales
        .route(
            "/sales",
            get(handlers::sales::list_sales).post(handlers::sales::record_transaction),
        )
        .route("/sales/summary", get(handlers::sales::sales_summary))
        .route("/sales/:id", get(handlers::sales::get_sale))
        .route("/sales/:id/approve", post(handlers::sales::approve_sale))
        .route("/sales/:id/reject", post(handlers::sales::reject_sale))
        // Customers
        .route(
            "/customers",
            get(handlers::customers::list_customers).post(handlers::customers::create_customer),
        )
        .route("/customers/:id", get(handlers::customers::get_customer))
        .route(
            "/customers/:id/payments",
            post(handlers::customers::record_payment),
        )
        // Payments (callback is gateway-originated, no bearer token)
        .route("/payments/initiate", post(handlers::payments::initiate_payment))
        .route("/payments/callback", post(handlers::payments::payment_callback))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(1024 * 1024)), // 1MB
        )
        .with_state(state)
}

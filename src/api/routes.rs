use axum::routing::get;
use axum::Router;

use super::{handlers, ApiState};

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        // Health
        .route("/health", get(handlers::health))
        .route("/health/detailed", get(handlers::health_detailed))
        // Instrument lookups
        .route("/api/v1/instruments/ric/:ric", get(handlers::find_by_ric))
        .route("/api/v1/instruments/id/:id", get(handlers::find_by_id))
        .route("/api/v1/instruments/exchanges", get(handlers::list_exchanges))
        .route(
            "/api/v1/instruments/exchanges-by-region",
            get(handlers::exchanges_by_region),
        )
        .route("/api/v1/instruments/exchange/:exchange", get(handlers::get_by_exchange))
        .route(
            "/api/v1/instruments/exchange/:exchange/filter",
            get(handlers::filter_by_column),
        )
        // Validation
        .route(
            "/api/v1/rules/validate/:product_type/:exchange",
            get(handlers::validate).post(handlers::validate),
        )
        .route(
            "/api/v1/rules/validate-custom/:product_type/:exchange",
            get(handlers::validate_custom).post(handlers::validate_custom),
        )
        // Rule inspection
        .route(
            "/api/v1/rules/rules/:product_type/:exchange",
            get(handlers::rules_for_exchange),
        )
        .route(
            "/api/v1/rules/rules-yaml/:product_type/:exchange",
            get(handlers::rules_for_exchange_yaml),
        )
        .route(
            "/api/v1/rules/combined-rules/:product_type/:exchange",
            get(handlers::combined_rules),
        )
        .route(
            "/api/v1/rules/combined-rules-details/:product_type/:exchange",
            get(handlers::combined_rules_details),
        )
        .route(
            "/api/v1/rules/validate-by-masterid/:master_id/:combined_rule",
            get(handlers::validate_by_masterid),
        )
        .with_state(state)
}

use std::sync::Arc;

use axum::{
    Router,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    AppState,
    middleware::{RateLimiter, auth_middleware, log_errors, rate_limit},
    routes::{admin, customer, system},
};

fn cors_layer(state: &AppState) -> Option<CorsLayer> {
    if state.config.is_development() {
        tracing::debug!("Adding permissive CORS layer for development mode");
        return Some(CorsLayer::permissive());
    }

    match HeaderValue::from_str(&state.config.frontend_url) {
        Ok(origin) => Some(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any),
        ),
        Err(_) => {
            tracing::warn!(
                "FRONTEND_URL {} is not a valid origin, CORS disabled",
                state.config.frontend_url
            );
            None
        }
    }
}

/// 组装全部路由，挂载在 `API_BASE_URI` 之下
///
/// 客户公开接口可能触发多次上游请求，配置了限流器时只对它们限流。
pub fn create_router(state: AppState, rate_limiter: Option<Arc<RateLimiter>>) -> Router {
    let open_routes = Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health))
        .route("/admin/login", post(admin::login));

    let mut customer_routes = Router::new()
        .route("/customer/{uuid}", get(customer::get_balance))
        .route("/customer/{uuid}/qr", get(customer::get_qr_code));
    if let Some(limiter) = rate_limiter {
        customer_routes = customer_routes.route_layer(from_fn_with_state(limiter, rate_limit));
    }

    let admin_routes = Router::new()
        .route("/admin/customers/search", get(admin::search_customers))
        .route("/admin/customers/all", get(admin::list_customers))
        .route("/admin/customers/link", post(admin::link_customer))
        .route("/admin/customers/links", get(admin::list_links))
        .route("/admin/customers/link/{uuid}", delete(admin::delete_link))
        .route("/admin/customers/refresh", post(admin::refresh_customers))
        // 应用认证中间件
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    let api = Router::new()
        .merge(open_routes)
        .merge(customer_routes)
        .merge(admin_routes);

    let base = state.config.api_base_uri.clone();
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(&base, api)
    };

    let router = router
        .layer(from_fn_with_state(state.clone(), log_errors))
        .layer(TraceLayer::new_for_http());

    let router = match cors_layer(&state) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

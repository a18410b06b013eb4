use axum::{
    Json,
    body::{Body, to_bytes},
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::{
    AppState,
    error::{ErrorDetail, ErrorResponse},
};

const MAX_LOGGED_BODY: usize = 64 * 1024;

/// 记录所有 5xx 响应；开发环境下把内部错误信息附加到响应体
pub async fn log_errors(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;

    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let detail = parts.extensions.remove::<ErrorDetail>();
    let bytes = match to_bytes(body, MAX_LOGGED_BODY).await {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to read error response body: {}", e);
            return Response::from_parts(parts, Body::empty());
        }
    };
    let body_str = String::from_utf8_lossy(&bytes);

    error!(
        "Server error occurred - {} {} Status: {}, Body: {}, Detail: {}",
        method,
        uri,
        parts.status,
        body_str,
        detail.as_ref().map(|d| d.0.as_str()).unwrap_or("-")
    );

    // 重置body以便重新构建响应
    parts.headers.remove(header::CONTENT_LENGTH);

    if state.config.is_development() {
        if let Some(ErrorDetail(internal)) = detail {
            let public = serde_json::from_slice::<serde_json::Value>(&bytes)
                .ok()
                .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
                .unwrap_or_else(|| body_str.into_owned());
            let body = Json(ErrorResponse {
                detail: public,
                error: Some(internal),
            });
            return (parts.status, parts.headers, body).into_response();
        }
    }

    Response::from_parts(parts, Body::from(bytes))
}

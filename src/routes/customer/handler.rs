use axum::{
    extract::{Json, Path, State},
    http::header,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::AppError,
    operations::{BalanceResolver, BalanceView},
    utils::qr,
};

/// 公开余额查询，无需登录
#[axum::debug_handler]
pub async fn get_balance(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<Json<BalanceView>, AppError> {
    let pages = state.pages();
    let resolver = BalanceResolver::new(
        state.links.as_ref(),
        state.customers.as_ref(),
        &pages,
        state.config.ewity_max_pages,
    );

    Ok(Json(resolver.resolve(&uuid).await?))
}

#[axum::debug_handler]
pub async fn get_qr_code(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let not_found = || AppError::NotFound("Customer not found".into());
    let uuid = Uuid::parse_str(uuid.trim()).map_err(|_| not_found())?;
    let link = state.links.find_by_uuid(uuid).await?.ok_or_else(not_found)?;

    let url = qr::balance_url(&state.config.frontend_url, &link.uuid.to_string());
    let png = qr::render_png(&url).map_err(|e| AppError::Internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/png"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        png,
    ))
}

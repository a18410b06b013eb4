use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};

use crate::{AppState, database::models::user::ADMIN_ROLE, error::AppError, utils::verify_token};

/// 校验 Bearer 令牌，仅放行管理员；通过后把 `Claims` 放入请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer.map_err(|rejection| {
        if rejection.is_missing() {
            AppError::Unauthorized("No token provided".into())
        } else {
            AppError::Unauthorized("Invalid or expired token".into())
        }
    })?;

    let claims = verify_token(bearer.token(), &state.config).map_err(|e| {
        tracing::debug!("Token rejected: {}", e);
        AppError::Unauthorized("Invalid or expired token".into())
    })?;

    if claims.role != ADMIN_ROLE {
        return Err(AppError::Forbidden("Not authorized".into()));
    }

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

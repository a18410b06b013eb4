use axum::{
    Extension,
    extract::{
        Json, Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};

use crate::{
    AppState,
    error::AppError,
    ewity::CustomerPageSource,
    operations::{self, CustomerSync},
    utils::{Claims, generate_token, verify_password},
};

use super::model::{
    CustomerListResponse, LinkCustomerRequest, LinkView, LoginRequest, LoginResponse,
    MessageResponse, PageQuery, RefreshResponse, SEARCH_PAGE_SIZE, SearchQuery,
};

fn bad_json(rejection: JsonRejection) -> AppError {
    AppError::Validation(rejection.body_text())
}

fn bad_query(rejection: QueryRejection) -> AppError {
    AppError::Validation(rejection.body_text())
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    req: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(req) = req.map_err(bad_json)?;
    let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let (Some(username), Some(password)) = (present(req.username), present(req.password)) else {
        return Err(AppError::Validation("Username and password required".into()));
    };

    let bad_credentials = || AppError::Unauthorized("Incorrect username or password".into());

    let user = state
        .users
        .find_by_username(username.trim())
        .await?
        .ok_or_else(bad_credentials)?;

    let verified = verify_password(&password, &user.password_hash).map_err(|e| {
        AppError::Internal(format!("Password verification failed: {}", e))
    })?;
    if !verified {
        tracing::info!("Failed login attempt for {}", user.username);
        return Err(bad_credentials());
    }

    if !user.is_admin() {
        return Err(AppError::Forbidden("Not authorized".into()));
    }

    let access_token = generate_token(user.id, &user.role, &state.config)
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

    tracing::info!("Admin {} logged in", user.username);
    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer",
    }))
}

#[axum::debug_handler]
pub async fn search_customers(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<Json<CustomerListResponse>, AppError> {
    let Query(query) = query.map_err(bad_query)?;
    let q = query.q.unwrap_or_default();
    let q = q.trim();
    if q.chars().count() < 2 {
        return Err(AppError::Validation(
            "Query must be at least 2 characters".into(),
        ));
    }

    let page = query.page.unwrap_or(1).max(1);
    let limit = SEARCH_PAGE_SIZE as i64;
    let offset = (page as i64 - 1) * limit;

    let (rows, total) = state.customers.search(q, limit, offset).await?;
    Ok(Json(CustomerListResponse::from_search(&rows, page, total)))
}

#[axum::debug_handler]
pub async fn list_customers(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<CustomerListResponse>, AppError> {
    let Query(query) = query.map_err(bad_query)?;
    let page = query.page.unwrap_or(1).max(1);

    let listing = state.pages().fetch_page(page).await?;
    Ok(Json(CustomerListResponse::from_upstream(&listing, page)))
}

#[axum::debug_handler]
pub async fn link_customer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    req: Result<Json<LinkCustomerRequest>, JsonRejection>,
) -> Result<Json<LinkView>, AppError> {
    let Json(req) = req.map_err(bad_json)?;
    let created_by = claims
        .user_id()
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".into()))?;

    let link = operations::create_link(
        state.links.as_ref(),
        state.customers.as_ref(),
        created_by,
        req.into(),
    )
    .await?;

    Ok(Json(LinkView::from(link)))
}

#[axum::debug_handler]
pub async fn list_links(State(state): State<AppState>) -> Result<Json<Vec<LinkView>>, AppError> {
    let links = state.links.list().await?;
    Ok(Json(links.into_iter().map(LinkView::from).collect()))
}

#[axum::debug_handler]
pub async fn delete_link(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    operations::delete_link(state.links.as_ref(), &uuid).await?;
    Ok(Json(MessageResponse {
        message: "Link deleted successfully",
    }))
}

/// 失败时仍返回 200，由 `success` 字段表示结果
#[axum::debug_handler]
pub async fn refresh_customers(State(state): State<AppState>) -> Json<RefreshResponse> {
    let sync = CustomerSync::new(
        state.pos.as_ref(),
        state.customers.as_ref(),
        state.links.as_ref(),
    );

    match sync.run().await {
        Ok(report) => Json(RefreshResponse {
            success: true,
            report: Some(report),
            error: None,
        }),
        Err(e) => {
            tracing::error!("Customer sync failed: {}", e);
            let error = if state.config.is_development() {
                e.to_string()
            } else {
                e.public_detail()
            };
            Json(RefreshResponse {
                success: false,
                report: None,
                error: Some(error),
            })
        }
    }
}

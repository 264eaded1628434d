use actix_web::{web, HttpResponse};

use crate::app_state::AppState;
use crate::context::RequestContext;
use crate::error::AppError;
use crate::response;
use crate::services::users::{self, UpdateUserRequest};

/// GET /api/users
pub async fn list_users(
    data: web::Data<AppState>,
    ctx: RequestContext,
) -> Result<HttpResponse, AppError> {
    Ok(response::ok(users::list_users(&data, &ctx).await?))
}

/// GET /api/users/{user_id}
pub async fn get_user(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    Ok(response::ok(users::get_user(&data, &ctx, &path).await?))
}

/// PUT /api/users/{user_id}
pub async fn update_user(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
    payload: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, AppError> {
    let profile = users::update_user(&data, &ctx, &path, payload.into_inner()).await?;
    Ok(response::ok(profile))
}

/// DELETE /api/users/{user_id}
pub async fn delete_user(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    users::delete_user(&data, &ctx, &path).await?;
    Ok(response::message("User deleted"))
}

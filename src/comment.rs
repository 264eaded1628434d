use actix_web::{web, HttpResponse};

use crate::app_state::AppState;
use crate::context::RequestContext;
use crate::error::AppError;
use crate::response;
use crate::services::comments::{self, CommentRequest};

/// GET /api/tickets/{ticket_id}/comments
pub async fn list_comments(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    Ok(response::ok(comments::list_comments(&data, &ctx, &path).await?))
}

/// POST /api/tickets/{ticket_id}/comments
pub async fn create_comment(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
    payload: web::Json<CommentRequest>,
) -> Result<HttpResponse, AppError> {
    let comment = comments::create_comment(&data, &ctx, &path, payload.into_inner()).await?;
    Ok(response::created(comment))
}

/// PUT /api/comments/{comment_id}
pub async fn update_comment(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
    payload: web::Json<CommentRequest>,
) -> Result<HttpResponse, AppError> {
    let comment = comments::update_comment(&data, &ctx, &path, payload.into_inner()).await?;
    Ok(response::ok(comment))
}

/// DELETE /api/comments/{comment_id}
pub async fn delete_comment(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    comments::delete_comment(&data, &ctx, &path).await?;
    Ok(response::message("Comment deleted"))
}

// src/ticket.rs

use actix_web::{http::header, web, HttpRequest, HttpResponse};

use crate::app_state::AppState;
use crate::context::RequestContext;
use crate::error::AppError;
use crate::models::TicketFilter;
use crate::response;
use crate::services::tickets::{self, CreateTicketRequest, UpdateTicketRequest};

/// POST /api/projects/{project_id}/tickets
pub async fn create_ticket(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
    payload: web::Json<CreateTicketRequest>,
) -> Result<HttpResponse, AppError> {
    let ticket = tickets::create_ticket(&data, &ctx, &path, payload.into_inner()).await?;
    Ok(response::created(ticket))
}

/// GET /api/projects/{project_id}/tickets
pub async fn list_project_tickets(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let filter = TicketFilter::for_project(&path);
    Ok(response::ok(tickets::list_tickets(&data, &ctx, &filter).await?))
}

/// GET /api/tickets?projectId=&assigneeId=&reporterId=&status=
pub async fn list_tickets(
    data: web::Data<AppState>,
    ctx: RequestContext,
    query: web::Query<TicketFilter>,
) -> Result<HttpResponse, AppError> {
    Ok(response::ok(tickets::list_tickets(&data, &ctx, &query).await?))
}

/// GET /api/tickets/{ticket_id}
pub async fn get_ticket(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    Ok(response::ok(tickets::get_ticket(&data, &ctx, &path).await?))
}

/// PUT /api/tickets/{ticket_id}
pub async fn update_ticket(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
    payload: web::Json<UpdateTicketRequest>,
) -> Result<HttpResponse, AppError> {
    let ticket = tickets::update_ticket(&data, &ctx, &path, payload.into_inner()).await?;
    Ok(response::ok(ticket))
}

/// PUT /api/tickets/{ticket_id}/photo
/// The body is the raw image; its Content-Type must be an image type.
pub async fn upload_ticket_photo(
    req: HttpRequest,
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
    body: web::Bytes,
) -> Result<HttpResponse, AppError> {
    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
        .ok_or_else(|| AppError::Validation("Content-Type header is required".to_string()))?;

    let ticket = tickets::upload_photo(&data, &ctx, &path, body.to_vec(), content_type).await?;
    Ok(response::ok(ticket))
}

/// DELETE /api/tickets/{ticket_id}
pub async fn delete_ticket(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    tickets::delete_ticket(&data, &ctx, &path).await?;
    Ok(response::message("Ticket deleted successfully"))
}

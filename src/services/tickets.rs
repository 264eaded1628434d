use chrono::Utc;
use log::{debug, info, warn};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{require_project, require_ticket, role_in};
use crate::access::{authorize, Action, Facts};
use crate::app_state::AppState;
use crate::attachment::{validate_http_url, PhotoChange, PhotoInput};
use crate::context::RequestContext;
use crate::error::{AppError, StoreError};
use crate::models::{
    double_option, Ticket, TicketFilter, TicketPriority, TicketStatus, TicketType,
};

/// Insert attempts before key allocation gives up.
const KEY_ATTEMPTS: usize = 5;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketRequest {
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub ticket_type: Option<TicketType>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub assignee_id: Option<String>,
    /// Data URI or http(s) URL.
    pub photo: Option<String>,
    pub video_url: Option<String>,
}

/// Partial update; omitted fields keep their values.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTicketRequest {
    #[validate(length(min = 1, max = 200, message = "must be between 1 and 200 characters"))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub ticket_type: Option<TicketType>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    /// `null` unassigns.
    #[serde(default, deserialize_with = "double_option")]
    pub assignee_id: Option<Option<String>>,
    /// Empty string clears the photo.
    pub photo: Option<String>,
    /// Empty string clears the link.
    pub video_url: Option<String>,
}

async fn check_assignee(state: &AppState, assignee_id: Option<String>) -> Result<Option<String>, AppError> {
    match assignee_id.filter(|id| !id.trim().is_empty()) {
        None => Ok(None),
        Some(id) => match state.store.find_user(&id).await? {
            Some(user) => Ok(Some(user.id)),
            None => Err(AppError::Validation("assignee does not exist".to_string())),
        },
    }
}

fn check_video(video_url: Option<String>) -> Result<Option<String>, AppError> {
    match video_url.filter(|v| !v.trim().is_empty()) {
        None => Ok(None),
        Some(v) => validate_http_url(&v, "videoUrl").map(Some),
    }
}

/// Drops a photo written for a ticket write that did not happen.
async fn discard_photo(state: &AppState, url: Option<&str>) {
    if let Some(url) = url {
        state.attachments.remove(url).await;
    }
}

pub async fn create_ticket(
    state: &AppState,
    ctx: &RequestContext,
    project_id: &str,
    req: CreateTicketRequest,
) -> Result<Ticket, AppError> {
    req.validate()?;
    let project = require_project(state, project_id).await?;
    authorize(ctx, Action::CreateTicket, &Facts::default())?;

    let assignee_id = check_assignee(state, req.assignee_id).await?;
    let video_url = check_video(req.video_url)?;
    let photo_url = match req.photo.filter(|p| !p.trim().is_empty()) {
        Some(photo) => Some(state.attachments.persist(PhotoInput::from_field(&photo)).await?),
        None => None,
    };

    let now = Utc::now();
    let mut ticket = Ticket {
        id: Uuid::new_v4().to_string(),
        project_id: project.id.clone(),
        title: req.title.trim().to_string(),
        description: req.description,
        ticket_type: req.ticket_type.unwrap_or(TicketType::Task),
        status: req.status.unwrap_or(TicketStatus::Open),
        priority: req.priority.unwrap_or(TicketPriority::Medium),
        ticket_key: String::new(),
        sequence: 0,
        reporter_id: Some(ctx.user_id.clone()),
        assignee_id,
        photo_url,
        video_url,
        created_at: now,
        updated_at: now,
    };

    // Count-based numbering; a unique index on the key catches concurrent
    // creators and the loser retries past the highest sequence in use.
    let mut sequence = match state.store.count_tickets(&project.id).await {
        Ok(count) => count as i64 + 1,
        Err(e) => {
            discard_photo(state, ticket.photo_url.as_deref()).await;
            return Err(e.into());
        }
    };
    for attempt in 1..=KEY_ATTEMPTS {
        ticket.sequence = sequence;
        ticket.ticket_key = format!("{}-{}", project.key, sequence);

        match state.store.insert_ticket(&ticket).await {
            Ok(()) => {
                info!("Ticket {} created by {}", ticket.ticket_key, ctx.user_id);
                return Ok(ticket);
            }
            Err(StoreError::Duplicate(_)) => {
                warn!(
                    "Ticket key {} taken (attempt {}/{})",
                    ticket.ticket_key, attempt, KEY_ATTEMPTS
                );
                let highest = match state.store.max_ticket_sequence(&project.id).await {
                    Ok(highest) => highest,
                    Err(e) => {
                        discard_photo(state, ticket.photo_url.as_deref()).await;
                        return Err(e.into());
                    }
                };
                sequence = (highest + 1).max(sequence + 1);
            }
            Err(e) => {
                discard_photo(state, ticket.photo_url.as_deref()).await;
                return Err(e.into());
            }
        }
    }

    discard_photo(state, ticket.photo_url.as_deref()).await;
    Err(AppError::Conflict(
        "Could not allocate a unique ticket key, please retry".to_string(),
    ))
}

pub async fn get_ticket(state: &AppState, ctx: &RequestContext, id: &str) -> Result<Ticket, AppError> {
    let ticket = require_ticket(state, id).await?;
    authorize(ctx, Action::View, &Facts::default())?;
    Ok(ticket)
}

pub async fn list_tickets(
    state: &AppState,
    ctx: &RequestContext,
    filter: &TicketFilter,
) -> Result<Vec<Ticket>, AppError> {
    authorize(ctx, Action::View, &Facts::default())?;
    if let Some(project_id) = &filter.project_id {
        require_project(state, project_id).await?;
    }
    Ok(state.store.list_tickets(filter).await?)
}

async fn authorize_on_ticket(
    state: &AppState,
    ctx: &RequestContext,
    action: Action,
    ticket: &Ticket,
) -> Result<(), AppError> {
    let role = role_in(state, &ticket.project_id, &ctx.user_id).await?;
    authorize(ctx, action, &Facts::ticket(ticket, role))
}

/// Writes `ticket` after applying `change` to its photo. A newly stored file
/// is removed if the write fails; the replaced file only after it succeeds.
async fn save_with_photo(
    state: &AppState,
    mut ticket: Ticket,
    change: PhotoChange,
) -> Result<Ticket, AppError> {
    let previous = ticket.photo_url.clone();
    let mut written = None;
    match change {
        PhotoChange::Keep => {}
        PhotoChange::Clear => ticket.photo_url = None,
        PhotoChange::Replace(input) => {
            let url = state.attachments.persist(input).await?;
            written = Some(url.clone());
            ticket.photo_url = Some(url);
        }
    }
    ticket.updated_at = Utc::now();

    if let Err(e) = state.store.update_ticket(&ticket).await {
        discard_photo(state, written.as_deref()).await;
        return Err(e.into());
    }
    if let Some(old) = previous {
        if ticket.photo_url.as_deref() != Some(old.as_str()) {
            state.attachments.remove(&old).await;
        }
    }
    Ok(ticket)
}

pub async fn update_ticket(
    state: &AppState,
    ctx: &RequestContext,
    id: &str,
    req: UpdateTicketRequest,
) -> Result<Ticket, AppError> {
    req.validate()?;
    let mut ticket = require_ticket(state, id).await?;
    authorize_on_ticket(state, ctx, Action::UpdateTicket, &ticket).await?;

    if let Some(title) = req.title {
        ticket.title = title.trim().to_string();
    }
    if let Some(description) = req.description {
        ticket.description = Some(description);
    }
    if let Some(ticket_type) = req.ticket_type {
        ticket.ticket_type = ticket_type;
    }
    if let Some(status) = req.status {
        if status != ticket.status {
            debug!(
                "Ticket {} status {} -> {}",
                ticket.ticket_key,
                ticket.status.as_str(),
                status.as_str()
            );
        }
        ticket.status = status;
    }
    if let Some(priority) = req.priority {
        ticket.priority = priority;
    }
    if let Some(assignee_id) = req.assignee_id {
        ticket.assignee_id = check_assignee(state, assignee_id).await?;
    }
    if let Some(video_url) = req.video_url {
        ticket.video_url = check_video(Some(video_url))?;
    }

    let change = PhotoChange::from_patch(req.photo.as_deref(), ticket.photo_url.as_deref());
    let ticket = save_with_photo(state, ticket, change).await?;
    info!("Ticket {} updated by {}", ticket.ticket_key, ctx.user_id);
    Ok(ticket)
}

/// Replaces the photo with an uploaded image file.
pub async fn upload_photo(
    state: &AppState,
    ctx: &RequestContext,
    id: &str,
    bytes: Vec<u8>,
    content_type: String,
) -> Result<Ticket, AppError> {
    let ticket = require_ticket(state, id).await?;
    authorize_on_ticket(state, ctx, Action::UpdateTicket, &ticket).await?;

    let change = PhotoChange::Replace(PhotoInput::UploadedFile { bytes, content_type });
    let ticket = save_with_photo(state, ticket, change).await?;
    info!("Ticket {} photo uploaded by {}", ticket.ticket_key, ctx.user_id);
    Ok(ticket)
}

pub async fn delete_ticket(state: &AppState, ctx: &RequestContext, id: &str) -> Result<(), AppError> {
    let ticket = require_ticket(state, id).await?;
    authorize_on_ticket(state, ctx, Action::DeleteTicket, &ticket).await?;

    if !state.store.delete_ticket(&ticket.id).await? {
        return Err(AppError::not_found("Ticket"));
    }
    discard_photo(state, ticket.photo_url.as_deref()).await;
    info!("Ticket {} deleted by {}", ticket.ticket_key, ctx.user_id);
    Ok(())
}

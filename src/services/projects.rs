use std::sync::LazyLock;

use chrono::Utc;
use log::info;
use regex::Regex;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{member_view, require_project, role_in};
use crate::access::{authorize, Action, Facts};
use crate::app_state::AppState;
use crate::context::RequestContext;
use crate::error::AppError;
use crate::models::{Membership, Project, ProjectDetails, ProjectRole, TicketFilter};

static PROJECT_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{2,10}$").expect("valid project key pattern"));

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub name: String,
    pub description: Option<String>,
    pub key: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 100, message = "must be between 1 and 100 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    /// Accepted only when it equals the stored key.
    pub key: Option<String>,
    pub active: Option<bool>,
}

/// Trims, checks and upper-cases a project key.
pub fn normalize_project_key(raw: &str) -> Result<String, AppError> {
    let key = raw.trim();
    if !PROJECT_KEY.is_match(key) {
        return Err(AppError::Validation(
            "key must be 2 to 10 letters or digits".to_string(),
        ));
    }
    Ok(key.to_ascii_uppercase())
}

/// Creates a project; the requester becomes its owner.
pub async fn create_project(
    state: &AppState,
    ctx: &RequestContext,
    req: CreateProjectRequest,
) -> Result<Project, AppError> {
    req.validate()?;
    authorize(ctx, Action::CreateProject, &Facts::default())?;
    let key = normalize_project_key(&req.key)?;

    let now = Utc::now();
    let project = Project {
        id: Uuid::new_v4().to_string(),
        name: req.name.trim().to_string(),
        description: req.description,
        key,
        active: true,
        created_by: Some(ctx.user_id.clone()),
        created_at: now,
        updated_at: now,
    };
    let owner = Membership {
        project_id: project.id.clone(),
        user_id: ctx.user_id.clone(),
        role: ProjectRole::Owner,
        joined_at: now,
    };
    state.store.insert_project(&project, &owner).await?;

    info!("Project {} ({}) created by {}", project.key, project.id, ctx.user_id);
    Ok(project)
}

pub async fn list_projects(state: &AppState, ctx: &RequestContext) -> Result<Vec<Project>, AppError> {
    authorize(ctx, Action::View, &Facts::default())?;
    Ok(state.store.list_projects().await?)
}

pub async fn get_project(
    state: &AppState,
    ctx: &RequestContext,
    id: &str,
) -> Result<ProjectDetails, AppError> {
    let project = require_project(state, id).await?;
    authorize(ctx, Action::View, &Facts::default())?;

    let mut members = Vec::new();
    for membership in state.store.list_memberships(&project.id).await? {
        members.push(member_view(state, membership).await?);
    }
    Ok(ProjectDetails { project, members })
}

pub async fn update_project(
    state: &AppState,
    ctx: &RequestContext,
    id: &str,
    req: UpdateProjectRequest,
) -> Result<Project, AppError> {
    req.validate()?;
    let mut project = require_project(state, id).await?;
    let role = role_in(state, &project.id, &ctx.user_id).await?;
    authorize(ctx, Action::UpdateProject, &Facts::project(role))?;

    if let Some(key) = &req.key {
        if normalize_project_key(key)? != project.key {
            return Err(AppError::Validation("project key is immutable".to_string()));
        }
    }
    if let Some(name) = req.name {
        project.name = name.trim().to_string();
    }
    if let Some(description) = req.description {
        project.description = Some(description);
    }
    if let Some(active) = req.active {
        project.active = active;
    }
    project.updated_at = Utc::now();

    state.store.update_project(&project).await?;
    info!("Project {} updated by {}", project.id, ctx.user_id);
    Ok(project)
}

/// Deletes a project with its memberships, tickets and comments.
pub async fn delete_project(state: &AppState, ctx: &RequestContext, id: &str) -> Result<(), AppError> {
    let project = require_project(state, id).await?;
    let role = role_in(state, &project.id, &ctx.user_id).await?;
    authorize(ctx, Action::DeleteProject, &Facts::project(role))?;

    let photos: Vec<String> = state
        .store
        .list_tickets(&TicketFilter::for_project(&project.id))
        .await?
        .into_iter()
        .filter_map(|t| t.photo_url)
        .collect();

    if !state.store.delete_project(&project.id).await? {
        return Err(AppError::not_found("Project"));
    }
    for photo in &photos {
        state.attachments.remove(photo).await;
    }

    info!("Project {} deleted by {}", project.id, ctx.user_id);
    Ok(())
}

// src/project.rs

use actix_web::{web, HttpResponse};

use crate::app_state::AppState;
use crate::context::RequestContext;
use crate::error::AppError;
use crate::response;
use crate::services::memberships::{self, AddMemberRequest, ChangeRoleRequest};
use crate::services::projects::{self, CreateProjectRequest, UpdateProjectRequest};

/// POST /api/projects
/// Creates a project; the caller becomes its owner.
pub async fn create_project(
    data: web::Data<AppState>,
    ctx: RequestContext,
    payload: web::Json<CreateProjectRequest>,
) -> Result<HttpResponse, AppError> {
    let project = projects::create_project(&data, &ctx, payload.into_inner()).await?;
    Ok(response::created(project))
}

/// GET /api/projects
pub async fn list_projects(
    data: web::Data<AppState>,
    ctx: RequestContext,
) -> Result<HttpResponse, AppError> {
    Ok(response::ok(projects::list_projects(&data, &ctx).await?))
}

/// GET /api/projects/{project_id}
pub async fn get_project(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    Ok(response::ok(projects::get_project(&data, &ctx, &path).await?))
}

/// PUT /api/projects/{project_id}
pub async fn update_project(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
    payload: web::Json<UpdateProjectRequest>,
) -> Result<HttpResponse, AppError> {
    let project = projects::update_project(&data, &ctx, &path, payload.into_inner()).await?;
    Ok(response::ok(project))
}

/// DELETE /api/projects/{project_id}
pub async fn delete_project(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    projects::delete_project(&data, &ctx, &path).await?;
    Ok(response::message("Project deleted"))
}

/// GET /api/projects/{project_id}/members
pub async fn list_members(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    Ok(response::ok(memberships::list_members(&data, &ctx, &path).await?))
}

/// POST /api/projects/{project_id}/members
pub async fn add_user_to_project(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<String>,
    payload: web::Json<AddMemberRequest>,
) -> Result<HttpResponse, AppError> {
    let member = memberships::add_member(&data, &ctx, &path, payload.into_inner()).await?;
    Ok(response::created(member))
}

/// PUT /api/projects/{project_id}/members/{user_id}
pub async fn change_member_role(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<(String, String)>,
    payload: web::Json<ChangeRoleRequest>,
) -> Result<HttpResponse, AppError> {
    let (project_id, user_id) = path.into_inner();
    let member =
        memberships::change_member_role(&data, &ctx, &project_id, &user_id, payload.into_inner())
            .await?;
    Ok(response::ok(member))
}

/// DELETE /api/projects/{project_id}/members/{user_id}
pub async fn remove_user_from_project(
    data: web::Data<AppState>,
    ctx: RequestContext,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (project_id, user_id) = path.into_inner();
    memberships::remove_member(&data, &ctx, &project_id, &user_id).await?;
    Ok(response::message("User removed from project"))
}

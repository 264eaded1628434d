//! Business operations. Each function takes the shared state and the
//! requester explicitly, looks the resource up (not-found first), runs the
//! authorization predicate, then mutates through the store.

pub mod comments;
pub mod memberships;
pub mod projects;
pub mod tickets;
pub mod users;

use crate::app_state::AppState;
use crate::error::AppError;
use crate::models::{MemberView, Membership, Project, ProjectRole, Ticket, User};

pub(crate) async fn require_project(state: &AppState, id: &str) -> Result<Project, AppError> {
    state
        .store
        .find_project(id)
        .await?
        .ok_or_else(|| AppError::not_found("Project"))
}

pub(crate) async fn require_ticket(state: &AppState, id: &str) -> Result<Ticket, AppError> {
    state
        .store
        .find_ticket(id)
        .await?
        .ok_or_else(|| AppError::not_found("Ticket"))
}

pub(crate) async fn require_user(state: &AppState, id: &str) -> Result<User, AppError> {
    state
        .store
        .find_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

/// The requester's role in a project, if they are a member.
pub(crate) async fn role_in(
    state: &AppState,
    project_id: &str,
    user_id: &str,
) -> Result<Option<ProjectRole>, AppError> {
    Ok(state
        .store
        .find_membership(project_id, user_id)
        .await?
        .map(|m| m.role))
}

pub(crate) async fn member_view(state: &AppState, membership: Membership) -> Result<MemberView, AppError> {
    let user = state.store.find_user(&membership.user_id).await?;
    Ok(MemberView {
        username: user.as_ref().map(|u| u.username.clone()),
        email: user.as_ref().map(|u| u.email.clone()),
        user_id: membership.user_id,
        role: membership.role,
        joined_at: membership.joined_at,
    })
}

use chrono::Utc;
use log::{info, warn};
use serde::Deserialize;
use validator::Validate;

use super::{member_view, require_project, require_user, role_in};
use crate::access::{authorize, Action, Facts};
use crate::app_state::AppState;
use crate::context::RequestContext;
use crate::error::{AppError, StoreError};
use crate::models::{MemberView, Membership, ProjectRole};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub user_id: String,
    /// Defaults to `member`.
    pub role: Option<ProjectRole>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: ProjectRole,
}

async fn authorize_manage(
    state: &AppState,
    ctx: &RequestContext,
    project_id: &str,
) -> Result<(), AppError> {
    let project = require_project(state, project_id).await?;
    let role = role_in(state, &project.id, &ctx.user_id).await?;
    authorize(ctx, Action::ManageMembers, &Facts::project(role))
}

pub async fn list_members(
    state: &AppState,
    ctx: &RequestContext,
    project_id: &str,
) -> Result<Vec<MemberView>, AppError> {
    let project = require_project(state, project_id).await?;
    authorize(ctx, Action::View, &Facts::default())?;

    let mut members = Vec::new();
    for membership in state.store.list_memberships(&project.id).await? {
        members.push(member_view(state, membership).await?);
    }
    Ok(members)
}

pub async fn add_member(
    state: &AppState,
    ctx: &RequestContext,
    project_id: &str,
    req: AddMemberRequest,
) -> Result<MemberView, AppError> {
    req.validate()?;
    authorize_manage(state, ctx, project_id).await?;
    let user = require_user(state, &req.user_id).await?;

    let already_in_project =
        || AppError::Conflict("User already in project".to_string());
    if state.store.find_membership(project_id, &user.id).await?.is_some() {
        return Err(already_in_project());
    }

    let membership = Membership {
        project_id: project_id.to_string(),
        user_id: user.id.clone(),
        role: req.role.unwrap_or(ProjectRole::Member),
        joined_at: Utc::now(),
    };
    match state.store.insert_membership(&membership).await {
        Ok(()) => {}
        Err(StoreError::Duplicate(_)) => return Err(already_in_project()),
        Err(e) => return Err(e.into()),
    }

    info!(
        "Added {} to project {} as {}",
        user.id,
        project_id,
        membership.role.as_str()
    );
    member_view(state, membership).await
}

pub async fn remove_member(
    state: &AppState,
    ctx: &RequestContext,
    project_id: &str,
    user_id: &str,
) -> Result<(), AppError> {
    authorize_manage(state, ctx, project_id).await?;

    if !state.store.delete_membership(project_id, user_id).await? {
        warn!("Remove of non-member {} from project {}", user_id, project_id);
        return Err(AppError::NotFound(
            "User is not a member of this project".to_string(),
        ));
    }
    info!("Removed {} from project {}", user_id, project_id);
    Ok(())
}

pub async fn change_member_role(
    state: &AppState,
    ctx: &RequestContext,
    project_id: &str,
    user_id: &str,
    req: ChangeRoleRequest,
) -> Result<MemberView, AppError> {
    authorize_manage(state, ctx, project_id).await?;

    let mut membership = state
        .store
        .find_membership(project_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User is not a member of this project".to_string()))?;
    membership.role = req.role;
    state.store.update_membership(&membership).await?;

    info!("Member {} of project {} is now {}", user_id, project_id, req.role.as_str());
    member_view(state, membership).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GlobalRole;
    use crate::services::fixtures::TestApp;
    use crate::services::projects::{create_project, CreateProjectRequest};

    async fn project_of(app: &TestApp, owner: &RequestContext) -> String {
        let req = CreateProjectRequest { name: "Demo".into(), description: None, key: "DEM".into() };
        create_project(&app.state, owner, req).await.unwrap().id
    }

    fn add(user_id: &str, role: Option<ProjectRole>) -> AddMemberRequest {
        AddMemberRequest { user_id: user_id.to_string(), role }
    }

    #[actix_web::test]
    async fn added_member_defaults_to_member_role() {
        let app = TestApp::new();
        let alice = app.user("alice", GlobalRole::User).await;
        let bob = app.user("bob", GlobalRole::Developer).await;
        let project = project_of(&app, &alice).await;

        let view = add_member(&app.state, &alice, &project, add(&bob.user_id, None)).await.unwrap();
        assert_eq!(view.role, ProjectRole::Member);
        assert_eq!(view.username.as_deref(), Some("bob"));
    }

    #[actix_web::test]
    async fn adding_twice_is_a_conflict() {
        let app = TestApp::new();
        let alice = app.user("alice", GlobalRole::User).await;
        let bob = app.user("bob", GlobalRole::User).await;
        let project = project_of(&app, &alice).await;

        add_member(&app.state, &alice, &project, add(&bob.user_id, None)).await.unwrap();
        let err = add_member(&app.state, &alice, &project, add(&bob.user_id, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn removing_a_non_member_is_not_found() {
        let app = TestApp::new();
        let alice = app.user("alice", GlobalRole::User).await;
        let bob = app.user("bob", GlobalRole::User).await;
        let project = project_of(&app, &alice).await;

        let err = remove_member(&app.state, &alice, &project, &bob.user_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[actix_web::test]
    async fn plain_members_cannot_manage_membership() {
        let app = TestApp::new();
        let alice = app.user("alice", GlobalRole::User).await;
        let bob = app.user("bob", GlobalRole::User).await;
        let carol = app.user("carol", GlobalRole::User).await;
        let project = project_of(&app, &alice).await;
        add_member(&app.state, &alice, &project, add(&bob.user_id, None)).await.unwrap();

        let err = add_member(&app.state, &bob, &project, add(&carol.user_id, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        change_member_role(
            &app.state,
            &alice,
            &project,
            &bob.user_id,
            ChangeRoleRequest { role: ProjectRole::Manager },
        )
        .await
        .unwrap();
        add_member(&app.state, &bob, &project, add(&carol.user_id, None)).await.unwrap();
        remove_member(&app.state, &bob, &project, &carol.user_id).await.unwrap();
    }

    #[actix_web::test]
    async fn unknown_user_cannot_be_added() {
        let app = TestApp::new();
        let alice = app.user("alice", GlobalRole::User).await;
        let project = project_of(&app, &alice).await;
        let err = add_member(&app.state, &alice, &project, add("ghost", None)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}

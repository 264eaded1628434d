use bcrypt::{hash, verify};
use chrono::Utc;
use log::{info, warn};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::require_user;
use crate::access::{authorize, Action, Facts};
use crate::app_state::AppState;
use crate::context::RequestContext;
use crate::error::AppError;
use crate::models::{GlobalRole, User, UserProfile};

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(length(min = 3, max = 30, message = "must be between 3 and 30 characters"))]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    #[serde(alias = "username", alias = "email")]
    pub login: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(length(min = 3, max = 30, message = "must be between 3 and 30 characters"))]
    pub username: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub password: Option<String>,
    pub role: Option<GlobalRole>,
    pub active: Option<bool>,
}

fn hash_password(state: &AppState, password: &str) -> Result<String, AppError> {
    hash(password, state.config.bcrypt_cost)
        .map_err(|e| AppError::Internal(format!("hashing password: {}", e)))
}

/// Registers an account. The first account of an empty system is an admin.
pub async fn signup(state: &AppState, req: SignupRequest) -> Result<User, AppError> {
    req.validate()?;

    let role = if state.store.count_users().await? == 0 {
        GlobalRole::Admin
    } else {
        GlobalRole::User
    };
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: req.username.trim().to_string(),
        email: req.email.trim().to_lowercase(),
        password_hash: hash_password(state, &req.password)?,
        role,
        active: true,
        created_at: now,
        updated_at: now,
    };
    state.store.insert_user(&user).await?;

    info!("User {} registered as {:?}", user.username, user.role);
    Ok(user)
}

/// Checks credentials and returns the account they belong to.
pub async fn authenticate(state: &AppState, req: LoginRequest) -> Result<User, AppError> {
    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let user = state
        .store
        .find_user_by_login(req.login.trim())
        .await?
        .ok_or_else(invalid)?;
    if !verify(&req.password, &user.password_hash).unwrap_or(false) {
        warn!("Failed login for {}", user.username);
        return Err(invalid());
    }
    if !user.active {
        return Err(AppError::Unauthorized("Account is deactivated".to_string()));
    }
    Ok(user)
}

pub async fn list_users(state: &AppState, ctx: &RequestContext) -> Result<Vec<UserProfile>, AppError> {
    authorize(ctx, Action::View, &Facts::default())?;
    Ok(state.store.list_users().await?.iter().map(UserProfile::from).collect())
}

pub async fn get_user(state: &AppState, ctx: &RequestContext, id: &str) -> Result<UserProfile, AppError> {
    let user = require_user(state, id).await?;
    authorize(ctx, Action::View, &Facts::default())?;
    Ok(UserProfile::from(&user))
}

pub async fn update_user(
    state: &AppState,
    ctx: &RequestContext,
    id: &str,
    req: UpdateUserRequest,
) -> Result<UserProfile, AppError> {
    req.validate()?;
    let mut user = require_user(state, id).await?;
    authorize(ctx, Action::UpdateUser, &Facts::user(&user.id))?;
    if req.role.is_some() || req.active.is_some() {
        authorize(ctx, Action::ChangeUserAccess, &Facts::user(&user.id))?;
    }

    if let Some(username) = req.username {
        user.username = username.trim().to_string();
    }
    if let Some(email) = req.email {
        user.email = email.trim().to_lowercase();
    }
    if let Some(password) = req.password {
        user.password_hash = hash_password(state, &password)?;
    }
    if let Some(role) = req.role {
        user.role = role;
    }
    if let Some(active) = req.active {
        user.active = active;
    }
    user.updated_at = Utc::now();

    state.store.update_user(&user).await?;
    info!("User {} updated by {}", user.id, ctx.user_id);
    Ok(UserProfile::from(&user))
}

/// Deletes an account. Tickets survive with reporter/assignee cleared.
pub async fn delete_user(state: &AppState, ctx: &RequestContext, id: &str) -> Result<(), AppError> {
    let user = require_user(state, id).await?;
    authorize(ctx, Action::DeleteUser, &Facts::user(&user.id))?;

    if !state.store.delete_user(&user.id).await? {
        return Err(AppError::not_found("User"));
    }
    info!("User {} deleted by {}", user.id, ctx.user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::comments::{create_comment, CommentRequest};
    use crate::services::fixtures::TestApp;
    use crate::services::memberships::{add_member, AddMemberRequest};
    use crate::services::projects::{create_project, CreateProjectRequest};
    use crate::services::tickets::{create_ticket, CreateTicketRequest};

    fn signup_req(name: &str) -> SignupRequest {
        SignupRequest {
            username: name.to_string(),
            email: format!("{}@Example.com", name),
            password: "hunter22".to_string(),
        }
    }

    #[actix_web::test]
    async fn first_account_is_admin() {
        let app = TestApp::new();
        let first = signup(&app.state, signup_req("first")).await.unwrap();
        let second = signup(&app.state, signup_req("second")).await.unwrap();
        assert_eq!(first.role, GlobalRole::Admin);
        assert_eq!(second.role, GlobalRole::User);
        assert_eq!(second.email, "second@example.com");
    }

    #[actix_web::test]
    async fn duplicate_username_is_a_conflict() {
        let app = TestApp::new();
        signup(&app.state, signup_req("dup")).await.unwrap();
        let err = signup(&app.state, signup_req("dup")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[actix_web::test]
    async fn login_by_username_or_email() {
        let app = TestApp::new();
        signup(&app.state, signup_req("carol")).await.unwrap();

        let by_name = LoginRequest { login: "carol".into(), password: "hunter22".into() };
        assert!(authenticate(&app.state, by_name).await.is_ok());
        let by_email = LoginRequest { login: "CAROL@example.com".into(), password: "hunter22".into() };
        assert!(authenticate(&app.state, by_email).await.is_ok());
        let wrong = LoginRequest { login: "carol".into(), password: "nope".into() };
        assert!(matches!(
            authenticate(&app.state, wrong).await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[actix_web::test]
    async fn only_admin_changes_roles() {
        let app = TestApp::new();
        let dave = app.user("dave", GlobalRole::Developer).await;
        let root = app.user("root", GlobalRole::Admin).await;

        let promote = || UpdateUserRequest { role: Some(GlobalRole::Admin), ..Default::default() };
        let err = update_user(&app.state, &dave, &dave.user_id, promote()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let profile = update_user(&app.state, &root, &dave.user_id, promote()).await.unwrap();
        assert_eq!(profile.role, GlobalRole::Admin);

        let rename = UpdateUserRequest { username: Some("david".into()), ..Default::default() };
        let profile = update_user(&app.state, &dave, &dave.user_id, rename).await.unwrap();
        assert_eq!(profile.username, "david");
    }

    #[actix_web::test]
    async fn deleting_user_keeps_tickets_but_clears_references() {
        let app = TestApp::new();
        let root = app.user("root", GlobalRole::Admin).await;
        let erin = app.user("erin", GlobalRole::User).await;
        let project = create_project(
            &app.state,
            &root,
            CreateProjectRequest { name: "Demo".into(), description: None, key: "DEM".into() },
        )
        .await
        .unwrap();
        let ticket = create_ticket(
            &app.state,
            &erin,
            &project.id,
            CreateTicketRequest {
                title: "by erin".into(),
                description: None,
                ticket_type: None,
                status: None,
                priority: None,
                assignee_id: Some(erin.user_id.clone()),
                photo: None,
                video_url: None,
            },
        )
        .await
        .unwrap();

        let err = delete_user(&app.state, &erin, &root.user_id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let join = AddMemberRequest { user_id: erin.user_id.clone(), role: None };
        add_member(&app.state, &root, &project.id, join).await.unwrap();
        let note = CommentRequest { content: "repro attached".into() };
        let comment = create_comment(&app.state, &erin, &ticket.id, note).await.unwrap();

        delete_user(&app.state, &root, &erin.user_id).await.unwrap();
        let kept = app.state.store.find_ticket(&ticket.id).await.unwrap().unwrap();
        assert_eq!(kept.reporter_id, None);
        assert_eq!(kept.assignee_id, None);
        assert!(app
            .state
            .store
            .find_membership(&project.id, &erin.user_id)
            .await
            .unwrap()
            .is_none());
        assert!(app.state.store.find_comment(&comment.id).await.unwrap().is_none());
        // The owner's membership is untouched.
        assert!(app
            .state
            .store
            .find_membership(&project.id, &root.user_id)
            .await
            .unwrap()
            .is_some());
    }
}

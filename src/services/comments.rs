use chrono::Utc;
use log::info;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::require_ticket;
use crate::access::{authorize, Action, Facts};
use crate::app_state::AppState;
use crate::context::RequestContext;
use crate::error::AppError;
use crate::models::Comment;

#[derive(Debug, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 5000, message = "must be between 1 and 5000 characters"))]
    pub content: String,
}

impl CommentRequest {
    fn checked_content(self) -> Result<String, AppError> {
        self.validate()?;
        let content = self.content.trim().to_string();
        if content.is_empty() {
            return Err(AppError::Validation("content must not be blank".to_string()));
        }
        Ok(content)
    }
}

async fn require_comment(state: &AppState, id: &str) -> Result<Comment, AppError> {
    state
        .store
        .find_comment(id)
        .await?
        .ok_or_else(|| AppError::not_found("Comment"))
}

pub async fn list_comments(
    state: &AppState,
    ctx: &RequestContext,
    ticket_id: &str,
) -> Result<Vec<Comment>, AppError> {
    let ticket = require_ticket(state, ticket_id).await?;
    authorize(ctx, Action::View, &Facts::default())?;
    Ok(state.store.list_comments(&ticket.id).await?)
}

pub async fn create_comment(
    state: &AppState,
    ctx: &RequestContext,
    ticket_id: &str,
    req: CommentRequest,
) -> Result<Comment, AppError> {
    let content = req.checked_content()?;
    let ticket = require_ticket(state, ticket_id).await?;

    let now = Utc::now();
    let comment = Comment {
        id: Uuid::new_v4().to_string(),
        ticket_id: ticket.id,
        author_id: ctx.user_id.clone(),
        content,
        created_at: now,
        updated_at: now,
    };
    state.store.insert_comment(&comment).await?;
    info!("Comment {} added to ticket {}", comment.id, ticket.ticket_key);
    Ok(comment)
}

pub async fn update_comment(
    state: &AppState,
    ctx: &RequestContext,
    id: &str,
    req: CommentRequest,
) -> Result<Comment, AppError> {
    let content = req.checked_content()?;
    let mut comment = require_comment(state, id).await?;
    authorize(ctx, Action::UpdateComment, &Facts::comment(&comment))?;

    comment.content = content;
    comment.updated_at = Utc::now();
    state.store.update_comment(&comment).await?;
    Ok(comment)
}

pub async fn delete_comment(state: &AppState, ctx: &RequestContext, id: &str) -> Result<(), AppError> {
    let comment = require_comment(state, id).await?;
    authorize(ctx, Action::DeleteComment, &Facts::comment(&comment))?;

    if !state.store.delete_comment(&comment.id).await? {
        return Err(AppError::not_found("Comment"));
    }
    info!("Comment {} deleted by {}", comment.id, ctx.user_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GlobalRole;
    use crate::services::fixtures::TestApp;
    use crate::services::projects::{create_project, delete_project, CreateProjectRequest};
    use crate::services::tickets::{create_ticket, delete_ticket, CreateTicketRequest};

    fn say(text: &str) -> CommentRequest {
        CommentRequest { content: text.to_string() }
    }

    async fn ticket_in_new_project(app: &TestApp, owner: &RequestContext) -> (String, String) {
        let project = create_project(
            &app.state,
            owner,
            CreateProjectRequest { name: "Demo".into(), description: None, key: "DEM".into() },
        )
        .await
        .unwrap();
        let ticket = create_ticket(
            &app.state,
            owner,
            &project.id,
            CreateTicketRequest {
                title: "bug".into(),
                description: None,
                ticket_type: None,
                status: None,
                priority: None,
                assignee_id: None,
                photo: None,
                video_url: None,
            },
        )
        .await
        .unwrap();
        (project.id, ticket.id)
    }

    #[actix_web::test]
    async fn only_author_edits_and_admin_may_delete() {
        let app = TestApp::new();
        let alice = app.user("alice", GlobalRole::User).await;
        let bob = app.user("bob", GlobalRole::Manager).await;
        let root = app.user("root", GlobalRole::Admin).await;
        let (_, ticket_id) = ticket_in_new_project(&app, &alice).await;

        let comment = create_comment(&app.state, &alice, &ticket_id, say("first")).await.unwrap();

        let err = update_comment(&app.state, &bob, &comment.id, say("edit")).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = update_comment(&app.state, &root, &comment.id, say("edit")).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let err = delete_comment(&app.state, &bob, &comment.id).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let edited = update_comment(&app.state, &alice, &comment.id, say("edited")).await.unwrap();
        assert_eq!(edited.content, "edited");

        delete_comment(&app.state, &root, &comment.id).await.unwrap();
        assert!(list_comments(&app.state, &alice, &ticket_id).await.unwrap().is_empty());
    }

    #[actix_web::test]
    async fn blank_comment_is_rejected() {
        let app = TestApp::new();
        let alice = app.user("alice", GlobalRole::User).await;
        let (_, ticket_id) = ticket_in_new_project(&app, &alice).await;
        let err = create_comment(&app.state, &alice, &ticket_id, say("   ")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[actix_web::test]
    async fn deleting_ticket_removes_its_comments() {
        let app = TestApp::new();
        let alice = app.user("alice", GlobalRole::User).await;
        let (_, ticket_id) = ticket_in_new_project(&app, &alice).await;
        let comment = create_comment(&app.state, &alice, &ticket_id, say("x")).await.unwrap();

        delete_ticket(&app.state, &alice, &ticket_id).await.unwrap();
        assert!(app.state.store.find_comment(&comment.id).await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn deleting_project_removes_tickets_and_comments() {
        let app = TestApp::new();
        let alice = app.user("alice", GlobalRole::User).await;
        let (project_id, ticket_id) = ticket_in_new_project(&app, &alice).await;
        let comment = create_comment(&app.state, &alice, &ticket_id, say("x")).await.unwrap();

        delete_project(&app.state, &alice, &project_id).await.unwrap();
        assert!(app.state.store.find_ticket(&ticket_id).await.unwrap().is_none());
        assert!(app.state.store.find_comment(&comment.id).await.unwrap().is_none());
    }
}

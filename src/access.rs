//! Authorization predicate. Every permission check in the service layer goes
//! through [`authorize`]; the rules live in one match so they can be read as
//! a table.

use log::debug;

use crate::context::RequestContext;
use crate::error::AppError;
use crate::models::{Comment, GlobalRole, ProjectRole, Ticket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    CreateProject,
    UpdateProject,
    DeleteProject,
    ManageMembers,
    CreateTicket,
    UpdateTicket,
    DeleteTicket,
    UpdateComment,
    DeleteComment,
    View,
    UpdateUser,
    ChangeUserAccess,
    DeleteUser,
}

/// What is known about the resource when a check is made. Fields not
/// relevant to the action are left empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct Facts<'a> {
    /// Requester's role in the project the resource belongs to.
    pub membership: Option<ProjectRole>,
    pub reporter_id: Option<&'a str>,
    pub assignee_id: Option<&'a str>,
    pub author_id: Option<&'a str>,
    pub target_user_id: Option<&'a str>,
}

impl<'a> Facts<'a> {
    pub fn project(membership: Option<ProjectRole>) -> Self {
        Self { membership, ..Self::default() }
    }

    pub fn ticket(ticket: &'a Ticket, membership: Option<ProjectRole>) -> Self {
        Self {
            membership,
            reporter_id: ticket.reporter_id.as_deref(),
            assignee_id: ticket.assignee_id.as_deref(),
            ..Self::default()
        }
    }

    pub fn comment(comment: &'a Comment) -> Self {
        Self { author_id: Some(&comment.author_id), ..Self::default() }
    }

    pub fn user(target_user_id: &'a str) -> Self {
        Self { target_user_id: Some(target_user_id), ..Self::default() }
    }
}

pub fn permits(ctx: &RequestContext, action: Action, facts: &Facts<'_>) -> bool {
    let admin = ctx.global_role == GlobalRole::Admin;
    let is = |id: Option<&str>| id == Some(ctx.user_id.as_str());
    let owner_or_manager = matches!(
        facts.membership,
        Some(ProjectRole::Owner) | Some(ProjectRole::Manager)
    );

    match action {
        Action::CreateProject | Action::CreateTicket | Action::View => true,
        Action::UpdateProject | Action::ManageMembers => admin || owner_or_manager,
        Action::DeleteProject => admin || facts.membership == Some(ProjectRole::Owner),
        Action::UpdateTicket => {
            admin || is(facts.assignee_id) || is(facts.reporter_id) || facts.membership.is_some()
        }
        Action::DeleteTicket => {
            admin || is(facts.assignee_id) || is(facts.reporter_id) || owner_or_manager
        }
        Action::UpdateComment => is(facts.author_id),
        Action::DeleteComment => admin || is(facts.author_id),
        Action::UpdateUser => admin || is(facts.target_user_id),
        Action::ChangeUserAccess | Action::DeleteUser => admin,
    }
}

pub fn authorize(ctx: &RequestContext, action: Action, facts: &Facts<'_>) -> Result<(), AppError> {
    if permits(ctx, action, facts) {
        Ok(())
    } else {
        debug!("User {} denied {:?}", ctx.user_id, action);
        Err(AppError::forbidden())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TicketPriority, TicketStatus, TicketType};
    use chrono::Utc;

    fn ctx(id: &str, role: GlobalRole) -> RequestContext {
        RequestContext { user_id: id.to_string(), global_role: role }
    }

    fn ticket(reporter: Option<&str>, assignee: Option<&str>) -> Ticket {
        Ticket {
            id: "t1".into(),
            project_id: "p1".into(),
            title: "Broken login".into(),
            description: None,
            ticket_type: TicketType::Bug,
            status: TicketStatus::Open,
            priority: TicketPriority::Medium,
            ticket_key: "DEM-1".into(),
            sequence: 1,
            reporter_id: reporter.map(String::from),
            assignee_id: assignee.map(String::from),
            photo_url: None,
            video_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn update_project_requires_owner_or_manager_membership() {
        let plain = ctx("u1", GlobalRole::User);
        assert!(!permits(&plain, Action::UpdateProject, &Facts::project(None)));
        assert!(!permits(&plain, Action::UpdateProject, &Facts::project(Some(ProjectRole::Member))));
        assert!(permits(&plain, Action::UpdateProject, &Facts::project(Some(ProjectRole::Manager))));
        assert!(permits(&plain, Action::UpdateProject, &Facts::project(Some(ProjectRole::Owner))));
        assert!(permits(&ctx("a", GlobalRole::Admin), Action::UpdateProject, &Facts::project(None)));
    }

    #[test]
    fn global_manager_is_not_a_project_manager() {
        let manager = ctx("m", GlobalRole::Manager);
        assert!(!permits(&manager, Action::UpdateProject, &Facts::project(None)));
        assert!(!permits(&manager, Action::ManageMembers, &Facts::project(None)));
    }

    #[test]
    fn only_owner_or_admin_deletes_project() {
        let plain = ctx("u1", GlobalRole::Developer);
        assert!(!permits(&plain, Action::DeleteProject, &Facts::project(Some(ProjectRole::Manager))));
        assert!(permits(&plain, Action::DeleteProject, &Facts::project(Some(ProjectRole::Owner))));
        assert!(permits(&ctx("a", GlobalRole::Admin), Action::DeleteProject, &Facts::project(None)));
    }

    #[test]
    fn outsider_cannot_delete_ticket() {
        let t = ticket(Some("reporter"), Some("assignee"));
        let outsider = ctx("stranger", GlobalRole::User);
        assert!(!permits(&outsider, Action::DeleteTicket, &Facts::ticket(&t, None)));
        assert!(!permits(&outsider, Action::UpdateTicket, &Facts::ticket(&t, None)));
    }

    #[test]
    fn reporter_and_assignee_may_delete_ticket() {
        let t = ticket(Some("reporter"), Some("assignee"));
        let reporter = ctx("reporter", GlobalRole::User);
        let assignee = ctx("assignee", GlobalRole::User);
        assert!(permits(&reporter, Action::DeleteTicket, &Facts::ticket(&t, None)));
        assert!(permits(&assignee, Action::DeleteTicket, &Facts::ticket(&t, None)));
    }

    #[test]
    fn plain_member_may_update_but_not_delete_ticket() {
        let t = ticket(None, None);
        let member = ctx("m1", GlobalRole::User);
        let facts = Facts::ticket(&t, Some(ProjectRole::Member));
        assert!(permits(&member, Action::UpdateTicket, &facts));
        assert!(!permits(&member, Action::DeleteTicket, &facts));
        let manager_facts = Facts::ticket(&t, Some(ProjectRole::Manager));
        assert!(permits(&member, Action::DeleteTicket, &manager_facts));
    }

    #[test]
    fn comment_edits_belong_to_author() {
        let comment = Comment {
            id: "c1".into(),
            ticket_id: "t1".into(),
            author_id: "author".into(),
            content: "looks good".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let facts = Facts::comment(&comment);
        let admin = ctx("admin", GlobalRole::Admin);
        assert!(permits(&ctx("author", GlobalRole::User), Action::UpdateComment, &facts));
        assert!(permits(&ctx("author", GlobalRole::User), Action::DeleteComment, &facts));
        assert!(!permits(&admin, Action::UpdateComment, &facts));
        assert!(permits(&admin, Action::DeleteComment, &facts));
        assert!(!permits(&ctx("other", GlobalRole::Manager), Action::DeleteComment, &facts));
    }

    #[test]
    fn users_manage_themselves_admins_manage_everyone() {
        let me = ctx("me", GlobalRole::Developer);
        assert!(permits(&me, Action::UpdateUser, &Facts::user("me")));
        assert!(!permits(&me, Action::UpdateUser, &Facts::user("you")));
        assert!(!permits(&me, Action::ChangeUserAccess, &Facts::user("me")));
        assert!(!permits(&me, Action::DeleteUser, &Facts::user("you")));
        assert!(permits(&ctx("a", GlobalRole::Admin), Action::DeleteUser, &Facts::user("you")));
    }

    #[test]
    fn authorize_reports_forbidden() {
        let err = authorize(&ctx("u", GlobalRole::User), Action::DeleteUser, &Facts::user("x"))
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::Store;
use crate::error::StoreError;
use crate::models::{Comment, Membership, Project, Ticket, TicketFilter, User};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    projects: Vec<Project>,
    memberships: Vec<Membership>,
    tickets: Vec<Ticket>,
    comments: Vec<Comment>,
}

/// Process-local store. Rows keep insertion order, which doubles as
/// creation order for listings.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn replace<T, F>(rows: &mut [T], row: &T, same: F)
where
    T: Clone,
    F: Fn(&T) -> bool,
{
    if let Some(slot) = rows.iter_mut().find(|r| same(r)) {
        *slot = row.clone();
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(self.tables.read().await.users.len() as u64)
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate("username"));
        }
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email"));
        }
        tables.users.push(user.clone());
        Ok(())
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let email = login.to_lowercase();
        Ok(self
            .tables
            .read()
            .await
            .users
            .iter()
            .find(|u| u.username == login || u.email == email)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.tables.read().await.users.clone())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let others = || tables.users.iter().filter(|u| u.id != user.id);
        if others().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate("username"));
        }
        if others().any(|u| u.email == user.email) {
            return Err(StoreError::Duplicate("email"));
        }
        replace(&mut tables.users, user, |u| u.id == user.id);
        Ok(())
    }

    async fn delete_user(&self, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        if tables.users.len() == before {
            return Ok(false);
        }
        tables.memberships.retain(|m| m.user_id != id);
        tables.comments.retain(|c| c.author_id != id);
        for ticket in tables.tickets.iter_mut() {
            if ticket.reporter_id.as_deref() == Some(id) {
                ticket.reporter_id = None;
            }
            if ticket.assignee_id.as_deref() == Some(id) {
                ticket.assignee_id = None;
            }
        }
        Ok(true)
    }

    async fn insert_project(&self, project: &Project, owner: &Membership) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.projects.iter().any(|p| p.key == project.key) {
            return Err(StoreError::Duplicate("project key"));
        }
        tables.projects.push(project.clone());
        tables.memberships.push(owner.clone());
        Ok(())
    }

    async fn find_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        Ok(self.tables.read().await.projects.iter().find(|p| p.id == id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        Ok(self.tables.read().await.projects.clone())
    }

    async fn update_project(&self, project: &Project) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        replace(&mut tables.projects, project, |p| p.id == project.id);
        Ok(())
    }

    async fn delete_project(&self, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.projects.len();
        tables.projects.retain(|p| p.id != id);
        if tables.projects.len() == before {
            return Ok(false);
        }
        let ticket_ids: Vec<String> = tables
            .tickets
            .iter()
            .filter(|t| t.project_id == id)
            .map(|t| t.id.clone())
            .collect();
        tables.comments.retain(|c| !ticket_ids.contains(&c.ticket_id));
        tables.tickets.retain(|t| t.project_id != id);
        tables.memberships.retain(|m| m.project_id != id);
        Ok(true)
    }

    async fn find_membership(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .memberships
            .iter()
            .find(|m| m.project_id == project_id && m.user_id == user_id)
            .cloned())
    }

    async fn list_memberships(&self, project_id: &str) -> Result<Vec<Membership>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .memberships
            .iter()
            .filter(|m| m.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .memberships
            .iter()
            .any(|m| m.project_id == membership.project_id && m.user_id == membership.user_id)
        {
            return Err(StoreError::Duplicate("membership"));
        }
        tables.memberships.push(membership.clone());
        Ok(())
    }

    async fn update_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        replace(&mut tables.memberships, membership, |m| {
            m.project_id == membership.project_id && m.user_id == membership.user_id
        });
        Ok(())
    }

    async fn delete_membership(&self, project_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.memberships.len();
        tables
            .memberships
            .retain(|m| !(m.project_id == project_id && m.user_id == user_id));
        Ok(tables.memberships.len() != before)
    }

    async fn count_tickets(&self, project_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .tickets
            .iter()
            .filter(|t| t.project_id == project_id)
            .count() as u64)
    }

    async fn max_ticket_sequence(&self, project_id: &str) -> Result<i64, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .tickets
            .iter()
            .filter(|t| t.project_id == project_id)
            .map(|t| t.sequence)
            .max()
            .unwrap_or(0))
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.tickets.iter().any(|t| t.ticket_key == ticket.ticket_key) {
            return Err(StoreError::Duplicate("ticket key"));
        }
        tables.tickets.push(ticket.clone());
        Ok(())
    }

    async fn find_ticket(&self, id: &str) -> Result<Option<Ticket>, StoreError> {
        Ok(self.tables.read().await.tickets.iter().find(|t| t.id == id).cloned())
    }

    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .tickets
            .iter()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn update_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        replace(&mut tables.tickets, ticket, |t| t.id == ticket.id);
        Ok(())
    }

    async fn delete_ticket(&self, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.tickets.len();
        tables.tickets.retain(|t| t.id != id);
        if tables.tickets.len() == before {
            return Ok(false);
        }
        tables.comments.retain(|c| c.ticket_id != id);
        Ok(true)
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        self.tables.write().await.comments.push(comment.clone());
        Ok(())
    }

    async fn find_comment(&self, id: &str) -> Result<Option<Comment>, StoreError> {
        Ok(self.tables.read().await.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn list_comments(&self, ticket_id: &str) -> Result<Vec<Comment>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .comments
            .iter()
            .filter(|c| c.ticket_id == ticket_id)
            .cloned()
            .collect())
    }

    async fn update_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        replace(&mut tables.comments, comment, |c| c.id == comment.id);
        Ok(())
    }

    async fn delete_comment(&self, id: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.comments.len();
        tables.comments.retain(|c| c.id != id);
        Ok(tables.comments.len() != before)
    }
}

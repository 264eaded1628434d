//! Persistence seam. The service layer only talks to [`Store`]; the MongoDB
//! backend is used in deployments and the in-memory one for development and
//! tests. Both implement the same cascade rules:
//!
//! * deleting a project removes its memberships, tickets and their comments;
//! * deleting a ticket removes its comments;
//! * deleting a user removes their memberships and comments and nulls the
//!   reporter/assignee of their tickets.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{Comment, Membership, Project, Ticket, TicketFilter, User};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[async_trait]
pub trait Store: Send + Sync {
    async fn count_users(&self) -> Result<u64, StoreError>;
    /// Fails with `Duplicate` on a taken username or email.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError>;
    /// Looks a user up by username or (lower-cased) email.
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;
    async fn delete_user(&self, id: &str) -> Result<bool, StoreError>;

    /// Inserts the project together with its first membership.
    async fn insert_project(&self, project: &Project, owner: &Membership) -> Result<(), StoreError>;
    async fn find_project(&self, id: &str) -> Result<Option<Project>, StoreError>;
    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;
    async fn update_project(&self, project: &Project) -> Result<(), StoreError>;
    async fn delete_project(&self, id: &str) -> Result<bool, StoreError>;

    async fn find_membership(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<Membership>, StoreError>;
    async fn list_memberships(&self, project_id: &str) -> Result<Vec<Membership>, StoreError>;
    async fn insert_membership(&self, membership: &Membership) -> Result<(), StoreError>;
    async fn update_membership(&self, membership: &Membership) -> Result<(), StoreError>;
    async fn delete_membership(&self, project_id: &str, user_id: &str) -> Result<bool, StoreError>;

    async fn count_tickets(&self, project_id: &str) -> Result<u64, StoreError>;
    /// Highest ticket sequence used in the project, 0 when it has none.
    async fn max_ticket_sequence(&self, project_id: &str) -> Result<i64, StoreError>;
    /// Fails with `Duplicate` when the ticket key is taken.
    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StoreError>;
    async fn find_ticket(&self, id: &str) -> Result<Option<Ticket>, StoreError>;
    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, StoreError>;
    async fn update_ticket(&self, ticket: &Ticket) -> Result<(), StoreError>;
    async fn delete_ticket(&self, id: &str) -> Result<bool, StoreError>;

    async fn insert_comment(&self, comment: &Comment) -> Result<(), StoreError>;
    async fn find_comment(&self, id: &str) -> Result<Option<Comment>, StoreError>;
    async fn list_comments(&self, ticket_id: &str) -> Result<Vec<Comment>, StoreError>;
    async fn update_comment(&self, comment: &Comment) -> Result<(), StoreError>;
    async fn delete_comment(&self, id: &str) -> Result<bool, StoreError>;
}

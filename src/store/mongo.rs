use async_trait::async_trait;
use futures_util::TryStreamExt;
use log::{info, warn};
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};

use super::Store;
use crate::error::StoreError;
use crate::models::{Comment, Membership, Project, Ticket, TicketFilter, User};

const DUPLICATE_KEY: i32 = 11000;

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn init(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        let client_options = ClientOptions::parse(uri).await?;
        let client = Client::with_options(client_options)?;
        let db = client.database(db_name);
        let store = MongoStore { db };
        store.ensure_indexes().await?;
        info!("Connected to MongoDB database {}", db_name);
        Ok(store)
    }

    fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    fn projects(&self) -> Collection<Project> {
        self.db.collection("projects")
    }

    fn memberships(&self) -> Collection<Membership> {
        self.db.collection("project_memberships")
    }

    fn tickets(&self) -> Collection<Ticket> {
        self.db.collection("tickets")
    }

    fn comments(&self) -> Collection<Comment> {
        self.db.collection("comments")
    }

    async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let unique = |keys: Document| {
            IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build()
        };

        self.users().create_index(unique(doc! { "id": 1 })).await?;
        self.users().create_index(unique(doc! { "username": 1 })).await?;
        self.users().create_index(unique(doc! { "email": 1 })).await?;
        self.projects().create_index(unique(doc! { "id": 1 })).await?;
        self.projects().create_index(unique(doc! { "key": 1 })).await?;
        self.memberships()
            .create_index(unique(doc! { "projectId": 1, "userId": 1 }))
            .await?;
        self.tickets().create_index(unique(doc! { "id": 1 })).await?;
        self.tickets().create_index(unique(doc! { "ticketKey": 1 })).await?;
        self.comments().create_index(unique(doc! { "id": 1 })).await?;
        Ok(())
    }
}

fn duplicate_message(err: &mongodb::error::Error) -> Option<&str> {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY =>
        {
            Some(write_error.message.as_str())
        }
        _ => None,
    }
}

/// Maps a duplicate-key failure to `Duplicate(what)`, anything else to `Backend`.
fn map_duplicate(err: mongodb::error::Error, what: &'static str) -> StoreError {
    if duplicate_message(&err).is_some() {
        StoreError::Duplicate(what)
    } else {
        err.into()
    }
}

fn map_user_duplicate(err: mongodb::error::Error) -> StoreError {
    match duplicate_message(&err) {
        Some(message) if message.contains("email") => StoreError::Duplicate("email"),
        Some(_) => StoreError::Duplicate("username"),
        None => err.into(),
    }
}

fn ticket_filter_doc(filter: &TicketFilter) -> Document {
    let mut query = doc! {};
    if let Some(project_id) = &filter.project_id {
        query.insert("projectId", project_id);
    }
    if let Some(assignee_id) = &filter.assignee_id {
        query.insert("assigneeId", assignee_id);
    }
    if let Some(reporter_id) = &filter.reporter_id {
        query.insert("reporterId", reporter_id);
    }
    if let Some(status) = &filter.status {
        query.insert("status", status.as_str());
    }
    query
}

#[async_trait]
impl Store for MongoStore {
    async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(self.users().count_documents(doc! {}).await?)
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        self.users().insert_one(user).await.map_err(map_user_duplicate)?;
        Ok(())
    }

    async fn find_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users().find_one(doc! { "id": id }).await?)
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let filter = doc! {
            "$or": [ { "username": login }, { "email": login.to_lowercase() } ]
        };
        Ok(self.users().find_one(filter).await?)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let cursor = self.users().find(doc! {}).sort(doc! { "createdAt": 1 }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        self.users()
            .replace_one(doc! { "id": &user.id }, user)
            .await
            .map_err(map_user_duplicate)?;
        Ok(())
    }

    async fn delete_user(&self, id: &str) -> Result<bool, StoreError> {
        let res = self.users().delete_one(doc! { "id": id }).await?;
        if res.deleted_count == 0 {
            return Ok(false);
        }
        self.tickets()
            .update_many(doc! { "reporterId": id }, doc! { "$set": { "reporterId": Bson::Null } })
            .await?;
        self.tickets()
            .update_many(doc! { "assigneeId": id }, doc! { "$set": { "assigneeId": Bson::Null } })
            .await?;
        self.memberships().delete_many(doc! { "userId": id }).await?;
        self.comments().delete_many(doc! { "authorId": id }).await?;
        Ok(true)
    }

    async fn insert_project(&self, project: &Project, owner: &Membership) -> Result<(), StoreError> {
        self.projects()
            .insert_one(project)
            .await
            .map_err(|e| map_duplicate(e, "project key"))?;
        if let Err(e) = self.memberships().insert_one(owner).await {
            warn!("Rolling back project {} after membership insert failed", project.id);
            self.projects().delete_one(doc! { "id": &project.id }).await?;
            return Err(e.into());
        }
        Ok(())
    }

    async fn find_project(&self, id: &str) -> Result<Option<Project>, StoreError> {
        Ok(self.projects().find_one(doc! { "id": id }).await?)
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let cursor = self.projects().find(doc! {}).sort(doc! { "createdAt": 1 }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_project(&self, project: &Project) -> Result<(), StoreError> {
        self.projects().replace_one(doc! { "id": &project.id }, project).await?;
        Ok(())
    }

    async fn delete_project(&self, id: &str) -> Result<bool, StoreError> {
        let res = self.projects().delete_one(doc! { "id": id }).await?;
        if res.deleted_count == 0 {
            return Ok(false);
        }
        let tickets: Vec<Ticket> = self
            .tickets()
            .find(doc! { "projectId": id })
            .await?
            .try_collect()
            .await?;
        let ticket_ids: Vec<&str> = tickets.iter().map(|t| t.id.as_str()).collect();
        if !ticket_ids.is_empty() {
            self.comments()
                .delete_many(doc! { "ticketId": { "$in": ticket_ids } })
                .await?;
        }
        self.tickets().delete_many(doc! { "projectId": id }).await?;
        self.memberships().delete_many(doc! { "projectId": id }).await?;
        Ok(true)
    }

    async fn find_membership(
        &self,
        project_id: &str,
        user_id: &str,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(self
            .memberships()
            .find_one(doc! { "projectId": project_id, "userId": user_id })
            .await?)
    }

    async fn list_memberships(&self, project_id: &str) -> Result<Vec<Membership>, StoreError> {
        let cursor = self
            .memberships()
            .find(doc! { "projectId": project_id })
            .sort(doc! { "joinedAt": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        self.memberships()
            .insert_one(membership)
            .await
            .map_err(|e| map_duplicate(e, "membership"))?;
        Ok(())
    }

    async fn update_membership(&self, membership: &Membership) -> Result<(), StoreError> {
        self.memberships()
            .update_one(
                doc! { "projectId": &membership.project_id, "userId": &membership.user_id },
                doc! { "$set": { "role": membership.role.as_str() } },
            )
            .await?;
        Ok(())
    }

    async fn delete_membership(&self, project_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let res = self
            .memberships()
            .delete_one(doc! { "projectId": project_id, "userId": user_id })
            .await?;
        Ok(res.deleted_count == 1)
    }

    async fn count_tickets(&self, project_id: &str) -> Result<u64, StoreError> {
        Ok(self.tickets().count_documents(doc! { "projectId": project_id }).await?)
    }

    async fn max_ticket_sequence(&self, project_id: &str) -> Result<i64, StoreError> {
        let last = self
            .tickets()
            .find_one(doc! { "projectId": project_id })
            .sort(doc! { "sequence": -1 })
            .await?;
        Ok(last.map(|t| t.sequence).unwrap_or(0))
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        self.tickets()
            .insert_one(ticket)
            .await
            .map_err(|e| map_duplicate(e, "ticket key"))?;
        Ok(())
    }

    async fn find_ticket(&self, id: &str) -> Result<Option<Ticket>, StoreError> {
        Ok(self.tickets().find_one(doc! { "id": id }).await?)
    }

    async fn list_tickets(&self, filter: &TicketFilter) -> Result<Vec<Ticket>, StoreError> {
        let cursor = self
            .tickets()
            .find(ticket_filter_doc(filter))
            .sort(doc! { "createdAt": 1, "sequence": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        self.tickets().replace_one(doc! { "id": &ticket.id }, ticket).await?;
        Ok(())
    }

    async fn delete_ticket(&self, id: &str) -> Result<bool, StoreError> {
        let res = self.tickets().delete_one(doc! { "id": id }).await?;
        if res.deleted_count == 0 {
            return Ok(false);
        }
        self.comments().delete_many(doc! { "ticketId": id }).await?;
        Ok(true)
    }

    async fn insert_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        self.comments().insert_one(comment).await?;
        Ok(())
    }

    async fn find_comment(&self, id: &str) -> Result<Option<Comment>, StoreError> {
        Ok(self.comments().find_one(doc! { "id": id }).await?)
    }

    async fn list_comments(&self, ticket_id: &str) -> Result<Vec<Comment>, StoreError> {
        let cursor = self
            .comments()
            .find(doc! { "ticketId": ticket_id })
            .sort(doc! { "createdAt": 1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn update_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        self.comments().replace_one(doc! { "id": &comment.id }, comment).await?;
        Ok(())
    }

    async fn delete_comment(&self, id: &str) -> Result<bool, StoreError> {
        let res = self.comments().delete_one(doc! { "id": id }).await?;
        Ok(res.deleted_count == 1)
    }
}

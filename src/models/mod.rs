pub mod comment;
pub mod project;
pub mod ticket;
pub mod user;

use serde::{Deserialize, Deserializer};

pub use comment::Comment;
pub use project::{MemberView, Membership, Project, ProjectDetails, ProjectRole};
pub use ticket::{Ticket, TicketFilter, TicketPriority, TicketStatus, TicketType};
pub use user::{GlobalRole, User, UserProfile};

/// Distinguishes an absent field (`None`) from an explicit `null`
/// (`Some(None)`) in partial-update payloads.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        assignee: Option<Option<String>>,
    }

    #[test]
    fn double_option_separates_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"assignee":null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"assignee":"u1"}"#).unwrap();
        assert_eq!(absent.assignee, None);
        assert_eq!(null.assignee, Some(None));
        assert_eq!(set.assignee, Some(Some("u1".to_string())));
    }
}

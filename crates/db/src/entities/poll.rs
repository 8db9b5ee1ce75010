//! Poll entity.

use chrono::Utc;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Poll visibility levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Listed in the public feed.
    #[sea_orm(string_value = "public")]
    Public,
    /// Reachable by link only.
    #[sea_orm(string_value = "unlisted")]
    Unlisted,
}

/// When aggregate results become visible to viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ResultsMode {
    /// Visible to everyone.
    #[sea_orm(string_value = "open")]
    Open,
    /// Hidden until the viewer has voted.
    #[sea_orm(string_value = "hidden_until_vote")]
    HiddenUntilVote,
    /// Hidden until the poll closes.
    #[sea_orm(string_value = "hidden_until_close")]
    HiddenUntilClose,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Author user ID
    #[sea_orm(indexed)]
    pub author_id: String,

    pub title: String,

    pub visibility: Visibility,

    pub results_mode: ResultsMode,

    /// Hidden by moderation
    pub is_hidden: bool,

    /// Frozen: visible but no longer accepting votes
    pub is_frozen: bool,

    /// When voting closes (null for no deadline)
    #[sea_orm(nullable)]
    pub closes_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    /// A poll is active if it is not hidden/frozen and not closed by time.
    #[must_use]
    pub fn is_active(&self) -> bool {
        if self.is_hidden || self.is_frozen {
            return false;
        }
        match self.closes_at {
            Some(closes_at) => Utc::now() < closes_at,
            None => true,
        }
    }

    /// Whether the poll has passed its close time.
    #[must_use]
    pub fn is_closed_by_time(&self) -> bool {
        self.closes_at.is_some_and(|closes_at| Utc::now() >= closes_at)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Author,

    #[sea_orm(has_many = "super::poll_option::Entity")]
    Option,

    #[sea_orm(has_many = "super::vote::Entity")]
    Vote,

    #[sea_orm(has_one = "super::poll_stats::Entity")]
    Stats,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::poll_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Option.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl Related<super::poll_stats::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stats.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn poll(closes_at: Option<DateTimeWithTimeZone>, hidden: bool, frozen: bool) -> Model {
        Model {
            id: "p1".to_string(),
            author_id: "u1".to_string(),
            title: "Test".to_string(),
            visibility: Visibility::Public,
            results_mode: ResultsMode::Open,
            is_hidden: hidden,
            is_frozen: frozen,
            closes_at,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_is_active_open_poll() {
        assert!(poll(None, false, false).is_active());
    }

    #[test]
    fn test_is_active_respects_flags() {
        assert!(!poll(None, true, false).is_active());
        assert!(!poll(None, false, true).is_active());
    }

    #[test]
    fn test_is_active_respects_close_time() {
        let past = (Utc::now() - Duration::hours(1)).into();
        let future = (Utc::now() + Duration::hours(1)).into();
        assert!(!poll(Some(past), false, false).is_active());
        assert!(poll(Some(future), false, false).is_active());
    }

    #[test]
    fn test_is_closed_by_time() {
        let past = (Utc::now() - Duration::minutes(1)).into();
        assert!(poll(Some(past), false, false).is_closed_by_time());
        assert!(!poll(None, false, false).is_closed_by_time());
    }
}

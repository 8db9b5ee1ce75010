//! Aggregate entity: materialized per-option vote counts for a poll.
//!
//! Fully derived from vote rows, never a source of truth, and always
//! rebuildable. One row per poll, overwritten in place on every recompute.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll_stats")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub poll_id: String,

    pub total_votes: i64,

    /// Counts per option: `{option_id: count}`
    #[sea_orm(column_type = "JsonBinary")]
    pub option_counts: Json,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::poll::Entity",
        from = "Column::PollId",
        to = "super::poll::Column::Id",
        on_delete = "Cascade"
    )]
    Poll,
}

impl Related<super::poll::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Poll.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

//! Vote entity: the ledger of one vote per (poll, identity channel).
//!
//! A vote carries up to three identity channels (account, device, network);
//! at least one is always set. Uniqueness is enforced by three partial unique
//! indexes, one per non-null channel, plus one on the idempotency key. A new
//! vote is rejected if it collides on any of them. Rows are append-only:
//! created once, never updated, deleted only administratively.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vote")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Poll being voted on
    #[sea_orm(indexed)]
    pub poll_id: String,

    /// Chosen option
    #[sea_orm(indexed)]
    pub option_id: String,

    /// Authenticated account (if any)
    #[sea_orm(nullable)]
    pub account_id: Option<String>,

    /// Peppered hash of the client device token
    #[sea_orm(nullable)]
    pub device_hash: Option<String>,

    /// Peppered hash of the client network address
    #[sea_orm(nullable)]
    pub network_hash: Option<String>,

    /// Client-supplied replay-safety token
    #[sea_orm(nullable)]
    pub idempotency_key: Option<String>,

    pub created_at: DateTimeWithTimeZone,
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

    #[sea_orm(
        belongs_to = "super::poll_option::Entity",
        from = "Column::OptionId",
        to = "super::poll_option::Column::Id",
        on_delete = "Cascade"
    )]
    Option,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AccountId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Account,
}

impl Related<super::poll::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Poll.def()
    }
}

impl Related<super::poll_option::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Option.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

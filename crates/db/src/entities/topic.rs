//! Topic entity: a thematic tag for polls.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "topic")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(unique)]
    pub name: String,

    #[sea_orm(unique)]
    pub slug: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::poll_topic::Entity")]
    PollTopic,
}

impl Related<super::poll_topic::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PollTopic.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

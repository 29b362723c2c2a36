//! `task_results` table — one append-only row per firing attempt.
//!
//! Grounded on `database/job_queue.rs`: a child table keyed to its owner with
//! `Uuid::now_v7()` identity generation and a `belongs_to` relation back to
//! the parent. Unlike `job_queue`, rows here are never mutated after insert.

use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "task_results")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub task_id: Uuid,

    pub run_at: DateTimeUtc,
    pub duration_ms: i64,

    #[sea_orm(nullable)]
    pub status_code: Option<i32>,

    pub success: bool,

    #[sea_orm(column_type = "JsonBinary")]
    pub response_headers: serde_json::Value,

    #[sea_orm(nullable)]
    pub response_body: Option<String>,

    #[sea_orm(nullable)]
    pub error_message: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tasks::Entity",
        from = "Column::TaskId",
        to = "super::tasks::Column::Id",
        on_delete = "Cascade"
    )]
    Task,
}

impl Related<super::tasks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        Self {
            id: Set(uuid::Uuid::now_v7()),
            response_headers: Set(serde_json::json!({})),
            success: Set(false),
            ..ActiveModelTrait::default()
        }
    }
}

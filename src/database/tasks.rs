//! `tasks` table. Grounded on `database/scheduled_cron_triggers.rs`: a
//! `DeriveEntityModel` with a `before_save` hook that stamps `updated_at`,
//! nullable companion columns for the two trigger kinds (here `fire_at` and
//! `cron_expr`, resolving the Open Question in SPEC_FULL.md §9 in favor of
//! the first schema revision from the source material).

use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub name: String,

    /// Non-null iff the trigger is one-off.
    #[sea_orm(nullable)]
    pub fire_at: Option<DateTimeUtc>,

    /// Non-null iff the trigger is cron.
    #[sea_orm(nullable)]
    pub cron_expr: Option<String>,

    pub method: String,
    pub url: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub headers: serde_json::Value,

    /// Opaque wire body; content type is inferred at send time from whether
    /// this parses as JSON (see `executor::send_request`).
    #[sea_orm(nullable, column_type = "Text")]
    pub payload: Option<String>,

    pub status: String,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,

    #[sea_orm(nullable)]
    pub next_run: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub last_run: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::task_results::Entity")]
    TaskResults,
}

impl Related<super::task_results::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaskResults.def()
    }
}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Set(uuid::Uuid::now_v7()),
            status: Set("scheduled".to_string()),
            headers: Set(serde_json::json!({})),
            created_at: Set(now),
            updated_at: Set(now),
            ..ActiveModelTrait::default()
        }
    }

    fn before_save<'life0, 'async_trait, C>(
        mut self,
        _db: &'life0 C,
        insert: bool,
    ) -> ::core::pin::Pin<
        Box<dyn ::core::future::Future<Output = Result<Self, DbErr>> + ::core::marker::Send + 'async_trait>,
    >
    where
        C: 'async_trait + ConnectionTrait,
        'life0: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            if !insert {
                self.updated_at = Set(chrono::Utc::now());
            }
            Ok(self)
        })
    }
}

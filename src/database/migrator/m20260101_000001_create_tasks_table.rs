use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tasks::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Tasks::Name).string().not_null())
                    .col(ColumnDef::new(Tasks::FireAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Tasks::CronExpr).string().null())
                    .col(ColumnDef::new(Tasks::Method).string().not_null())
                    .col(ColumnDef::new(Tasks::Url).string().not_null())
                    .col(ColumnDef::new(Tasks::Headers).json_binary().not_null())
                    .col(ColumnDef::new(Tasks::Payload).text().null())
                    .col(
                        ColumnDef::new(Tasks::Status)
                            .string()
                            .not_null()
                            .default("scheduled"),
                    )
                    .col(
                        ColumnDef::new(Tasks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Tasks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Tasks::NextRun).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Tasks::LastRun).timestamp_with_time_zone().null())
                    .to_owned(),
            )
            .await?;

        // Recovery sweep and cron-dispatch lookups both filter on status and
        // order/compare against next_run.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tasks_status")
                    .table(Tasks::Table)
                    .col(Tasks::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tasks_next_run")
                    .table(Tasks::Table)
                    .col(Tasks::NextRun)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tasks_status_next_run")
                    .table(Tasks::Table)
                    .col(Tasks::Status)
                    .col(Tasks::NextRun)
                    .to_owned(),
            )
            .await?;

        // list_tasks pages ordered by created_at descending.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_tasks_created_at")
                    .table(Tasks::Table)
                    .col(Tasks::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Tasks::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
pub(super) enum Tasks {
    Table,
    Id,
    Name,
    FireAt,
    CronExpr,
    Method,
    Url,
    Headers,
    Payload,
    Status,
    CreatedAt,
    UpdatedAt,
    NextRun,
    LastRun,
}

use sea_orm_migration::prelude::*;

use super::m20260101_000001_create_tasks_table::Tasks;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TaskResults::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TaskResults::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(TaskResults::TaskId).uuid().not_null())
                    .col(
                        ColumnDef::new(TaskResults::RunAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TaskResults::DurationMs).big_integer().not_null())
                    .col(ColumnDef::new(TaskResults::StatusCode).integer().null())
                    .col(ColumnDef::new(TaskResults::Success).boolean().not_null())
                    .col(ColumnDef::new(TaskResults::ResponseHeaders).json_binary().not_null())
                    .col(ColumnDef::new(TaskResults::ResponseBody).text().null())
                    .col(ColumnDef::new(TaskResults::ErrorMessage).text().null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_results_task_id")
                            .from(TaskResults::Table, TaskResults::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_task_results_task_id")
                    .table(TaskResults::Table)
                    .col(TaskResults::TaskId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_task_results_run_at")
                    .table(TaskResults::Table)
                    .col(TaskResults::RunAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TaskResults::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TaskResults {
    Table,
    Id,
    TaskId,
    RunAt,
    DurationMs,
    StatusCode,
    Success,
    ResponseHeaders,
    ResponseBody,
    ErrorMessage,
}

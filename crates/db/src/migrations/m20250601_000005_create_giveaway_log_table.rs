//! Create `giveaway_log` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GiveawayLog::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GiveawayLog::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GiveawayLog::GiveawayId).string_len(32).not_null())
                    .col(ColumnDef::new(GiveawayLog::Actor).string_len(64).not_null())
                    .col(ColumnDef::new(GiveawayLog::Action).string_len(32).not_null())
                    .col(
                        ColumnDef::new(GiveawayLog::Payload)
                            .json_binary()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(GiveawayLog::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_giveaway_log_giveaway")
                            .from(GiveawayLog::Table, GiveawayLog::GiveawayId)
                            .to(Giveaway::Table, Giveaway::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_giveaway_log_giveaway_id")
                    .table(GiveawayLog::Table)
                    .col(GiveawayLog::GiveawayId)
                    .col(GiveawayLog::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GiveawayLog::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum GiveawayLog {
    Table,
    Id,
    GiveawayId,
    Actor,
    Action,
    Payload,
    CreatedAt,
}

#[derive(Iden)]
enum Giveaway {
    Table,
    Id,
}

//! Create `giveaway_winner` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GiveawayWinner::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GiveawayWinner::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(GiveawayWinner::GiveawayId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(GiveawayWinner::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(GiveawayWinner::PickedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GiveawayWinner::Method)
                            .string_len(16)
                            .not_null()
                            .default("initial"),
                    )
                    .col(ColumnDef::new(GiveawayWinner::RerollOf).string_len(32))
                    .col(ColumnDef::new(GiveawayWinner::Prize).string_len(256))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_giveaway_winner_giveaway")
                            .from(GiveawayWinner::Table, GiveawayWinner::GiveawayId)
                            .to(Giveaway::Table, Giveaway::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_giveaway_winner_giveaway_id")
                    .table(GiveawayWinner::Table)
                    .col(GiveawayWinner::GiveawayId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GiveawayWinner::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum GiveawayWinner {
    Table,
    Id,
    GiveawayId,
    UserId,
    PickedAt,
    Method,
    RerollOf,
    Prize,
}

#[derive(Iden)]
enum Giveaway {
    Table,
    Id,
}

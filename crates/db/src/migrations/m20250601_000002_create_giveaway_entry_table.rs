//! Create `giveaway_entry` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GiveawayEntry::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GiveawayEntry::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(GiveawayEntry::GiveawayId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(GiveawayEntry::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(GiveawayEntry::DisplayName)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GiveawayEntry::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GiveawayEntry::Method)
                            .string_len(16)
                            .not_null()
                            .default("button"),
                    )
                    .col(
                        ColumnDef::new(GiveawayEntry::Weight)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(GiveawayEntry::IsBot)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(GiveawayEntry::SuspiciousAlt)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_giveaway_entry_giveaway")
                            .from(GiveawayEntry::Table, GiveawayEntry::GiveawayId)
                            .to(Giveaway::Table, Giveaway::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One entry per member per giveaway
        manager
            .create_index(
                Index::create()
                    .name("idx_giveaway_entry_giveaway_user")
                    .table(GiveawayEntry::Table)
                    .col(GiveawayEntry::GiveawayId)
                    .col(GiveawayEntry::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GiveawayEntry::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum GiveawayEntry {
    Table,
    Id,
    GiveawayId,
    UserId,
    DisplayName,
    JoinedAt,
    Method,
    Weight,
    IsBot,
    SuspiciousAlt,
}

#[derive(Iden)]
enum Giveaway {
    Table,
    Id,
}

//! Create `giveaway_claim` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GiveawayClaim::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GiveawayClaim::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GiveawayClaim::WinnerId).string_len(32).not_null())
                    .col(ColumnDef::new(GiveawayClaim::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(GiveawayClaim::GiveawayId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GiveawayClaim::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GiveawayClaim::ClaimDeadlineAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GiveawayClaim::Status)
                            .string_len(16)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(GiveawayClaim::RerollCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(GiveawayClaim::PreviousClaimId).string_len(32))
                    .col(
                        ColumnDef::new(GiveawayClaim::FirstReminderSent)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(GiveawayClaim::FinalReminderSent)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(GiveawayClaim::ConversationRef).string_len(64))
                    .col(ColumnDef::new(GiveawayClaim::ConversationOpenedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(GiveawayClaim::ClaimedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(GiveawayClaim::ResponseExcerpt).text())
                    .col(ColumnDef::new(GiveawayClaim::ResolvedAt).timestamp_with_time_zone())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_giveaway_claim_giveaway")
                            .from(GiveawayClaim::Table, GiveawayClaim::GiveawayId)
                            .to(Giveaway::Table, Giveaway::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_giveaway_claim_winner")
                            .from(GiveawayClaim::Table, GiveawayClaim::WinnerId)
                            .to(GiveawayWinner::Table, GiveawayWinner::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Claim sweep: pending claims by deadline
        manager
            .create_index(
                Index::create()
                    .name("idx_giveaway_claim_status_deadline")
                    .table(GiveawayClaim::Table)
                    .col(GiveawayClaim::Status)
                    .col(GiveawayClaim::ClaimDeadlineAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_giveaway_claim_giveaway_id")
                    .table(GiveawayClaim::Table)
                    .col(GiveawayClaim::GiveawayId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GiveawayClaim::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum GiveawayClaim {
    Table,
    Id,
    WinnerId,
    UserId,
    GiveawayId,
    CreatedAt,
    ClaimDeadlineAt,
    Status,
    RerollCount,
    PreviousClaimId,
    FirstReminderSent,
    FinalReminderSent,
    ConversationRef,
    ConversationOpenedAt,
    ClaimedAt,
    ResponseExcerpt,
    ResolvedAt,
}

#[derive(Iden)]
enum Giveaway {
    Table,
    Id,
}

#[derive(Iden)]
enum GiveawayWinner {
    Table,
    Id,
}

//! Create `giveaway` table.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Giveaway::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Giveaway::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Giveaway::GuildId).string_len(32).not_null())
                    .col(ColumnDef::new(Giveaway::ChannelId).string_len(32).not_null())
                    .col(ColumnDef::new(Giveaway::HostId).string_len(32).not_null())
                    .col(ColumnDef::new(Giveaway::Title).string_len(256).not_null())
                    .col(ColumnDef::new(Giveaway::Prize).string_len(256))
                    .col(
                        ColumnDef::new(Giveaway::WinnersCount)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(Giveaway::Rules)
                            .json_binary()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Giveaway::Options)
                            .json_binary()
                            .not_null()
                            .default("{}"),
                    )
                    .col(
                        ColumnDef::new(Giveaway::Status)
                            .string_len(16)
                            .not_null()
                            .default("draft"),
                    )
                    .col(ColumnDef::new(Giveaway::ScheduledAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Giveaway::StartsAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Giveaway::EndsAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Giveaway::EndedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Giveaway::CancelledAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Giveaway::Processing)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Giveaway::ProcessingStartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Giveaway::FairRngSeed).string_len(128))
                    .col(
                        ColumnDef::new(Giveaway::WinnersAnnounced)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Giveaway::EntriesCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Giveaway::LastLiveUpdateAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Giveaway::AnnouncementMessageId).string_len(64))
                    .col(
                        ColumnDef::new(Giveaway::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_giveaway_guild_id")
                    .table(Giveaway::Table)
                    .col(Giveaway::GuildId)
                    .to_owned(),
            )
            .await?;

        // Promote tick: scheduled giveaways by start time
        manager
            .create_index(
                Index::create()
                    .name("idx_giveaway_status_scheduled_at")
                    .table(Giveaway::Table)
                    .col(Giveaway::Status)
                    .col(Giveaway::ScheduledAt)
                    .to_owned(),
            )
            .await?;

        // End tick: active giveaways by end time
        manager
            .create_index(
                Index::create()
                    .name("idx_giveaway_status_ends_at")
                    .table(Giveaway::Table)
                    .col(Giveaway::Status)
                    .col(Giveaway::EndsAt)
                    .to_owned(),
            )
            .await?;

        // Lock watchdog
        manager
            .create_index(
                Index::create()
                    .name("idx_giveaway_processing_started_at")
                    .table(Giveaway::Table)
                    .col(Giveaway::Processing)
                    .col(Giveaway::ProcessingStartedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Giveaway::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Giveaway {
    Table,
    Id,
    GuildId,
    ChannelId,
    HostId,
    Title,
    Prize,
    WinnersCount,
    Rules,
    Options,
    Status,
    ScheduledAt,
    StartsAt,
    EndsAt,
    EndedAt,
    CancelledAt,
    Processing,
    ProcessingStartedAt,
    FairRngSeed,
    WinnersAnnounced,
    EntriesCount,
    LastLiveUpdateAt,
    AnnouncementMessageId,
    CreatedAt,
}

use sea_orm_migration::prelude::*;

/// Promotions (限量优惠活动)
/// - claims_count: 已分配的领取序号上限（同时也是领取总数）
/// - last_claimed_at: 最近一次领取时间，用于保证 claimed_at 单调
#[derive(DeriveIden)]
enum Promotions {
    Table,
    Id,
    VenueId,
    Title,
    Description,
    PromotionType,
    CapacityLimit,
    StartsAt,
    EndsAt,
    ClaimsCount,
    LastClaimedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Promotions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Promotions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Promotions::VenueId).big_integer().not_null())
                    .col(ColumnDef::new(Promotions::Title).string_len(255).not_null())
                    .col(ColumnDef::new(Promotions::Description).text().null())
                    .col(
                        ColumnDef::new(Promotions::PromotionType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Promotions::CapacityLimit)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Promotions::StartsAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Promotions::EndsAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Promotions::ClaimsCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Promotions::LastClaimedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Promotions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Promotions::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_promotions_venue")
                    .table(Promotions::Table)
                    .col(Promotions::VenueId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().if_exists().table(Promotions::Table).to_owned())
            .await?;
        Ok(())
    }
}

use sea_orm_migration::prelude::*;

/// Promotion Claims (用户领取记录)
/// - (promotion_id, user_id) 唯一：每个用户每个活动最多一条
/// - (promotion_id, sequence) 唯一：同一活动内名次不可重复
#[derive(DeriveIden)]
enum PromotionClaims {
    Table,
    Id,
    PromotionId,
    UserId,
    Sequence,
    ClaimedAt,
    Status,
    RedeemedAt,
    RedeemedBy,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Promotions {
    Table,
    Id,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PromotionClaims::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PromotionClaims::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PromotionClaims::PromotionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PromotionClaims::UserId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PromotionClaims::Sequence)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PromotionClaims::ClaimedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PromotionClaims::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PromotionClaims::RedeemedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PromotionClaims::RedeemedBy)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PromotionClaims::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    // 不加 ON DELETE CASCADE，删除活动时由服务层先删领取记录
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_promotion_claims_promotion")
                            .from(PromotionClaims::Table, PromotionClaims::PromotionId)
                            .to(Promotions::Table, Promotions::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_promotion_claims_promotion_user_unique")
                    .table(PromotionClaims::Table)
                    .col(PromotionClaims::PromotionId)
                    .col(PromotionClaims::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_promotion_claims_promotion_sequence_unique")
                    .table(PromotionClaims::Table)
                    .col(PromotionClaims::PromotionId)
                    .col(PromotionClaims::Sequence)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_promotion_claims_user")
                    .table(PromotionClaims::Table)
                    .col(PromotionClaims::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .if_exists()
                    .table(PromotionClaims::Table)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

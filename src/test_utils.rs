//! 测试辅助：内存 SQLite + 真实迁移 + 基础数据

use crate::entities::{
    ClaimStatus, PromotionType, promotion_claim_entity as claims, promotion_entity as promotions,
    user_entity as users, venue_entity as venues, venue_staff_entity as staff,
};
use chrono::{DateTime, Duration, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use std::path::PathBuf;

/// 内存库只能使用单连接，否则每个连接各自一份数据库
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

/// 临时文件库，连接池多连接，用于并发场景；drop 时删除文件
pub struct FileDb {
    pub db: DatabaseConnection,
    path: PathBuf,
}

impl Drop for FileDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm", "-journal"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

pub async fn setup_file_db(max_connections: u32) -> FileDb {
    let path = std::env::temp_dir().join(format!("crowdmatch-test-{}.db", uuid::Uuid::new_v4()));
    let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
    options.max_connections(max_connections).sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    FileDb { db, path }
}

pub async fn seed_user(db: &DatabaseConnection, display_name: &str) -> users::Model {
    users::ActiveModel {
        display_name: Set(display_name.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_venue(db: &DatabaseConnection, owner_id: i64) -> venues::Model {
    venues::ActiveModel {
        owner_id: Set(owner_id),
        name: Set("Bar do Zé".to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_staff(db: &DatabaseConnection, venue_id: i64, user_id: i64) -> staff::Model {
    staff::ActiveModel {
        venue_id: Set(venue_id),
        user_id: Set(user_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn seed_promotion(
    db: &DatabaseConnection,
    venue_id: i64,
    capacity_limit: i32,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> promotions::Model {
    seed_typed_promotion(
        db,
        venue_id,
        PromotionType::FirstNCheckin,
        capacity_limit,
        starts_at,
        ends_at,
    )
    .await
}

pub async fn seed_typed_promotion(
    db: &DatabaseConnection,
    venue_id: i64,
    promotion_type: PromotionType,
    capacity_limit: i32,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> promotions::Model {
    let now = Utc::now();
    promotions::ActiveModel {
        venue_id: Set(venue_id),
        title: Set(format!("First {capacity_limit} get a free drink")),
        description: Set(None),
        promotion_type: Set(promotion_type),
        capacity_limit: Set(capacity_limit),
        starts_at: Set(starts_at),
        ends_at: Set(ends_at),
        claims_count: Set(0),
        last_claimed_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

/// 当前有效（一小时前开始，三小时后结束）的签到类活动
pub async fn seed_active_promotion(
    db: &DatabaseConnection,
    venue_id: i64,
    capacity_limit: i32,
) -> promotions::Model {
    let now = Utc::now();
    seed_promotion(
        db,
        venue_id,
        capacity_limit,
        now - Duration::hours(1),
        now + Duration::hours(3),
    )
    .await
}

/// 直接写入领取记录（绕过仲裁，用于构造历史数据）
pub async fn seed_claim(
    db: &DatabaseConnection,
    promotion_id: i64,
    user_id: i64,
    sequence: i64,
    status: ClaimStatus,
) -> claims::Model {
    let now = Utc::now();
    claims::ActiveModel {
        promotion_id: Set(promotion_id),
        user_id: Set(user_id),
        sequence: Set(sequence),
        claimed_at: Set(now),
        status: Set(status),
        redeemed_at: Set(None),
        redeemed_by: Set(None),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

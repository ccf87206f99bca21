use crate::entities::promotion_entity as promotions;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect, RuntimeErr,
};

/// 锁定活动行并读取最新数据，行不存在时返回 None
///
/// 先对该行做一次不改变数据的更新，再带 `FOR UPDATE` 读取。
/// PostgreSQL 上两者都持有行锁直到事务结束；SQLite 不支持行锁，
/// 但事务的第一条语句是写操作，于是从一开始就持有写锁，遇忙按 busy_timeout 等待。
/// 领取、修改、删除活动都经由这里串行化。
pub(crate) async fn lock_promotion<C: ConnectionTrait>(
    conn: &C,
    promotion_id: i64,
) -> Result<Option<promotions::Model>, DbErr> {
    let touched = promotions::Entity::update_many()
        .col_expr(
            promotions::Column::ClaimsCount,
            Expr::col(promotions::Column::ClaimsCount).into(),
        )
        .filter(promotions::Column::Id.eq(promotion_id))
        .exec(conn)
        .await?;
    if touched.rows_affected == 0 {
        return Ok(None);
    }

    promotions::Entity::find_by_id(promotion_id)
        .lock_exclusive()
        .one(conn)
        .await
}

/// 锁冲突 / 序列化失败：同一事务整体重做即可
///
/// SQLite: SQLITE_BUSY (5) / SQLITE_LOCKED (6) 及其扩展码；
/// PostgreSQL: 40001 serialization_failure / 40P01 deadlock_detected。
pub(crate) fn is_contention(err: &DbErr) -> bool {
    let runtime = match err {
        DbErr::Conn(e) | DbErr::Exec(e) | DbErr::Query(e) => e,
        _ => return false,
    };
    let RuntimeErr::SqlxError(sea_orm::SqlxError::Database(db_err)) = runtime else {
        return false;
    };
    db_err.code().is_some_and(|code| is_contention_code(&code))
}

fn is_contention_code(code: &str) -> bool {
    match code {
        "40001" | "40P01" => true,
        other => other
            .parse::<i32>()
            .is_ok_and(|c| c < 10_000 && matches!(c & 0xff, 5 | 6)),
    }
}

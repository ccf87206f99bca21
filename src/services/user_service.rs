use crate::entities::user_entity as users;
use crate::error::AppResult;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::collections::HashMap;

#[derive(Clone)]
pub struct UserService {
    pool: DatabaseConnection,
}

impl UserService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn display_name(&self, user_id: i64) -> AppResult<Option<String>> {
        let user = users::Entity::find_by_id(user_id).one(&self.pool).await?;
        Ok(user.map(|u| u.display_name))
    }

    /// 批量获取展示名；不存在的用户不出现在结果中
    pub async fn display_names(&self, user_ids: &[i64]) -> AppResult<HashMap<i64, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let list = users::Entity::find()
            .filter(users::Column::Id.is_in(user_ids.iter().copied()))
            .all(&self.pool)
            .await?;
        Ok(list.into_iter().map(|u| (u.id, u.display_name)).collect())
    }
}

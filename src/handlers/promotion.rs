use crate::middlewares::auth::current_user_id;
use crate::models::*;
use crate::services::PromotionService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/promotions",
    tag = "promotions",
    security(
        ("bearer_auth" = [])
    ),
    request_body = CreatePromotionRequest,
    responses(
        (status = 201, description = "活动创建成功", body = PromotionResponse),
        (status = 400, description = "参数错误"),
        (status = 403, description = "不是场所所有者")
    )
)]
/// 场所所有者创建限量活动
pub async fn create_promotion(
    service: web::Data<PromotionService>,
    req: HttpRequest,
    body: web::Json<CreatePromotionRequest>,
) -> Result<HttpResponse> {
    let user_id = match current_user_id(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.error_response()),
    };
    match service.create_promotion(user_id, body.into_inner()).await {
        Ok(data) => Ok(HttpResponse::Created().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/promotions/{id}",
    tag = "promotions",
    params(
        ("id" = i64, Path, description = "活动ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取活动成功", body = PromotionResponse),
        (status = 404, description = "活动不存在")
    )
)]
pub async fn get_promotion(
    service: web::Data<PromotionService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match service.get_promotion(path.into_inner()).await {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/promotions/{id}",
    tag = "promotions",
    params(
        ("id" = i64, Path, description = "活动ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    request_body = UpdatePromotionRequest,
    responses(
        (status = 200, description = "活动修改成功", body = PromotionResponse),
        (status = 400, description = "参数错误"),
        (status = 403, description = "不是场所所有者"),
        (status = 404, description = "活动不存在")
    )
)]
/// 修改标题、描述、名额或结束时间
pub async fn update_promotion(
    service: web::Data<PromotionService>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<UpdatePromotionRequest>,
) -> Result<HttpResponse> {
    let user_id = match current_user_id(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.error_response()),
    };
    match service
        .update_promotion(user_id, path.into_inner(), body.into_inner())
        .await
    {
        Ok(data) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": data }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/promotions/{id}",
    tag = "promotions",
    params(
        ("id" = i64, Path, description = "活动ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "活动已删除（连同领取记录）"),
        (status = 403, description = "不是场所所有者"),
        (status = 404, description = "活动不存在")
    )
)]
pub async fn delete_promotion(
    service: web::Data<PromotionService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user_id = match current_user_id(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.error_response()),
    };
    match service.delete_promotion(user_id, path.into_inner()).await {
        Ok(removed_claims) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": { "removed_claims": removed_claims }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/venues/{venue_id}/promotions",
    tag = "promotions",
    params(
        ("venue_id" = i64, Path, description = "场所ID"),
        VenuePromotionQuery
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取场所活动成功", body = [PromotionResponse])
    )
)]
/// 场所活动列表（可只看进行中的、按类型过滤）
pub async fn list_venue_promotions(
    service: web::Data<PromotionService>,
    path: web::Path<i64>,
    query: web::Query<VenuePromotionQuery>,
) -> Result<HttpResponse> {
    match service
        .list_venue_promotions(path.into_inner(), &query.into_inner())
        .await
    {
        Ok(list) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": list }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/promotions/{id}/claims",
    tag = "promotions",
    params(
        ("id" = i64, Path, description = "活动ID"),
        ("page" = Option<u32>, Query, description = "页码 (默认1)"),
        ("per_page" = Option<u32>, Query, description = "每页数量 (默认20)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "获取领取明细成功", body = [PromotionClaimEntry]),
        (status = 403, description = "无权查看该场所"),
        (status = 404, description = "活动不存在")
    )
)]
/// 按名次升序分页查看领取明细（所有者或员工）
pub async fn list_promotion_claims(
    service: web::Data<PromotionService>,
    req: HttpRequest,
    path: web::Path<i64>,
    query: web::Query<ClaimListQuery>,
) -> Result<HttpResponse> {
    let user_id = match current_user_id(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.error_response()),
    };
    match service
        .list_promotion_claims(user_id, path.into_inner(), &query.into_inner())
        .await
    {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置
pub fn promotion_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/promotions", web::post().to(create_promotion))
        .route("/promotions/{id}", web::get().to(get_promotion))
        .route("/promotions/{id}", web::put().to(update_promotion))
        .route("/promotions/{id}", web::delete().to(delete_promotion))
        .route("/promotions/{id}/claims", web::get().to(list_promotion_claims))
        .route(
            "/venues/{venue_id}/promotions",
            web::get().to(list_venue_promotions),
        );
}

use crate::middlewares::auth::current_user_id;
use crate::models::*;
use crate::services::{ClaimCountService, ClaimService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/promotions/{id}/claim",
    tag = "claims",
    params(
        ("id" = i64, Path, description = "活动ID")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "领取成功或已领取（幂等）", body = ClaimOutcome),
        (status = 404, description = "活动不存在"),
        (status = 409, description = "活动尚未开始"),
        (status = 410, description = "活动已结束"),
        (status = 503, description = "领取仲裁失败，可重试")
    )
)]
/// 领取限量活动名额:
/// 1. 同一活动的并发领取在活动行锁上串行，名次连续且唯一
/// 2. 重复领取返回原名次，不会产生第二条记录
/// 3. 超出名额的领取也会记录，但 is_winner 为 false
pub async fn claim_promotion(
    service: web::Data<ClaimService>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let user_id = match current_user_id(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.error_response()),
    };
    match service.claim(path.into_inner(), user_id).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": outcome }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/promotions/claim-counts",
    tag = "claims",
    security(
        ("bearer_auth" = [])
    ),
    request_body = PromotionIdsRequest,
    responses(
        (status = 200, description = "批量获取领取数量成功", body = ClaimCountsResponse)
    )
)]
/// 批量获取领取数量；没有领取记录的活动不返回
pub async fn claim_counts(
    service: web::Data<ClaimCountService>,
    body: web::Json<PromotionIdsRequest>,
) -> Result<HttpResponse> {
    match service.get_claim_counts(&body.promotion_ids).await {
        Ok(counts) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": ClaimCountsResponse { counts }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/promotions/claim-overview",
    tag = "claims",
    security(
        ("bearer_auth" = [])
    ),
    request_body = PromotionIdsRequest,
    responses(
        (status = 200, description = "获取领取概览成功", body = [PromotionClaimOverview])
    )
)]
/// 领取数量 + 当前用户的名次与状态（客户端刷新用，不会产生新领取）
pub async fn claim_overview(
    service: web::Data<ClaimCountService>,
    req: HttpRequest,
    body: web::Json<PromotionIdsRequest>,
) -> Result<HttpResponse> {
    let user_id = match current_user_id(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.error_response()),
    };
    match service
        .get_claim_overview(user_id, &body.promotion_ids)
        .await
    {
        Ok(list) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": list }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置（需在 `/promotions/{id}` 之前注册）
pub fn claim_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/promotions/claim-counts", web::post().to(claim_counts))
        .route("/promotions/claim-overview", web::post().to(claim_overview))
        .route("/promotions/{id}/claim", web::post().to(claim_promotion));
}

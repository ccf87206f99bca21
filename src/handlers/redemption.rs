use crate::middlewares::auth::current_user_id;
use crate::models::*;
use crate::services::RedemptionService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/redemptions",
    tag = "redemptions",
    security(
        ("bearer_auth" = [])
    ),
    request_body = RedeemRequest,
    responses(
        (status = 200, description = "核销结果 success / already_redeemed / not_found / not_winner", body = RedemptionOutcome),
        (status = 400, description = "凭证格式错误"),
        (status = 403, description = "调用者不管理该场所"),
        (status = 410, description = "活动已结束")
    )
)]
/// 店员扫描用户二维码后核销；同一凭证只会成功一次
pub async fn redeem(
    service: web::Data<RedemptionService>,
    req: HttpRequest,
    body: web::Json<RedeemRequest>,
) -> Result<HttpResponse> {
    let staff_user_id = match current_user_id(&req) {
        Ok(id) => id,
        Err(e) => return Ok(e.error_response()),
    };
    match service.redeem(staff_user_id, &body.credential).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": outcome }))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 路由配置
pub fn redemption_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/redemptions", web::post().to(redeem));
}

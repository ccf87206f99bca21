use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{ClaimStatus, PromotionType};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::promotion::create_promotion,
        handlers::promotion::get_promotion,
        handlers::promotion::update_promotion,
        handlers::promotion::delete_promotion,
        handlers::promotion::list_venue_promotions,
        handlers::promotion::list_promotion_claims,
        handlers::claim::claim_promotion,
        handlers::claim::claim_counts,
        handlers::claim::claim_overview,
        handlers::redemption::redeem,
    ),
    components(
        schemas(
            ApiError,
            PromotionType,
            ClaimStatus,
            CreatePromotionRequest,
            UpdatePromotionRequest,
            VenuePromotionQuery,
            PromotionResponse,
            ClaimOutcome,
            PromotionIdsRequest,
            ClaimCountsResponse,
            MyClaimDetail,
            PromotionClaimOverview,
            PromotionClaimEntry,
            ClaimListQuery,
            RedeemRequest,
            RedemptionStatus,
            RedemptionClaimDetails,
            RedemptionOutcome,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "promotions", description = "Venue promotion management API"),
        (name = "claims", description = "Promotion claim arbitration and counts API"),
        (name = "redemptions", description = "Staff redemption API"),
    ),
    info(
        title = "CrowdMatch Promotions API",
        version = "1.0.0",
        description = "First-N promotion claims, counts and redemption",
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

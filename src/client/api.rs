use crate::config::ClientConfig;
use crate::entities::PromotionType;
use crate::error::{AppError, AppResult};
use crate::models::{
    ApiResponse, ClaimCounts, ClaimCountsResponse, ClaimOutcome, PromotionClaimOverview,
    PromotionIdsRequest, PromotionResponse, VenuePromotionQuery,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// 领取相关接口（客户端视角）
#[async_trait]
pub trait PromotionApi: Send + Sync {
    /// 场所当前有效、且类型匹配的活动
    async fn active_promotions(
        &self,
        venue_id: i64,
        promotion_type: PromotionType,
    ) -> AppResult<Vec<PromotionResponse>>;

    async fn claim(&self, promotion_id: i64) -> AppResult<ClaimOutcome>;

    async fn claim_overview(&self, promotion_ids: &[i64])
    -> AppResult<Vec<PromotionClaimOverview>>;

    async fn claim_counts(&self, promotion_ids: &[i64]) -> AppResult<ClaimCounts>;
}

/// HTTP 实现，携带当前用户的访问令牌
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, access_token: impl Into<String>) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl PromotionApi for ApiClient {
    async fn active_promotions(
        &self,
        venue_id: i64,
        promotion_type: PromotionType,
    ) -> AppResult<Vec<PromotionResponse>> {
        let query = VenuePromotionQuery {
            active: true,
            promotion_type: Some(promotion_type),
        };
        let response = self
            .client
            .get(self.url(&format!("/venues/{venue_id}/promotions")))
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await?;
        decode_envelope(response).await
    }

    async fn claim(&self, promotion_id: i64) -> AppResult<ClaimOutcome> {
        let response = self
            .client
            .post(self.url(&format!("/promotions/{promotion_id}/claim")))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        decode_envelope(response).await
    }

    async fn claim_overview(
        &self,
        promotion_ids: &[i64],
    ) -> AppResult<Vec<PromotionClaimOverview>> {
        let response = self
            .client
            .post(self.url("/promotions/claim-overview"))
            .bearer_auth(&self.access_token)
            .json(&PromotionIdsRequest {
                promotion_ids: promotion_ids.to_vec(),
            })
            .send()
            .await?;
        decode_envelope(response).await
    }

    async fn claim_counts(&self, promotion_ids: &[i64]) -> AppResult<ClaimCounts> {
        let response = self
            .client
            .post(self.url("/promotions/claim-counts"))
            .bearer_auth(&self.access_token)
            .json(&PromotionIdsRequest {
                promotion_ids: promotion_ids.to_vec(),
            })
            .send()
            .await?;
        let body: ClaimCountsResponse = decode_envelope(response).await?;
        Ok(body.counts)
    }
}

/// 解析 `{success, data | error}` 包装
async fn decode_envelope<T: DeserializeOwned>(response: reqwest::Response) -> AppResult<T> {
    let status = response.status();
    let text = response.text().await?;
    parse_envelope(status.as_u16(), &text)
}

fn parse_envelope<T: DeserializeOwned>(status: u16, text: &str) -> AppResult<T> {
    let envelope: ApiResponse<T> = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            log::error!("Unexpected response body (status {status}): {text}");
            return Err(AppError::ExternalApiError(format!(
                "Unexpected response (status {status}): {e}"
            )));
        }
    };

    if envelope.success {
        return envelope.data.ok_or_else(|| {
            AppError::ExternalApiError(format!("Response without data (status {status})"))
        });
    }

    match envelope.error {
        Some(error) => Err(AppError::from_api(&error.code, error.message)),
        None => Err(AppError::ExternalApiError(format!(
            "Request failed with status {status}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ClaimStatus;

    #[test]
    fn test_parse_success_envelope() {
        let text = r#"{"success":true,"data":{
            "success":true,"claimed":true,"rank":3,"is_winner":true,"claim_id":9,
            "promotion_id":4,"capacity_limit":10,"claimed_at":"2026-10-18T20:00:00Z",
            "status":"claimed","credential":"9|1|4|2026-10-18T20:00:00.000000Z",
            "message":"Claimed! You are #3 of 10 winners"}}"#;
        let outcome: ClaimOutcome = parse_envelope(200, text).unwrap();
        assert_eq!(outcome.rank, 3);
        assert_eq!(outcome.status, ClaimStatus::Claimed);
    }

    #[test]
    fn test_parse_error_envelope_restores_error_kind() {
        let text = r#"{"success":false,"error":{"code":"PROMOTION_EXPIRED","message":"This promotion has ended"}}"#;
        let err = parse_envelope::<ClaimOutcome>(410, text).unwrap_err();
        assert!(matches!(err, AppError::Expired));
        assert!(!err.is_retryable());

        let text = r#"{"success":false,"error":{"code":"ARBITRATION_FAILURE","message":"lock timeout"}}"#;
        let err = parse_envelope::<ClaimOutcome>(503, text).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_non_json_body_is_retryable() {
        let err = parse_envelope::<ClaimOutcome>(502, "<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, AppError::ExternalApiError(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_connection_dropped_mid_body_is_unknown_outcome() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            // 声明 500 字节，只写出一部分后断开
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 500\r\n\r\n{\"success\":true,\"data\":{\"rank\":",
                )
                .await
                .unwrap();
            socket.flush().await.unwrap();
        });

        let config = ClientConfig {
            base_url: format!("http://{addr}/api/v1"),
            request_timeout_secs: 5,
            ..Default::default()
        };
        let client = ApiClient::new(&config, "token").unwrap();
        let err = client.claim(4).await.unwrap_err();
        server.await.unwrap();

        assert!(matches!(err, AppError::ReqwestError(_)));
        assert!(err.is_unknown_outcome());
    }

    #[test]
    fn test_counts_envelope_uses_string_keys() {
        let text = r#"{"success":true,"data":{"counts":{"4":12}}}"#;
        let body: ClaimCountsResponse = parse_envelope(200, text).unwrap();
        assert_eq!(body.counts.get(&4), Some(&12));
    }
}

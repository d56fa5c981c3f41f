//! HTTP 분석 제출 클라이언트.
//!
//! `AnalysisSubmitter` 포트 구현. 프레임을 base64로 실어
//! `POST /api/v1/ai/analyze-image`로 보낸다.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use chrono::Utc;
use motionwatch_core::error::CoreError;
use motionwatch_core::models::analysis::{AnalysisRequest, AnalysisResult, SubmitAck};
use motionwatch_core::ports::api_client::AnalysisSubmitter;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// 분석 제출 경로
pub const ANALYZE_PATH: &str = "/api/v1/ai/analyze-image";

/// Retry-After 헤더가 없을 때 기본 대기 (초)
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// 응답 상태 코드 확인 및 에러 매핑
///
/// 429 → `RateLimit`, 503 → `ServiceUnavailable`, 그 외 non-2xx → `Network`
pub(crate) async fn check_response(resp: reqwest::Response) -> Result<reqwest::Response, CoreError> {
    let status = resp.status();

    if status.is_success() {
        return Ok(resp);
    }

    let retry_after = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    let text = resp.text().await.unwrap_or_else(|e| {
        warn!("응답 본문 읽기 실패: {e}");
        String::new()
    });

    match status.as_u16() {
        429 => Err(CoreError::RateLimit {
            retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        }),
        503 => Err(CoreError::ServiceUnavailable(text)),
        _ => Err(CoreError::Network(format!("API 에러 ({status}): {text}"))),
    }
}

#[derive(Debug, Serialize)]
struct AnalyzeImageBody<'a> {
    frame_id: &'a str,
    image_base64: String,
    motion_strength: f32,
    timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
}

/// 즉시 응답: 동기 완료, 실패, 대기열 접수 중 하나
#[derive(Debug, Default, Deserialize)]
struct AnalyzeImageResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    detected: Option<String>,
    #[serde(default)]
    processing_time: Option<f64>,
    #[serde(default)]
    llm_model: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// 분석 제출 클라이언트: `AnalysisSubmitter` 포트 구현
pub struct HttpAnalysisClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAnalysisClient {
    /// 새 클라이언트 생성
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn interpret(request: &AnalysisRequest, body: AnalyzeImageResponse) -> Result<SubmitAck, CoreError> {
        match (body.success, body.description) {
            (Some(false), _) => {
                let msg = body
                    .error_message
                    .unwrap_or_else(|| "알 수 없는 오류".to_string());
                Err(CoreError::Internal(format!("백엔드 분석 실패: {msg}")))
            }
            (Some(true), Some(description)) => {
                debug!(
                    "동기 분석 완료: frame_id={}, model={}",
                    request.frame_id,
                    body.llm_model.as_deref().unwrap_or("-")
                );
                Ok(SubmitAck::Completed(AnalysisResult {
                    frame_id: Some(request.frame_id.clone()),
                    description,
                    detected: body.detected,
                    processing_time_seconds: body.processing_time.unwrap_or_default(),
                    timestamp: Utc::now(),
                }))
            }
            _ => {
                debug!(
                    "분석 접수: frame_id={}, status={}",
                    request.frame_id,
                    body.status.as_deref().unwrap_or("queued")
                );
                Ok(SubmitAck::Queued)
            }
        }
    }
}

#[async_trait]
impl AnalysisSubmitter for HttpAnalysisClient {
    async fn submit(&self, request: &AnalysisRequest) -> Result<SubmitAck, CoreError> {
        let url = format!("{}{}", self.base_url, ANALYZE_PATH);
        let body = AnalyzeImageBody {
            frame_id: &request.frame_id,
            image_base64: B64.encode(&request.frame_data),
            motion_strength: request.motion_strength,
            timestamp: request.submitted_at.to_rfc3339(),
            prompt: request.prompt.as_deref(),
        };

        debug!(
            "분석 제출: frame_id={}, {} bytes, strength={:.1}",
            request.frame_id,
            request.frame_data.len(),
            request.motion_strength
        );

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("분석 제출 실패: {e}")))?;
        let resp = check_response(resp).await?;

        // 2xx지만 JSON이 아니면 접수로 본다
        let text = resp
            .text()
            .await
            .map_err(|e| CoreError::Network(format!("응답 읽기 실패: {e}")))?;
        let parsed = serde_json::from_str::<AnalyzeImageResponse>(&text).unwrap_or_default();

        Self::interpret(request, parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use tokio_test::assert_ok;

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            frame_id: "frame_1_ab12cd34".to_string(),
            frame_data: vec![0xFF, 0xD8, 0xFF, 0xD9],
            motion_strength: 42.5,
            submitted_at: Utc::now(),
            prompt: None,
        }
    }

    fn client(server: &mockito::ServerGuard) -> HttpAnalysisClient {
        HttpAnalysisClient::new(&server.url(), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn http_client_creation() {
        let client = HttpAnalysisClient::new("http://localhost:8000/", Duration::from_secs(30));
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url, "http://localhost:8000");
    }

    #[tokio::test]
    async fn queued_acknowledgement() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", ANALYZE_PATH)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "frame_id": "frame_1_ab12cd34",
                "image_base64": "/9j/2Q==",
                "motion_strength": 42.5
            })))
            .with_status(202)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "queued"}"#)
            .create_async()
            .await;

        let ack = client(&server).submit(&request()).await;
        assert_eq!(assert_ok!(ack), SubmitAck::Queued);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn prompt_is_forwarded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", ANALYZE_PATH)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "prompt": "Is anyone at the door?"
            })))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let mut req = request();
        req.prompt = Some("Is anyone at the door?".to_string());
        assert_ok!(client(&server).submit(&req).await);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn synchronous_completion() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", ANALYZE_PATH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"description": "A delivery driver", "detected": "YES",
                    "processing_time": 1.8, "llm_model": "gemini", "success": true}"#,
            )
            .create_async()
            .await;

        match client(&server).submit(&request()).await.unwrap() {
            SubmitAck::Completed(result) => {
                assert_eq!(result.frame_id.as_deref(), Some("frame_1_ab12cd34"));
                assert_eq!(result.description, "A delivery driver");
                assert_eq!(result.detected.as_deref(), Some("YES"));
            }
            other => panic!("unexpected ack: {other:?}"),
        }
    }

    #[tokio::test]
    async fn backend_reported_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", ANALYZE_PATH)
            .with_status(200)
            .with_body(
                r#"{"description": "", "detected": "NO", "processing_time": 0.1,
                    "llm_model": "gemini", "success": false, "error_message": "bad image"}"#,
            )
            .create_async()
            .await;

        let err = client(&server).submit(&request()).await.unwrap_err();
        assert!(err.to_string().contains("bad image"));
    }

    #[tokio::test]
    async fn rate_limit_429() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", ANALYZE_PATH)
            .with_status(429)
            .with_header("retry-after", "12")
            .with_body("Too Many Requests")
            .create_async()
            .await;

        let err = client(&server).submit(&request()).await.unwrap_err();
        assert!(matches!(err, CoreError::RateLimit { retry_after_secs: 12 }));
    }

    #[tokio::test]
    async fn service_unavailable_503() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", ANALYZE_PATH)
            .with_status(503)
            .with_body("API quota exceeded")
            .create_async()
            .await;

        let err = client(&server).submit(&request()).await.unwrap_err();
        assert!(matches!(err, CoreError::ServiceUnavailable(msg) if msg.contains("quota")));
    }

    #[tokio::test]
    async fn other_status_is_network_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", ANALYZE_PATH)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let err = client(&server).submit(&request()).await.unwrap_err();
        assert!(matches!(err, CoreError::Network(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_network_error() {
        let client = HttpAnalysisClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let err = client.submit(&request()).await.unwrap_err();
        assert!(matches!(err, CoreError::Network(_)));
    }
}

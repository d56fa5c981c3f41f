//! 전송 방식 선택.
//!
//! `auto` 모드에서는 `GET /health` 응답 본문에 `sse_connections`가 있으면
//! 스트리밍, 없으면 폴링을 쓴다. 프로브 자체가 실패하면 스트리밍을 택하고
//! 재연결 상태 머신에 복구를 맡긴다.

use motionwatch_core::config::TransportMode;
use motionwatch_core::error::CoreError;
use std::time::Duration;
use tracing::{info, warn};

use crate::http_client::check_response;

/// 헬스 체크 경로
pub const HEALTH_PATH: &str = "/health";

/// 확정된 전송 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedTransport {
    Stream,
    Poll,
}

/// 서버 기능 조회
pub async fn probe_capabilities(base_url: &str, timeout: Duration) -> Result<ResolvedTransport, CoreError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

    let url = format!("{}{}", base_url.trim_end_matches('/'), HEALTH_PATH);
    let resp = client
        .get(&url)
        .send()
        .await
        .map_err(|e| CoreError::Network(format!("헬스 체크 실패: {e}")))?;
    let body: serde_json::Value = check_response(resp)
        .await?
        .json()
        .await
        .map_err(|e| CoreError::Network(format!("헬스 체크 응답 파싱 실패: {e}")))?;

    if body.get("sse_connections").is_some() {
        Ok(ResolvedTransport::Stream)
    } else {
        Ok(ResolvedTransport::Poll)
    }
}

/// 설정 모드 → 실제 전송 방식
pub async fn resolve_transport(mode: TransportMode, base_url: &str, timeout: Duration) -> ResolvedTransport {
    match mode {
        TransportMode::Stream => ResolvedTransport::Stream,
        TransportMode::Poll => ResolvedTransport::Poll,
        TransportMode::Auto => match probe_capabilities(base_url, timeout).await {
            Ok(resolved) => {
                info!("전송 방식 자동 선택: {resolved:?}");
                resolved
            }
            Err(e) => {
                warn!("기능 조회 실패, 스트리밍으로 시도: {e}");
                ResolvedTransport::Stream
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn advertises_streaming() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", HEALTH_PATH)
            .with_status(200)
            .with_body(r#"{"status": "ok", "sse_connections": 2}"#)
            .create_async()
            .await;

        let resolved = resolve_transport(TransportMode::Auto, &server.url(), Duration::from_secs(2)).await;
        assert_eq!(resolved, ResolvedTransport::Stream);
    }

    #[tokio::test]
    async fn falls_back_to_polling() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", HEALTH_PATH)
            .with_status(200)
            .with_body(r#"{"status": "ok"}"#)
            .create_async()
            .await;

        let resolved = resolve_transport(TransportMode::Auto, &server.url(), Duration::from_secs(2)).await;
        assert_eq!(resolved, ResolvedTransport::Poll);
    }

    #[tokio::test]
    async fn probe_failure_prefers_streaming() {
        let resolved =
            resolve_transport(TransportMode::Auto, "http://127.0.0.1:1", Duration::from_millis(500)).await;
        assert_eq!(resolved, ResolvedTransport::Stream);
    }

    #[tokio::test]
    async fn explicit_mode_skips_probe() {
        // 서버 없이도 즉시 결정
        let resolved = resolve_transport(TransportMode::Poll, "http://127.0.0.1:1", Duration::from_millis(1)).await;
        assert_eq!(resolved, ResolvedTransport::Poll);
    }
}

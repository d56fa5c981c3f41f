//! SSE(Server-Sent Events) 커넥터.
//!
//! `GET /api/v1/events/stream`을 열고 `eventsource-stream`으로 이벤트를 해석한다.
//! 재연결은 [`ReconnectingTransport`](crate::transport::ReconnectingTransport)가 담당.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::StreamExt;
use motionwatch_core::error::CoreError;
use motionwatch_core::models::analysis::AnalysisResult;
use std::time::Duration;
use tracing::{debug, warn};

use crate::http_client::check_response;
use crate::transport::{MessageStream, StreamConnector, WireMessage};

/// 이벤트 스트림 경로
pub const STREAM_PATH: &str = "/api/v1/events/stream";

/// SSE 커넥터: `StreamConnector` 구현
pub struct SseConnector {
    base_url: String,
    http_client: reqwest::Client,
}

impl SseConnector {
    /// 새 SSE 커넥터 생성
    ///
    /// 스트림은 장시간 유지되므로 전체 요청 타임아웃 대신 연결 타임아웃만 건다.
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, CoreError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// SSE 이벤트 데이터를 `WireMessage`로 파싱
    ///
    /// 알 수 없는 타입은 debug, 깨진 JSON은 warn 로그 후 `None`.
    pub fn parse_event(event_type: &str, data: &str) -> Option<WireMessage> {
        match event_type {
            "connected" => {
                let val = parse_json(event_type, data)?;
                let client_id = val.get("client_id")?.as_str()?.to_string();
                Some(WireMessage::Connected { client_id })
            }
            "ai_analysis" => match serde_json::from_str::<AnalysisResult>(data) {
                Ok(result) => Some(WireMessage::AnalysisResult(result)),
                Err(e) => {
                    warn!("분석 결과 파싱 실패: {e}");
                    None
                }
            },
            "analysis_failed" => {
                let val = parse_json(event_type, data)?;
                let frame_id = val.get("frame_id")?.as_str()?.to_string();
                let reason = val
                    .get("reason")
                    .and_then(|r| r.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                Some(WireMessage::AnalysisFailed { frame_id, reason })
            }
            "heartbeat" => Some(WireMessage::Heartbeat),
            // 이벤트 이름 없이 `{type, data}` 봉투로 오는 메시지
            "message" => {
                let val = parse_json(event_type, data)?;
                let inner_type = val.get("type")?.as_str()?;
                if inner_type == "message" {
                    return None;
                }
                let inner = val.get("data").cloned().unwrap_or(serde_json::Value::Null);
                Self::parse_event(inner_type, &inner.to_string())
            }
            _ => {
                debug!("알 수 없는 SSE 이벤트 타입: {event_type}");
                None
            }
        }
    }
}

fn parse_json(event_type: &str, data: &str) -> Option<serde_json::Value> {
    match serde_json::from_str(data) {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("SSE 데이터 파싱 실패 ({event_type}): {e}");
            None
        }
    }
}

#[async_trait]
impl StreamConnector for SseConnector {
    async fn open(&self) -> Result<MessageStream, CoreError> {
        let url = format!("{}{}", self.base_url, STREAM_PATH);
        debug!("SSE 연결: {url}");

        let resp = self
            .http_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("SSE 연결 실패: {e}")))?;
        let resp = check_response(resp).await?;

        let stream = resp
            .bytes_stream()
            .eventsource()
            .filter_map(|item| async move {
                match item {
                    Ok(event) => {
                        let event_type = if event.event.is_empty() {
                            "message"
                        } else {
                            event.event.as_str()
                        };
                        SseConnector::parse_event(event_type, &event.data).map(Ok)
                    }
                    Err(e) => Some(Err(CoreError::Network(format!("SSE 스트림 에러: {e}")))),
                }
            });

        Ok(stream.boxed())
    }

    fn name(&self) -> &'static str {
        "sse"
    }
}

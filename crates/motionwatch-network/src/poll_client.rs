//! 폴링 폴백 커넥터.
//!
//! 스트리밍 채널을 열 수 없는 환경용. 결과를 기다리는 프레임 ID를 모아
//! `poll_interval`마다 `POST /api/v1/analysis/poll`로 조회한다.
//! 조회할 ID가 없는 주기는 요청 없이 heartbeat로 처리해 무수신 타임아웃을 막는다.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use motionwatch_core::error::CoreError;
use motionwatch_core::models::analysis::AnalysisResult;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::http_client::check_response;
use crate::transport::{MessageStream, StreamConnector, WireMessage};

/// 폴링 경로
pub const POLL_PATH: &str = "/api/v1/analysis/poll";

#[derive(Debug, Serialize)]
struct PollRequest {
    frame_ids: Vec<String>,
}

/// 실패 항목: 프레임 ID 문자열 또는 `{frame_id, reason}` 객체
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FailedFrame {
    Id(String),
    Detailed {
        frame_id: String,
        #[serde(default)]
        reason: Option<String>,
    },
}

impl FailedFrame {
    fn into_message(self) -> WireMessage {
        let (frame_id, reason) = match self {
            FailedFrame::Id(frame_id) => (frame_id, None),
            FailedFrame::Detailed { frame_id, reason } => (frame_id, reason),
        };
        WireMessage::AnalysisFailed {
            frame_id,
            reason: reason.unwrap_or_else(|| "unknown".to_string()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PollResponse {
    #[serde(default)]
    completed: Vec<AnalysisResult>,
    #[serde(default)]
    failed: Vec<FailedFrame>,
}

#[derive(Clone)]
struct Poller {
    client: reqwest::Client,
    url: String,
    tracked: Arc<Mutex<HashSet<String>>>,
}

impl Poller {
    /// 1회 조회 → 메시지 목록 (결과가 없으면 heartbeat 하나)
    async fn poll_once(&self) -> Result<Vec<WireMessage>, CoreError> {
        let frame_ids: Vec<String> = self.tracked.lock().iter().cloned().collect();

        let resp = self
            .client
            .post(&self.url)
            .json(&PollRequest { frame_ids })
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("폴링 요청 실패: {e}")))?;
        let body: PollResponse = check_response(resp)
            .await?
            .json()
            .await
            .map_err(|e| CoreError::Network(format!("폴링 응답 파싱 실패: {e}")))?;

        let mut messages: Vec<WireMessage> = body
            .completed
            .into_iter()
            .map(WireMessage::AnalysisResult)
            .chain(body.failed.into_iter().map(FailedFrame::into_message))
            .collect();

        if messages.is_empty() {
            messages.push(WireMessage::Heartbeat);
        } else {
            debug!("폴링 결과 {}건", messages.len());
        }
        Ok(messages)
    }
}

/// 폴링 커넥터: `StreamConnector` 구현
pub struct PollConnector {
    poller: Poller,
    interval: Duration,
}

impl PollConnector {
    pub fn new(base_url: &str, interval: Duration, request_timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("HTTP 클라이언트 빌드 실패: {e}")))?;

        Ok(Self {
            poller: Poller {
                client,
                url: format!("{}{}", base_url.trim_end_matches('/'), POLL_PATH),
                tracked: Arc::new(Mutex::new(HashSet::new())),
            },
            interval,
        })
    }

    /// 현재 추적 중인 프레임 수
    pub fn tracked_count(&self) -> usize {
        self.poller.tracked.lock().len()
    }
}

#[async_trait]
impl StreamConnector for PollConnector {
    /// 첫 조회 성공을 연결 수립으로 본다
    async fn open(&self) -> Result<MessageStream, CoreError> {
        let first = self.poller.poll_once().await?;
        let poller = self.poller.clone();
        let interval = self.interval;

        let rest = stream::unfold(poller, move |poller| async move {
            tokio::time::sleep(interval).await;
            let batch = if poller.tracked.lock().is_empty() {
                Ok(vec![WireMessage::Heartbeat])
            } else {
                poller.poll_once().await
            };
            Some((batch, poller))
        });

        let batches = stream::once(async move { Ok(first) }).chain(rest);
        let messages = batches.flat_map(|batch| match batch {
            Ok(messages) => stream::iter(messages.into_iter().map(Ok).collect::<Vec<_>>()),
            Err(e) => stream::iter(vec![Err(e)]),
        });

        Ok(messages.boxed())
    }

    fn name(&self) -> &'static str {
        "poll"
    }

    fn track(&self, frame_id: &str) {
        self.poller.tracked.lock().insert(frame_id.to_string());
    }

    fn untrack(&self, frame_id: &str) {
        self.poller.tracked.lock().remove(frame_id);
    }
}

//! 분석 요청/결과 모델.
//!
//! 코디네이터가 생성하는 `AnalysisRequest`, 백엔드가 스트림으로 돌려주는
//! `AnalysisResult`, 그리고 요청별 최종 결과 `AnalysisOutcome`.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// 분석 요청 (제출 시점에 생성, 이후 불변)
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// 세션 내 유일한 프레임 ID
    pub frame_id: String,
    /// 인코딩된 이미지 바이트 (JPEG)
    pub frame_data: Vec<u8>,
    /// 제출을 유발한 모션 강도
    pub motion_strength: f32,
    /// 제출 시각
    pub submitted_at: DateTime<Utc>,
    /// 사용자 지정 분석 프롬프트 (None이면 백엔드 기본값)
    pub prompt: Option<String>,
}

/// 분석 결과
///
/// 백엔드가 `frame_id`를 돌려주지 않을 수 있다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// 요청 프레임 ID
    #[serde(default, alias = "frameId")]
    pub frame_id: Option<String>,
    /// 모델이 생성한 설명
    pub description: String,
    /// 감지 여부 플래그 ("YES" / "NO")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected: Option<String>,
    /// 백엔드 처리 시간 (초)
    #[serde(
        default,
        rename = "processing_time",
        alias = "processingTimeSeconds",
        alias = "processing_time_seconds"
    )]
    pub processing_time_seconds: f64,
    /// 결과 생성 시각
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// RFC3339 또는 타임존 없는 ISO-8601 문자열을 UTC로 해석
///
/// 백엔드는 `datetime.now().isoformat()` 형식(타임존 없음)을 보낸다.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

/// 제출 직후 응답
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitAck {
    /// 대기열에 들어감: 결과는 이벤트 전송 계층으로 도착
    Queued,
    /// 동기 처리 완료 (드묾)
    Completed(AnalysisResult),
}

/// 분석 실패 사유
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// 제한 시간 내 결과 미도착
    Timeout,
    /// 수락 후 프레임 캡처 또는 인코딩 실패
    Capture(String),
    /// 제출 실패 (네트워크, non-2xx)
    Submission(String),
    /// 백엔드가 분석 실패를 보고
    Backend(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Timeout => write!(f, "timeout"),
            FailureReason::Capture(msg) => write!(f, "capture: {msg}"),
            FailureReason::Submission(msg) => write!(f, "submission: {msg}"),
            FailureReason::Backend(msg) => write!(f, "backend: {msg}"),
        }
    }
}

/// 요청 단위 최종 결과 (호출자에게 통지)
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// 대기 작업과 매칭된 결과
    Completed(AnalysisResult),
    /// 매칭되는 작업이 없는 결과 (최신 결과로만 노출)
    Uncorrelated(AnalysisResult),
    /// 요청 실패
    Failed {
        frame_id: String,
        reason: FailureReason,
    },
}

//! 애플리케이션 설정 구조체.
//!
//! 서버 URL, 모션 감지 주기/민감도, 분석 레이트 리밋, 전송 계층 재연결 정책 등
//! 런타임 설정을 정의한다. `ConfigManager`를 통해 JSON 파일에서 로드.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// 서버 연결 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 모션 감지 설정
    #[serde(default)]
    pub motion: MotionConfig,
    /// 분석 제출 설정
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// 이벤트 전송 계층 설정
    #[serde(default)]
    pub transport: TransportConfig,
}

// ============================================================
// 서버 설정
// ============================================================

/// 서버 연결 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// API 서버 기본 URL (예: "https://api.example.com")
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// 요청 타임아웃 (밀리초)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ServerConfig {
    /// HTTP 요청 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_ms() -> u64 {
    15_000
}

// ============================================================
// 모션 감지 설정
// ============================================================

/// 모션 감지 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionConfig {
    /// 감지 틱 간격 (밀리초)
    #[serde(default = "default_detection_interval_ms")]
    pub detection_interval_ms: u64,
    /// 민감도 (1-100, 범위 밖은 보정)
    #[serde(default = "default_sensitivity")]
    pub sensitivity: i32,
    /// 스냅샷 프레임 파일 경로 (외부 캡처 프로세스가 갱신)
    #[serde(default)]
    pub frame_path: Option<PathBuf>,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            detection_interval_ms: default_detection_interval_ms(),
            sensitivity: default_sensitivity(),
            frame_path: None,
        }
    }
}

impl MotionConfig {
    /// 감지 틱 간격
    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }
}

fn default_detection_interval_ms() -> u64 {
    500
}

fn default_sensitivity() -> i32 {
    50
}

// ============================================================
// 분석 설정
// ============================================================

/// 분석 제출 설정: 유의미 임계값, 레이트 리밋, 타임아웃
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// 제출 최소 모션 강도 (0.0 ~ 100.0)
    #[serde(default = "default_significance_threshold")]
    pub significance_threshold: f32,
    /// 분당 최대 제출 수 (롤링 60초 윈도우)
    #[serde(default = "default_max_requests_per_minute")]
    pub max_requests_per_minute: u32,
    /// 제출 간 최소 간격 (밀리초)
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// 요청별 결과 대기 타임아웃 (밀리초)
    #[serde(default = "default_analysis_timeout_ms")]
    pub request_timeout_ms: u64,
    /// 사용자 지정 분석 프롬프트
    #[serde(default)]
    pub prompt: Option<String>,
    /// 제출 이미지 최대 너비 (초과 시 축소)
    #[serde(default = "default_max_frame_width")]
    pub max_frame_width: u32,
    /// JPEG 품질 (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            significance_threshold: default_significance_threshold(),
            max_requests_per_minute: default_max_requests_per_minute(),
            min_interval_ms: default_min_interval_ms(),
            request_timeout_ms: default_analysis_timeout_ms(),
            prompt: None,
            max_frame_width: default_max_frame_width(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl AnalysisConfig {
    /// 제출 간 최소 간격
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    /// 요청별 타임아웃
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_significance_threshold() -> f32 {
    30.0
}

fn default_max_requests_per_minute() -> u32 {
    6
}

fn default_min_interval_ms() -> u64 {
    5_000
}

fn default_analysis_timeout_ms() -> u64 {
    30_000
}

fn default_max_frame_width() -> u32 {
    640
}

fn default_jpeg_quality() -> u8 {
    80
}

// ============================================================
// 전송 계층 설정
// ============================================================

/// 결과 수신 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// 서버 기능 탐지 후 선택
    #[default]
    Auto,
    /// SSE 스트림 고정
    Stream,
    /// 폴링 폴백 고정
    Poll,
}

impl std::str::FromStr for TransportMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(TransportMode::Auto),
            "stream" | "sse" => Ok(TransportMode::Stream),
            "poll" | "polling" => Ok(TransportMode::Poll),
            other => Err(CoreError::Config(format!("알 수 없는 전송 방식: {other}"))),
        }
    }
}

/// 이벤트 전송 계층 설정: 재연결 정책, 유휴 타임아웃
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// 수신 방식
    #[serde(default)]
    pub mode: TransportMode,
    /// 재연결 기본 지연 (밀리초, 시도마다 2배)
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// 최대 재연결 시도 횟수
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// 메시지(하트비트 포함) 미수신 허용 시간 (밀리초)
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// 폴링 간격 (밀리초, 폴링 모드)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: TransportMode::Auto,
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            idle_timeout_ms: default_idle_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl TransportConfig {
    /// 재연결 기본 지연
    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    /// 유휴 타임아웃
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// 폴링 간격
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_reconnect_base_delay_ms() -> u64 {
    1_000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_idle_timeout_ms() -> u64 {
    65_000
}

fn default_poll_interval_ms() -> u64 {
    2_000
}

// ============================================================
// AppConfig impl
// ============================================================

impl Default for AppConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl AppConfig {
    /// 기본 설정값 반환
    pub fn default_config() -> Self {
        Self {
            server: ServerConfig::default(),
            motion: MotionConfig::default(),
            analysis: AnalysisConfig::default(),
            transport: TransportConfig::default(),
        }
    }

    /// 설정값 검증
    ///
    /// 민감도는 검증하지 않는다 (범위 밖 값은 감지 시 보정).
    pub fn validate(&self) -> Result<(), CoreError> {
        fn invalid(field: &str, message: &str) -> CoreError {
            CoreError::Validation {
                field: field.to_string(),
                message: message.to_string(),
            }
        }

        if self.server.base_url.trim().is_empty() {
            return Err(invalid("server.base_url", "비어 있을 수 없습니다"));
        }
        if self.motion.detection_interval_ms == 0 {
            return Err(invalid("motion.detection_interval_ms", "0보다 커야 합니다"));
        }
        if self.analysis.max_requests_per_minute == 0 {
            return Err(invalid(
                "analysis.max_requests_per_minute",
                "0보다 커야 합니다",
            ));
        }
        if self.analysis.request_timeout_ms == 0 {
            return Err(invalid("analysis.request_timeout_ms", "0보다 커야 합니다"));
        }
        if !(0.0..=100.0).contains(&self.analysis.significance_threshold) {
            return Err(invalid(
                "analysis.significance_threshold",
                "0.0 ~ 100.0 범위여야 합니다",
            ));
        }
        if self.analysis.jpeg_quality == 0 || self.analysis.jpeg_quality > 100 {
            return Err(invalid("analysis.jpeg_quality", "1 ~ 100 범위여야 합니다"));
        }
        if self.transport.reconnect_base_delay_ms == 0 {
            return Err(invalid(
                "transport.reconnect_base_delay_ms",
                "0보다 커야 합니다",
            ));
        }
        if self.transport.poll_interval_ms == 0 {
            return Err(invalid("transport.poll_interval_ms", "0보다 커야 합니다"));
        }
        Ok(())
    }
}

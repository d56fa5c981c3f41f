//! 이벤트 전송 계층 연결 상태 및 이벤트.

use serde::{Deserialize, Serialize};

use crate::models::analysis::AnalysisResult;

/// 연결 상태
///
/// 전이: `Closed → Connecting → Open`. `Closed`는 `Connecting` 또는 `Open`에서만 도달한다.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// 연결 시도 중
    Connecting,
    /// 연결됨
    Open,
    /// 닫힘
    #[default]
    Closed,
}

impl ConnectionState {
    /// 현재 상태에서 `next`로의 전이가 허용되는지
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        matches!(
            (self, next),
            (ConnectionState::Closed, ConnectionState::Connecting)
                | (ConnectionState::Connecting, ConnectionState::Open)
                | (ConnectionState::Connecting, ConnectionState::Closed)
                | (ConnectionState::Open, ConnectionState::Closed)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// 전송 계층이 구독자에게 전달하는 이벤트
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// 서버가 연결을 확인함
    Connected { client_id: String },
    /// 분석 결과 수신
    AnalysisResult(AnalysisResult),
    /// 백엔드가 특정 프레임 분석 실패를 보고 (폴링 폴백)
    AnalysisFailed { frame_id: String, reason: String },
    /// 연결 에러 (재연결 상태 머신 구동)
    Error(String),
    /// 재연결 한도 소진: 자동 복구 없음
    Closed,
}

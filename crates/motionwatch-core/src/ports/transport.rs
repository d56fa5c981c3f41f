//! 이벤트 전송 계층 포트.
//!
//! 구현: `motionwatch-network` crate (SSE 스트림, 폴링 폴백)

use tokio::sync::{broadcast, watch};

use crate::models::connection::{ConnectionState, TransportEvent};

/// 백엔드 → 클라이언트 결과 전달 채널
///
/// 콜백 객체 대신 구독 채널로 이벤트를 전달한다.
/// 구독자는 원하는 만큼 `subscribe()`로 수신기를 만들 수 있다.
pub trait EventTransport: Send + Sync {
    /// 연결 시작 (비동기로 진행, 호출자는 대기하지 않음)
    ///
    /// 이미 연결 중이거나 열려 있으면 아무것도 하지 않는다.
    fn connect(&self);

    /// 연결 종료 + 재연결 카운터 초기화
    ///
    /// 연결한 적이 없어도 안전하다. 대기 중인 재연결 타이머도 취소된다.
    fn disconnect(&self);

    /// 현재 연결 상태 (동기)
    fn connection_state(&self) -> ConnectionState;

    /// 상태 전이 수신기
    fn state_changes(&self) -> watch::Receiver<ConnectionState>;

    /// 이벤트 구독
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;

    /// 결과를 기다리는 프레임 등록 (폴링 구현만 사용)
    fn track(&self, _frame_id: &str) {}

    /// 프레임 등록 해제 (폴링 구현만 사용)
    fn untrack(&self, _frame_id: &str) {}
}

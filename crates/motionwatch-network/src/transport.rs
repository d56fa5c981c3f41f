//! 재연결 이벤트 전송 계층.
//!
//! `EventTransport` 포트 구현. 실제 전달 방식(SSE 스트림, 폴링)은
//! [`StreamConnector`]로 분리하고, 상태 머신과 exponential backoff 재연결은
//! [`ReconnectingTransport`] 하나가 담당한다.
//!
//! 상태: `Closed → Connecting → Open`. 비정상 종료 시 `Closed`로 돌아간 뒤
//! `base * 2^(n-1)` 지연 후 재시도하며, 한도를 넘으면 `TransportEvent::Closed`를
//! 한 번 발행하고 멈춘다.

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use motionwatch_core::config::TransportConfig;
use motionwatch_core::error::CoreError;
use motionwatch_core::models::analysis::AnalysisResult;
use motionwatch_core::models::connection::{ConnectionState, TransportEvent};
use motionwatch_core::ports::transport::EventTransport;
use motionwatch_core::timer::CancelableTimer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, trace, warn};

/// 이벤트 브로드캐스트 버퍼 크기
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// 커넥터가 해석한 서버 메시지
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    /// 연결 확인 (`connected`)
    Connected { client_id: String },
    /// 분석 결과 (`ai_analysis`)
    AnalysisResult(AnalysisResult),
    /// 분석 실패 (`analysis_failed`, 폴링 전용)
    AnalysisFailed { frame_id: String, reason: String },
    /// 연결 유지 신호 (`heartbeat`)
    Heartbeat,
}

/// 열린 채널에서 읽는 메시지 스트림
///
/// `None`은 서버 측 종료, `Err`는 전송 오류. 둘 다 재연결 대상이다.
pub type MessageStream = BoxStream<'static, Result<WireMessage, CoreError>>;

/// 전달 방식 추상화
#[async_trait]
pub trait StreamConnector: Send + Sync + 'static {
    /// 채널 열기 (성공 시 `Open`)
    async fn open(&self) -> Result<MessageStream, CoreError>;

    /// 로그용 이름
    fn name(&self) -> &'static str;

    /// 결과 대기 프레임 등록 (폴링 커넥터만 사용)
    fn track(&self, _frame_id: &str) {}

    /// 결과 대기 프레임 해제
    fn untrack(&self, _frame_id: &str) {}
}

/// 재연결 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// 첫 재연결 지연
    pub base_delay: Duration,
    /// 최대 재연결 시도 횟수
    pub max_attempts: u32,
    /// 무수신 허용 시간 (0이면 비활성)
    pub idle_timeout: Duration,
}

impl ReconnectPolicy {
    /// n번째(1부터) 재연결 지연: `base * 2^(n-1)`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl From<&TransportConfig> for ReconnectPolicy {
    fn from(config: &TransportConfig) -> Self {
        Self {
            base_delay: config.reconnect_base_delay(),
            max_attempts: config.max_reconnect_attempts,
            idle_timeout: config.idle_timeout(),
        }
    }
}

struct Shared<C> {
    connector: C,
    policy: ReconnectPolicy,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<TransportEvent>,
    attempts: AtomicU32,
    /// 연결 세대: `disconnect()` 이후 이전 태스크의 늦은 갱신을 무시
    epoch: AtomicU64,
}

impl<C: StreamConnector> Shared<C> {
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn set_state(&self, epoch: u64, next: ConnectionState) {
        if !self.is_current(epoch) {
            return;
        }
        self.force_state(next);
    }

    fn force_state(&self, next: ConnectionState) {
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if !current.can_transition_to(next) {
                debug!("비정상 상태 전이: {current} → {next}");
            }
            trace!("[{}] 연결 상태: {current} → {next}", self.connector.name());
            *current = next;
            true
        });
    }

    fn emit(&self, epoch: u64, event: TransportEvent) {
        if !self.is_current(epoch) {
            return;
        }
        // 구독자가 없으면 버림
        let _ = self.events_tx.send(event);
    }

    fn dispatch(&self, epoch: u64, message: WireMessage) {
        match message {
            WireMessage::Connected { client_id } => {
                info!("[{}] 서버 연결 확인: client_id={client_id}", self.connector.name());
                self.emit(epoch, TransportEvent::Connected { client_id });
            }
            WireMessage::AnalysisResult(result) => {
                if let Some(id) = result.frame_id.as_deref() {
                    self.connector.untrack(id);
                }
                self.emit(epoch, TransportEvent::AnalysisResult(result));
            }
            WireMessage::AnalysisFailed { frame_id, reason } => {
                self.connector.untrack(&frame_id);
                self.emit(epoch, TransportEvent::AnalysisFailed { frame_id, reason });
            }
            WireMessage::Heartbeat => trace!("[{}] heartbeat", self.connector.name()),
        }
    }
}

/// 재연결 상태 머신: `EventTransport` 포트 구현
pub struct ReconnectingTransport<C: StreamConnector> {
    shared: Arc<Shared<C>>,
    task: Mutex<Option<CancelableTimer>>,
}

impl<C: StreamConnector> ReconnectingTransport<C> {
    pub fn new(connector: C, policy: ReconnectPolicy) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                connector,
                policy,
                state_tx,
                events_tx,
                attempts: AtomicU32::new(0),
                epoch: AtomicU64::new(0),
            }),
            task: Mutex::new(None),
        }
    }

    /// 현재까지의 연속 재연결 시도 횟수
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.attempts.load(Ordering::SeqCst)
    }
}

impl<C: StreamConnector> EventTransport for ReconnectingTransport<C> {
    fn connect(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| t.is_pending()) {
            debug!("[{}] 이미 연결 중: connect 무시", self.shared.connector.name());
            return;
        }

        self.shared.attempts.store(0, Ordering::SeqCst);
        let epoch = self.shared.epoch.load(Ordering::SeqCst);
        let shared = self.shared.clone();
        *task = Some(CancelableTimer::spawn(run_connection(shared, epoch)));
    }

    fn disconnect(&self) {
        // 세대를 먼저 올려 진행 중인 태스크의 갱신을 무효화
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        if let Some(mut task) = self.task.lock().take() {
            task.cancel();
        }
        self.shared.attempts.store(0, Ordering::SeqCst);
        self.shared.force_state(ConnectionState::Closed);
        debug!("[{}] 연결 해제", self.shared.connector.name());
    }

    fn connection_state(&self) -> ConnectionState {
        *self.shared.state_tx.borrow()
    }

    fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.shared.events_tx.subscribe()
    }

    fn track(&self, frame_id: &str) {
        self.shared.connector.track(frame_id);
    }

    fn untrack(&self, frame_id: &str) {
        self.shared.connector.untrack(frame_id);
    }
}

/// 연결 루프 (태스크 하나가 재연결 대기까지 포함)
async fn run_connection<C: StreamConnector>(shared: Arc<Shared<C>>, epoch: u64) {
    let name = shared.connector.name();
    let policy = shared.policy;

    loop {
        shared.set_state(epoch, ConnectionState::Connecting);
        info!("[{name}] 연결 시도");

        let reason = match shared.connector.open().await {
            Ok(mut stream) => {
                shared.set_state(epoch, ConnectionState::Open);
                shared.attempts.store(0, Ordering::SeqCst);
                info!("[{name}] 연결 수립");
                read_until_failure(&shared, epoch, &mut stream, policy.idle_timeout).await
            }
            Err(e) => format!("연결 실패: {e}"),
        };

        if !shared.is_current(epoch) {
            return;
        }

        warn!("[{name}] 연결 끊김: {reason}");
        shared.set_state(epoch, ConnectionState::Closed);
        shared.emit(epoch, TransportEvent::Error(reason));

        let attempt = shared.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt > policy.max_attempts {
            warn!(
                "[{name}] 재연결 한도 소진 ({}회): 자동 복구 중단",
                policy.max_attempts
            );
            shared.attempts.store(policy.max_attempts, Ordering::SeqCst);
            shared.emit(epoch, TransportEvent::Closed);
            return;
        }

        let delay = policy.delay_for(attempt);
        info!(
            "[{name}] 재연결 대기: {}ms (시도 {attempt}/{})",
            delay.as_millis(),
            policy.max_attempts
        );
        tokio::time::sleep(delay).await;
    }
}

/// 스트림이 끝나거나 오류/무수신 타임아웃이 날 때까지 메시지 전달
async fn read_until_failure<C: StreamConnector>(
    shared: &Shared<C>,
    epoch: u64,
    stream: &mut MessageStream,
    idle_timeout: Duration,
) -> String {
    loop {
        let next = if idle_timeout.is_zero() {
            Ok(stream.next().await)
        } else {
            tokio::time::timeout(idle_timeout, stream.next()).await
        };

        match next {
            Ok(Some(Ok(message))) => shared.dispatch(epoch, message),
            Ok(Some(Err(e))) => return format!("스트림 에러: {e}"),
            Ok(None) => return "서버가 스트림을 종료함".to_string(),
            Err(_) => {
                return format!("{}ms 동안 수신 없음", idle_timeout.as_millis());
            }
        }
    }
}

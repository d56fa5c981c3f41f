//! 분석 코디네이터.
//!
//! 모션 샘플 → 허용 정책 → 프레임 캡처/인코딩 (블로킹 스레드) → 제출 → 결과 상관.
//!
//! 허용 정책 (앞에서부터 검사, 첫 실패에서 부작용 없이 거절):
//! 1. 프레임 소스 준비 + 전송 계층 `Open`
//! 2. 모션 강도 ≥ 유의 임계값
//! 3. 분당 최대 제출 수, 최소 제출 간격
//!
//! 대기 작업 테이블은 이 구조체만 소유한다. 제출 결과와 타임아웃은
//! 내부 채널로 돌아와 `run` 루프 한 곳에서 처리된다.

use chrono::Utc;
use motionwatch_core::config::AnalysisConfig;
use motionwatch_core::error::CoreError;
use motionwatch_core::models::analysis::{
    AnalysisOutcome, AnalysisRequest, AnalysisResult, FailureReason, SubmitAck,
};
use motionwatch_core::models::connection::{ConnectionState, TransportEvent};
use motionwatch_core::models::motion::MotionSample;
use motionwatch_core::ports::api_client::AnalysisSubmitter;
use motionwatch_core::ports::transport::EventTransport;
use motionwatch_core::ports::vision::FrameSource;
use motionwatch_core::timer::CancelableTimer;
use motionwatch_vision::encoder::FrameEncoder;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::pending::{PendingJob, PendingJobs};
use crate::rate_limiter::{RateLimiter, Throttle};

/// 결과 브로드캐스트 버퍼 크기
const OUTCOME_CHANNEL_CAPACITY: usize = 32;

/// 명령 채널 버퍼 크기
const COMMAND_CHANNEL_CAPACITY: usize = 8;

/// 제출 거절 사유
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Rejection {
    #[error("프레임 소스 준비 안 됨")]
    NoFrameSource,
    #[error("전송 계층 연결 안 됨 ({0})")]
    TransportNotOpen(ConnectionState),
    #[error("모션 강도 {strength:.1} < 임계값 {threshold:.1}")]
    BelowThreshold { strength: f32, threshold: f32 },
    #[error("분당 제출 한도 {limit}회 도달")]
    RateLimited { limit: u32 },
    #[error("최소 간격 미경과 ({}ms 남음)", .wait.as_millis())]
    TooSoon { wait: Duration },
}

/// 외부에서 보내는 명령
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorCommand {
    /// 전송 계층 재연결 (대기 작업은 유지)
    Reconnect,
    /// 대기 작업, 속도 제한, 최신 결과 초기화
    Reset,
}

/// 외부에 공개되는 상태
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoordinatorSnapshot {
    /// 대기 작업이 하나 이상 있는지
    pub analyzing: bool,
    /// 대기 작업 수
    pub pending: usize,
    /// 마지막으로 도착한 결과 (상관 여부 무관)
    pub latest_result: Option<AnalysisResult>,
    /// 수락된 제출 수
    pub accepted: u64,
    /// 거절된 제출 수
    pub rejected: u64,
}

/// 코디네이터 설정
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub significance_threshold: f32,
    pub max_requests_per_minute: u32,
    pub min_interval: Duration,
    pub request_timeout: Duration,
    pub prompt: Option<String>,
    pub max_frame_width: u32,
    pub jpeg_quality: u8,
}

impl From<&AnalysisConfig> for CoordinatorConfig {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            significance_threshold: config.significance_threshold,
            max_requests_per_minute: config.max_requests_per_minute,
            min_interval: config.min_interval(),
            request_timeout: config.request_timeout(),
            prompt: config.prompt.clone(),
            max_frame_width: config.max_frame_width,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// 제출 태스크와 타임아웃 타이머가 보내는 내부 메시지
#[derive(Debug)]
enum Internal {
    Submitted {
        frame_id: String,
        result: Result<SubmitAck, CoreError>,
    },
    CaptureFailed {
        frame_id: String,
        error: String,
    },
    Timeout(String),
}

/// 실행 중인 코디네이터 제어 핸들
#[derive(Clone)]
pub struct CoordinatorHandle {
    commands: mpsc::Sender<CoordinatorCommand>,
    snapshot: watch::Receiver<CoordinatorSnapshot>,
    outcomes: broadcast::Sender<AnalysisOutcome>,
}

impl CoordinatorHandle {
    pub async fn reconnect(&self) -> Result<(), CoreError> {
        self.send(CoordinatorCommand::Reconnect).await
    }

    pub async fn reset(&self) -> Result<(), CoreError> {
        self.send(CoordinatorCommand::Reset).await
    }

    async fn send(&self, command: CoordinatorCommand) -> Result<(), CoreError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoreError::Internal("코디네이터가 종료됨".to_string()))
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<CoordinatorSnapshot> {
        self.snapshot.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisOutcome> {
        self.outcomes.subscribe()
    }
}

/// 분석 코디네이터
pub struct AnalysisCoordinator {
    config: CoordinatorConfig,
    source: Arc<dyn FrameSource>,
    submitter: Arc<dyn AnalysisSubmitter>,
    transport: Arc<dyn EventTransport>,
    encoder: FrameEncoder,
    limiter: RateLimiter,
    pending: PendingJobs,
    seq: u64,
    internal_tx: mpsc::UnboundedSender<Internal>,
    internal_rx: mpsc::UnboundedReceiver<Internal>,
    command_tx: mpsc::Sender<CoordinatorCommand>,
    command_rx: mpsc::Receiver<CoordinatorCommand>,
    snapshot_tx: watch::Sender<CoordinatorSnapshot>,
    outcomes_tx: broadcast::Sender<AnalysisOutcome>,
}

impl AnalysisCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        source: Arc<dyn FrameSource>,
        submitter: Arc<dyn AnalysisSubmitter>,
        transport: Arc<dyn EventTransport>,
    ) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (snapshot_tx, _) = watch::channel(CoordinatorSnapshot::default());
        let (outcomes_tx, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);

        Self {
            encoder: FrameEncoder::new(config.max_frame_width, config.jpeg_quality),
            limiter: RateLimiter::new(config.max_requests_per_minute, config.min_interval),
            config,
            source,
            submitter,
            transport,
            pending: PendingJobs::new(),
            seq: 0,
            internal_tx,
            internal_rx,
            command_tx,
            command_rx,
            snapshot_tx,
            outcomes_tx,
        }
    }

    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            commands: self.command_tx.clone(),
            snapshot: self.snapshot_tx.subscribe(),
            outcomes: self.outcomes_tx.clone(),
        }
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisOutcome> {
        self.outcomes_tx.subscribe()
    }

    /// 모션 샘플 평가 → 수락 시 frame_id 반환
    ///
    /// 캡처와 인코딩은 수락 후 제출 태스크에서 수행된다.
    /// 그 단계의 실패는 거절이 아니라 `FailureReason::Capture` 결과로 통지.
    pub fn on_motion(&mut self, sample: &MotionSample) -> Result<String, Rejection> {
        if let Err(rejection) = self.admit(sample) {
            debug!("분석 제출 거절: {rejection}");
            self.snapshot_tx.send_modify(|s| s.rejected += 1);
            return Err(rejection);
        }

        self.limiter.record(Instant::now());
        self.seq += 1;
        let frame_id = next_frame_id(self.seq);

        let submission = {
            let source = self.source.clone();
            let encoder = self.encoder;
            let submitter = self.submitter.clone();
            let tx = self.internal_tx.clone();
            let frame_id = frame_id.clone();
            let motion_strength = sample.strength;
            let prompt = self.config.prompt.clone();
            CancelableTimer::spawn(async move {
                // 파일 읽기, 디코딩, JPEG 인코딩은 블로킹 스레드에서
                let prepared = tokio::task::spawn_blocking(move || {
                    source.capture().and_then(|frame| encoder.encode(&frame))
                })
                .await;
                let message = match prepared {
                    Ok(Ok(frame_data)) => {
                        let request = AnalysisRequest {
                            frame_id: frame_id.clone(),
                            frame_data,
                            motion_strength,
                            submitted_at: Utc::now(),
                            prompt,
                        };
                        let result = submitter.submit(&request).await;
                        Internal::Submitted { frame_id, result }
                    }
                    Ok(Err(e)) => Internal::CaptureFailed {
                        frame_id,
                        error: e.to_string(),
                    },
                    Err(e) => Internal::CaptureFailed {
                        frame_id,
                        error: e.to_string(),
                    },
                };
                let _ = tx.send(message);
            })
        };

        let timeout = {
            let tx = self.internal_tx.clone();
            let frame_id = frame_id.clone();
            CancelableTimer::after(self.config.request_timeout, async move {
                let _ = tx.send(Internal::Timeout(frame_id));
            })
        };

        self.pending.insert(PendingJob::new(
            frame_id.clone(),
            sample.strength,
            timeout,
            Some(submission),
        ));
        self.transport.track(&frame_id);

        info!(
            "분석 제출: {frame_id} (강도 {:.1}, 대기 {}건)",
            sample.strength,
            self.pending.len()
        );
        self.snapshot_tx.send_modify(|s| s.accepted += 1);
        self.publish_pending();

        Ok(frame_id)
    }

    /// 허용 정책 검사 (부작용 없음)
    fn admit(&mut self, sample: &MotionSample) -> Result<(), Rejection> {
        if !self.source.is_ready() {
            return Err(Rejection::NoFrameSource);
        }
        let state = self.transport.connection_state();
        if state != ConnectionState::Open {
            return Err(Rejection::TransportNotOpen(state));
        }
        if sample.strength < self.config.significance_threshold {
            return Err(Rejection::BelowThreshold {
                strength: sample.strength,
                threshold: self.config.significance_threshold,
            });
        }
        self.limiter.check(Instant::now()).map_err(|t| match t {
            Throttle::PerMinute { limit } => Rejection::RateLimited { limit },
            Throttle::TooSoon { wait } => Rejection::TooSoon { wait },
        })
    }

    /// 전송 계층 이벤트 처리
    pub fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::AnalysisResult(result) => self.on_result(result),
            TransportEvent::AnalysisFailed { frame_id, reason } => {
                self.fail(&frame_id, FailureReason::Backend(reason));
            }
            TransportEvent::Connected { client_id } => {
                info!("결과 채널 연결됨: {client_id}");
            }
            // 연결 문제는 대기 작업을 실패시키지 않는다 (타임아웃으로 정리)
            TransportEvent::Error(msg) => warn!("결과 채널 에러: {msg}"),
            TransportEvent::Closed => {
                warn!("결과 채널 재연결 한도 소진: 수동 재연결 필요");
            }
        }
    }

    fn on_result(&mut self, result: AnalysisResult) {
        let matched = result
            .frame_id
            .as_deref()
            .and_then(|id| self.pending.remove(id));

        let outcome = match matched {
            Some(job) => {
                self.transport.untrack(&job.frame_id);
                info!(
                    "분석 완료: {} ({:.2}s)",
                    job.frame_id, result.processing_time_seconds
                );
                AnalysisOutcome::Completed(result.clone())
            }
            None => {
                debug!("매칭되지 않은 결과: frame_id={:?}", result.frame_id);
                AnalysisOutcome::Uncorrelated(result.clone())
            }
        };

        self.snapshot_tx
            .send_modify(|s| s.latest_result = Some(result));
        self.publish_pending();
        let _ = self.outcomes_tx.send(outcome);
    }

    fn fail(&mut self, frame_id: &str, reason: FailureReason) {
        let Some(job) = self.pending.remove(frame_id) else {
            // 이미 처리된 작업 (늦은 타이머, 중복 보고)
            debug!("이미 정리된 작업 무시: {frame_id} ({reason})");
            return;
        };
        self.transport.untrack(&job.frame_id);
        warn!(
            "분석 실패: {frame_id} ({reason}, 제출 진행 중={}, 타이머 대기={})",
            job.is_submitting(),
            job.is_armed()
        );

        self.publish_pending();
        let _ = self.outcomes_tx.send(AnalysisOutcome::Failed {
            frame_id: frame_id.to_string(),
            reason,
        });
    }

    fn on_internal(&mut self, message: Internal) {
        match message {
            Internal::Submitted { frame_id, result } => match result {
                Ok(SubmitAck::Queued) => debug!("제출 접수: {frame_id}"),
                Ok(SubmitAck::Completed(mut result)) => {
                    if result.frame_id.is_none() {
                        result.frame_id = Some(frame_id);
                    }
                    self.on_result(result);
                }
                Err(e) => self.fail(&frame_id, FailureReason::Submission(e.to_string())),
            },
            Internal::CaptureFailed { frame_id, error } => {
                self.fail(&frame_id, FailureReason::Capture(error))
            }
            Internal::Timeout(frame_id) => self.fail(&frame_id, FailureReason::Timeout),
        }
    }

    fn on_command(&mut self, command: CoordinatorCommand) {
        match command {
            CoordinatorCommand::Reconnect => {
                info!("전송 계층 재연결 (대기 {}건 유지)", self.pending.len());
                self.transport.disconnect();
                self.transport.connect();
            }
            CoordinatorCommand::Reset => {
                self.clear_pending();
                self.limiter.reset();
                self.snapshot_tx.send_modify(|s| *s = CoordinatorSnapshot::default());
                info!("코디네이터 초기화");
            }
        }
    }

    fn clear_pending(&mut self) {
        for frame_id in self.pending.clear() {
            self.transport.untrack(&frame_id);
        }
        self.publish_pending();
    }

    fn publish_pending(&self) {
        let pending = self.pending.len();
        self.snapshot_tx.send_if_modified(|s| {
            let changed = s.pending != pending || s.analyzing != (pending > 0);
            s.pending = pending;
            s.analyzing = pending > 0;
            changed
        });
    }

    /// 이벤트 루프
    ///
    /// 모션 샘플, 전송 이벤트, 내부 메시지, 명령을 한 곳에서 순서대로 처리.
    /// 종료 신호를 받으면 모든 대기 작업과 타이머를 정리한 뒤 반환한다.
    pub async fn run(
        mut self,
        mut motion_rx: mpsc::Receiver<MotionSample>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut events = self.transport.subscribe();
        info!(
            "분석 코디네이터 시작: 임계값={:.1}, 분당 {}회, 간격 {}ms, 타임아웃 {}ms",
            self.config.significance_threshold,
            self.config.max_requests_per_minute,
            self.config.min_interval.as_millis(),
            self.config.request_timeout.as_millis()
        );

        loop {
            tokio::select! {
                Some(sample) = motion_rx.recv() => {
                    if sample.has_motion {
                        let _ = self.on_motion(&sample);
                    }
                }
                event = events.recv() => match event {
                    Ok(event) => self.on_transport_event(event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("전송 이벤트 {n}건 유실");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("전송 이벤트 채널 닫힘");
                        break;
                    }
                },
                Some(message) = self.internal_rx.recv() => self.on_internal(message),
                Some(command) = self.command_rx.recv() => self.on_command(command),
                _ = shutdown_rx.changed() => {
                    info!("분석 코디네이터 종료 신호 수신");
                    break;
                }
            }
        }

        self.teardown();
    }

    /// 모든 대기 작업과 타이머 정리
    pub fn teardown(&mut self) {
        let count = self.pending.len();
        self.clear_pending();
        // 정리 전에 이미 발사된 타이머 메시지는 버림
        while self.internal_rx.try_recv().is_ok() {}
        info!("분석 코디네이터 정리 완료 (대기 작업 {count}건 취소)");
    }
}

/// `frame_{seq}_{uuid 앞 8자}`
fn next_frame_id(seq: u64) -> String {
    let uuid = Uuid::new_v4().simple().to_string();
    format!("frame_{seq}_{}", &uuid[..8])
}

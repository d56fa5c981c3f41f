//! 모션 감지 루프.
//!
//! 고정 주기로 [`MotionScorer`]를 호출하고 샘플을 `mpsc`로,
//! 최신 [`MotionState`]를 `watch`로 발행한다.
//!
//! 수명주기: `Idle → Starting → Running → Stopping → Idle`.

use motionwatch_core::error::CoreError;
use motionwatch_core::models::motion::{clamp_sensitivity, MotionSample, MotionState};
use motionwatch_core::ports::vision::FrameSource;
use motionwatch_core::timer::CancelableTimer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use chrono::Utc;
use tracing::{debug, info, trace, warn};

use crate::scorer::MotionScorer;

/// 감지 루프 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorPhase {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// 모션 감지 루프
pub struct MotionMonitor {
    source: Arc<dyn FrameSource>,
    scorer: Arc<Mutex<MotionScorer>>,
    sensitivity: Arc<AtomicI32>,
    interval: Duration,
    phase: MonitorPhase,
    state_tx: Arc<watch::Sender<MotionState>>,
    ticker: Option<CancelableTimer>,
}

impl MotionMonitor {
    pub fn new(source: Arc<dyn FrameSource>, interval: Duration, sensitivity: i32) -> Self {
        let (state_tx, _) = watch::channel(MotionState::new(sensitivity));
        Self {
            source,
            scorer: Arc::new(Mutex::new(MotionScorer::new())),
            sensitivity: Arc::new(AtomicI32::new(clamp_sensitivity(sensitivity) as i32)),
            interval,
            phase: MonitorPhase::Idle,
            state_tx: Arc::new(state_tx),
            ticker: None,
        }
    }

    /// 감지 시작
    ///
    /// 새 세션이므로 기준 프레임을 비우고 콜드 스타트부터 시작한다.
    /// `Idle`이 아니면 `CoreError::Validation`.
    pub fn start(&mut self, samples_tx: mpsc::Sender<MotionSample>) -> Result<(), CoreError> {
        if self.loop_exited() {
            debug!("감지 루프가 스스로 종료됨: 중지 상태로 정리");
            self.stop();
        }
        if self.phase != MonitorPhase::Idle {
            return Err(CoreError::Validation {
                field: "monitor".to_string(),
                message: format!("이미 실행 중 (현재 단계: {:?})", self.phase),
            });
        }
        self.phase = MonitorPhase::Starting;

        self.scorer.lock().reset();
        self.state_tx.send_modify(|s| {
            s.reset();
            s.is_active = true;
        });

        let source = self.source.clone();
        let scorer = self.scorer.clone();
        let sensitivity = self.sensitivity.clone();
        let state_tx = self.state_tx.clone();
        let period = self.interval;

        self.ticker = Some(CancelableTimer::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                let s = sensitivity.load(Ordering::Relaxed);
                // 프레임 읽기와 디코딩은 블로킹 스레드에서
                let detect = {
                    let source = source.clone();
                    let scorer = scorer.clone();
                    tokio::task::spawn_blocking(move || scorer.lock().detect(source.as_ref(), s))
                };
                let sample = match detect.await {
                    Ok(sample) => sample,
                    Err(e) => {
                        warn!("모션 감지 작업 실패: {e}");
                        MotionSample::still(Utc::now())
                    }
                };
                trace!(
                    "모션 샘플: motion={}, strength={:.1}",
                    sample.has_motion,
                    sample.strength
                );
                state_tx.send_modify(|st| st.apply(&sample));

                match samples_tx.try_send(sample) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        debug!("샘플 채널 포화: 샘플 드롭");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        debug!("샘플 수신자 종료: 감지 루프 종료");
                        break;
                    }
                }
            }
        }));

        self.phase = MonitorPhase::Running;
        info!(
            "모션 감지 시작: 주기={}ms, 민감도={}",
            self.interval.as_millis(),
            self.sensitivity.load(Ordering::Relaxed)
        );
        Ok(())
    }

    /// 감지 중지 (기준 프레임은 다음 시작까지 유지, `Idle`이면 no-op)
    pub fn stop(&mut self) {
        if self.phase == MonitorPhase::Idle {
            return;
        }
        self.phase = MonitorPhase::Stopping;

        if let Some(mut ticker) = self.ticker.take() {
            ticker.cancel();
        }
        self.state_tx.send_modify(|s| s.is_active = false);

        self.phase = MonitorPhase::Idle;
        info!("모션 감지 중지");
    }

    /// 기준 프레임과 측정 상태 초기화
    pub fn reset(&self) {
        self.scorer.lock().reset();
        self.state_tx.send_modify(|s| s.reset());
        debug!("모션 상태 초기화");
    }

    /// 민감도 변경 (다음 틱부터 적용)
    pub fn set_sensitivity(&self, sensitivity: i32) {
        let clamped = clamp_sensitivity(sensitivity);
        self.sensitivity.store(clamped as i32, Ordering::Relaxed);
        self.state_tx.send_modify(|s| s.sensitivity = clamped);
    }

    /// 현재 단계 (수신자 종료로 루프가 끝났으면 `Idle`)
    pub fn phase(&self) -> MonitorPhase {
        if self.loop_exited() {
            MonitorPhase::Idle
        } else {
            self.phase
        }
    }

    fn loop_exited(&self) -> bool {
        self.phase == MonitorPhase::Running
            && !self.ticker.as_ref().is_some_and(|t| t.is_pending())
    }

    pub fn state(&self) -> MotionState {
        self.state_tx.borrow().clone()
    }

    /// 상태 변경 구독
    pub fn subscribe(&self) -> watch::Receiver<MotionState> {
        self.state_tx.subscribe()
    }
}

impl Drop for MotionMonitor {
    fn drop(&mut self) {
        self.stop();
        self.scorer.lock().dispose();
    }
}

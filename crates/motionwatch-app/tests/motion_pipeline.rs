//! 모션 파이프라인 통합 테스트.
//!
//! 프레임 소스 → 모션 모니터 → 분석 코디네이터 → 결과 상관 cross-crate 연동.

use async_trait::async_trait;
use chrono::Utc;
use image::{DynamicImage, Rgba, RgbaImage};
use motionwatch_analysis::coordinator::{AnalysisCoordinator, CoordinatorConfig};
use motionwatch_core::error::CoreError;
use motionwatch_core::models::analysis::{
    AnalysisOutcome, AnalysisRequest, AnalysisResult, FailureReason, SubmitAck,
};
use motionwatch_core::models::connection::{ConnectionState, TransportEvent};
use motionwatch_core::ports::api_client::AnalysisSubmitter;
use motionwatch_core::ports::transport::EventTransport;
use motionwatch_vision::monitor::MotionMonitor;
use motionwatch_vision::source::SharedFrameSource;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};

const TICK: Duration = Duration::from_millis(20);
const WAIT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct RecordingSubmitter {
    requests: Mutex<Vec<AnalysisRequest>>,
}

#[async_trait]
impl AnalysisSubmitter for RecordingSubmitter {
    async fn submit(&self, request: &AnalysisRequest) -> Result<SubmitAck, CoreError> {
        self.requests.lock().push(request.clone());
        Ok(SubmitAck::Queued)
    }
}

struct LoopbackTransport {
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<TransportEvent>,
    tracked: Mutex<Vec<String>>,
}

impl LoopbackTransport {
    fn new(initial: ConnectionState) -> Self {
        let (state, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(16);
        Self {
            state,
            events,
            tracked: Mutex::new(Vec::new()),
        }
    }

    fn deliver(&self, event: TransportEvent) {
        let _ = self.events.send(event);
    }
}

impl EventTransport for LoopbackTransport {
    fn connect(&self) {
        self.state.send_replace(ConnectionState::Open);
    }
    fn disconnect(&self) {
        self.state.send_replace(ConnectionState::Closed);
    }
    fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }
    fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
    fn track(&self, frame_id: &str) {
        self.tracked.lock().push(frame_id.to_string());
    }
    fn untrack(&self, frame_id: &str) {
        self.tracked.lock().retain(|id| id != frame_id);
    }
}

fn solid(value: u8) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        160,
        120,
        Rgba([value, value, value, 255]),
    ))
}

fn config(request_timeout: Duration) -> CoordinatorConfig {
    CoordinatorConfig {
        significance_threshold: 30.0,
        max_requests_per_minute: 6,
        min_interval: Duration::ZERO,
        request_timeout,
        prompt: Some("무엇이 움직였나요?".to_string()),
        max_frame_width: 640,
        jpeg_quality: 80,
    }
}

struct Pipeline {
    source: Arc<SharedFrameSource>,
    submitter: Arc<RecordingSubmitter>,
    transport: Arc<LoopbackTransport>,
    monitor: MotionMonitor,
    outcomes: broadcast::Receiver<AnalysisOutcome>,
    shutdown_tx: watch::Sender<bool>,
    coordinator_task: tokio::task::JoinHandle<()>,
}

fn start_pipeline(config: CoordinatorConfig, state: ConnectionState) -> Pipeline {
    let source = Arc::new(SharedFrameSource::new());
    source.publish(solid(30));
    let submitter = Arc::new(RecordingSubmitter::default());
    let transport = Arc::new(LoopbackTransport::new(state));

    let coordinator =
        AnalysisCoordinator::new(config, source.clone(), submitter.clone(), transport.clone());
    let outcomes = coordinator.subscribe();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (motion_tx, motion_rx) = mpsc::channel(16);
    let coordinator_task = tokio::spawn(coordinator.run(motion_rx, shutdown_rx));

    let mut monitor = MotionMonitor::new(source.clone(), TICK, 50);
    monitor.start(motion_tx).unwrap();

    Pipeline {
        source,
        submitter,
        transport,
        monitor,
        outcomes,
        shutdown_tx,
        coordinator_task,
    }
}

async fn wait_for_request(submitter: &RecordingSubmitter) -> AnalysisRequest {
    tokio::time::timeout(WAIT, async {
        loop {
            if let Some(request) = submitter.requests.lock().first().cloned() {
                return request;
            }
            tokio::time::sleep(TICK).await;
        }
    })
    .await
    .expect("제출 요청이 도착해야 함")
}

async fn shutdown(mut pipeline: Pipeline) {
    pipeline.monitor.stop();
    pipeline.shutdown_tx.send(true).unwrap();
    pipeline.coordinator_task.await.unwrap();
}

#[tokio::test]
async fn motion_is_submitted_and_result_correlated() {
    let mut pipeline = start_pipeline(config(Duration::from_secs(30)), ConnectionState::Open);

    // 기준 프레임 확보 후 장면 변화
    tokio::time::sleep(TICK * 4).await;
    pipeline.source.publish(solid(220));

    let request = wait_for_request(&pipeline.submitter).await;
    assert!(request.frame_id.starts_with("frame_1_"));
    assert!(request.motion_strength > 30.0);
    assert_eq!(&request.frame_data[..2], &[0xFF, 0xD8]);
    assert_eq!(request.prompt.as_deref(), Some("무엇이 움직였나요?"));
    assert_eq!(
        pipeline.transport.tracked.lock().clone(),
        vec![request.frame_id.clone()]
    );

    pipeline
        .transport
        .deliver(TransportEvent::AnalysisResult(AnalysisResult {
            frame_id: Some(request.frame_id.clone()),
            description: "사람이 지나감".to_string(),
            detected: Some("YES".to_string()),
            processing_time_seconds: 0.8,
            timestamp: Utc::now(),
        }));

    let outcome = tokio::time::timeout(WAIT, pipeline.outcomes.recv())
        .await
        .unwrap()
        .unwrap();
    match outcome {
        AnalysisOutcome::Completed(result) => {
            assert_eq!(result.frame_id.as_deref(), Some(request.frame_id.as_str()));
            assert_eq!(result.description, "사람이 지나감");
        }
        other => panic!("Completed 기대, 실제: {other:?}"),
    }

    shutdown(pipeline).await;
}

#[tokio::test]
async fn unanswered_request_times_out() {
    let mut pipeline = start_pipeline(config(Duration::from_millis(200)), ConnectionState::Open);

    tokio::time::sleep(TICK * 4).await;
    pipeline.source.publish(solid(220));
    let request = wait_for_request(&pipeline.submitter).await;

    let outcome = tokio::time::timeout(WAIT, pipeline.outcomes.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        outcome,
        AnalysisOutcome::Failed {
            frame_id: request.frame_id,
            reason: FailureReason::Timeout,
        }
    );
    assert!(pipeline.transport.tracked.lock().is_empty());

    shutdown(pipeline).await;
}

#[tokio::test]
async fn closed_transport_blocks_submission() {
    let pipeline = start_pipeline(config(Duration::from_secs(30)), ConnectionState::Closed);

    tokio::time::sleep(TICK * 4).await;
    pipeline.source.publish(solid(220));
    tokio::time::sleep(TICK * 10).await;

    assert!(pipeline.submitter.requests.lock().is_empty());
    assert!(pipeline.transport.tracked.lock().is_empty());

    shutdown(pipeline).await;
}

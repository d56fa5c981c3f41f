//! # motionwatch-app
//!
//! MotionWatch 클라이언트 바이너리 진입점.
//! 설정 로드, 어댑터 와이어링, 모션 모니터와 분석 코디네이터 구동, 라이프사이클 관리.

mod lifecycle;
mod wiring;

use anyhow::{anyhow, Result};
use clap::Parser;
use motionwatch_analysis::coordinator::{AnalysisCoordinator, CoordinatorConfig};
use motionwatch_core::config::{AppConfig, TransportMode};
use motionwatch_core::config_manager::ConfigManager;
use motionwatch_core::models::analysis::AnalysisOutcome;
use motionwatch_core::ports::transport::EventTransport;
use motionwatch_core::ports::vision::FrameSource;
use motionwatch_network::http_client::HttpAnalysisClient;
use motionwatch_network::probe::resolve_transport;
use motionwatch_vision::monitor::MotionMonitor;
use motionwatch_vision::source::SnapshotFileSource;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::lifecycle::LifecycleManager;

/// 모니터 → 코디네이터 샘플 채널 용량
const MOTION_CHANNEL_CAPACITY: usize = 16;

/// MotionWatch 클라이언트
///
/// 카메라 스냅샷의 움직임을 감지해 유의미한 프레임만 분석 서버로 보낸다.
#[derive(Parser, Debug)]
#[command(name = "motionwatch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 서버 URL 지정 (기본: http://localhost:8000)
    #[arg(long, short = 's')]
    server: Option<String>,

    /// 설정 파일 경로 (기본: 플랫폼 설정 디렉토리)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// 스냅샷 프레임 파일 경로
    #[arg(long, short = 'f')]
    frame_path: Option<PathBuf>,

    /// 모션 민감도 (1-100)
    #[arg(long)]
    sensitivity: Option<i32>,

    /// 결과 수신 방식 (auto, stream, poll)
    #[arg(long, short = 't')]
    transport: Option<TransportMode>,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn print_banner() {
    println!();
    println!("╔══════════════════════════════════════════════════╗");
    println!("║                                                  ║");
    println!("║                M O T I O N W A T C H             ║");
    println!("║                                                  ║");
    println!("║        모션 감지 기반 프레임 분석 클라이언트     ║");
    println!("║                                                  ║");
    println!("╚══════════════════════════════════════════════════╝");
    println!();
}

/// 설정 로드 (파일 로드 실패 시 기본값)
fn load_config(path: Option<PathBuf>) -> AppConfig {
    let manager = match path {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new(),
    };
    match manager {
        Ok(manager) => {
            info!("설정 파일: {}", manager.config_path().display());
            manager.get()
        }
        Err(e) => {
            warn!("설정 로드 실패, 기본값 사용: {e}");
            AppConfig::default_config()
        }
    }
}

/// CLI 인자로 설정 오버라이드
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(ref server_url) = args.server {
        config.server.base_url = server_url.clone();
    }
    if let Some(sensitivity) = args.sensitivity {
        config.motion.sensitivity = sensitivity;
    }
    if let Some(mode) = args.transport {
        config.transport.mode = mode;
    }
}

/// 분석 결과 로깅 루프
async fn log_outcomes(
    mut outcomes: broadcast::Receiver<AnalysisOutcome>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            outcome = outcomes.recv() => match outcome {
                Ok(AnalysisOutcome::Completed(result)) => {
                    info!(
                        "분석 완료 [{}]: {} ({:.2}초)",
                        result.frame_id.as_deref().unwrap_or("-"),
                        result.description,
                        result.processing_time_seconds
                    );
                }
                Ok(AnalysisOutcome::Uncorrelated(result)) => {
                    info!("분석 결과 (대기 작업 없음): {}", result.description);
                }
                Ok(AnalysisOutcome::Failed { frame_id, reason }) => {
                    warn!("분석 실패 [{frame_id}]: {reason}");
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("분석 결과 {n}건 유실");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = shutdown_rx.changed() => break,
        }
    }
}

/// 연결 상태 로깅 루프
async fn log_connection(
    transport: Arc<dyn EventTransport>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut states = transport.state_changes();
    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                info!("연결 상태: {state}");
            }
            _ = shutdown_rx.changed() => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_filter = format!(
        "motionwatch={},motionwatch_app={},motionwatch_core={},motionwatch_vision={},motionwatch_network={},motionwatch_analysis={}",
        args.log_level, args.log_level, args.log_level, args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    print_banner();
    info!("MotionWatch 클라이언트 시작");

    let mut config = load_config(args.config.clone());
    apply_overrides(&mut config, &args);
    config
        .validate()
        .map_err(|e| anyhow!("설정 검증 실패: {e}"))?;
    info!("서버: {}", config.server.base_url);

    // ── 어댑터 생성 ──

    // 1. 프레임 소스 (외부 캡처 프로세스가 갱신하는 스냅샷 파일)
    let frame_path = wiring::resolve_frame_path(args.frame_path.clone(), &config)?;
    info!("스냅샷 파일: {}", frame_path.display());
    let source: Arc<dyn FrameSource> = Arc::new(SnapshotFileSource::new(frame_path));

    // 2. 전송 계층
    let resolved = resolve_transport(
        config.transport.mode,
        &config.server.base_url,
        config.server.request_timeout(),
    )
    .await;
    let transport = wiring::build_transport(&config, resolved)?;

    // 3. 제출 클라이언트
    let submitter = Arc::new(HttpAnalysisClient::new(
        &config.server.base_url,
        config.server.request_timeout(),
    )?);

    // ── 구동 ──

    let lifecycle = LifecycleManager::new();

    let coordinator = AnalysisCoordinator::new(
        CoordinatorConfig::from(&config.analysis),
        source.clone(),
        submitter,
        transport.clone(),
    );
    let handle = coordinator.handle();

    tokio::spawn(log_outcomes(handle.subscribe(), lifecycle.subscribe()));
    tokio::spawn(log_connection(transport.clone(), lifecycle.subscribe()));

    let (motion_tx, motion_rx) = mpsc::channel(MOTION_CHANNEL_CAPACITY);
    let coordinator_task = tokio::spawn(coordinator.run(motion_rx, lifecycle.subscribe()));

    transport.connect();

    let mut monitor = MotionMonitor::new(
        source,
        config.motion.detection_interval(),
        config.motion.sensitivity,
    );
    monitor.start(motion_tx)?;

    info!("모든 구성 요소 시작 완료. Ctrl+C로 종료.");

    if let Err(e) = lifecycle.wait_for_signal().await {
        error!("시그널 핸들러 등록 실패: {e}");
        lifecycle.shutdown();
    }

    // ── 정리 ──
    monitor.stop();
    if let Err(e) = coordinator_task.await {
        error!("분석 코디네이터 태스크 비정상 종료: {e}");
    }
    transport.disconnect();

    let snapshot = handle.snapshot();
    info!(
        "MotionWatch 종료 (제출 {}건, 거절 {}건)",
        snapshot.accepted, snapshot.rejected
    );
    Ok(())
}

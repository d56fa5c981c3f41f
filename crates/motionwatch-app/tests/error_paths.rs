//! Cross-crate 에러 경로 테스트.
//!
//! 프레임 소스, 제출 클라이언트, 전송 방식 탐지의 크레이트 경계 에러 전파를 검증한다.

use chrono::Utc;
use motionwatch_core::config::TransportMode;
use motionwatch_core::error::CoreError;
use motionwatch_core::models::analysis::AnalysisRequest;
use motionwatch_core::ports::api_client::AnalysisSubmitter;
use motionwatch_core::ports::vision::FrameSource;
use motionwatch_network::http_client::HttpAnalysisClient;
use motionwatch_network::probe::{resolve_transport, ResolvedTransport};
use motionwatch_vision::source::SnapshotFileSource;
use std::time::Duration;

/// 닫힌 포트 (연결 거부)
const UNREACHABLE: &str = "http://127.0.0.1:9";

fn request() -> AnalysisRequest {
    AnalysisRequest {
        frame_id: "frame_1_deadbeef".to_string(),
        frame_data: vec![0xFF, 0xD8, 0xFF, 0xD9],
        motion_strength: 55.0,
        submitted_at: Utc::now(),
        prompt: None,
    }
}

#[test]
fn missing_snapshot_is_not_ready() {
    let dir = tempfile::tempdir().unwrap();
    let source = SnapshotFileSource::new(dir.path().join("missing.jpg"));

    assert!(!source.is_ready());
    let err = source.capture().unwrap_err();
    assert!(matches!(err, CoreError::FrameNotReady(_)));
    assert!(err.to_string().contains("missing.jpg"));
}

#[test]
fn corrupt_snapshot_is_encode_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("frame.jpg");
    std::fs::write(&path, b"not an image").unwrap();

    let source = SnapshotFileSource::new(path);
    assert!(source.is_ready());
    assert!(matches!(source.capture(), Err(CoreError::Encode(_))));
}

#[tokio::test]
async fn submit_to_unreachable_server_is_network_error() {
    let client = HttpAnalysisClient::new(UNREACHABLE, Duration::from_secs(2)).unwrap();
    let result = client.submit(&request()).await;
    assert!(matches!(result, Err(CoreError::Network(_))));
}

#[tokio::test]
async fn failed_probe_falls_back_to_stream() {
    let resolved = resolve_transport(TransportMode::Auto, UNREACHABLE, Duration::from_secs(2)).await;
    assert_eq!(resolved, ResolvedTransport::Stream);

    // 고정 모드는 탐지하지 않음
    let resolved = resolve_transport(TransportMode::Poll, UNREACHABLE, Duration::from_secs(2)).await;
    assert_eq!(resolved, ResolvedTransport::Poll);
}

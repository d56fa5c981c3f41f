//! 어댑터 생성 (DI 와이어링).
//!
//! 설정으로부터 프레임 소스, 전송 계층, 제출 클라이언트를 만든다.

use motionwatch_core::config::AppConfig;
use motionwatch_core::config_manager::ConfigManager;
use motionwatch_core::error::CoreError;
use motionwatch_core::ports::transport::EventTransport;
use motionwatch_network::poll_client::PollConnector;
use motionwatch_network::probe::ResolvedTransport;
use motionwatch_network::sse_client::SseConnector;
use motionwatch_network::transport::{ReconnectPolicy, ReconnectingTransport};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// 기본 스냅샷 파일 이름 (설정 디렉토리 아래)
const DEFAULT_FRAME_FILE: &str = "frame.jpg";

/// 스냅샷 파일 경로 결정: CLI 인자 → 설정 → 설정 디렉토리 기본값
pub fn resolve_frame_path(
    cli: Option<PathBuf>,
    config: &AppConfig,
) -> Result<PathBuf, CoreError> {
    if let Some(path) = cli.or_else(|| config.motion.frame_path.clone()) {
        return Ok(path);
    }
    Ok(ConfigManager::config_dir()?.join(DEFAULT_FRAME_FILE))
}

/// 확정된 방식으로 전송 계층 생성 (연결은 호출자가 시작)
pub fn build_transport(
    config: &AppConfig,
    resolved: ResolvedTransport,
) -> Result<Arc<dyn EventTransport>, CoreError> {
    let policy = ReconnectPolicy::from(&config.transport);
    let base_url = config.server.base_url.as_str();

    let transport: Arc<dyn EventTransport> = match resolved {
        ResolvedTransport::Stream => {
            let connector = SseConnector::new(base_url, config.server.request_timeout())?;
            Arc::new(ReconnectingTransport::new(connector, policy))
        }
        ResolvedTransport::Poll => {
            let connector = PollConnector::new(
                base_url,
                config.transport.poll_interval(),
                config.server.request_timeout(),
            )?;
            Arc::new(ReconnectingTransport::new(connector, policy))
        }
    };

    info!(
        "전송 계층 생성: {:?} (재연결 {}회, 기본 지연 {}ms)",
        resolved,
        policy.max_attempts,
        policy.base_delay.as_millis()
    );
    Ok(transport)
}

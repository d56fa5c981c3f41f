//! # motionwatch-network
//!
//! 분석 서버 네트워크 어댑터.
//! 프레임 분석 제출(HTTP), 결과 수신 채널(SSE 스트림 또는 폴링 폴백),
//! 그리고 두 채널 공통의 재연결 상태 머신을 제공한다.
//!
//! ## 사용 예시
//!
//! ```rust,ignore
//! use motionwatch_network::sse_client::SseConnector;
//! use motionwatch_network::transport::{ReconnectPolicy, ReconnectingTransport};
//!
//! let connector = SseConnector::new("http://localhost:8000", Duration::from_secs(10))?;
//! let transport = ReconnectingTransport::new(connector, ReconnectPolicy::from(&config.transport));
//! transport.connect();
//! ```

pub mod http_client;
pub mod poll_client;
pub mod probe;
pub mod sse_client;
pub mod transport;

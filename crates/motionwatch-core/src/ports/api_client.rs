//! 분석 제출 포트.
//!
//! 구현: `motionwatch-network` crate (reqwest)

use async_trait::async_trait;

use crate::error::CoreError;
use crate::models::analysis::{AnalysisRequest, SubmitAck};

/// 프레임 분석 제출 클라이언트
///
/// 결과 수신 경로(이벤트 전송 계층)와 분리된 단발성 요청 경로.
#[async_trait]
pub trait AnalysisSubmitter: Send + Sync {
    /// 프레임 제출
    ///
    /// non-2xx 응답과 전송 실패는 모두 `Err`로 반환한다.
    async fn submit(&self, request: &AnalysisRequest) -> Result<SubmitAck, CoreError>;
}

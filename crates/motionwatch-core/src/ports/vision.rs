//! 비전(프레임 소스) 포트.
//!
//! 구현: `motionwatch-vision` crate (스냅샷 파일 소스), 테스트용 합성 소스

use image::DynamicImage;

use crate::error::CoreError;

/// 라이브 비디오 프레임 소스
///
/// 획득/권한 관리는 소스 소유자의 책임이다. 코어는 준비 여부 확인과
/// 현재 프레임 읽기만 수행한다. 두 메서드 모두 동기이며 I/O에서 오래 블록되면 안 된다.
pub trait FrameSource: Send + Sync {
    /// 현재 프레임을 읽을 수 있는 상태인지
    fn is_ready(&self) -> bool;

    /// 현재 프레임 캡처
    ///
    /// 준비되지 않았으면 `CoreError::FrameNotReady`.
    fn capture(&self) -> Result<DynamicImage, CoreError>;
}

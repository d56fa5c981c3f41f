//! # motionwatch-vision
//!
//! 프레임 샘플링 크레이트.
//! 모션 점수 계산, 주기적 감지 루프, 프레임 소스 구현,
//! 분석 서버 제출용 JPEG 인코딩을 담당한다.

pub mod encoder;
pub mod monitor;
pub mod resize;
pub mod scorer;
pub mod source;

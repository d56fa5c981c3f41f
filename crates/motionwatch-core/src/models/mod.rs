//! MotionWatch 도메인 모델.
//!
//! 모션 샘플, 분석 요청/결과, 전송 계층 상태를 정의한다.
//! 모든 상태는 세션 단위 인메모리이며 영속화하지 않는다.

pub mod analysis;
pub mod connection;
pub mod motion;

//! # motionwatch-analysis
//!
//! 분석 파이프라인.
//! 모션 샘플 중 분석할 가치가 있는 것만 골라 서버에 제출하고,
//! 전송 계층으로 도착한 결과를 요청과 상관시킨다.
//! 속도 제한(롤링 60초 윈도우 + 최소 간격)과 요청별 타임아웃을 관리한다.

pub mod coordinator;
pub mod pending;
pub mod rate_limiter;

//! 모션 감지 모델.
//!
//! 샘플링 틱마다 생성되는 `MotionSample`과
//! 세션 단위로 유지되는 `MotionState`를 정의.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 민감도 하한
pub const MIN_SENSITIVITY: i32 = 1;

/// 민감도 상한
pub const MAX_SENSITIVITY: i32 = 100;

/// 범위를 벗어난 민감도를 `[1, 100]`으로 보정
///
/// 에러를 반환하지 않는다. 잘못된 입력도 가장 가까운 유효값으로 동작한다.
pub fn clamp_sensitivity(sensitivity: i32) -> u8 {
    sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY) as u8
}

/// 직전 프레임과의 비교 결과 (불변)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// 감지 컷오프 초과 여부
    pub has_motion: bool,
    /// 모션 강도 (0.0 ~ 100.0)
    pub strength: f32,
    /// 샘플링 시각
    pub captured_at: DateTime<Utc>,
}

impl MotionSample {
    /// 모션 없음 샘플 (콜드 스타트, 소스 미준비, 샘플링 실패)
    pub fn still(captured_at: DateTime<Utc>) -> Self {
        Self {
            has_motion: false,
            strength: 0.0,
            captured_at,
        }
    }
}

/// 세션별 모션 상태
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionState {
    /// 감지 루프 동작 중 여부
    pub is_active: bool,
    /// 최근 모션 강도
    pub strength: f32,
    /// 마지막으로 모션이 감지된 시각
    pub last_motion_at: Option<DateTime<Utc>>,
    /// 민감도 (1 ~ 100)
    pub sensitivity: u8,
}

impl MotionState {
    /// 새 상태 생성 (비활성)
    pub fn new(sensitivity: i32) -> Self {
        Self {
            is_active: false,
            strength: 0.0,
            last_motion_at: None,
            sensitivity: clamp_sensitivity(sensitivity),
        }
    }

    /// 샘플 반영
    pub fn apply(&mut self, sample: &MotionSample) {
        self.strength = sample.strength;
        if sample.has_motion {
            self.last_motion_at = Some(sample.captured_at);
        }
    }

    /// 측정값 초기화 (민감도는 유지)
    pub fn reset(&mut self) {
        self.strength = 0.0;
        self.last_motion_at = None;
    }
}

//! 모션 점수 계산.
//!
//! 프레임을 고정 크기 휘도 버퍼(64x48)로 다운샘플한 뒤 직전 버퍼와 픽셀 단위로 비교.
//! 민감도가 높을수록 픽셀 임계값이 낮아져 같은 변화에도 강도가 커진다.
//! 비교 후 현재 버퍼가 새 기준(baseline)이 된다 (슬라이딩 윈도우).

use chrono::Utc;
use fast_image_resize::Resizer;
use image::DynamicImage;
use motionwatch_core::error::CoreError;
use motionwatch_core::models::motion::{clamp_sensitivity, MotionSample};
use motionwatch_core::ports::vision::FrameSource;
use tracing::{debug, warn};

use crate::resize::resize_with;

/// 다운샘플 버퍼 너비
pub const SAMPLE_WIDTH: u32 = 64;

/// 다운샘플 버퍼 높이
pub const SAMPLE_HEIGHT: u32 = 48;

/// 민감도 1일 때의 픽셀 휘도 임계값
pub const NOISE_FLOOR_MAX: f32 = 64.0;

/// 모션 판정 컷오프 (강도 %)
pub const DETECTION_CUTOFF: f32 = 1.0;

/// 민감도 → 픽셀 임계값 (단조 감소, 최소 1)
pub fn pixel_threshold(sensitivity: i32) -> f32 {
    let s = clamp_sensitivity(sensitivity) as f32;
    (NOISE_FLOOR_MAX * (101.0 - s) / 100.0).max(1.0)
}

/// 프레임 비교기
///
/// 세션당 하나. 기준 버퍼는 이 구조체만 소유/변경한다.
pub struct MotionScorer {
    baseline: Option<Vec<u8>>,
    resizer: Option<Resizer>,
}

impl Default for MotionScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionScorer {
    pub fn new() -> Self {
        Self {
            baseline: None,
            resizer: None,
        }
    }

    /// 소스에서 한 프레임을 샘플링해 점수 계산
    ///
    /// 실패는 전파하지 않는다. 소스 미준비, 캡처/리사이즈 오류는 모두
    /// 모션 없음 샘플이 되며 기준 버퍼는 건드리지 않는다.
    pub fn detect(&mut self, source: &dyn FrameSource, sensitivity: i32) -> MotionSample {
        let now = Utc::now();

        if !source.is_ready() {
            debug!("프레임 소스 미준비: 샘플 건너뜀");
            return MotionSample::still(now);
        }

        match source.capture() {
            Ok(frame) => self.score_frame(&frame, sensitivity),
            Err(e) => {
                warn!("프레임 캡처 실패: {e}");
                MotionSample::still(now)
            }
        }
    }

    /// 이미 확보한 프레임으로 점수 계산
    pub fn score_frame(&mut self, frame: &DynamicImage, sensitivity: i32) -> MotionSample {
        let now = Utc::now();

        let current = match self.luma_buffer(frame) {
            Ok(buf) => buf,
            Err(e) => {
                warn!("다운샘플 실패: {e}");
                return MotionSample::still(now);
            }
        };

        // 콜드 스타트: 비교 대상 없음
        let Some(previous) = self.baseline.replace(current) else {
            debug!("기준 프레임 저장 (콜드 스타트)");
            return MotionSample::still(now);
        };

        let threshold = pixel_threshold(sensitivity);
        let strength = match self.baseline.as_deref() {
            Some(current) => changed_percent(&previous, current, threshold),
            None => 0.0,
        };

        MotionSample {
            has_motion: strength > DETECTION_CUTOFF,
            strength,
            captured_at: now,
        }
    }

    /// 기준 버퍼 삭제: 다음 호출은 콜드 스타트
    pub fn reset(&mut self) {
        self.baseline = None;
    }

    /// 샘플링 자원 해제 (이후 동작은 `reset()`과 동일)
    pub fn dispose(&mut self) {
        self.baseline = None;
        self.resizer = None;
    }

    pub fn has_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    fn luma_buffer(&mut self, frame: &DynamicImage) -> Result<Vec<u8>, CoreError> {
        let resizer = self.resizer.get_or_insert_with(Resizer::new);
        let small = resize_with(resizer, frame, SAMPLE_WIDTH, SAMPLE_HEIGHT)?;

        // Rec.601 휘도
        Ok(small
            .as_raw()
            .chunks_exact(4)
            .map(|px| {
                let y = 299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32;
                (y / 1000) as u8
            })
            .collect())
    }
}

/// 임계값을 넘는 픽셀 비율 (0.0 ~ 100.0)
fn changed_percent(prev: &[u8], curr: &[u8], threshold: f32) -> f32 {
    let total = prev.len().min(curr.len());
    if total == 0 {
        return 0.0;
    }

    let changed = prev
        .iter()
        .zip(curr.iter())
        .filter(|(a, b)| a.abs_diff(**b) as f32 > threshold)
        .count();

    (changed as f32 * 100.0 / total as f32).clamp(0.0, 100.0)
}

//! JPEG 인코더.
//!
//! 분석 서버로 보낼 프레임을 너비 상한에 맞춰 축소한 뒤 JPEG로 인코딩.

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use motionwatch_core::error::CoreError;
use tracing::debug;

use crate::resize::fit_width;

/// 품질 하한 (이보다 낮으면 분석 정확도 저하)
const MIN_QUALITY: u8 = 30;

/// 제출용 프레임 인코더
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    max_width: u32,
    quality: u8,
}

impl FrameEncoder {
    pub fn new(max_width: u32, quality: u8) -> Self {
        Self {
            max_width,
            quality: quality.clamp(MIN_QUALITY, 100),
        }
    }

    /// 축소 + JPEG 인코딩
    pub fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, CoreError> {
        let fitted = fit_width(image, self.max_width)?;
        // JPEG는 알파 채널 미지원
        let rgb = fitted.to_rgb8();

        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, self.quality).encode_image(&rgb)?;

        debug!(
            "JPEG 인코딩: {}x{} → {} bytes (q={})",
            rgb.width(),
            rgb.height(),
            buf.len(),
            self.quality
        );
        Ok(buf)
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

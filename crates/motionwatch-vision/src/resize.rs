//! 고속 리사이즈.
//!
//! fast_image_resize 기반. 감지 버퍼 다운샘플과 제출 프레임 축소에 공용.

use fast_image_resize::{images::Image as FirImage, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, RgbaImage};
use motionwatch_core::error::CoreError;

/// 재사용 가능한 `Resizer`로 RGBA 리사이즈
pub fn resize_with(
    resizer: &mut Resizer,
    image: &DynamicImage,
    width: u32,
    height: u32,
) -> Result<RgbaImage, CoreError> {
    let (src_w, src_h) = (image.width(), image.height());

    if src_w == 0 || src_h == 0 {
        return Err(CoreError::Encode("소스 이미지 크기 0".to_string()));
    }
    if width == 0 || height == 0 {
        return Err(CoreError::Encode("목표 이미지 크기 0".to_string()));
    }

    // 동일 크기면 변환만
    if src_w == width && src_h == height {
        return Ok(image.to_rgba8());
    }

    let src_image = FirImage::from_vec_u8(src_w, src_h, image.to_rgba8().into_raw(), PixelType::U8x4)
        .map_err(|e| CoreError::Encode(format!("소스 이미지 생성 실패: {e}")))?;

    let mut dst_image = FirImage::new(width, height, PixelType::U8x4);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(
        fast_image_resize::FilterType::Bilinear,
    ));

    resizer
        .resize(&src_image, &mut dst_image, &options)
        .map_err(|e| CoreError::Encode(format!("리사이즈 실패: {e}")))?;

    RgbaImage::from_raw(width, height, dst_image.into_vec())
        .ok_or_else(|| CoreError::Encode("결과 이미지 생성 실패".to_string()))
}

/// 너비 상한에 맞춰 비율 유지 축소 (상한 이하면 원본 복제)
pub fn fit_width(image: &DynamicImage, max_width: u32) -> Result<DynamicImage, CoreError> {
    let (w, h) = (image.width(), image.height());
    if max_width == 0 || w <= max_width {
        return Ok(image.clone());
    }

    let new_h = ((h as u64 * max_width as u64) / w as u64).max(1) as u32;
    let mut resizer = Resizer::new();
    let resized = resize_with(&mut resizer, image, max_width, new_h)?;
    Ok(DynamicImage::ImageRgba8(resized))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, image::Rgba(color)))
    }

    #[test]
    fn downsample_keeps_uniform_color() {
        let img = solid(640, 480, [120, 60, 30, 255]);
        let mut resizer = Resizer::new();
        let small = resize_with(&mut resizer, &img, 64, 48).unwrap();
        assert_eq!(small.dimensions(), (64, 48));
        let px = small.get_pixel(10, 10);
        assert_eq!(px.0, [120, 60, 30, 255]);
    }

    #[test]
    fn zero_size_source_is_error() {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        let mut resizer = Resizer::new();
        assert!(resize_with(&mut resizer, &img, 64, 48).is_err());
    }

    #[test]
    fn fit_width_preserves_aspect() {
        let img = solid(1280, 720, [0, 0, 0, 255]);
        let fitted = fit_width(&img, 640).unwrap();
        assert_eq!((fitted.width(), fitted.height()), (640, 360));
    }

    #[test]
    fn fit_width_leaves_small_images() {
        let img = solid(320, 240, [0, 0, 0, 255]);
        let fitted = fit_width(&img, 640).unwrap();
        assert_eq!((fitted.width(), fitted.height()), (320, 240));
    }
}

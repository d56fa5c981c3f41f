//! 프레임 소스 구현.
//!
//! - [`SnapshotFileSource`]: 외부 캡처 프로세스가 갱신하는 스냅샷 파일
//! - [`SharedFrameSource`]: 임베딩 애플리케이션이 직접 밀어넣는 최신 프레임

use image::DynamicImage;
use motionwatch_core::error::CoreError;
use motionwatch_core::ports::vision::FrameSource;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::trace;

/// 스냅샷 파일 기반 프레임 소스
///
/// 파일이 존재하고 비어있지 않으면 준비 상태로 본다.
#[derive(Debug, Clone)]
pub struct SnapshotFileSource {
    path: PathBuf,
}

impl SnapshotFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for SnapshotFileSource {
    fn is_ready(&self) -> bool {
        std::fs::metadata(&self.path)
            .map(|m| m.is_file() && m.len() > 0)
            .unwrap_or(false)
    }

    fn capture(&self) -> Result<DynamicImage, CoreError> {
        if !self.is_ready() {
            return Err(CoreError::FrameNotReady(self.path.display().to_string()));
        }
        let image = image::open(&self.path)?;
        trace!(
            "스냅샷 로드: {} ({}x{})",
            self.path.display(),
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

/// 메모리 공유 프레임 소스
///
/// 첫 프레임이 들어오기 전에는 준비되지 않은 상태.
#[derive(Debug, Default)]
pub struct SharedFrameSource {
    latest: RwLock<Option<DynamicImage>>,
}

impl SharedFrameSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 최신 프레임 교체
    pub fn publish(&self, frame: DynamicImage) {
        *self.latest.write() = Some(frame);
    }

    /// 프레임 비우기 (소스 분리)
    pub fn clear(&self) {
        *self.latest.write() = None;
    }
}

impl FrameSource for SharedFrameSource {
    fn is_ready(&self) -> bool {
        self.latest.read().is_some()
    }

    fn capture(&self) -> Result<DynamicImage, CoreError> {
        self.latest
            .read()
            .clone()
            .ok_or_else(|| CoreError::FrameNotReady("공유 프레임 없음".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn missing_snapshot_is_not_ready() {
        let dir = TempDir::new().unwrap();
        let source = SnapshotFileSource::new(dir.path().join("frame.jpg"));
        assert!(!source.is_ready());
        assert!(matches!(source.capture(), Err(CoreError::FrameNotReady(_))));
    }

    #[test]
    fn empty_snapshot_is_not_ready() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.jpg");
        std::fs::write(&path, b"").unwrap();
        assert!(!SnapshotFileSource::new(path).is_ready());
    }

    #[test]
    fn loads_snapshot_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.png");
        RgbImage::from_pixel(32, 24, Rgb([1, 2, 3])).save(&path).unwrap();

        let source = SnapshotFileSource::new(&path);
        assert!(source.is_ready());
        let frame = source.capture().unwrap();
        assert_eq!((frame.width(), frame.height()), (32, 24));
    }

    #[test]
    fn corrupt_snapshot_is_encode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame.jpg");
        std::fs::write(&path, b"not an image").unwrap();

        let result = SnapshotFileSource::new(path).capture();
        assert!(result.is_err());
    }

    #[test]
    fn shared_source_follows_published_frames() {
        let source = SharedFrameSource::new();
        assert!(!source.is_ready());

        source.publish(DynamicImage::new_rgb8(4, 4));
        assert!(source.is_ready());
        assert!(source.capture().is_ok());

        source.clear();
        assert!(!source.is_ready());
    }
}

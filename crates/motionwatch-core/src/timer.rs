//! 취소 가능한 타이머.
//!
//! 논리적 타임아웃(감지 틱, 재연결, 요청 타임아웃) 하나당 타이머 하나.
//! 드롭 시 자동 취소되므로 소유자 해체 = 타이머 정리.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

/// 소유권 기반 취소 타이머 (tokio 태스크 래퍼)
#[derive(Debug)]
pub struct CancelableTimer {
    handle: Option<JoinHandle<()>>,
}

impl CancelableTimer {
    /// `delay` 후 `task` 실행
    ///
    /// tokio 런타임 컨텍스트 안에서 호출해야 한다.
    pub fn after<F>(delay: Duration, task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            task.await;
        });
        Self {
            handle: Some(handle),
        }
    }

    /// 즉시 실행되는 장기 태스크를 타이머처럼 관리
    pub fn spawn<F>(task: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            handle: Some(tokio::spawn(task)),
        }
    }

    /// 취소 (이미 완료/취소됐으면 no-op)
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// 아직 대기/실행 중인지
    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for CancelableTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let timer = CancelableTimer::after(Duration::from_secs(30), async move {
            flag.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_fire() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let mut timer = CancelableTimer::after(Duration::from_secs(5), async move {
            flag.store(true, Ordering::SeqCst);
        });

        timer.cancel();
        assert!(!timer.is_pending());
        // 두 번 취소해도 안전
        timer.cancel();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        {
            let _timer = CancelableTimer::after(Duration::from_secs(1), async move {
                flag.store(true, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}

//! 라이프사이클 관리.
//!
//! 종료 신호 전파, OS 시그널 대기.

use std::io;
use tokio::sync::watch;
use tracing::info;

/// 라이프사이클 관리자
pub struct LifecycleManager {
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    /// 종료 수신기 복제
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// 종료 신호 발송 (중복 호출 무시)
    pub fn shutdown(&self) {
        if self.is_shutting_down() {
            return;
        }
        info!("종료 신호 발송");
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// OS 시그널 대기 (SIGINT, SIGTERM) 후 종료 신호 발송
    ///
    /// 핸들러 등록 실패는 에러로 반환한다.
    pub async fn wait_for_signal(&self) -> io::Result<()> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigint = signal(SignalKind::interrupt())?;
            let mut sigterm = signal(SignalKind::terminate())?;

            tokio::select! {
                _ = sigint.recv() => {
                    info!("SIGINT 수신");
                }
                _ = sigterm.recv() => {
                    info!("SIGTERM 수신");
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await?;
            info!("Ctrl+C 수신");
        }

        self.shutdown();
        Ok(())
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_creation() {
        let lm = LifecycleManager::new();
        let rx = lm.subscribe();
        assert!(!*rx.borrow());
        assert!(!lm.is_shutting_down());
    }

    #[test]
    fn shutdown_signal() {
        let lm = LifecycleManager::new();
        let rx = lm.subscribe();
        lm.shutdown();
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn subscribers_observe_shutdown_once() {
        let lm = LifecycleManager::new();
        let mut rx = lm.subscribe();

        lm.shutdown();
        lm.shutdown();

        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
        assert!(!rx.has_changed().unwrap());
    }
}

//! 제출 속도 제한.
//!
//! 최근 60초 제출 시각을 롤링 윈도우로 유지하고,
//! 분당 최대 횟수와 최소 제출 간격을 함께 검사한다.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// 롤링 윈도우 길이
pub const WINDOW: Duration = Duration::from_secs(60);

/// 제한 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Throttle {
    /// 최근 60초 제출 수가 한도에 도달
    PerMinute { limit: u32 },
    /// 직전 제출 후 최소 간격 미경과
    TooSoon { wait: Duration },
}

/// 제출 속도 제한기
#[derive(Debug)]
pub struct RateLimiter {
    window: VecDeque<Instant>,
    /// 윈도우와 별개로 보관 (최소 간격이 윈도우보다 길 수 있음)
    last_accepted: Option<Instant>,
    max_per_minute: u32,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32, min_interval: Duration) -> Self {
        Self {
            window: VecDeque::with_capacity(max_per_minute as usize),
            last_accepted: None,
            max_per_minute,
            min_interval,
        }
    }

    /// `now` 시점에 제출 가능한지 검사 (기록하지 않음)
    pub fn check(&mut self, now: Instant) -> Result<(), Throttle> {
        self.prune(now);

        if self.window.len() >= self.max_per_minute as usize {
            return Err(Throttle::PerMinute {
                limit: self.max_per_minute,
            });
        }

        if let Some(last) = self.last_accepted {
            let elapsed = now.saturating_duration_since(last);
            if elapsed < self.min_interval {
                return Err(Throttle::TooSoon {
                    wait: self.min_interval - elapsed,
                });
            }
        }

        Ok(())
    }

    /// 수락된 제출 기록
    pub fn record(&mut self, now: Instant) {
        self.window.push_back(now);
        self.last_accepted = Some(now);
    }

    /// 윈도우 내 제출 수
    pub fn in_window(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.window.len()
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.last_accepted = None;
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.window.front() {
            if now.saturating_duration_since(*front) >= WINDOW {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }
}

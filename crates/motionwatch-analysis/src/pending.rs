//! 결과 대기 작업 테이블.
//!
//! 작업마다 타임아웃 타이머와 제출 태스크를 소유한다.
//! 작업이 테이블에서 빠지는 순간(결과 도착, 실패, 타임아웃, 해체) 둘 다 취소된다.

use chrono::{DateTime, Utc};
use motionwatch_core::timer::CancelableTimer;
use std::collections::HashMap;

/// 결과를 기다리는 제출 건
#[derive(Debug)]
pub struct PendingJob {
    pub frame_id: String,
    pub submitted_at: DateTime<Utc>,
    pub motion_strength: f32,
    /// 재시도 횟수 (현재 코디네이터는 재시도하지 않음)
    pub retry_count: u32,
    timeout: CancelableTimer,
    submission: Option<CancelableTimer>,
}

impl PendingJob {
    pub fn new(
        frame_id: String,
        motion_strength: f32,
        timeout: CancelableTimer,
        submission: Option<CancelableTimer>,
    ) -> Self {
        Self {
            frame_id,
            submitted_at: Utc::now(),
            motion_strength,
            retry_count: 0,
            timeout,
            submission,
        }
    }

    /// 타임아웃 타이머가 아직 살아있는지
    pub fn is_armed(&self) -> bool {
        self.timeout.is_pending()
    }

    /// 제출 요청이 아직 진행 중인지
    pub fn is_submitting(&self) -> bool {
        self.submission.as_ref().is_some_and(|s| s.is_pending())
    }
}

/// frame_id → 작업
#[derive(Debug, Default)]
pub struct PendingJobs {
    jobs: HashMap<String, PendingJob>,
}

impl PendingJobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, job: PendingJob) {
        self.jobs.insert(job.frame_id.clone(), job);
    }

    /// 작업 제거: 반환값을 버리면 타이머도 취소됨
    pub fn remove(&mut self, frame_id: &str) -> Option<PendingJob> {
        self.jobs.remove(frame_id)
    }

    pub fn contains(&self, frame_id: &str) -> bool {
        self.jobs.contains_key(frame_id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// 전체 제거 (모든 타이머 취소), 제거된 ID 반환
    pub fn clear(&mut self) -> Vec<String> {
        self.jobs.drain().map(|(id, _job)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn job_with_flag(id: &str, fired: Arc<AtomicBool>) -> PendingJob {
        let timer = CancelableTimer::after(Duration::from_secs(30), async move {
            fired.store(true, Ordering::SeqCst);
        });
        PendingJob::new(id.to_string(), 50.0, timer, None)
    }

    #[tokio::test(start_paused = true)]
    async fn removing_job_cancels_timeout() {
        let fired = Arc::new(AtomicBool::new(false));
        let mut jobs = PendingJobs::new();
        jobs.insert(job_with_flag("frame_1_a", fired.clone()));
        assert!(jobs.contains("frame_1_a"));

        let removed = jobs.remove("frame_1_a").unwrap();
        assert!(removed.is_armed());
        assert!(!removed.is_submitting());
        drop(removed);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert!(jobs.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_cancels_every_timer() {
        let flags: Vec<_> = (0..3).map(|_| Arc::new(AtomicBool::new(false))).collect();
        let mut jobs = PendingJobs::new();
        for (i, flag) in flags.iter().enumerate() {
            jobs.insert(job_with_flag(&format!("frame_{i}_x"), flag.clone()));
        }
        assert_eq!(jobs.len(), 3);

        let mut cleared = jobs.clear();
        cleared.sort();
        assert_eq!(cleared, vec!["frame_0_x", "frame_1_x", "frame_2_x"]);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(flags.iter().all(|f| !f.load(Ordering::SeqCst)));
    }

    #[tokio::test(start_paused = true)]
    async fn remove_unknown_is_none() {
        let mut jobs = PendingJobs::new();
        assert!(jobs.remove("missing").is_none());
    }
}

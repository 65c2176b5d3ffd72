//! 周期任务
//!
//! 基于 tokio interval 的单任务定时器：
//! - 同一任务内顺序执行，上一次未结束时到期的 tick 直接跳过
//! - 句柄被替换或释放时中止任务

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// 周期任务句柄，drop 时中止后台任务。
#[derive(Debug)]
pub struct PeriodicTask {
    name: String,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// 每隔 `period` 执行一次 `job`，首次在一个周期之后执行。
    ///
    /// 必须在 tokio 运行时内调用。
    pub fn spawn<F, Fut>(name: impl Into<String>, period: Duration, mut job: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let period = period.max(Duration::from_millis(1));
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                tracing::debug!(target: "ems.tsdb", task = %task_name, "periodic task tick");
                job().await;
            }
        });
        Self { name, handle }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

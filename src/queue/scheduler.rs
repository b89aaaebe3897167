// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::config::settings::SchedulerSettings;
use crate::queue::interval::IntervalSchedule;
use crate::utils::errors::SchedulerError;
use crate::workers::pool::{PoolTask, WorkerPool};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use metrics::counter;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 定时任务的工作函数
pub type JobFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// 任务运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Running,
}

/// 任务键：(分组ID, 端点ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub group_id: String,
    pub endpoint_id: String,
}

impl JobKey {
    pub fn new(group_id: &str, endpoint_id: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            endpoint_id: endpoint_id.to_string(),
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group_id, self.endpoint_id)
    }
}

/// 定时任务快照
#[derive(Debug, Clone)]
pub struct CronJob {
    pub group_id: String,
    pub endpoint_id: String,
    pub interval: String,
    pub active: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub status: JobStatus,
    /// 当前触发器的标识，每次重新注册都会变化
    pub trigger_id: Uuid,
}

/// 一次触发的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    Submitted,
    SkippedInactive,
    SkippedRunning,
    NotFound,
    PoolStopped,
}

struct JobEntry {
    interval: String,
    active: bool,
    last_run: Option<DateTime<Utc>>,
    status_tx: Arc<watch::Sender<JobStatus>>,
    trigger_id: Uuid,
    trigger: JoinHandle<()>,
    job: JobFn,
}

impl JobEntry {
    fn snapshot(&self, key: &JobKey) -> CronJob {
        CronJob {
            group_id: key.group_id.clone(),
            endpoint_id: key.endpoint_id.clone(),
            interval: self.interval.clone(),
            active: self.active,
            last_run: self.last_run,
            status: *self.status_tx.borrow(),
            trigger_id: self.trigger_id,
        }
    }
}

struct Inner {
    jobs: RwLock<HashMap<JobKey, JobEntry>>,
    pool: Arc<WorkerPool>,
    max_jitter: Duration,
    stopped: AtomicBool,
}

/// 任务调度器
///
/// 每个端点对应一个定时任务。同一任务同时最多只有一次执行，
/// 执行本身交给工作池；任务表的锁只在修改表时持有，不跨越执行过程
#[derive(Clone)]
pub struct JobScheduler {
    inner: Arc<Inner>,
}

impl JobScheduler {
    /// 创建调度器
    ///
    /// # 参数
    ///
    /// * `pool` - 执行任务的工作池，调度器停止时一并停止
    /// * `max_jitter` - 每次触发前随机等待的上限
    pub fn new(pool: Arc<WorkerPool>, max_jitter: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: RwLock::new(HashMap::new()),
                pool,
                max_jitter,
                stopped: AtomicBool::new(false),
            }),
        }
    }

    /// 按配置创建调度器及其工作池（需在 tokio 运行时内调用）
    pub fn from_settings(settings: &SchedulerSettings) -> Self {
        let pool = Arc::new(WorkerPool::new(
            settings.max_concurrent_tasks,
            settings.num_workers,
        ));
        Self::new(pool, Duration::from_secs(settings.max_jitter_secs))
    }

    /// 注册定时任务
    ///
    /// 同一键已存在时替换原有注册（先取消旧触发器），运行状态保留
    ///
    /// # 返回值
    ///
    /// 新触发器的标识；表达式无法解析时返回 `InvalidInterval`
    pub fn add_job<F, Fut>(
        &self,
        group_id: &str,
        endpoint_id: &str,
        interval: &str,
        active: bool,
        job: F,
    ) -> Result<Uuid, SchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let job: JobFn = Arc::new(move || job().boxed());
        self.insert_job(JobKey::new(group_id, endpoint_id), interval, active, job)
    }

    fn insert_job(
        &self,
        key: JobKey,
        interval: &str,
        active: bool,
        job: JobFn,
    ) -> Result<Uuid, SchedulerError> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(SchedulerError::Stopped);
        }
        let schedule = IntervalSchedule::parse(interval)?;

        let mut jobs = self.inner.jobs.write();
        let (status_tx, last_run) = match jobs.remove(&key) {
            Some(previous) => {
                warn!(job = %key, "Job already registered, replacing it");
                previous.trigger.abort();
                (previous.status_tx, previous.last_run)
            }
            None => (Arc::new(watch::channel(JobStatus::Idle).0), None),
        };

        let trigger_id = Uuid::new_v4();
        let trigger = self.spawn_trigger(key.clone(), trigger_id, schedule);
        jobs.insert(
            key.clone(),
            JobEntry {
                interval: interval.to_string(),
                active,
                last_run,
                status_tx,
                trigger_id,
                trigger,
                job,
            },
        );

        info!(job = %key, interval = %interval, active, "Job registered");
        Ok(trigger_id)
    }

    fn spawn_trigger(&self, key: JobKey, trigger_id: Uuid, schedule: IntervalSchedule) -> JoinHandle<()> {
        tokio::spawn(run_trigger(
            Arc::downgrade(&self.inner),
            key,
            trigger_id,
            schedule,
        ))
    }

    /// 删除定时任务
    ///
    /// 任务正在执行时等待其回到 `Idle` 后才返回；任务不存在时只记录日志
    pub async fn destroy_job(&self, group_id: &str, endpoint_id: &str) {
        let key = JobKey::new(group_id, endpoint_id);
        let removed = self.inner.jobs.write().remove(&key);
        let Some(entry) = removed else {
            warn!(job = %key, "Destroy requested for unknown job, ignoring");
            return;
        };
        entry.trigger.abort();

        let mut status_rx = entry.status_tx.subscribe();
        if *status_rx.borrow() == JobStatus::Running {
            debug!(job = %key, "Waiting for running job to finish before removal");
        }
        // the entry keeps the sender alive, so the wait only ends on Idle
        let _ = status_rx.wait_for(|status| *status == JobStatus::Idle).await;
        info!(job = %key, "Job destroyed");
    }

    /// 修改任务的触发表达式，保留启用状态与运行状态
    ///
    /// 新表达式先校验，无效时原任务保持不变
    pub fn update_job_interval(
        &self,
        group_id: &str,
        endpoint_id: &str,
        interval: &str,
    ) -> Result<(), SchedulerError> {
        let schedule = IntervalSchedule::parse(interval)?;
        let key = JobKey::new(group_id, endpoint_id);

        let mut jobs = self.inner.jobs.write();
        let Some(entry) = jobs.get_mut(&key) else {
            warn!(job = %key, "Interval update requested for unknown job, ignoring");
            return Ok(());
        };
        entry.trigger.abort();
        entry.trigger_id = Uuid::new_v4();
        entry.trigger = self.spawn_trigger(key.clone(), entry.trigger_id, schedule);
        entry.interval = interval.to_string();

        info!(job = %key, interval = %interval, "Job interval updated");
        Ok(())
    }

    /// 启用任务
    pub fn start_job(&self, group_id: &str, endpoint_id: &str) {
        self.set_active(group_id, endpoint_id, true);
    }

    /// 停用任务，触发器保留但触发时不执行
    pub fn stop_job(&self, group_id: &str, endpoint_id: &str) {
        self.set_active(group_id, endpoint_id, false);
    }

    fn set_active(&self, group_id: &str, endpoint_id: &str, active: bool) {
        let key = JobKey::new(group_id, endpoint_id);
        match self.inner.jobs.write().get_mut(&key) {
            Some(entry) => {
                entry.active = active;
                debug!(job = %key, active, "Job active flag changed");
            }
            None => warn!(job = %key, "Unknown job, active flag unchanged"),
        }
    }

    /// 获取任务快照
    pub fn get_job(&self, group_id: &str, endpoint_id: &str) -> Option<CronJob> {
        let key = JobKey::new(group_id, endpoint_id);
        self.inner.jobs.read().get(&key).map(|entry| entry.snapshot(&key))
    }

    /// 所有任务的快照
    pub fn jobs(&self) -> Vec<CronJob> {
        self.inner
            .jobs
            .read()
            .iter()
            .map(|(key, entry)| entry.snapshot(key))
            .collect()
    }

    /// 立即触发一次任务（不等待随机抖动），遵循与定时触发相同的规则
    pub fn trigger_now(&self, group_id: &str, endpoint_id: &str) -> FireOutcome {
        fire(&self.inner, &JobKey::new(group_id, endpoint_id), None)
    }

    /// 停止调度器：取消所有触发器，停止工作池并等待执行中的任务完成
    pub async fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            debug!("Scheduler already stopping");
        }
        for entry in self.inner.jobs.read().values() {
            entry.trigger.abort();
        }
        self.inner.pool.stop().await;
        info!("Scheduler stopped");
    }
}

async fn run_trigger(
    inner: Weak<Inner>,
    key: JobKey,
    trigger_id: Uuid,
    schedule: IntervalSchedule,
) {
    loop {
        let Some(delay) = schedule.next_delay(Utc::now()) else {
            debug!(job = %key, "Schedule has no further occurrences");
            return;
        };
        tokio::time::sleep(delay).await;

        let jitter = match inner.upgrade() {
            Some(inner) => jitter(inner.max_jitter),
            None => return,
        };
        if !jitter.is_zero() {
            tokio::time::sleep(jitter).await;
        }

        let Some(inner) = inner.upgrade() else {
            return;
        };
        counter!("scheduler_jobs_triggered_total").increment(1);
        if fire(&inner, &key, Some(trigger_id)) == FireOutcome::NotFound {
            return;
        }
    }
}

fn jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::random_range(0..max_ms))
}

fn fire(inner: &Arc<Inner>, key: &JobKey, trigger_id: Option<Uuid>) -> FireOutcome {
    let mut jobs = inner.jobs.write();
    let Some(entry) = jobs.get_mut(key) else {
        return FireOutcome::NotFound;
    };
    if trigger_id.is_some_and(|id| id != entry.trigger_id) {
        // stale trigger of a replaced registration
        return FireOutcome::NotFound;
    }

    if !entry.active {
        counter!("scheduler_jobs_skipped_total", "reason" => "inactive").increment(1);
        debug!(job = %key, "Job inactive, skipping trigger");
        return FireOutcome::SkippedInactive;
    }
    if *entry.status_tx.borrow() == JobStatus::Running {
        counter!("scheduler_jobs_skipped_total", "reason" => "running").increment(1);
        info!(job = %key, "Job still running, skipping trigger");
        return FireOutcome::SkippedRunning;
    }

    entry.status_tx.send_replace(JobStatus::Running);
    let guard = RunGuard {
        inner: Arc::downgrade(inner),
        key: key.clone(),
        status_tx: Arc::clone(&entry.status_tx),
        started: false,
    };
    let job = Arc::clone(&entry.job);
    let task: PoolTask = Box::new(move || {
        async move {
            let mut guard = guard;
            guard.started = true;
            let result = job().await;
            drop(guard);
            result
        }
        .boxed()
    });

    // a rejected task is dropped here and its guard resets the status
    if !inner.pool.add_task(task) {
        warn!(job = %key, "Worker pool stopped, trigger dropped");
        return FireOutcome::PoolStopped;
    }
    debug!(job = %key, "Job submitted to worker pool");
    FireOutcome::Submitted
}

/// 执行结束（包括失败、panic 和未执行即被丢弃）时把状态复位为 `Idle`
struct RunGuard {
    inner: Weak<Inner>,
    key: JobKey,
    status_tx: Arc<watch::Sender<JobStatus>>,
    started: bool,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.started {
            if let Some(inner) = self.inner.upgrade() {
                if let Some(entry) = inner.jobs.write().get_mut(&self.key) {
                    entry.last_run = Some(Utc::now());
                }
            }
        }
        self.status_tx.send_replace(JobStatus::Idle);
    }
}

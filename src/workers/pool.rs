// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use futures::future::BoxFuture;
use futures::FutureExt;
use metrics::counter;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 提交给工作池的任务
pub type PoolTask = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<PoolTask>>>;

/// 工作池
///
/// 固定数量的工作协程共享一个任务通道，信号量限制同时执行的任务数。
/// 任务的错误与 panic 只记录日志，不会影响工作池
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::UnboundedSender<PoolTask>>>,
    shutdown: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
    stopped: AtomicBool,
}

impl WorkerPool {
    /// 创建工作池并启动工作协程（需在 tokio 运行时内调用）
    ///
    /// # 参数
    ///
    /// * `max_concurrent` - 同时执行的任务上限
    /// * `num_workers` - 工作协程数量
    pub fn new(max_concurrent: usize, num_workers: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let (sender, receiver) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        let receiver: SharedReceiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        let handles = (0..num_workers.max(1))
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                let semaphore = Arc::clone(&semaphore);
                let shutdown_rx = shutdown.subscribe();
                tokio::spawn(worker_loop(id, receiver, semaphore, shutdown_rx))
            })
            .collect();

        info!(max_concurrent, num_workers, "Worker pool started");

        Self {
            sender: Mutex::new(Some(sender)),
            shutdown,
            handles: Mutex::new(handles),
            semaphore,
            max_concurrent,
            stopped: AtomicBool::new(false),
        }
    }

    /// 提交任务
    ///
    /// # 返回值
    ///
    /// 任务进入队列时返回 `true`；工作池已停止时不做任何事并返回 `false`
    pub fn add_task(&self, task: PoolTask) -> bool {
        if self.stopped.load(Ordering::SeqCst) {
            warn!("Worker pool is stopped, task ignored");
            return false;
        }
        match self.sender.lock().as_ref() {
            Some(sender) => sender.send(task).is_ok(),
            None => false,
        }
    }

    /// 正在执行的任务数
    pub fn active_tasks(&self) -> usize {
        self.max_concurrent - self.semaphore.available_permits()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// 停止工作池，等待正在执行的任务完成后返回
    ///
    /// 尚未被取走的排队任务会被丢弃；重复调用是安全的
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Worker pool already stopping");
        }
        self.shutdown.send_replace(true);
        self.sender.lock().take();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker task join error: {}", e);
            }
        }
        info!("Worker pool stopped");
    }
}

async fn worker_loop(
    id: usize,
    receiver: SharedReceiver,
    semaphore: Arc<Semaphore>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let task = {
            let mut rx = receiver.lock().await;
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => None,
                task = rx.recv() => task,
            }
        };

        let Some(task) = task else {
            break;
        };

        let Ok(_permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };

        let outcome = AssertUnwindSafe(async move { task().await })
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                counter!("worker_pool_tasks_failed_total").increment(1);
                warn!(worker = id, error = %e, "Task failed");
            }
            Err(_) => {
                counter!("worker_pool_tasks_failed_total").increment(1);
                error!(worker = id, "Task panicked");
            }
        }
    }
    debug!(worker = id, "Worker exited");
}

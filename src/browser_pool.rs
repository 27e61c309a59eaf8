//! Browser pool management for concurrent Chrome instances
//!
//! A fixed set of Chrome processes is launched once and shared by every
//! capture request, so no request pays for browser startup.

use crate::{create_browser_config, Config, ScreenshotError};
use chromiumoxide::browser::Browser;
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

type HandlerTask = JoinHandle<Result<(), chromiumoxide::error::CdpError>>;

/// Current status of a browser instance in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    /// Instance is running
    Healthy,
    /// Instance could not be relaunched
    Failed,
}

/// A single Chrome process owned by the pool
#[derive(Debug)]
pub struct BrowserInstance {
    pub browser: Arc<Mutex<Browser>>,
    /// Background task driving the DevTools connection
    pub handler: HandlerTask,
    pub capture_count: usize,
    pub status: InstanceStatus,
}

impl BrowserInstance {
    pub fn new(browser: Browser, handler: HandlerTask) -> Self {
        Self {
            browser: Arc::new(Mutex::new(browser)),
            handler,
            capture_count: 0,
            status: InstanceStatus::Healthy,
        }
    }

    /// The DevTools handler ends when the Chrome process goes away
    pub fn is_alive(&self) -> bool {
        !self.handler.is_finished()
    }

    pub async fn shutdown(self) {
        let _ = self.browser.lock().await.close().await;
        self.handler.abort();
    }
}

/// Free instance ids, with one semaphore permit per free id
struct Slots {
    free: std::sync::Mutex<VecDeque<usize>>,
    semaphore: Arc<Semaphore>,
}

impl Slots {
    fn new() -> Self {
        Self {
            free: std::sync::Mutex::new(VecDeque::new()),
            semaphore: Arc::new(Semaphore::new(0)),
        }
    }

    fn push(&self, id: usize) {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(id);
        self.semaphore.add_permits(1);
    }

    /// Wait for a permit, then take the id it stands for
    async fn checkout(self: &Arc<Self>) -> Result<Slot, ScreenshotError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ScreenshotError::BrowserUnavailable)?;

        let id = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or(ScreenshotError::BrowserUnavailable)?;

        Ok(Slot {
            id,
            slots: self.clone(),
            _permit: permit,
        })
    }

    fn available(&self) -> usize {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn close(&self) {
        self.semaphore.close();
    }
}

/// A checked-out id; the id is back in the free list before the permit is released
struct Slot {
    id: usize,
    slots: Arc<Slots>,
    // Fields drop after `Drop::drop` runs
    _permit: OwnedSemaphorePermit,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.slots
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(self.id);
    }
}

/// Checked-out browser; returns itself to the pool when dropped
pub struct BrowserHandle {
    pub browser: Arc<Mutex<Browser>>,
    pub instance_id: usize,
    _slot: Slot,
}

#[derive(Clone)]
pub struct BrowserPool {
    instances: Arc<Mutex<Vec<BrowserInstance>>>,
    slots: Arc<Slots>,
    config: Config,
    is_shutting_down: Arc<AtomicBool>,
}

impl BrowserPool {
    pub async fn new(config: Config) -> Result<Self, ScreenshotError> {
        let pool = Self {
            instances: Arc::new(Mutex::new(Vec::new())),
            slots: Arc::new(Slots::new()),
            config,
            is_shutting_down: Arc::new(AtomicBool::new(false)),
        };

        pool.initialize_instances().await?;
        Ok(pool)
    }

    async fn initialize_instances(&self) -> Result<(), ScreenshotError> {
        let mut instances = self.instances.lock().await;

        for i in 0..self.config.browser_pool_size {
            match self.create_browser_instance(i).await {
                Ok(instance) => {
                    instances.push(instance);
                    self.slots.push(i);
                    info!("Browser instance {} created successfully", i);
                }
                Err(e) => {
                    error!("Failed to create browser instance {}: {}", i, e);
                    return Err(e);
                }
            }
        }

        info!("Browser pool initialized with {} instances", instances.len());
        Ok(())
    }

    async fn create_browser_instance(&self, id: usize) -> Result<BrowserInstance, ScreenshotError> {
        let browser_config = create_browser_config(&self.config, id)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScreenshotError::BrowserLaunchFailed(e.to_string()))?;

        // The handler is a Stream that must be polled for the connection to make progress
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::error!("Browser {} handler error: {}", id, e);
                    return Err(e);
                }
            }
            tracing::info!("Browser {} handler stream ended", id);
            Ok(())
        });

        Ok(BrowserInstance::new(browser, handler_task))
    }

    /// Wait for a free instance, relaunching it first if its process died
    pub async fn get_browser(&self) -> Result<BrowserHandle, ScreenshotError> {
        if self.is_shutting_down.load(Ordering::Relaxed) {
            return Err(ScreenshotError::BrowserUnavailable);
        }

        // An early return drops the slot, which puts the id back
        let slot = self.slots.checkout().await?;
        let instance_id = slot.id;

        let mut instances = self.instances.lock().await;
        let instance = instances
            .get_mut(instance_id)
            .ok_or(ScreenshotError::BrowserUnavailable)?;

        if !instance.is_alive() {
            warn!("Browser instance {} is not running, relaunching", instance_id);
            let _ = instance.browser.lock().await.close().await;

            match self.create_browser_instance(instance_id).await {
                Ok(fresh) => {
                    *instance = fresh;
                    info!("Browser instance {} relaunched", instance_id);
                }
                Err(e) => {
                    instance.status = InstanceStatus::Failed;
                    return Err(e);
                }
            }
        }

        instance.capture_count += 1;

        Ok(BrowserHandle {
            browser: instance.browser.clone(),
            instance_id,
            _slot: slot,
        })
    }

    pub async fn shutdown(&self) {
        info!("Shutting down browser pool...");
        self.is_shutting_down.store(true, Ordering::Relaxed);
        self.slots.close();

        let mut instances = self.instances.lock().await;
        for instance in instances.drain(..) {
            instance.shutdown().await;
        }

        info!("Browser pool shutdown complete");
    }

    pub async fn get_stats(&self) -> BrowserPoolStats {
        let instances = self.instances.lock().await;

        let mut stats = BrowserPoolStats {
            total_instances: instances.len(),
            available_instances: self.slots.available(),
            ..Default::default()
        };

        for instance in instances.iter() {
            stats.total_captures += instance.capture_count;
            if instance.status == InstanceStatus::Failed {
                stats.failed_instances += 1;
            }
        }

        stats
    }
}

#[derive(Debug, Clone, Default)]
pub struct BrowserPoolStats {
    pub total_instances: usize,
    pub available_instances: usize,
    pub failed_instances: usize,
    pub total_captures: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(ids: usize) -> Arc<Slots> {
        let slots = Arc::new(Slots::new());
        for id in 0..ids {
            slots.push(id);
        }
        slots
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_waiter_gets_released_slot() {
        let slots = slots(1);
        let first = slots.checkout().await.unwrap();

        let waiter = {
            let slots = slots.clone();
            tokio::spawn(async move { slots.checkout().await.map(|slot| slot.id) })
        };
        tokio::task::yield_now().await;
        drop(first);

        assert_eq!(waiter.await.unwrap().unwrap(), 0);
        assert_eq!(slots.available(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_back_to_back_checkouts_never_fail() {
        let slots = slots(1);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let slots = slots.clone();
                tokio::spawn(async move {
                    for _ in 0..50 {
                        let slot = slots.checkout().await?;
                        tokio::task::yield_now().await;
                        drop(slot);
                    }
                    Ok::<_, ScreenshotError>(())
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(slots.available(), 1);
    }

    #[tokio::test]
    async fn test_checkout_after_close_is_unavailable() {
        let slots = slots(2);
        slots.close();
        assert!(matches!(
            slots.checkout().await,
            Err(ScreenshotError::BrowserUnavailable)
        ));
    }
}

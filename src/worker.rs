use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::RgbImage;
use log::{info, warn};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::action::{CellRecognition, ScanContext, scan_grid, scan_single_cell};
use crate::config::ScanConfig;
use crate::error::{ScanError, ScanResult};
use crate::ocr::FallbackClassifier;
use crate::types::RecognitionResult;

/// Runs scans on the blocking pool, one at a time. A request made while a
/// scan is outstanding is refused with [`ScanError::ScanInProgress`].
pub struct ScanService {
    config: Arc<ScanConfig>,
    fallback: Arc<dyn FallbackClassifier>,
    tracker: TaskTracker,
    busy: Arc<AtomicBool>,
}

/// Frees the slot when the job finishes, even by panic.
struct SlotGuard(Arc<AtomicBool>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ScanService {
    pub fn new(config: ScanConfig, fallback: Arc<dyn FallbackClassifier>) -> Self {
        Self {
            config: Arc::new(config),
            fallback,
            tracker: TaskTracker::new(),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Full grid scan of `image`. Templates are reloaded for every scan.
    pub fn submit(&self, image: RgbImage) -> ScanResult<JoinHandle<ScanResult<RecognitionResult>>> {
        let config = Arc::clone(&self.config);
        let fallback = Arc::clone(&self.fallback);
        self.try_spawn(move || {
            let ctx = ScanContext::load((*config).clone(), fallback)?;
            scan_grid(&image, &ctx)
        })
    }

    pub fn submit_single_cell(
        &self,
        image: RgbImage,
    ) -> ScanResult<JoinHandle<ScanResult<CellRecognition>>> {
        let config = Arc::clone(&self.config);
        let fallback = Arc::clone(&self.fallback);
        self.try_spawn(move || {
            let ctx = ScanContext::load((*config).clone(), fallback)?;
            scan_single_cell(&image, &ctx)
        })
    }

    fn try_spawn<F, T>(&self, job: F) -> ScanResult<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Scan requested while another is running");
            return Err(ScanError::ScanInProgress);
        }

        let guard = SlotGuard(Arc::clone(&self.busy));
        Ok(self.tracker.spawn_blocking(move || {
            let _guard = guard;
            job()
        }))
    }

    /// Stops accepting work and waits for the outstanding scan.
    pub async fn shutdown(&self) {
        self.tracker.close();
        info!("Waiting for {} scan task(s)", self.tracker.len());
        self.tracker.wait().await;
    }
}

//! Readiness barrier awaited before a capture is rasterized.
//!
//! Fonts, images and frame timing settle asynchronously after the capture
//! target is prepared. Each concern is a [`ReadinessCheck`]; the barrier
//! awaits them strictly in order and fails if they take longer than the
//! deadline.

use crate::BoxFuture;
use crate::images::{ImageCache, ImageLoader};
use crate::text::FontBook;
use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Readiness errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadinessError {
    #[error("Render did not settle within {deadline:?} (waiting on {check})")]
    Timeout {
        deadline: Duration,
        check: &'static str,
    },
}

/// What a capture target references.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadinessScope {
    pub image_sources: Vec<String>,
}

/// One asynchronous signal the capture must wait for.
pub trait ReadinessCheck {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Resolves once the signal is ready for `scope`.
    fn wait<'a>(&'a self, scope: &'a ReadinessScope) -> BoxFuture<'a, ()>;
}

/// Source of rendering-frame boundaries.
pub trait FrameClock {
    fn next_frame(&self) -> BoxFuture<'_, ()>;
}

/// Frame clock ticking at a fixed interval.
#[derive(Debug, Clone, Copy)]
pub struct IntervalFrameClock {
    pub interval: Duration,
}

impl Default for IntervalFrameClock {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(16),
        }
    }
}

impl FrameClock for IntervalFrameClock {
    fn next_frame(&self) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(self.interval))
    }
}

/// Waits for the UI font to be loaded.
pub struct FontsReady {
    pub fonts: Arc<FontBook>,
}

impl ReadinessCheck for FontsReady {
    fn name(&self) -> &'static str {
        "fonts"
    }

    fn wait<'a>(&'a self, _scope: &'a ReadinessScope) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            match self.fonts.load() {
                Ok(fonts) => log::debug!("Fonts ready: {}", fonts.stack()),
                Err(e) => log::debug!("Fonts settled without a usable font: {}", e),
            }
        })
    }
}

/// Waits until every referenced image has loaded or failed.
pub struct ImagesSettled {
    pub cache: Arc<ImageCache>,
    pub loader: Arc<dyn ImageLoader>,
}

impl ReadinessCheck for ImagesSettled {
    fn name(&self) -> &'static str {
        "images"
    }

    fn wait<'a>(&'a self, scope: &'a ReadinessScope) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.cache
                .load_all(self.loader.as_ref(), &scope.image_sources)
                .await;
            log::debug!("{} images settled", scope.image_sources.len());
        })
    }
}

/// Waits for a number of frame boundaries.
pub struct FrameTicks {
    pub clock: Arc<dyn FrameClock>,
    pub frames: u32,
}

impl ReadinessCheck for FrameTicks {
    fn name(&self) -> &'static str {
        "frames"
    }

    fn wait<'a>(&'a self, _scope: &'a ReadinessScope) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            for _ in 0..self.frames {
                self.clock.next_frame().await;
            }
        })
    }
}

/// Waits a fixed delay.
pub struct GraceDelay {
    pub delay: Duration,
}

impl ReadinessCheck for GraceDelay {
    fn name(&self) -> &'static str {
        "grace delay"
    }

    fn wait<'a>(&'a self, _scope: &'a ReadinessScope) -> BoxFuture<'a, ()> {
        Box::pin(tokio::time::sleep(self.delay))
    }
}

/// Ordered set of readiness checks with an overall deadline.
#[derive(Default)]
pub struct ReadinessBarrier {
    checks: Vec<Box<dyn ReadinessCheck>>,
    deadline: Option<Duration>,
}

impl ReadinessBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a check; checks run in insertion order.
    pub fn with_check(mut self, check: impl ReadinessCheck + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Fail instead of waiting longer than `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Names of the checks, in order.
    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Resolve once every check has resolved, in order.
    pub async fn wait(&self, scope: &ReadinessScope) -> Result<(), ReadinessError> {
        let current = Cell::new("none");
        let all = async {
            for check in &self.checks {
                current.set(check.name());
                log::debug!("Waiting for {}", check.name());
                check.wait(scope).await;
            }
        };

        match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, all).await.map_err(|_| {
                log::warn!("Readiness deadline of {:?} exceeded", deadline);
                ReadinessError::Timeout {
                    deadline,
                    check: current.get(),
                }
            }),
            None => {
                all.await;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImageState;
    use crate::images::tests::{SlowLoader, red_png};
    use crate::text::FontSource;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Instant;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ReadinessCheck for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn wait<'a>(&'a self, _scope: &'a ReadinessScope) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                tokio::task::yield_now().await;
                self.log.lock().unwrap().push(self.name);
            })
        }
    }

    struct Never;

    impl ReadinessCheck for Never {
        fn name(&self) -> &'static str {
            "never"
        }

        fn wait<'a>(&'a self, _scope: &'a ReadinessScope) -> BoxFuture<'a, ()> {
            Box::pin(std::future::pending())
        }
    }

    struct CountingClock {
        ticks: Mutex<u32>,
    }

    impl FrameClock for CountingClock {
        fn next_frame(&self) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                *self.ticks.lock().unwrap() += 1;
            })
        }
    }

    #[tokio::test]
    async fn test_checks_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let barrier = ["fonts", "images", "frames", "grace"]
            .into_iter()
            .fold(ReadinessBarrier::new(), |b, name| {
                b.with_check(Recorder {
                    name,
                    log: log.clone(),
                })
            });

        barrier.wait(&ReadinessScope::default()).await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["fonts", "images", "frames", "grace"]);
    }

    #[tokio::test]
    async fn test_waits_for_slow_and_broken_images() {
        let cache = Arc::new(ImageCache::new());
        let loader = SlowLoader {
            delay: Duration::from_millis(50),
            images: HashMap::from([("slow.png".to_string(), red_png())]),
        };
        let barrier = ReadinessBarrier::new().with_check(ImagesSettled {
            cache: cache.clone(),
            loader: Arc::new(loader),
        });
        let scope = ReadinessScope {
            image_sources: vec!["slow.png".to_string(), "broken.png".to_string()],
        };

        let started = Instant::now();
        barrier.wait(&scope).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(cache.all_settled(&scope.image_sources));
        assert!(matches!(cache.get("slow.png"), Some(ImageState::Loaded(_))));
        assert!(matches!(cache.get("broken.png"), Some(ImageState::Failed(_))));
    }

    #[tokio::test]
    async fn test_deadline_reports_pending_check() {
        let barrier = ReadinessBarrier::new()
            .with_check(GraceDelay {
                delay: Duration::from_millis(1),
            })
            .with_check(Never)
            .with_deadline(Duration::from_millis(20));

        let err = barrier.wait(&ReadinessScope::default()).await.unwrap_err();
        assert_eq!(
            err,
            ReadinessError::Timeout {
                deadline: Duration::from_millis(20),
                check: "never",
            }
        );
    }

    #[tokio::test]
    async fn test_frame_ticks_and_fonts() {
        let clock = Arc::new(CountingClock {
            ticks: Mutex::new(0),
        });
        let fonts = Arc::new(FontBook::new(FontSource::Embedded));
        let barrier = ReadinessBarrier::new()
            .with_check(FontsReady {
                fonts: fonts.clone(),
            })
            .with_check(FrameTicks {
                clock: clock.clone(),
                frames: 2,
            });

        barrier.wait(&ReadinessScope::default()).await.unwrap();
        assert!(fonts.is_ready());
        assert_eq!(*clock.ticks.lock().unwrap(), 2);
        assert_eq!(barrier.check_names(), vec!["fonts", "frames"]);
    }
}

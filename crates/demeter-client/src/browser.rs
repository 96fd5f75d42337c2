use std::path::PathBuf;
use std::sync::Arc;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use demeter_core::error::AppError;
use demeter_core::traits::{SessionHandle, SessionPool};

/// Presented to the source site instead of the headless default.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One borrowed browser tab.
///
/// Created blank by the pool; the extractor navigates it. Consumed by
/// [`SessionHandle::close`] so the tab is freed on every exit path.
pub struct PageHandle {
    page: Page,
}

impl PageHandle {
    pub fn page(&self) -> &Page {
        &self.page
    }
}

impl SessionHandle for PageHandle {
    async fn close(self) {
        if let Err(e) = self.page.close().await {
            tracing::debug!(error = %e, "Page did not close cleanly");
        }
    }
}

struct PoolInner {
    browser: Browser,
    handler_task: JoinHandle<()>,
    epoch: String,
}

/// Session pool backed by a single shared headless Chromium process.
///
/// The browser is launched lazily on the first borrow and lives for one
/// epoch, until [`recycle`](SessionPool::recycle) tears it down; the next
/// borrow starts a fresh epoch. Each borrow opens a new blank tab.
///
/// The inner mutex makes launch and recycle mutually exclusive with
/// borrows. Recycling while tabs are still open is prevented by the
/// scheduler, which only recycles at batch boundaries.
#[derive(Clone)]
pub struct BrowserPool {
    inner: Arc<Mutex<Option<PoolInner>>>,
}

impl BrowserPool {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    async fn launch() -> Result<PoolInner, AppError> {
        let mut builder = BrowserConfig::builder();
        builder = builder.no_sandbox().disable_default_args();

        // Snap-packaged Chromium exposes a wrapper that rejects standard
        // Chrome CLI flags (--headless, --disable-gpu, …).  We try to
        // locate the *real* binary buried inside the snap, falling back
        // to any other Chrome/Chromium the user may have installed.
        if let Some(bin) = Self::find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .window_size(1366, 768)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-accelerated-2d-canvas")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .arg("--no-zygote")
            .build()
            .map_err(|e| AppError::PoolError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::PoolError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    tracing::warn!("Browser CDP handler error: {event:?}");
                    break;
                }
            }
        });

        let epoch = format!("epoch-{}", &Uuid::new_v4().to_string()[..8]);
        tracing::info!(%epoch, "Browser session started");

        Ok(PoolInner {
            browser,
            handler_task,
            epoch,
        })
    }

    /// Tries to locate the real Chrome/Chromium binary.
    ///
    /// Honours an explicit `CHROME_BIN` override first, then well-known
    /// snap/flatpak/apt locations. Returning `None` lets `chromiumoxide`
    /// do its own lookup.
    fn find_chrome_binary() -> Option<PathBuf> {
        let candidates: &[&str] = &[
            // Snap (Ubuntu default)
            "/snap/chromium/current/usr/lib/chromium-browser/chrome",
            // Flatpak
            "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
            // Common apt / manual installs
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
        ];

        if let Ok(p) = std::env::var("CHROME_BIN") {
            let path = PathBuf::from(&p);
            if path.exists() {
                return Some(path);
            }
        }

        candidates.iter().map(PathBuf::from).find(|p| p.exists())
    }
}

impl Default for BrowserPool {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionPool for BrowserPool {
    type Handle = PageHandle;

    async fn borrow(&self) -> Result<PageHandle, AppError> {
        let mut guard = self.inner.lock().await;
        if guard.is_none() {
            *guard = Some(Self::launch().await?);
        }
        let Some(inner) = guard.as_ref() else {
            return Err(AppError::PoolError("session vanished during borrow".into()));
        };

        let page = inner
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| AppError::PoolError(format!("Failed to open page: {e}")))?;

        if let Err(e) = page.set_user_agent(USER_AGENT).await {
            tracing::debug!(epoch = %inner.epoch, error = %e, "Could not set user agent");
        }

        Ok(PageHandle { page })
    }

    async fn recycle(&self) {
        let mut guard = self.inner.lock().await;
        if let Some(mut inner) = guard.take() {
            tracing::info!(epoch = %inner.epoch, "Recycling browser session");
            if let Err(e) = inner.browser.close().await {
                tracing::warn!(epoch = %inner.epoch, error = %e, "Browser did not close cleanly");
            }
            inner.handler_task.abort();
        }
    }
}

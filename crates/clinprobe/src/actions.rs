//! Action primitives: fill, click, read-number, read-text-set, attach-files.
//!
//! Each primitive resolves its target through the locator, waits a short
//! settle delay so the element is not caught mid-transition, acts, and logs
//! how long it took.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::driver::{ElementHandle, PageDriver};
use crate::locator::{locate, locate_all, LocatorSpec, Readiness};
use crate::result::{ProbeError, ProbeResult};
use crate::wait::WaitPolicy;

/// Default pause between locating an element and acting on it
pub const DEFAULT_SETTLE_MS: u64 = 1_000;

/// Primitive UI actions bound to one page
#[derive(Clone, Copy)]
pub struct Actions<'a> {
    driver: &'a dyn PageDriver,
    policy: WaitPolicy,
    settle: Duration,
}

impl std::fmt::Debug for Actions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Actions")
            .field("policy", &self.policy)
            .field("settle", &self.settle)
            .finish_non_exhaustive()
    }
}

impl<'a> Actions<'a> {
    /// Bind actions to a driver with default policy and settle delay
    #[must_use]
    pub fn new(driver: &'a dyn PageDriver) -> Self {
        Self {
            driver,
            policy: WaitPolicy::locator_default(),
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
        }
    }

    /// Set the locator wait policy
    #[must_use]
    pub const fn with_policy(mut self, policy: WaitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the settle delay
    #[must_use]
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Underlying driver
    #[must_use]
    pub fn driver(&self) -> &'a dyn PageDriver {
        self.driver
    }

    /// Locator wait policy
    #[must_use]
    pub const fn policy(&self) -> &WaitPolicy {
        &self.policy
    }

    async fn target(
        &self,
        locator: &LocatorSpec,
        readiness: Readiness,
    ) -> ProbeResult<ElementHandle> {
        let element = locate(self.driver, locator, &self.policy, readiness).await?;
        sleep(self.settle).await;
        Ok(element)
    }

    /// Clear a field and type `value` into it.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when `value` is `None` (for example an unset credential),
    /// locator errors when the field never becomes interactable.
    pub async fn fill(
        &self,
        locator: &LocatorSpec,
        value: Option<&str>,
        label: &str,
    ) -> ProbeResult<()> {
        timed(label, async {
            let text = value.ok_or_else(|| {
                ProbeError::invalid_input(format!("expected text for '{label}', got nothing"))
            })?;
            let element = self.target(locator, Readiness::Interactable).await?;
            self.driver.clear(&element).await?;
            self.driver.type_text(&element, text).await
        })
        .await
    }

    /// Click the first interactable match.
    ///
    /// # Errors
    ///
    /// Locator errors, or a driver error from the click itself
    pub async fn click(&self, locator: &LocatorSpec, label: &str) -> ProbeResult<()> {
        timed(label, async {
            let element = self.target(locator, Readiness::Interactable).await?;
            self.driver.click(&element).await
        })
        .await
    }

    /// Trimmed text of the first match; `None` with a warning when it is empty.
    ///
    /// Parsing the number is left to the caller.
    ///
    /// # Errors
    ///
    /// Locator errors
    pub async fn read_number(
        &self,
        locator: &LocatorSpec,
        label: &str,
    ) -> ProbeResult<Option<String>> {
        timed(label, async {
            let element = self.target(locator, Readiness::Present).await?;
            let text = element.text.trim();
            if text.is_empty() {
                tracing::warn!("Element {locator} was found but is empty");
                Ok(None)
            } else {
                tracing::info!("Captured value: {text}");
                Ok(Some(text.to_string()))
            }
        })
        .await
    }

    /// Trimmed texts of every match, in document order.
    ///
    /// # Errors
    ///
    /// Locator errors
    pub async fn read_text_set(
        &self,
        locator: &LocatorSpec,
        label: &str,
    ) -> ProbeResult<Vec<String>> {
        timed(label, async {
            let elements =
                locate_all(self.driver, locator, &self.policy, Readiness::Present).await?;
            sleep(self.settle).await;
            Ok(elements.into_iter().map(|e| e.text.trim().to_string()).collect())
        })
        .await
    }

    /// Attach every regular file in `folder` to the file input at `locator`.
    ///
    /// Returns the attached paths, sorted by file name.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when the folder does not exist, I/O errors while listing
    /// it, locator errors for the input.
    pub async fn attach_files(
        &self,
        locator: &LocatorSpec,
        folder: &Path,
        label: &str,
    ) -> ProbeResult<Vec<PathBuf>> {
        timed(label, async {
            let files = list_files(folder)?;
            if files.is_empty() {
                tracing::warn!("Folder '{}' has no files to send", folder.display());
                return Ok(files);
            }
            let input = self.target(locator, Readiness::Present).await?;
            self.driver.set_input_files(&input, &files).await?;
            tracing::info!("Files from folder '{}' attached ({})", folder.display(), files.len());
            Ok(files)
        })
        .await
    }
}

/// Regular files directly inside `folder`, sorted
///
/// # Errors
///
/// `InvalidInput` if the folder is missing, I/O errors otherwise
pub fn list_files(folder: &Path) -> ProbeResult<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(ProbeError::invalid_input(format!(
            "folder '{}' not found",
            folder.display()
        )));
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

async fn timed<T, F>(label: &str, action: F) -> ProbeResult<T>
where
    F: std::future::Future<Output = ProbeResult<T>>,
{
    let start = Instant::now();
    let result = action.await;
    if let Err(ref err) = result {
        tracing::error!("{label}: {err}");
    }
    tracing::info!(
        tag = "waiting",
        "Action '{label}' finished in {:.2} seconds",
        start.elapsed().as_secs_f64()
    );
    result
}

//! Chromium session over the Chrome `DevTools` Protocol.
//!
//! With the `browser` feature, [`CdpDriver`] implements [`PageDriver`] with
//! chromiumoxide. Elements are found by evaluating the scripts in
//! [`crate::dom_scripts`], which tag every match with a reference attribute;
//! later actions resolve that attribute back to a CDP element.

use std::path::PathBuf;

/// Browser launch settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    /// Run without a window
    pub headless: bool,
    /// Chromium binary (None = auto-detect)
    pub chrome_path: Option<PathBuf>,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_path: None,
            viewport_width: 1366,
            viewport_height: 900,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set the Chromium binary
    #[must_use]
    pub fn with_chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

#[cfg(feature = "browser")]
#[allow(clippy::missing_errors_doc, clippy::significant_drop_tightening)]
mod cdp {
    use super::BrowserConfig;
    use std::path::PathBuf;

    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
    use chromiumoxide::cdp::browser_protocol::page::SetInterceptFileChooserDialogParams;
    use chromiumoxide::element::Element;
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde::de::DeserializeOwned;
    use tokio::sync::Mutex;

    use crate::dom_scripts::{clear_script, query_script, ref_selector, text_present_script};
    use crate::driver::{ElementHandle, PageDriver};
    use crate::locator::LocatorSpec;
    use crate::result::{ProbeError, ProbeResult};

    /// Page driver backed by a launched Chromium
    #[derive(Debug)]
    pub struct CdpDriver {
        browser: Mutex<CdpBrowser>,
        page: CdpPage,
        handle: tokio::task::JoinHandle<()>,
    }

    impl CdpDriver {
        /// Launch Chromium and open a blank page
        pub async fn launch(config: &BrowserConfig) -> ProbeResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.viewport_width, config.viewport_height);
            if !config.headless {
                builder = builder.with_head();
            }
            if !config.sandbox {
                builder = builder.no_sandbox();
            }
            if let Some(ref path) = config.chrome_path {
                builder = builder.chrome_executable(path);
            }
            let cdp_config = builder
                .build()
                .map_err(|message| ProbeError::BrowserLaunch { message })?;

            let (browser, mut handler) = CdpBrowser::launch(cdp_config)
                .await
                .map_err(|e| ProbeError::BrowserLaunch {
                    message: e.to_string(),
                })?;

            let handle = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            let page = browser.new_page("about:blank").await?;
            // Upload buttons open a native chooser; files are set on the input instead.
            page.execute(SetInterceptFileChooserDialogParams::new(true))
                .await?;

            tracing::info!(tag = "configuring", "Browser launched");
            Ok(Self {
                browser: Mutex::new(browser),
                page,
                handle,
            })
        }

        async fn eval<T: DeserializeOwned>(&self, script: String) -> ProbeResult<T> {
            self.page
                .evaluate(script)
                .await?
                .into_value()
                .map_err(|e| ProbeError::driver(format!("unexpected script result: {e}")))
        }

        async fn element(&self, handle: &ElementHandle) -> ProbeResult<Element> {
            Ok(self.page.find_element(ref_selector(&handle.id)).await?)
        }
    }

    #[async_trait]
    impl PageDriver for CdpDriver {
        async fn navigate(&self, url: &str) -> ProbeResult<()> {
            self.page.goto(url).await?;
            Ok(())
        }

        async fn current_url(&self) -> ProbeResult<String> {
            Ok(self.page.url().await?.unwrap_or_default())
        }

        async fn query_all(&self, locator: &LocatorSpec) -> ProbeResult<Vec<ElementHandle>> {
            self.eval(query_script(locator, None)).await
        }

        async fn query_within(
            &self,
            parent: &ElementHandle,
            locator: &LocatorSpec,
        ) -> ProbeResult<Vec<ElementHandle>> {
            self.eval(query_script(locator, Some(&parent.id))).await
        }

        async fn click(&self, element: &ElementHandle) -> ProbeResult<()> {
            self.element(element).await?.click().await?;
            Ok(())
        }

        async fn clear(&self, element: &ElementHandle) -> ProbeResult<()> {
            let cleared: bool = self.eval(clear_script(&element.id)).await?;
            if cleared {
                Ok(())
            } else {
                Err(ProbeError::driver(format!("element {} is gone", element.id)))
            }
        }

        async fn type_text(&self, element: &ElementHandle, text: &str) -> ProbeResult<()> {
            let target = self.element(element).await?;
            target.focus().await?;
            target.type_str(text).await?;
            Ok(())
        }

        async fn attribute(
            &self,
            element: &ElementHandle,
            name: &str,
        ) -> ProbeResult<Option<String>> {
            Ok(self.element(element).await?.attribute(name).await?)
        }

        async fn set_input_files(
            &self,
            element: &ElementHandle,
            files: &[PathBuf],
        ) -> ProbeResult<()> {
            let mut paths = Vec::with_capacity(files.len());
            for file in files {
                paths.push(std::fs::canonicalize(file)?.to_string_lossy().into_owned());
            }
            let target = self.element(element).await?;
            let mut params = SetFileInputFilesParams::new(paths);
            params.backend_node_id = Some(target.backend_node_id);
            self.page.execute(params).await?;
            Ok(())
        }

        async fn text_present(&self, fragment: &str) -> ProbeResult<bool> {
            self.eval(text_present_script(fragment)).await
        }

        async fn close(&self) -> ProbeResult<()> {
            let mut browser = self.browser.lock().await;
            browser.close().await?;
            if let Err(err) = browser.wait().await {
                tracing::warn!("Browser process did not exit cleanly: {err}");
            }
            self.handle.abort();
            Ok(())
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::CdpDriver;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builders() {
        let config = BrowserConfig::default()
            .with_headless(true)
            .with_chrome_path("/usr/bin/chromium")
            .with_viewport(1024, 768)
            .with_no_sandbox();
        assert!(config.headless);
        assert!(!config.sandbox);
        assert_eq!(config.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
        assert_eq!((config.viewport_width, config.viewport_height), (1024, 768));
    }

    #[test]
    fn test_default_opens_a_window() {
        assert!(!BrowserConfig::default().headless);
    }
}

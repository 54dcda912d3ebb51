//! Chromium-backed chat surface

use crate::config::{Config, SelectorConfig};
use crate::error::SurfaceError;
use crate::poll::{PollError, PollPolicy, poll_until};
use crate::surface::ChatSurface;
use crate::types::{Profile, RawIncoming};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use reqwest::Url;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How often to look for an element while waiting for it to appear.
const ELEMENT_POLL: Duration = Duration::from_millis(250);

pub struct ChatBrowser {
    #[allow(dead_code)] // Browser must stay alive
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Page,
    site: Url,
    character_path: String,
    chat_path: String,
    selectors: SelectorConfig,
    element_timeout: Duration,
    open_delay: Duration,
    cancel: CancellationToken,
}

impl ChatBrowser {
    /// Launches Chromium on the persistent profile and opens a blank page.
    pub async fn launch(config: &Config, cancel: CancellationToken) -> Result<Self> {
        let site = Url::parse(&config.chat.base_url)
            .with_context(|| format!("invalid chat.base_url: {}", config.chat.base_url))?;

        std::fs::create_dir_all(&config.browser.profile_dir).with_context(|| {
            format!(
                "failed to create browser profile dir: {}",
                config.browser.profile_dir.display()
            )
        })?;

        let mut builder = CdpBrowserConfig::builder().user_data_dir(&config.browser.profile_dir);
        if !config.browser.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &config.browser.executable {
            builder = builder.chrome_executable(path);
        }
        let cdp_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("invalid browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| anyhow::anyhow!("failed to launch browser: {e}"))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::warn!("CDP handler error: {e}");
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| anyhow::anyhow!("failed to open browser page: {e}"))?;
        tracing::info!(profile = %config.browser.profile_dir.display(), "browser launched");

        Ok(Self {
            browser,
            handler_task,
            page,
            site,
            character_path: config.chat.character_path.clone(),
            chat_path: config.chat.chat_path.clone(),
            selectors: config.selectors.clone(),
            element_timeout: config.timing.element_timeout(),
            open_delay: config.timing.open_delay(),
            cancel,
        })
    }

    pub async fn goto(&self, url: &str) -> Result<(), SurfaceError> {
        tracing::debug!(url, "navigating");
        self.page
            .goto(url)
            .await
            .map_err(|e| SurfaceError::Interaction(format!("navigation to {url} failed: {e}")))?;
        Ok(())
    }

    /// Reads the partner's name, age and bio from their character page.
    pub async fn partner_profile(&self, character_id: &str) -> Result<Profile, SurfaceError> {
        let url = self.site_url(&self.character_path, character_id)?;
        self.goto(url.as_str()).await?;

        let heading = self.wait_for(&self.selectors.profile_heading).await?;
        let bio = self.wait_for(&self.selectors.profile_bio).await?;
        let heading = heading.inner_text().await?.unwrap_or_default();
        let bio = bio.inner_text().await?;

        Ok(Profile::from_heading(&heading, bio))
    }

    /// Opens the chat and waits until it can take input.
    pub async fn open_chat(&self, chat_id: &str) -> Result<(), SurfaceError> {
        let url = self.site_url(&self.chat_path, chat_id)?;
        self.goto(url.as_str()).await?;

        self.wait_for(&self.selectors.text_input).await?;
        self.wait_for(&self.selectors.reaction_button).await?;
        tokio::time::sleep(self.open_delay).await;
        tracing::info!(chat_id, "chat ready");
        Ok(())
    }

    fn site_url(&self, path: &str, id: &str) -> Result<Url, SurfaceError> {
        self.site
            .join(&format!("{path}{id}"))
            .map_err(|e| SurfaceError::Interaction(format!("bad url for {id}: {e}")))
    }

    async fn wait_for(&self, selector: &str) -> Result<Element, SurfaceError> {
        let policy = PollPolicy::every(ELEMENT_POLL).with_deadline(Some(self.element_timeout));
        poll_until(policy, &self.cancel, move || self.first_match(selector))
            .await
            .map_err(|err| match err {
                PollError::Failed(err) => err,
                PollError::TimedOut(waited) => SurfaceError::ElementMissing {
                    selector: selector.to_string(),
                    waited,
                },
                PollError::Cancelled => SurfaceError::Gone("cancelled".to_string()),
            })
    }

    async fn first_match(&self, selector: &str) -> Result<Option<Element>, SurfaceError> {
        match self.page.find_elements(selector).await {
            Ok(found) => Ok(found.into_iter().next()),
            Err(e) if is_transient(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_incoming(&self) -> Result<Option<RawIncoming>, CdpError> {
        let Some(block) = self
            .page
            .find_elements(self.selectors.message_block.as_str())
            .await?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };
        let Some(bubble) = block
            .find_elements(self.selectors.partner_bubble.as_str())
            .await?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };

        let mut raw = RawIncoming::default();
        let paragraphs = bubble
            .find_elements(self.selectors.text_node.as_str())
            .await?;
        if let Some(text) = paragraphs.first() {
            raw.text = text.inner_text().await?;
        }
        if let Some(time) = paragraphs.get(1) {
            raw.rendered_timestamp = time.inner_text().await?;
        }

        if let Some(img) = bubble
            .find_elements(self.selectors.image.as_str())
            .await?
            .first()
        {
            raw.image_src = img
                .attribute("src")
                .await?
                .and_then(|src| resolve_image_url(&self.site, &src));
        }
        Ok(Some(raw))
    }

    async fn text_input(&self) -> Result<Element, SurfaceError> {
        self.page
            .find_element(self.selectors.text_input.as_str())
            .await
            .map_err(|e| SurfaceError::Interaction(format!("text input unavailable: {e}")))
    }
}

impl Drop for ChatBrowser {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

#[async_trait]
impl ChatSurface for ChatBrowser {
    async fn render_current_incoming(&self) -> Result<Option<RawIncoming>, SurfaceError> {
        match self.read_incoming().await {
            Ok(raw) => Ok(raw),
            Err(e) if is_transient(&e) => {
                tracing::trace!(error = %e, "message not readable yet");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_text(&self, text: &str) -> Result<(), SurfaceError> {
        let input = self.text_input().await?;
        let interaction = |e: CdpError| SurfaceError::Interaction(format!("typing failed: {e}"));
        input.click().await.map_err(interaction)?;
        input
            .call_js_fn("function() { this.value = ''; }", false)
            .await
            .map_err(interaction)?;
        input.type_str(text).await.map_err(interaction)?;
        Ok(())
    }

    async fn submit_text(&self) -> Result<(), SurfaceError> {
        self.text_input()
            .await?
            .press_key("Enter")
            .await
            .map_err(|e| SurfaceError::Interaction(format!("submit failed: {e}")))?;
        Ok(())
    }

    async fn trigger_reaction(&self) -> Result<(), SurfaceError> {
        self.page
            .find_element(self.selectors.reaction_button.as_str())
            .await
            .map_err(|e| SurfaceError::Interaction(format!("reaction button unavailable: {e}")))?
            .click()
            .await
            .map_err(|e| SurfaceError::Interaction(format!("reaction failed: {e}")))?;
        Ok(())
    }
}

/// Protocol errors seen when a node vanishes mid-read during a re-render.
const STALE_NODE_ERRORS: [&str; 4] = [
    "no node with given id",
    "could not find node with given id",
    "node with given id does not belong to the document",
    "cannot find context with specified id",
];

/// Lookup misses and stale node ids happen while the page re-renders.
/// Any other protocol error (closed target, lost session) means the page is gone.
fn is_transient(err: &CdpError) -> bool {
    match err {
        CdpError::NotFound => true,
        CdpError::Chrome(e) => is_stale_node_error(&e.to_string()),
        _ => false,
    }
}

fn is_stale_node_error(message: &str) -> bool {
    let message = message.to_lowercase();
    STALE_NODE_ERRORS.iter().any(|known| message.contains(known))
}

/// Resolves an `img@src` against the site root.
pub fn resolve_image_url(site: &Url, src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    site.join(src).ok().map(String::from)
}

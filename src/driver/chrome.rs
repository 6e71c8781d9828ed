//! Headless Chromium driver.
//!
//! Element queries run as small scripts inside the page: the locator is
//! serialized to JSON, resolved by [`RESOLVER`] and the requested action is
//! applied to the matches. Each script returns `{ found, value }`.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};

use crate::driver::{ClickOptions, Locator, PageDriver};
use crate::error::{AppError, Result};
use crate::models::BrowserSettings;

/// Resolves a serialized [`Locator`] to an array of elements (`els`).
const RESOLVER: &str = r#"
const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
const visible = (el) => !!(el && (el.offsetWidth || el.offsetHeight || el.getClientRects().length));
const resolve = (loc) => {
  let found = [];
  switch (loc.kind) {
    case 'css':
      found = Array.from(document.querySelectorAll(loc.value));
      break;
    case 'xpath': {
      const snap = document.evaluate(loc.value, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
      for (let i = 0; i < snap.snapshotLength; i++) found.push(snap.snapshotItem(i));
      break;
    }
    case 'text': {
      const hit = (el) => loc.exact ? norm(el.innerText) === loc.value : norm(el.innerText).includes(loc.value);
      const inputs = Array.from(document.querySelectorAll('input[type=button], input[type=submit]'))
        .filter((el) => loc.exact ? norm(el.value) === loc.value : norm(el.value).includes(loc.value));
      const leaves = Array.from(document.querySelectorAll('body *'))
        .filter((el) => hit(el) && !Array.from(el.children).some(hit));
      found = leaves.concat(inputs);
      break;
    }
    case 'label': {
      for (const label of document.querySelectorAll('label')) {
        if (!norm(label.textContent).includes(loc.value)) continue;
        const control = label.control || (label.htmlFor && document.getElementById(label.htmlFor));
        if (control) found.push(control);
      }
      for (const el of document.querySelectorAll('input, select, textarea')) {
        const named = norm(el.getAttribute('title')) + ' ' + norm(el.getAttribute('aria-label'));
        if (named.includes(loc.value) && !found.includes(el)) found.push(el);
      }
      break;
    }
    case 'cell': {
      for (const th of document.querySelectorAll('th')) {
        if (!(th.textContent || '').includes(loc.label)) continue;
        for (let sib = th.nextElementSibling; sib; sib = sib.nextElementSibling) {
          if (sib.tagName !== 'TD') continue;
          if (loc.descend) found.push(...sib.querySelectorAll(loc.descend));
          else found.push(sib);
        }
      }
      break;
    }
  }
  if (loc.nth !== null && loc.nth !== undefined) found = found[loc.nth] ? [found[loc.nth]] : [];
  return found;
};
"#;

/// Script return envelope.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
struct Probe<T> {
    found: bool,
    #[serde(default)]
    value: Option<T>,
}

/// A single Chromium tab driven over the DevTools protocol.
pub struct ChromeDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeDriver {
    /// Launch a browser and open a blank page.
    pub async fn launch(settings: &BrowserSettings) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .window_size(settings.window_width, settings.window_height)
            .request_timeout(Duration::from_secs(settings.timeout_secs))
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={}", settings.user_agent));
        if !settings.headless {
            builder = builder.with_head();
        }
        for arg in &settings.extra_args {
            builder = builder.arg(arg.as_str());
        }

        let config = builder
            .build()
            .map_err(|e| AppError::driver(format!("browser config error: {e}")))?;
        let (browser, mut handler) = Browser::launch(config).await?;
        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let page = browser.new_page("about:blank").await?;
        log::info!("Browser launched (headless: {})", settings.headless);

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    /// Close the browser and stop the protocol handler.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            log::warn!("Browser close error: {e}");
        }
        self.handler.abort();
        log::info!("Browser resources released.");
    }

    async fn eval<T: DeserializeOwned>(&self, script: String) -> Result<T> {
        let params = EvaluateParams::builder()
            .expression(script)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(AppError::driver)?;
        let result = self.page.evaluate_expression(params).await?;
        Ok(result.into_value()?)
    }

    /// Resolve `locator` and run `action` (a JS body using `els`).
    async fn probe<T: DeserializeOwned>(&self, locator: &Locator, action: &str) -> Result<Probe<T>> {
        let loc = serde_json::to_string(locator)?;
        let script = format!("(() => {{ {RESOLVER} const els = resolve({loc}); {action} }})()");
        self.eval(script).await
    }

    /// Like [`probe`](Self::probe) but a missing element is an error.
    async fn act(&self, locator: &Locator, action: &str) -> Result<()> {
        let probe: Probe<bool> = self.probe(locator, action).await?;
        if probe.found {
            Ok(())
        } else {
            Err(AppError::driver(format!("no element matches {locator}")))
        }
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        log::debug!("Navigating to {url}");
        self.page.goto(url).await?;
        Ok(())
    }

    async fn wait_for_idle(&self, limit: Duration) -> Result<()> {
        let deadline = Instant::now() + limit;
        let _ = timeout(limit, self.page.wait_for_navigation()).await;
        loop {
            let state: String = self.eval("document.readyState".to_string()).await?;
            if state == "complete" {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(AppError::timeout("waiting for page load", limit.as_millis() as u64));
            }
            sleep(Duration::from_millis(100)).await;
        }
    }

    async fn count(&self, locator: &Locator) -> Result<usize> {
        let probe: Probe<usize> = self
            .probe(locator, "return { found: true, value: els.length };")
            .await?;
        Ok(probe.value.unwrap_or(0))
    }

    async fn is_visible(&self, locator: &Locator) -> Result<bool> {
        let probe: Probe<bool> = self
            .probe(
                locator,
                "return { found: els.length > 0, value: els.length > 0 && visible(els[0]) };",
            )
            .await?;
        Ok(probe.value.unwrap_or(false))
    }

    async fn text(&self, locator: &Locator) -> Result<String> {
        let probe: Probe<String> = self
            .probe(
                locator,
                "return els.length ? { found: true, value: els[0].innerText || els[0].value || '' } : { found: false };",
            )
            .await?;
        match probe.value {
            Some(text) if probe.found => Ok(text),
            _ => Err(AppError::driver(format!("no element matches {locator}"))),
        }
    }

    async fn texts(&self, locator: &Locator) -> Result<Vec<String>> {
        let probe: Probe<Vec<String>> = self
            .probe(
                locator,
                "return { found: true, value: els.map((el) => el.innerText || '') };",
            )
            .await?;
        Ok(probe.value.unwrap_or_default())
    }

    async fn click(&self, locator: &Locator, options: ClickOptions) -> Result<()> {
        let action = if options.dom {
            "if (!els.length) return { found: false }; els[0].click(); return { found: true, value: true };"
        } else {
            // Synthetic pointer sequence; dispatched directly on the element so
            // overlays cannot intercept it.
            r#"if (!els.length) return { found: false };
               const el = els[0];
               el.scrollIntoView({ block: 'center' });
               for (const type of ['mouseover', 'mousedown', 'mouseup', 'click']) {
                 el.dispatchEvent(new MouseEvent(type, { bubbles: true, cancelable: true, view: window }));
               }
               return { found: true, value: true };"#
        };
        if !options.force && !options.dom && !self.is_visible(locator).await? {
            return Err(AppError::driver(format!("element not visible: {locator}")));
        }
        self.act(locator, action).await
    }

    async fn hover(&self, locator: &Locator) -> Result<()> {
        self.act(
            locator,
            r#"if (!els.length) return { found: false };
               for (const type of ['mouseover', 'mouseenter', 'mousemove']) {
                 els[0].dispatchEvent(new MouseEvent(type, { bubbles: true, view: window }));
               }
               return { found: true, value: true };"#,
        )
        .await
    }

    async fn fill(&self, locator: &Locator, value: &str) -> Result<()> {
        let value = serde_json::to_string(value)?;
        let action = format!(
            r#"if (!els.length) return {{ found: false }};
               const el = els[0];
               el.focus();
               el.value = {value};
               el.dispatchEvent(new Event('input', {{ bubbles: true }}));
               el.dispatchEvent(new Event('change', {{ bubbles: true }}));
               return {{ found: true, value: true }};"#
        );
        self.act(locator, &action).await
    }

    async fn select_option(&self, locator: &Locator, label: &str) -> Result<()> {
        let label = serde_json::to_string(label)?;
        let action = format!(
            r#"if (!els.length) return {{ found: false }};
               const el = els[0];
               const option = Array.from(el.options || []).find((o) => norm(o.textContent) === {label});
               if (!option) return {{ found: false }};
               el.value = option.value;
               option.selected = true;
               el.dispatchEvent(new Event('change', {{ bubbles: true }}));
               return {{ found: true, value: true }};"#
        );
        self.act(locator, &action).await
    }

    async fn press(&self, locator: &Locator, key: &str) -> Result<()> {
        let key = serde_json::to_string(key)?;
        let action = format!(
            r#"if (!els.length) return {{ found: false }};
               const el = els[0];
               for (const type of ['keydown', 'keyup']) {{
                 el.dispatchEvent(new KeyboardEvent(type, {{ key: {key}, bubbles: true }}));
               }}
               if ({key} === 'Tab') {{
                 el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                 el.blur();
               }}
               return {{ found: true, value: true }};"#
        );
        self.act(locator, &action).await
    }

    async fn unlock(&self, locator: &Locator) -> Result<()> {
        self.act(
            locator,
            r#"if (!els.length) return { found: false };
               const el = els[0];
               el.removeAttribute('readonly');
               el.removeAttribute('disabled');
               el.readOnly = false;
               el.value = '';
               return { found: true, value: true };"#,
        )
        .await
    }

    async fn go_back(&self) -> Result<()> {
        let _: bool = self
            .eval("(() => { history.back(); return true; })()".to_string())
            .await?;
        Ok(())
    }
}

//! Chromium driver over the Chrome `DevTools` Protocol.
//!
//! Elements are tagged in the page with a `data-flowprobe-id` attribute that
//! embeds a per-document token. A handle whose tag can no longer be found
//! belongs to a replaced document and is reported stale. Native dialogs are
//! tracked from `Page.javascriptDialogOpening` events; clicks are dispatched
//! from a zero-delay timer so a dialog opened by the click never blocks the
//! protocol call that caused it.

#![allow(clippy::significant_drop_tightening, clippy::missing_errors_doc)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    Bounds, GetWindowForTargetParams, SetWindowBoundsParams, WindowState,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, DialogType as CdpDialogType,
    EventJavascriptDialogClosed, EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::page::Page as CdpPage;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BrowserOptions;
use crate::dialog::{Dialog, DialogType};
use crate::driver::{BrowserDriver, ElementHandle};
use crate::error::{ProbeError, ProbeResult};
use crate::locator::Selector;

const HANDLE_ATTR: &str = "data-flowprobe-id";

/// Select `opt` on `sel` through the native setter so framework-controlled
/// selects see the change.
const SELECT_OPTION_JS: &str = "Object.getOwnPropertyDescriptor(HTMLSelectElement.prototype, 'value').set.call(sel, opt.value); \
     sel.dispatchEvent(new Event('input', { bubbles: true })); \
     sel.dispatchEvent(new Event('change', { bubbles: true }));";

/// Real browser behind [`BrowserDriver`]
#[derive(Debug)]
pub struct ChromiumDriver {
    browser: Mutex<CdpBrowser>,
    page: CdpPage,
    dialog: Arc<Mutex<DialogTracker>>,
    document: Mutex<Option<String>>,
    generation: AtomicU64,
    tasks: Vec<JoinHandle<()>>,
}

#[derive(Debug, Deserialize)]
struct FoundElement {
    id: String,
    tag: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct FindReply {
    doc: String,
    #[serde(default)]
    missing_scope: bool,
    found: Vec<FoundElement>,
}

#[derive(Debug, Deserialize)]
struct ActReply {
    #[serde(default)]
    stale: bool,
    #[serde(default)]
    missing: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    value: serde_json::Value,
}

/// Pending-dialog bookkeeping. Opening and closing arrive on separate CDP
/// streams, so state is derived from counts rather than event order: a
/// dialog is pending while more have opened than have closed or been handled.
#[derive(Debug, Default)]
struct DialogTracker {
    latest: Option<Dialog>,
    opened: u64,
    closed: u64,
    handled: u64,
}

impl DialogTracker {
    fn on_opened(&mut self, dialog: Dialog) {
        self.opened += 1;
        self.latest = Some(dialog);
    }

    fn on_closed(&mut self) {
        self.closed += 1;
    }

    fn pending(&self) -> Option<&Dialog> {
        if self.opened > self.closed.max(self.handled) {
            self.latest.as_ref()
        } else {
            None
        }
    }

    fn take(&mut self) -> Option<Dialog> {
        let dialog = self.pending().cloned()?;
        self.handled = self.opened;
        Some(dialog)
    }
}

enum DialogEvent {
    Opened(Dialog),
    Closed,
}

fn cdp_err(e: impl std::fmt::Display) -> ProbeError {
    ProbeError::browser(e.to_string())
}

fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

const fn dialog_type(kind: &CdpDialogType) -> DialogType {
    match kind {
        CdpDialogType::Alert => DialogType::Alert,
        CdpDialogType::Confirm => DialogType::Confirm,
        CdpDialogType::Prompt => DialogType::Prompt,
        CdpDialogType::Beforeunload => DialogType::BeforeUnload,
    }
}

impl ChromiumDriver {
    /// Launch Chromium with `options` and open a blank page.
    pub async fn launch(options: &BrowserOptions) -> ProbeResult<Self> {
        let mut builder = CdpConfig::builder().window_size(options.window_width, options.window_height);
        if !options.headless {
            builder = builder.with_head();
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = options.chromium_path {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|message| ProbeError::BrowserLaunch { message })?;

        let (browser, mut handler) =
            CdpBrowser::launch(config)
                .await
                .map_err(|e| ProbeError::BrowserLaunch {
                    message: e.to_string(),
                })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(cdp_err)?;
        let dialog = Arc::new(Mutex::new(DialogTracker::default()));

        let opened = page
            .event_listener::<EventJavascriptDialogOpening>()
            .await
            .map_err(cdp_err)?
            .map(|event| DialogEvent::Opened(Dialog::new(dialog_type(&event.r#type), event.message.clone())));
        let closed = page
            .event_listener::<EventJavascriptDialogClosed>()
            .await
            .map_err(cdp_err)?
            .map(|_| DialogEvent::Closed);
        let tracker = Arc::clone(&dialog);
        let dialog_task = tokio::spawn(async move {
            let mut events = futures::stream::select(opened, closed);
            while let Some(event) = events.next().await {
                let mut tracker = tracker.lock().await;
                match event {
                    DialogEvent::Opened(found) => {
                        debug!(kind = %found.dialog_type(), message = %found.message(), "dialog opened");
                        tracker.on_opened(found);
                    }
                    DialogEvent::Closed => {
                        debug!("dialog closed");
                        tracker.on_closed();
                    }
                }
            }
        });

        info!(
            headless = options.headless,
            width = options.window_width,
            height = options.window_height,
            "chromium launched"
        );
        Ok(Self {
            browser: Mutex::new(browser),
            page,
            dialog,
            document: Mutex::new(None),
            generation: AtomicU64::new(0),
            tasks: vec![handler_task, dialog_task],
        })
    }

    async fn ensure_no_dialog(&self) -> ProbeResult<()> {
        match self.dialog.lock().await.pending() {
            Some(d) => Err(ProbeError::DialogBlocking {
                kind: d.dialog_type().to_string(),
                message: d.message().to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn eval_value(&self, script: &str) -> ProbeResult<serde_json::Value> {
        let result = self.page.evaluate(script).await.map_err(cdp_err)?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    /// Bump the generation when the page reports a new document token.
    async fn observe_document(&self, doc: &str) -> u64 {
        let mut current = self.document.lock().await;
        if current.as_deref() != Some(doc) {
            *current = Some(doc.to_string());
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(generation, "new document");
            return generation;
        }
        self.generation.load(Ordering::SeqCst)
    }

    /// Run `body` with `el` bound to the handle's element.
    async fn act(&self, handle: &ElementHandle, body: &str) -> ProbeResult<serde_json::Value> {
        self.ensure_no_dialog().await?;
        if handle.generation() != self.generation.load(Ordering::SeqCst) {
            return Err(stale(handle));
        }
        let script = format!(
            "(() => {{ const el = document.querySelector('[{HANDLE_ATTR}=' + JSON.stringify({id}) + ']'); \
             if (!el) return {{ stale: true }}; {body} }})()",
            id = js_string(handle.id()),
        );
        let reply: ActReply = serde_json::from_value(self.eval_value(&script).await?)?;
        if reply.stale {
            return Err(stale(handle));
        }
        if reply.missing {
            return Err(ProbeError::NotFound {
                selector: handle.to_string(),
            });
        }
        if let Some(error) = reply.error {
            return Err(ProbeError::browser(format!("{handle}: {error}")));
        }
        Ok(reply.value)
    }

    async fn assign_value(&self, handle: &ElementHandle, value: &str) -> ProbeResult<()> {
        let body = format!(
            "const d = Object.getOwnPropertyDescriptor(Object.getPrototypeOf(el), 'value'); \
             if (d && d.set) {{ d.set.call(el, {v}); }} else {{ el.value = {v}; }} \
             el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             return {{}};",
            v = js_string(value),
        );
        self.act(handle, &body).await.map(|_| ())
    }
}

fn stale(handle: &ElementHandle) -> ProbeError {
    ProbeError::StaleHandle {
        element: handle.id().to_string(),
        generation: handle.generation(),
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> ProbeResult<()> {
        self.ensure_no_dialog().await?;
        self.page
            .goto(url)
            .await
            .map_err(|e| ProbeError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    async fn find_elements(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
    ) -> ProbeResult<Vec<ElementHandle>> {
        self.ensure_no_dialog().await?;
        let (kind, expr) = match (selector.to_css(), selector.to_xpath()) {
            (Some(css), _) => ("css", css),
            (None, Some(xpath)) => ("xpath", xpath),
            (None, None) => return Err(ProbeError::malformed(selector.to_string(), "no css or xpath form")),
        };
        let scope_id = scope.map_or_else(|| "null".to_string(), |h| js_string(h.id()));
        let script = format!(
            r#"(() => {{
  const doc = window.__flowprobeDoc || (window.__flowprobeDoc = {token});
  const scopeId = {scope_id};
  const root = scopeId === null ? document : document.querySelector('[{HANDLE_ATTR}=' + JSON.stringify(scopeId) + ']');
  if (!root) return {{ doc, missing_scope: true, found: [] }};
  let nodes = [];
  if ({kind} === 'css') {{
    nodes = Array.from(root.querySelectorAll({expr}));
  }} else {{
    let xpath = {expr};
    if (scopeId !== null && xpath.startsWith('/')) xpath = '.' + xpath;
    const snap = document.evaluate(xpath, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
    for (let i = 0; i < snap.snapshotLength; i++) nodes.push(snap.snapshotItem(i));
  }}
  const found = nodes.filter(n => n.nodeType === 1).map(n => {{
    if (!n.getAttribute('{HANDLE_ATTR}')) {{
      window.__flowprobeSeq = (window.__flowprobeSeq || 0) + 1;
      n.setAttribute('{HANDLE_ATTR}', doc + '/' + window.__flowprobeSeq);
    }}
    return {{ id: n.getAttribute('{HANDLE_ATTR}'), tag: n.tagName.toLowerCase(), text: (n.innerText || n.textContent || '').trim() }};
  }});
  return {{ doc, found }};
}})()"#,
            token = js_string(&Uuid::new_v4().to_string()),
            kind = js_string(kind),
            expr = js_string(&expr),
        );
        let value = self.eval_value(&script).await.map_err(|e| match e {
            ProbeError::Browser { message } if message.contains("SyntaxError") => {
                ProbeError::malformed(selector.to_string(), message)
            }
            other => other,
        })?;
        let reply: FindReply = serde_json::from_value(value)?;
        let generation = self.observe_document(&reply.doc).await;
        if reply.missing_scope {
            if let Some(handle) = scope {
                return Err(stale(handle));
            }
        }
        Ok(reply
            .found
            .into_iter()
            .map(|f| ElementHandle::new(f.id, generation, f.tag, f.text))
            .collect())
    }

    async fn click(&self, element: &ElementHandle) -> ProbeResult<()> {
        // Options of a closed select have no box and ignore el.click()
        let body = format!(
            "if (el.tagName === 'OPTION') {{ \
               const sel = el.closest('select'); const opt = el; \
               if (!sel || sel.disabled || opt.disabled) return {{ error: 'element is not interactable' }}; \
               {SELECT_OPTION_JS} return {{}}; \
             }} \
             const r = el.getBoundingClientRect(); \
             if (el.disabled || r.width === 0 || r.height === 0) return {{ error: 'element is not interactable' }}; \
             el.scrollIntoView({{ block: 'center' }}); \
             setTimeout(() => el.click(), 0); \
             return {{}};"
        );
        self.act(element, &body).await.map(|_| ())
    }

    async fn select_option(&self, select: &ElementHandle, index: usize) -> ProbeResult<String> {
        let body = format!(
            "if (el.tagName !== 'SELECT') return {{ error: 'element is not a select' }}; \
             if (el.disabled) return {{ error: 'element is not interactable' }}; \
             const sel = el; const opt = sel.options[{index}]; \
             if (!opt) return {{ missing: true }}; \
             {SELECT_OPTION_JS} \
             return {{ value: sel.value }};"
        );
        let value = self.act(select, &body).await.map_err(|e| match e {
            ProbeError::NotFound { .. } => ProbeError::NotFound {
                selector: format!("option #{index} of {select}"),
            },
            other => other,
        })?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> ProbeResult<()> {
        self.act(element, "el.focus(); return {};").await?;
        let css = format!("[{HANDLE_ATTR}={}]", js_string(element.id()));
        let target = self.page.find_element(css).await.map_err(|_| stale(element))?;
        target.type_str(text).await.map_err(cdp_err)?;
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> ProbeResult<()> {
        self.assign_value(element, "").await
    }

    async fn set_value(&self, element: &ElementHandle, value: &str) -> ProbeResult<()> {
        self.assign_value(element, value).await
    }

    async fn is_clickable(&self, element: &ElementHandle) -> ProbeResult<bool> {
        let value = self
            .act(
                element,
                "const r = el.getBoundingClientRect(); \
                 const s = window.getComputedStyle(el); \
                 return { value: !el.disabled && r.width > 0 && r.height > 0 && s.visibility !== 'hidden' };",
            )
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn current_url(&self) -> ProbeResult<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(cdp_err)?
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn evaluate(&self, script: &str) -> ProbeResult<serde_json::Value> {
        self.ensure_no_dialog().await?;
        self.eval_value(script).await
    }

    async fn pending_dialog(&self) -> ProbeResult<Option<Dialog>> {
        Ok(self.dialog.lock().await.pending().cloned())
    }

    async fn accept_dialog(&self) -> ProbeResult<Dialog> {
        let mut tracker = self.dialog.lock().await;
        let mut dialog = tracker.pending().cloned().ok_or(ProbeError::NoDialog)?;
        self.page
            .execute(HandleJavaScriptDialogParams::new(true))
            .await
            .map_err(cdp_err)?;
        tracker.take();
        dialog.accept();
        Ok(dialog)
    }

    async fn dismiss_dialog(&self) -> ProbeResult<Dialog> {
        let mut tracker = self.dialog.lock().await;
        let mut dialog = tracker.pending().cloned().ok_or(ProbeError::NoDialog)?;
        self.page
            .execute(HandleJavaScriptDialogParams::new(false))
            .await
            .map_err(cdp_err)?;
        tracker.take();
        dialog.dismiss();
        Ok(dialog)
    }

    async fn maximize_window(&self) -> ProbeResult<()> {
        let window = self
            .page
            .execute(GetWindowForTargetParams::default())
            .await
            .map_err(cdp_err)?;
        let bounds = Bounds::builder().window_state(WindowState::Maximized).build();
        self.page
            .execute(SetWindowBoundsParams::new(window.window_id.clone(), bounds))
            .await
            .map_err(cdp_err)?;
        Ok(())
    }

    async fn screenshot(&self) -> ProbeResult<Vec<u8>> {
        self.ensure_no_dialog().await?;
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        let shot = self.page.execute(params).await.map_err(cdp_err)?;
        base64::engine::general_purpose::STANDARD
            .decode(&shot.data)
            .map_err(cdp_err)
    }

    async fn close(&self) -> ProbeResult<()> {
        let mut browser = self.browser.lock().await;
        let result = browser.close().await.map_err(cdp_err).map(|_| ());
        if let Err(e) = browser.wait().await {
            warn!(error = %e, "browser process did not exit cleanly");
        }
        for task in &self.tasks {
            task.abort();
        }
        result
    }
}

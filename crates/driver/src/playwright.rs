//! Playwright browser automation
//!
//! A [`PlaywrightSession`] keeps one `node` process alive for the whole run.
//! The process runs a small driver script that owns a Playwright page and
//! answers one JSON request per line on stdin with one JSON reply per line on
//! stdout:
//!
//! ```text
//! -> {"id":3,"op":"find","selector":"xpath=//h1"}
//! <- {"id":3,"ok":true,"value":{"text":"Welcome","id":null}}
//! ```
//!
//! Reply `0` is sent once the browser is up.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::browser::{BrowserSession, ClickOutcome, Element, Locator};
use crate::error::{DriverError, DriverResult};

const DRIVER_SCRIPT: &str = r#"
const playwright = require('playwright');
const readline = require('readline');

const config = JSON.parse(process.argv[2]);

function send(message) {
  process.stdout.write(JSON.stringify(message) + '\n');
}

(async () => {
  const browser = await playwright[config.browser].launch({ headless: config.headless });
  const context = await browser.newContext({
    viewport: { width: config.viewport_width, height: config.viewport_height }
  });
  const page = await context.newPage();
  page.setDefaultTimeout(config.command_timeout_ms);

  const first = (selector) => page.locator(selector).first();
  const present = async (el) => (await el.count()) > 0;

  const ops = {
    goto: async (r) => { await page.goto(r.url, { waitUntil: 'load' }); return null; },
    url: async () => page.url(),
    title: async () => page.title(),
    content: async () => page.content(),
    find: async (r) => {
      const el = first(r.selector);
      if (!(await present(el))) return null;
      return { text: (await el.textContent()) || '', id: await el.getAttribute('id') };
    },
    attribute: async (r) => {
      const el = first(r.selector);
      if (!(await present(el))) return null;
      return el.getAttribute(r.name);
    },
    click: async (r) => {
      const el = first(r.selector);
      if (!(await present(el))) return 'missing';
      if (await el.isDisabled()) return 'intercepted';
      try {
        await el.click({ timeout: config.click_timeout_ms });
      } catch (e) {
        if (e.name === 'TimeoutError') return 'intercepted';
        throw e;
      }
      await page.waitForLoadState('load');
      return 'clicked';
    },
    fill: async (r) => {
      const el = first(r.selector);
      if (!(await present(el))) return 'missing';
      await el.fill(r.value);
      return null;
    },
    select: async (r) => {
      const el = first(r.selector);
      if (!(await present(el))) return 'missing';
      const values = await el.locator('option').evaluateAll((os) => os.map((o) => o.value));
      if (!values.includes(r.value)) return false;
      await el.selectOption(r.value);
      return true;
    },
    reveal: async (r) => {
      const el = first(r.selector);
      if (!(await present(el))) return 'missing';
      await el.evaluate((e) => {
        if (getComputedStyle(e).display === 'none') e.style.display = 'block';
      });
      return null;
    },
    close: async () => { await browser.close(); return null; },
  };

  send({ id: 0, ok: true, value: 'ready' });

  const lines = readline.createInterface({ input: process.stdin });
  for await (const line of lines) {
    if (!line.trim()) continue;
    let request;
    try {
      request = JSON.parse(line);
    } catch (e) {
      send({ id: null, ok: false, error: 'bad request: ' + e.message });
      continue;
    }
    try {
      const op = ops[request.op];
      if (!op) throw new Error('unknown op ' + request.op);
      send({ id: request.id, ok: true, value: await op(request) });
    } catch (e) {
      send({ id: request.id, ok: false, error: e.message });
    }
    if (request.op === 'close') break;
  }
  process.exit(0);
})().catch((e) => {
  send({ id: 0, ok: false, error: e.message });
  process.exit(1);
});
"#;

/// Time allowed for the browser to come up.
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Upper bound on any single browser command, navigation included
    pub command_timeout: Duration,
    /// How long a click may wait for its target to become actionable before
    /// it counts as intercepted
    pub click_timeout: Duration,
    /// Node binary
    pub node: PathBuf,
    /// Where `require('playwright')` is resolved from, when not the default
    pub node_path: Option<PathBuf>,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1024,
            viewport_height: 768,
            command_timeout: Duration::from_secs(60),
            click_timeout: Duration::from_secs(5),
            node: PathBuf::from("node"),
            node_path: None,
        }
    }
}

/// Launch parameters handed to the driver script.
#[derive(Debug, Serialize)]
struct ScriptConfig<'a> {
    browser: &'a str,
    headless: bool,
    viewport_width: u32,
    viewport_height: u32,
    command_timeout_ms: u128,
    click_timeout_ms: u128,
}

impl<'a> From<&'a PlaywrightConfig> for ScriptConfig<'a> {
    fn from(config: &'a PlaywrightConfig) -> Self {
        Self {
            browser: config.browser.as_str(),
            headless: config.headless,
            viewport_width: config.viewport_width,
            viewport_height: config.viewport_height,
            command_timeout_ms: config.command_timeout.as_millis(),
            click_timeout_ms: config.click_timeout.as_millis(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Op<'a> {
    Goto { url: &'a str },
    Url,
    Title,
    Content,
    Find { selector: String },
    Attribute { selector: String, name: &'a str },
    Click { selector: String },
    Fill { selector: String, value: &'a str },
    Select { selector: String, value: &'a str },
    Reveal { selector: String },
    Close,
}

impl Op<'_> {
    fn name(&self) -> &'static str {
        match self {
            Op::Goto { .. } => "goto",
            Op::Url => "url",
            Op::Title => "title",
            Op::Content => "content",
            Op::Find { .. } => "find",
            Op::Attribute { .. } => "attribute",
            Op::Click { .. } => "click",
            Op::Fill { .. } => "fill",
            Op::Select { .. } => "select",
            Op::Reveal { .. } => "reveal",
            Op::Close => "close",
        }
    }
}

#[derive(Debug, Serialize)]
struct Request<'a> {
    id: u64,
    #[serde(flatten)]
    op: Op<'a>,
}

#[derive(Debug, Deserialize)]
struct Reply {
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FoundElement {
    text: String,
    id: Option<String>,
}

/// Browser session backed by a persistent Playwright process.
pub struct PlaywrightSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    command_timeout: Duration,
    closed: bool,
    // Holds the staged driver script until the session is dropped.
    _script_dir: TempDir,
}

impl PlaywrightSession {
    /// Start node with the driver script and wait for the browser to be ready.
    pub async fn launch(config: &PlaywrightConfig) -> DriverResult<Self> {
        Self::check_playwright_installed().await?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        tokio::fs::write(&script_path, DRIVER_SCRIPT).await?;
        debug!("Staged Playwright driver at {}", script_path.display());

        let mut command = Command::new(&config.node);
        command
            .arg(&script_path)
            .arg(serde_json::to_string(&ScriptConfig::from(config))?)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(node_path) = &config.node_path {
            command.env("NODE_PATH", node_path);
        }

        let mut child = command
            .spawn()
            .map_err(|e| DriverError::Browser(format!("Failed to start {}: {}", config.node.display(), e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DriverError::Browser("driver stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DriverError::Browser("driver stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("playwright: {}", line);
                }
            });
        }

        let mut session = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            command_timeout: config.command_timeout,
            closed: false,
            _script_dir: script_dir,
        };

        let ready = tokio::time::timeout(LAUNCH_TIMEOUT, session.read_reply(0))
            .await
            .map_err(|_| DriverError::Browser("Timed out waiting for the browser to start".to_string()))??;
        if ready.as_str() != Some("ready") {
            return Err(DriverError::Browser(format!("Unexpected handshake: {}", ready)));
        }
        info!(
            "Started {} ({})",
            config.browser.as_str(),
            if config.headless { "headless" } else { "headed" }
        );
        Ok(session)
    }

    /// Check if Playwright is installed
    async fn check_playwright_installed() -> DriverResult<()> {
        let status = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(DriverError::Browser(
                "Playwright not found (try: npm install playwright && npx playwright install)"
                    .to_string(),
            )),
        }
    }

    async fn call(&mut self, op: Op<'_>) -> DriverResult<serde_json::Value> {
        if self.closed {
            return Err(DriverError::Browser("browser is closed".to_string()));
        }
        let id = self.next_id;
        self.next_id += 1;
        let name = op.name();

        let mut line = serde_json::to_string(&Request { id, op })?;
        line.push('\n');

        let timeout = self.command_timeout;
        let exchange = async {
            self.stdin.write_all(line.as_bytes()).await?;
            self.stdin.flush().await?;
            self.read_reply(id).await
        };
        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| DriverError::Browser(format!("Timed out waiting for '{}'", name)))?
    }

    async fn read_reply(&mut self, id: u64) -> DriverResult<serde_json::Value> {
        loop {
            let Some(line) = self.stdout.next_line().await? else {
                return Err(DriverError::Browser("driver process exited".to_string()));
            };
            let reply: Reply = match serde_json::from_str(&line) {
                Ok(reply) => reply,
                Err(_) => {
                    debug!("playwright: {}", line);
                    continue;
                }
            };
            if reply.id != Some(id) {
                warn!("Discarding reply for request {:?} while waiting for {}", reply.id, id);
                continue;
            }
            return if reply.ok {
                Ok(reply.value)
            } else {
                Err(DriverError::Browser(
                    reply.error.unwrap_or_else(|| "unknown driver error".to_string()),
                ))
            };
        }
    }

    async fn call_string(&mut self, op: Op<'_>) -> DriverResult<String> {
        match self.call(op).await? {
            serde_json::Value::String(s) => Ok(s),
            other => Err(DriverError::Browser(format!("Expected a string, got {}", other))),
        }
    }

    /// Run an op whose only failure value is the `"missing"` marker.
    async fn call_on_element(&mut self, locator: &Locator, op: Op<'_>) -> DriverResult<serde_json::Value> {
        let value = self.call(op).await?;
        if value.as_str() == Some("missing") {
            return Err(DriverError::ElementNotFound(locator.to_string()));
        }
        Ok(value)
    }
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
    async fn current_url(&mut self) -> DriverResult<String> {
        self.call_string(Op::Url).await
    }

    async fn title(&mut self) -> DriverResult<String> {
        self.call_string(Op::Title).await
    }

    async fn goto(&mut self, url: &str) -> DriverResult<()> {
        self.call(Op::Goto { url }).await.map(|_| ())
    }

    async fn find(&mut self, locator: &Locator) -> DriverResult<Option<Element>> {
        let value = self
            .call(Op::Find {
                selector: locator.to_playwright(),
            })
            .await?;
        let found: Option<FoundElement> = serde_json::from_value(value)?;
        Ok(found.map(|f| Element {
            text: f.text,
            id: f.id,
        }))
    }

    async fn attribute(&mut self, locator: &Locator, name: &str) -> DriverResult<Option<String>> {
        let value = self
            .call(Op::Attribute {
                selector: locator.to_playwright(),
                name,
            })
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn click(&mut self, locator: &Locator) -> DriverResult<ClickOutcome> {
        let op = Op::Click {
            selector: locator.to_playwright(),
        };
        match self.call_on_element(locator, op).await?.as_str() {
            Some("clicked") => Ok(ClickOutcome::Clicked),
            Some("intercepted") => Ok(ClickOutcome::Intercepted),
            other => Err(DriverError::Browser(format!("Unexpected click result: {:?}", other))),
        }
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> DriverResult<()> {
        let op = Op::Fill {
            selector: locator.to_playwright(),
            value,
        };
        self.call_on_element(locator, op).await.map(|_| ())
    }

    async fn select_option(&mut self, locator: &Locator, value: &str) -> DriverResult<bool> {
        let op = Op::Select {
            selector: locator.to_playwright(),
            value,
        };
        let selected = self.call_on_element(locator, op).await?;
        selected
            .as_bool()
            .ok_or_else(|| DriverError::Browser(format!("Unexpected select result: {}", selected)))
    }

    async fn reveal(&mut self, locator: &Locator) -> DriverResult<()> {
        let op = Op::Reveal {
            selector: locator.to_playwright(),
        };
        self.call_on_element(locator, op).await.map(|_| ())
    }

    async fn page_source(&mut self) -> DriverResult<String> {
        self.call_string(Op::Content).await
    }

    async fn close(&mut self) -> DriverResult<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.call(Op::Close).await;
        self.closed = true;
        match tokio::time::timeout(Duration::from_secs(10), self.child.wait()).await {
            Ok(Ok(status)) => debug!("Playwright driver exited with {}", status),
            _ => {
                warn!("Playwright driver did not exit; killing it");
                self.child.kill().await?;
            }
        }
        result.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = Request {
            id: 7,
            op: Op::Select {
                selector: Locator::id("researcher_workspace-ubuntu-zone").to_playwright(),
                value: "melbourne-qh2",
            },
        };
        let json: serde_json::Value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": 7,
                "op": "select",
                "selector": "[id=\"researcher_workspace-ubuntu-zone\"]",
                "value": "melbourne-qh2",
            })
        );

        let json = serde_json::to_value(&Request { id: 1, op: Op::Title }).unwrap();
        assert_eq!(json, serde_json::json!({"id": 1, "op": "title"}));
    }

    #[test]
    fn test_reply_parsing() {
        let reply: Reply =
            serde_json::from_str(r#"{"id":3,"ok":true,"value":{"text":"x","id":null}}"#).unwrap();
        assert!(reply.ok);
        let found: Option<FoundElement> = serde_json::from_value(reply.value).unwrap();
        let found = found.unwrap();
        assert_eq!(found.text, "x");
        assert_eq!(found.id, None);

        let reply: Reply = serde_json::from_str(r#"{"id":4,"ok":false,"error":"boom"}"#).unwrap();
        assert!(!reply.ok);
        assert_eq!(reply.error.as_deref(), Some("boom"));
        assert!(reply.value.is_null());
    }

    #[test]
    fn test_script_handles_every_op() {
        let ops = [
            Op::Goto { url: "" },
            Op::Url,
            Op::Title,
            Op::Content,
            Op::Find { selector: String::new() },
            Op::Attribute { selector: String::new(), name: "" },
            Op::Click { selector: String::new() },
            Op::Fill { selector: String::new(), value: "" },
            Op::Select { selector: String::new(), value: "" },
            Op::Reveal { selector: String::new() },
            Op::Close,
        ];
        for op in ops {
            assert!(
                DRIVER_SCRIPT.contains(&format!("    {}: async", op.name())),
                "driver script lacks '{}'",
                op.name()
            );
        }
    }

    #[test]
    fn test_script_config() {
        let config = PlaywrightConfig {
            browser: Browser::Firefox,
            ..Default::default()
        };
        let json = serde_json::to_value(ScriptConfig::from(&config)).unwrap();
        assert_eq!(json["browser"], "firefox");
        assert_eq!(json["viewport_width"], 1024);
        assert_eq!(json["viewport_height"], 768);
        assert_eq!(json["click_timeout_ms"], 5000);
        assert_eq!(json["headless"], true);
    }
}

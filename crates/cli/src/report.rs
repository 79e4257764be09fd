//! Nagios passive-check reporting over NRDP

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use deskprobe_driver::config::NagiosSettings;
use deskprobe_driver::{EventReporter, Outcome};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Cannot connect to Nagios NRDP URL {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected NRDP reply: {0}")]
    BadReply(String),
}

/// NRDP service states used for a check result.
pub const STATE_OK: u8 = 0;
pub const STATE_CRITICAL: u8 = 2;

/// Files outcomes as passive service checks against one host.
pub struct NagiosReporter {
    client: reqwest::Client,
    url: String,
    token: String,
    target_host: String,
}

impl NagiosReporter {
    pub fn new(settings: &NagiosSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: settings.url.clone(),
            token: settings.token.trim().to_string(),
            target_host: settings.target_host.clone(),
        }
    }

    /// Service name the monitoring side expects for a scenario check.
    pub fn service_name(zone: &str, scenario: &str, desktop: &str) -> String {
        format!("tempest_{}_desktop_{}_{}", zone, scenario, desktop)
    }

    fn check_results(&self, service: &str, outcome: &Outcome) -> String {
        let state = if outcome.success { STATE_OK } else { STATE_CRITICAL };
        format!(
            concat!(
                "<checkresults>",
                "<checkresult type=\"service\" checktype=\"1\">",
                "<hostname>{}</hostname>",
                "<servicename>{}</servicename>",
                "<state>{}</state>",
                "<output>{}</output>",
                "</checkresult>",
                "</checkresults>"
            ),
            escape_xml(&self.target_host),
            escape_xml(service),
            state,
            escape_xml(&outcome.detail)
        )
    }
}

#[async_trait]
impl EventReporter for NagiosReporter {
    type Error = ReportError;

    async fn report(&self, service: &str, outcome: &Outcome) -> Result<Option<String>, ReportError> {
        let xml = self.check_results(service, outcome);
        debug!("Raw Nagios NRDP request: {}", xml);

        let params = [
            ("token", self.token.as_str()),
            ("cmd", "submitcheck"),
            ("XMLDATA", xml.as_str()),
        ];
        let http = |source| ReportError::Http {
            url: self.url.clone(),
            source,
        };
        let body = self
            .client
            .post(&self.url)
            .query(&params)
            .send()
            .await
            .map_err(http)?
            .text()
            .await
            .map_err(http)?;
        debug!("Raw Nagios NRDP response: {}", body);

        reply_message(&body)
            .map(Some)
            .ok_or_else(|| ReportError::BadReply(body.chars().take(200).collect()))
    }
}

static REPLY_MESSAGE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)<message>(.*?)</message>").ok());

/// The `<message>` of an NRDP reply.
fn reply_message(body: &str) -> Option<String> {
    let re = REPLY_MESSAGE.as_ref()?;
    let message = re.captures(body)?.get(1)?.as_str();
    Some(unescape_xml(message.trim()))
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

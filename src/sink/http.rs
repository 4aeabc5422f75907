use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use url::Url;

use super::EventSink;
use crate::event::ScoreEvent;

/// POSTs each event as a JSON body. Any 2xx answer is success.
pub struct HttpSink {
    url: Url,
    agent: ureq::Agent,
}

impl HttpSink {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("invalid sink url '{}'", url))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "unsupported sink scheme '{}'; expected http(s)",
                url.scheme()
            ));
        }
        // Redirects are answers too: a 3xx is not a delivery.
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .redirects(0)
            .build();
        Ok(Self { url, agent })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl EventSink for HttpSink {
    fn name(&self) -> &'static str {
        "http"
    }

    fn deliver(&mut self, event: &ScoreEvent) -> Result<()> {
        match self.agent.post(self.url.as_str()).send_json(event) {
            Ok(response) if (200..300).contains(&response.status()) => Ok(()),
            Ok(response) => Err(anyhow!("sink answered HTTP {}", response.status())),
            Err(ureq::Error::Status(code, _)) => Err(anyhow!("sink answered HTTP {}", code)),
            Err(ureq::Error::Transport(transport)) => {
                Err(anyhow!("sink unreachable: {}", transport))
            }
        }
    }
}

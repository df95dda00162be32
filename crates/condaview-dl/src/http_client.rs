use std::time::Duration;

use ureq::{Agent, Proxy};

/// Settings for the HTTP agent used to fetch upstream feeds.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub user_agent: Option<String>,
    pub proxy: Option<Proxy>,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    /// Creates a default ClientConfig with a `condaview/<version>` user agent
    /// and no proxy or timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use condaview_dl::http_client::ClientConfig;
    ///
    /// let cfg = ClientConfig::default();
    /// assert!(cfg.user_agent.as_deref().unwrap().starts_with("condaview/"));
    /// assert!(cfg.proxy.is_none());
    /// assert!(cfg.timeout.is_none());
    /// ```
    fn default() -> Self {
        Self {
            user_agent: Some(format!("condaview/{}", env!("CARGO_PKG_VERSION"))),
            proxy: None,
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Builds an HTTP `Agent` configured from this `ClientConfig`.
    ///
    /// Non-success statuses are returned as responses rather than errors so
    /// callers can tell `304 Not Modified` and server errors apart from
    /// transport failures.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use condaview_dl::http_client::ClientConfig;
    ///
    /// let config = ClientConfig {
    ///     timeout: Some(Duration::from_secs(30)),
    ///     ..ClientConfig::default()
    /// };
    /// let agent = config.build();
    /// let _req = agent.get("http://example.com");
    /// ```
    pub fn build(&self) -> Agent {
        let mut config = Agent::config_builder()
            .http_status_as_error(false)
            .proxy(self.proxy.clone())
            .timeout_global(self.timeout);

        if let Some(user_agent) = &self.user_agent {
            config = config.user_agent(user_agent);
        }

        config.build().into()
    }
}

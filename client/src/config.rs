use anyhow::{bail, Context};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration for a chat session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How often the conversation list is refreshed.
    pub list_poll_interval: Duration,
    /// How often the open conversation's history is refreshed.
    pub conversation_poll_interval: Duration,
    /// Distance from the bottom, in viewport units, still counted as "at the bottom".
    pub scroll_threshold: f64,
    /// Quiet period after a manual scroll before auto-scroll resumes.
    pub scroll_grace: Duration,
    /// Buffered UI events per subscriber.
    pub event_capacity: usize,
}

impl SyncConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from `lookup`, which maps a variable name to its raw value.
    /// Unset variables keep their defaults; set ones must parse.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let list_poll_interval = duration_var(&lookup, "FITCHAT_LIST_POLL_MS")?
            .unwrap_or(defaults.list_poll_interval);
        let conversation_poll_interval = duration_var(&lookup, "FITCHAT_CONVERSATION_POLL_MS")?
            .unwrap_or(defaults.conversation_poll_interval);
        let scroll_threshold = parsed_var::<f64, _>(&lookup, "FITCHAT_SCROLL_THRESHOLD")?
            .unwrap_or(defaults.scroll_threshold);
        let scroll_grace = duration_var(&lookup, "FITCHAT_SCROLL_GRACE_MS")?
            .unwrap_or(defaults.scroll_grace);
        let event_capacity = parsed_var::<usize, _>(&lookup, "FITCHAT_EVENT_CAPACITY")?
            .unwrap_or(defaults.event_capacity);

        let config = Self {
            list_poll_interval,
            conversation_poll_interval,
            scroll_threshold,
            scroll_grace,
            event_capacity,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.list_poll_interval.is_zero() || self.conversation_poll_interval.is_zero() {
            bail!("polling intervals must be greater than zero");
        }
        if !self.scroll_threshold.is_finite() || self.scroll_threshold < 0.0 {
            bail!("scroll threshold must be a non-negative number");
        }
        if self.event_capacity == 0 {
            bail!("event capacity must be greater than zero");
        }
        Ok(())
    }

    pub fn with_list_poll_interval(mut self, interval: Duration) -> Self {
        self.list_poll_interval = interval;
        self
    }

    pub fn with_conversation_poll_interval(mut self, interval: Duration) -> Self {
        self.conversation_poll_interval = interval;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            list_poll_interval: Duration::from_secs(10),
            conversation_poll_interval: Duration::from_secs(3),
            scroll_threshold: 50.0,
            scroll_grace: Duration::from_secs(2),
            event_capacity: 256,
        }
    }
}

fn parsed_var<T, F>(lookup: &F, name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{name}={raw:?}"))
        })
        .transpose()
}

fn duration_var<F>(lookup: &F, name: &str) -> anyhow::Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    let ms = parsed_var::<u64, _>(lookup, name)
        .with_context(|| format!("{name} must be a number of milliseconds"))?;
    Ok(ms.map(Duration::from_millis))
}

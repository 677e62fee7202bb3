use std::time::Duration;

use fms_remote::RemoteConfig;

/// Configuration errors. Raised at startup, never mid-session.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Refresh intervals of the polling read cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Assignments and notifications (default: 2 s).
    pub fast: Duration,
    /// Work activities, class records, work details, class sessions
    /// (default: 3 s).
    pub standard: Duration,
    /// Admin faculty list (default: 5 s).
    pub faculty_list: Duration,
    /// Admin stats (default: 10 s).
    pub stats: Duration,
    /// Upper bound of the random delay added to every interval (default: 0).
    pub jitter: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            fast: Duration::from_millis(2_000),
            standard: Duration::from_millis(3_000),
            faculty_list: Duration::from_millis(5_000),
            stats: Duration::from_millis(10_000),
            jitter: Duration::ZERO,
        }
    }
}

/// Portal configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Hosted backend base URL.
    pub remote_url: String,
    /// Public anon key of the hosted project.
    pub anon_key: String,
    /// Storage bucket for class record and work detail documents.
    pub document_bucket: String,
    pub polling: PollingConfig,
    /// Also write the structured `details` column on work activities.
    pub structured_activities: bool,
    pub request_timeout: Duration,
}

impl PortalConfig {
    /// Defaults for everything but the backend address.
    pub fn new(remote_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            remote_url: remote_url.into(),
            anon_key: anon_key.into(),
            document_bucket: "documents".into(),
            polling: PollingConfig::default(),
            structured_activities: false,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var                     | Default     |
    /// |-----------------------------|-------------|
    /// | `FMS_REMOTE_URL`            | required    |
    /// | `FMS_ANON_KEY`              | required    |
    /// | `FMS_DOCUMENT_BUCKET`       | `documents` |
    /// | `FMS_POLL_FAST_MS`          | `2000`      |
    /// | `FMS_POLL_MS`               | `3000`      |
    /// | `FMS_POLL_FACULTY_LIST_MS`  | `5000`      |
    /// | `FMS_POLL_STATS_MS`         | `10000`     |
    /// | `FMS_POLL_JITTER_MS`        | `0`         |
    /// | `FMS_STRUCTURED_ACTIVITIES` | `false`     |
    /// | `FMS_REQUEST_TIMEOUT_SECS`  | `30`        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Lookup(&lookup);

        let remote_url = env.required("FMS_REMOTE_URL")?;
        let anon_key = env.required("FMS_ANON_KEY")?;
        let document_bucket = env
            .get("FMS_DOCUMENT_BUCKET")
            .unwrap_or_else(|| "documents".into());

        let defaults = PollingConfig::default();
        let polling = PollingConfig {
            fast: env.millis("FMS_POLL_FAST_MS", defaults.fast, false)?,
            standard: env.millis("FMS_POLL_MS", defaults.standard, false)?,
            faculty_list: env.millis("FMS_POLL_FACULTY_LIST_MS", defaults.faculty_list, false)?,
            stats: env.millis("FMS_POLL_STATS_MS", defaults.stats, false)?,
            jitter: env.millis("FMS_POLL_JITTER_MS", defaults.jitter, true)?,
        };

        let structured_activities = env.flag("FMS_STRUCTURED_ACTIVITIES", false)?;
        let request_timeout =
            Duration::from_secs(env.number("FMS_REQUEST_TIMEOUT_SECS", 30, false)?);

        Ok(Self {
            remote_url,
            anon_key,
            document_bucket,
            polling,
            structured_activities,
            request_timeout,
        })
    }

    pub fn remote_config(&self) -> RemoteConfig {
        RemoteConfig {
            request_timeout: self.request_timeout,
            ..RemoteConfig::new(&self.remote_url, &self.anon_key)
        }
    }
}

// ---- private helpers ----

struct Lookup<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Lookup<'_, F> {
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        self.get(var).ok_or(ConfigError::Missing(var))
    }

    fn number(&self, var: &'static str, default: u64, allow_zero: bool) -> Result<u64, ConfigError> {
        let Some(raw) = self.get(var) else {
            return Ok(default);
        };
        let value: u64 = raw.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        })?;
        if value == 0 && !allow_zero {
            return Err(ConfigError::Invalid {
                var,
                value: raw,
                reason: "must be greater than zero".into(),
            });
        }
        Ok(value)
    }

    fn millis(
        &self,
        var: &'static str,
        default: Duration,
        allow_zero: bool,
    ) -> Result<Duration, ConfigError> {
        let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        self.number(var, default_ms, allow_zero)
            .map(Duration::from_millis)
    }

    fn flag(&self, var: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(var).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
            Some(v) => Err(ConfigError::Invalid {
                var,
                value: v,
                reason: "expected true or false".into(),
            }),
        }
    }
}

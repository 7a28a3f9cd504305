use anyhow::Context;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Server-side cap on `numberOfPropertiesPerPage`.
pub const DEFAULT_PAGE_SIZE: usize = 499;

/// Highest entry index the search API will serve.
pub const DEFAULT_MAX_PAGE_OFFSET: usize = 1247;

pub const DEFAULT_MAX_CONCURRENT_DETAILS: usize = 10;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Provider hosts. Overridable so tests can point at a mock transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoints {
    /// Site root, used to absolutize listing paths.
    pub site: Url,
    /// Search API (`/api/_search`).
    pub search_api: Url,
    /// Location type-ahead lookup.
    pub typeahead: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            site: Url::parse("https://www.rightmove.co.uk/").expect("static URL is valid"),
            search_api: Url::parse("https://www.rightmove.co.uk/api/_search")
                .expect("static URL is valid"),
            typeahead: Url::parse("https://los.rightmove.co.uk/typeahead")
                .expect("static URL is valid"),
        }
    }
}

/// Runtime knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct ScoutConfig {
    pub endpoints: Endpoints,
    pub max_concurrent_details: usize,
    pub request_timeout: Duration,
    pub page_size: usize,
    pub max_page_offset: usize,
    /// Attempts per request, including the first one.
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Hard limit for the whole run. `None` lets the run finish on its own.
    pub run_deadline: Option<Duration>,
    pub output_path: PathBuf,
    pub user_agent: String,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            endpoints: Endpoints::default(),
            max_concurrent_details: DEFAULT_MAX_CONCURRENT_DETAILS,
            request_timeout: Duration::from_secs(30),
            page_size: DEFAULT_PAGE_SIZE,
            max_page_offset: DEFAULT_MAX_PAGE_OFFSET,
            max_attempts: 3,
            retry_delay: Duration::from_millis(500),
            run_deadline: None,
            output_path: PathBuf::from("results/search_results.json"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ScoutConfig {
    /// Build a config from `SCOUT_*` environment variables, falling back to
    /// the defaults for anything unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            endpoints: defaults.endpoints,
            max_concurrent_details: parse_var(
                "SCOUT_MAX_CONCURRENT_DETAILS",
                defaults.max_concurrent_details,
            )?,
            request_timeout: Duration::from_secs(parse_var(
                "SCOUT_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            page_size: parse_var("SCOUT_PAGE_SIZE", defaults.page_size)?,
            max_page_offset: parse_var("SCOUT_MAX_PAGE_OFFSET", defaults.max_page_offset)?,
            max_attempts: parse_var("SCOUT_MAX_ATTEMPTS", defaults.max_attempts)?,
            retry_delay: Duration::from_millis(parse_var(
                "SCOUT_RETRY_DELAY_MS",
                defaults.retry_delay.as_millis() as u64,
            )?),
            run_deadline: optional_var::<u64>("SCOUT_RUN_DEADLINE_SECS")?
                .map(Duration::from_secs),
            output_path: optional_var::<PathBuf>("SCOUT_OUTPUT")?
                .unwrap_or(defaults.output_path),
            user_agent: env::var("SCOUT_USER_AGENT").unwrap_or(defaults.user_agent),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.page_size > 0, "page size must be positive");
        anyhow::ensure!(
            self.max_concurrent_details > 0,
            "max concurrent detail fetches must be positive"
        );
        anyhow::ensure!(self.max_attempts > 0, "max attempts must be positive");
        Ok(())
    }
}

fn optional_var<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {key}: {raw}")),
        _ => Ok(None),
    }
}

fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    Ok(optional_var(key)?.unwrap_or(default))
}

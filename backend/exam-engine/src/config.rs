use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub quiz_api_url: String,
    pub scoring_api_url: String,
    pub results_url: String,
    pub bind_addr: String,
    pub tick_interval_ms: u64,
    pub min_transition_ms: u64,
    pub http_timeout_secs: u64,
    pub session_retention_secs: u64,
    pub metrics_auth: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            quiz_api_url: "http://localhost:8000/api".to_string(),
            scoring_api_url: "http://localhost:8000/api".to_string(),
            results_url: "http://localhost:3000/results".to_string(),
            bind_addr: "0.0.0.0:8081".to_string(),
            tick_interval_ms: 1000,
            min_transition_ms: 100,
            http_timeout_secs: 5,
            session_retention_secs: 300,
            metrics_auth: "admin:changeme".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, local .env as fallback
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/*.toml + APP__* overrides
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", app_env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let quiz_api_url = settings
            .get_string("quiz_api.url")
            .or_else(|_| env::var("QUIZ_API_URL"))
            .unwrap_or(defaults.quiz_api_url);

        let scoring_api_url = settings
            .get_string("scoring_api.url")
            .or_else(|_| env::var("SCORING_API_URL"))
            .unwrap_or(defaults.scoring_api_url);

        let results_url = settings
            .get_string("results.url")
            .or_else(|_| env::var("RESULTS_URL"))
            .unwrap_or(defaults.results_url);

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or(defaults.bind_addr);

        let tick_interval_ms = read_positive(
            &settings,
            "exam.tick_interval_ms",
            "EXAM_TICK_INTERVAL_MS",
            defaults.tick_interval_ms,
        );
        let min_transition_ms = read_u64(
            &settings,
            "exam.min_transition_ms",
            "EXAM_MIN_TRANSITION_MS",
            defaults.min_transition_ms,
        );
        let http_timeout_secs = read_positive(
            &settings,
            "http.timeout_secs",
            "HTTP_TIMEOUT_SECS",
            defaults.http_timeout_secs,
        );
        // Zero evicts a submitted session as soon as it is submitted
        let session_retention_secs = read_u64(
            &settings,
            "exam.session_retention_secs",
            "EXAM_SESSION_RETENTION_SECS",
            defaults.session_retention_secs,
        );

        let metrics_auth = settings
            .get_string("metrics.auth")
            .or_else(|_| env::var("METRICS_AUTH"))
            .unwrap_or_else(|_| {
                if app_env == "prod" {
                    tracing::warn!("METRICS_AUTH not set in production, using default credentials");
                }
                defaults.metrics_auth
            });

        for (name, value) in [
            ("quiz_api.url", &quiz_api_url),
            ("scoring_api.url", &scoring_api_url),
            ("results.url", &results_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| config::ConfigError::Message(format!("{} is not a valid URL: {}", name, e)))?;
        }

        Ok(Config {
            quiz_api_url,
            scoring_api_url,
            results_url,
            bind_addr,
            tick_interval_ms,
            min_transition_ms,
            http_timeout_secs,
            session_retention_secs,
            metrics_auth,
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn min_transition(&self) -> Duration {
        Duration::from_millis(self.min_transition_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// How long a submitted session stays readable before it is evicted.
    pub fn session_retention(&self) -> Duration {
        Duration::from_secs(self.session_retention_secs)
    }
}

fn read_u64(settings: &config::Config, key: &str, env_key: &str, default: u64) -> u64 {
    settings
        .get_int(key)
        .ok()
        .and_then(|v| u64::try_from(v).ok())
        .or_else(|| env::var(env_key).ok().and_then(|v| v.parse::<u64>().ok()))
        .unwrap_or(default)
}

fn read_positive(settings: &config::Config, key: &str, env_key: &str, default: u64) -> u64 {
    Some(read_u64(settings, key, env_key, default))
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

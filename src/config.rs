use crate::error::ConfigError;

/// Service configuration, loaded once from the process environment at
/// startup and passed explicitly to the components that need it.
///
/// `DB_URL` and `DB_NAME` are required; startup fails fast without them.
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory holding the database. A `sqlite://` prefix is
    /// tolerated and stripped.
    pub db_url: String,
    /// Logical database name; becomes the database file stem.
    pub db_name: String,
    pub port: u16,
    /// Comma-separated allow-list of CORS origins. `None` means `*`.
    pub allowed_origins: Option<Vec<String>>,
    /// Optional webhook endpoint for the notifier. `None` means log-only.
    pub notify_webhook_url: Option<String>,
}

const DEFAULT_PORT: u16 = 3000;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let db_url = require_env("DB_URL")?;
        let db_name = require_env("DB_NAME")?;

        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidEnvVar("PORT".to_string(), raw))?,
            Err(_) => DEFAULT_PORT,
        };

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect::<Vec<_>>()
            })
            // Set-but-empty behaves the same as absent.
            .filter(|origins: &Vec<String>| !origins.is_empty());

        let notify_webhook_url = std::env::var("NOTIFY_WEBHOOK_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Ok(Self {
            db_url,
            db_name,
            port,
            allowed_origins,
            notify_webhook_url,
        })
    }

    /// Filesystem path of the SQLite database backing the document store.
    pub fn database_path(&self) -> std::path::PathBuf {
        let dir = self
            .db_url
            .strip_prefix("sqlite://")
            .unwrap_or(&self.db_url);
        std::path::Path::new(dir).join(format!("{}.db", self.db_name))
    }

    /// True when the given `Origin` header value is acceptable for CORS.
    pub fn origin_allowed(&self, origin: &str) -> bool {
        match &self.allowed_origins {
            Some(origins) => origins.iter().any(|allowed| allowed == origin),
            None => true,
        }
    }
}

fn require_env(name: &str) -> Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

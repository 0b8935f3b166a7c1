//! Layered runtime settings.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. `shopmate.toml` in the working directory (optional)
//! 3. `SHOPMATE__<SECTION>__<KEY>` environment variables, e.g.
//!    `SHOPMATE__SERVER__PORT=9000` or
//!    `SHOPMATE__SERVER__CORS_ORIGINS=https://a.example,https://b.example`

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

const ENV_PREFIX: &str = "SHOPMATE";
/// Public placeholder; anyone can mint tokens while it is in use.
const DEV_JWT_SECRET: &str = "shopmate-dev-secret-change-me";

fn secret<'de, D: Deserializer<'de>>(d: D) -> Result<SecretString, D::Error> {
    String::deserialize(d).map(SecretString::from)
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    #[serde(deserialize_with = "secret")]
    pub jwt_secret: SecretString,
    pub token_ttl_days: i64,
}

impl AuthSettings {
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret.expose_secret() == DEV_JWT_SECRET
    }
}

#[derive(Debug, Deserialize)]
pub struct MediaSettings {
    pub root: PathBuf,
    pub url_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct MailSettings {
    /// No host means mail is logged instead of sent.
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub username: Option<String>,
    #[serde(deserialize_with = "secret")]
    pub password: SecretString,
    pub from: String,
    pub timeout_secs: u64,
}

impl MailSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub media: MediaSettings,
    pub mail: MailSettings,
}

impl Settings {
    /// Reads `.env`, `shopmate.toml` and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_sources(Some("shopmate"), Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("server.cors_origins")
            .try_parsing(true)
    }

    fn from_sources(file: Option<&str>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.cors_origins", Vec::<String>::new())?
            .set_default("database.url", "sqlite:shopmate.db")?
            .set_default("database.max_connections", 5)?
            .set_default("auth.jwt_secret", DEV_JWT_SECRET)?
            .set_default("auth.token_ttl_days", 7)?
            .set_default("media.root", "./data/media")?
            .set_default("media.url_prefix", "/media")?
            .set_default("mail.smtp_port", 587)?
            .set_default("mail.password", "")?
            .set_default("mail.from", "ShopMate <no-reply@shopmate.com>")?
            .set_default("mail.timeout_secs", 10)?;
        if let Some(name) = file {
            builder = builder.add_source(File::with_name(name).required(false));
        }
        builder.add_source(env).build()?.try_deserialize()
    }
}

//! # ShopMate Binary
//!
//! The entry point that assembles the application based on compile-time features.

mod config;

use actix_web::{web, App, HttpServer};
use secrecy::ExposeSecret;
use sm_api::handlers::AppState;
use sm_core::traits::Mailer;

use crate::config::{MailSettings, Settings};

#[cfg(feature = "db-sqlite")]
use sm_db_sqlite::SqliteRepo;

#[cfg(feature = "storage-local")]
use sm_storage_local::LocalMediaStore;

#[cfg(feature = "auth-simple")]
use sm_auth_simple::SimpleAuthProvider;

#[cfg(feature = "mail-smtp")]
use sm_mail_smtp::{LogMailer, SmtpMailer, SmtpSettings};

#[cfg(feature = "mail-smtp")]
fn build_mailer(mail: &MailSettings) -> anyhow::Result<Box<dyn Mailer>> {
    let Some(host) = mail.smtp_host.clone() else {
        log::warn!("no SMTP host configured; outgoing mail will only be logged");
        return Ok(Box::new(LogMailer));
    };
    let mailer = SmtpMailer::new(&SmtpSettings {
        host,
        port: mail.smtp_port,
        username: mail.username.clone(),
        password: mail.password.clone(),
        from: mail.from.clone(),
        timeout: mail.timeout(),
    })?;
    Ok(Box::new(mailer))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    let settings = Settings::load()?;
    if settings.auth.uses_dev_secret() {
        log::warn!("auth.jwt_secret is the built-in development value; set SHOPMATE__AUTH__JWT_SECRET");
    }

    // 1. Database
    #[cfg(feature = "db-sqlite")]
    let repo = SqliteRepo::connect(&settings.database.url, settings.database.max_connections).await?;

    // 2. Media storage
    #[cfg(feature = "storage-local")]
    let store = LocalMediaStore::new(settings.media.root.clone(), settings.media.url_prefix.clone());

    // 3. Auth
    #[cfg(feature = "auth-simple")]
    let auth = SimpleAuthProvider::new(settings.auth.jwt_secret.expose_secret())
        .with_ttl(chrono::Duration::days(settings.auth.token_ttl_days));

    // 4. Mail
    #[cfg(feature = "mail-smtp")]
    let mailer = build_mailer(&settings.mail)?;

    let state = web::Data::new(AppState {
        repo: Box::new(repo),
        store: Box::new(store),
        auth: Box::new(auth),
        mailer,
    });

    std::fs::create_dir_all(&settings.media.root)?;
    let media_root = settings.media.root.clone();
    let media_prefix = settings.media.url_prefix.trim_end_matches('/').to_string();
    let cors_origins = settings.server.cors_origins.clone();

    let bind = (settings.server.host.clone(), settings.server.port);
    log::info!("ShopMate starting on http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(sm_api::middleware::cors_policy(&cors_origins))
            .wrap(sm_api::middleware::security_headers())
            .wrap(sm_api::middleware::standard_middleware())
            .configure(sm_api::configure_routes)
            .service(actix_files::Files::new(&media_prefix, &media_root))
    })
    .bind(bind)?
    .run()
    .await?;
    Ok(())
}

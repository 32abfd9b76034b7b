use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::auth;
use crate::collections::Collections;
use crate::config;
use crate::data::{self, AccountService, AuthService, CatalogService};
use crate::logging;
use crate::session;
use crate::storage::{self, MemorySessionStore, SessionStore};
use crate::tmdb;
use crate::ui;

pub fn run() -> Result<()> {
    let log_path = match logging::init(None) {
        Ok(path) => path,
        Err(err) => {
            eprintln!("warning: logging disabled: {err:#}");
            None
        }
    };

    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let config_path = config::default_path();
    let display_path = friendly_path(config_path.as_ref());
    info!(
        version = crate::VERSION,
        config = %display_path,
        log = ?log_path,
        "moviepedia: starting"
    );

    if cfg.tmdb.access_token.trim().is_empty() {
        bail!(
            "no TMDB access token configured.\n\nRun `moviepedia --save-token <TOKEN>` or set MOVIEPEDIA_TMDB__ACCESS_TOKEN.\nConfig file: {}",
            display_path
        );
    }

    let client = Arc::new(
        tmdb::Client::new(tmdb::ClientConfig {
            access_token: cfg.tmdb.access_token.clone(),
            user_agent: cfg.tmdb.user_agent.clone(),
            base_url: Some(cfg.tmdb.base_url.clone()),
            language: Some(cfg.tmdb.language.clone()),
            http_client: None,
        })
        .context("create TMDB client")?,
    );

    let store: Arc<dyn SessionStore> = match storage::Store::open(storage::Options::default()) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            warn!(error = ?err, "moviepedia: local store unavailable, session will not persist");
            Arc::new(MemorySessionStore::new())
        }
    };

    let auth_service: Arc<dyn AuthService> = Arc::new(data::TmdbAuthService::new(client.clone()));
    let flow = Arc::new(auth::Flow::new(
        auth_service.clone(),
        cfg.auth.flow_config(&cfg.tmdb.authenticate_url),
    ));
    let session_manager = Arc::new(session::Manager::new(
        store,
        flow,
        auth_service,
        cfg.tmdb.account_id,
    ));

    let catalog: Arc<dyn CatalogService> = Arc::new(data::TmdbCatalogService::new(client.clone()));
    let account: Arc<dyn AccountService> = Arc::new(data::TmdbAccountService::new(client));
    let collections = Arc::new(Collections::new(account, session_manager.clone()));

    let status = if session_manager.is_authenticated() {
        "Signed in to TMDB. Tab switches lists, Space opens the item menu, q quits.".to_string()
    } else {
        "Browsing signed out. Press s to sign in, q to quit.".to_string()
    };

    let options = ui::Options {
        status_message: status,
        catalog,
        collections,
        session: session_manager,
        auth_redirect_uri: cfg.auth.redirect_uri.clone(),
        image_base_url: cfg.tmdb.image_base_url.clone(),
        image_size: cfg.tmdb.image_size.clone(),
        notification_duration: cfg.ui.notification_duration,
        default_media_type: cfg.ui.default_media_type,
        load_more_threshold: cfg.ui.load_more_threshold,
        config_path: display_path,
    };

    let mut model = ui::Model::new(options);
    model.run()?;
    info!("moviepedia: exiting");

    Ok(())
}

fn friendly_path(path: Option<&PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/moviepedia/config.yaml".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendly_path_falls_back_without_a_path() {
        assert_eq!(friendly_path(None), "~/.config/moviepedia/config.yaml");
    }

    #[test]
    fn friendly_path_abbreviates_home() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        let path = home.join(".config").join("moviepedia").join("config.yaml");
        assert_eq!(
            friendly_path(Some(&path)),
            "~/.config/moviepedia/config.yaml"
        );
    }
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::apod;
use crate::config;
use crate::data::{self, FeedService};
use crate::logging;
use crate::ui;

/// Command-line overrides applied on top of the loaded config.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_file: Option<PathBuf>,
    pub feed_url: Option<String>,
    pub offline: bool,
}

pub fn run(opts: RunOptions) -> Result<()> {
    let mut cfg = config::load(config::LoadOptions {
        config_file: opts.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    if let Some(url) = opts.feed_url.as_ref() {
        cfg.feed.url = url.clone();
    }

    let log_path = logging::init(&cfg.log);
    let config_path = opts.config_file.clone().or_else(config::default_path);
    tracing::info!(
        version = crate::VERSION,
        config = ?config_path,
        feed = %cfg.feed.url,
        offline = opts.offline,
        log = ?log_path,
        "starting apod-tui"
    );

    let options = build_options(&cfg, opts.offline)?;
    let mut model = ui::Model::new(options);
    model.run()?;

    tracing::info!("apod-tui exited");
    Ok(())
}

fn build_options(cfg: &config::Config, offline: bool) -> Result<ui::Options> {
    let feed_service: Arc<dyn FeedService + Send + Sync> = if offline {
        Arc::new(data::MockFeedService)
    } else {
        let client = apod::Client::new(apod::ClientConfig {
            user_agent: cfg.feed.user_agent.clone(),
            timeout: cfg.feed.timeout,
            http_client: None,
        })
        .context("create feed client")?;
        Arc::new(data::ApodFeedService::new(Arc::new(client)))
    };

    let status_message = if offline {
        "Offline mode: showing built-in sample records. Press f to load, q to quit.".to_string()
    } else {
        format!(
            "Feed: {}  |  f/r: fetch  Tab: focus  Enter/Space: open  q: quit",
            cfg.feed.url
        )
    };

    Ok(ui::Options {
        status_message,
        feed_url: cfg.feed.url.clone(),
        feed_service: Some(feed_service),
        player_command: cfg.player.video_command.clone(),
        card_width: cfg.ui.card_width,
        card_height: cfg.ui.card_height,
        fetch_on_start: false,
        link_opener: ui::browser_opener(),
    })
}

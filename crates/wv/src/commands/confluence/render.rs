//! `wv confluence render` command implementation.

use std::sync::Arc;

use clap::Args;
use wv_config::{Config, ConfluenceConfig};
use wv_confluence::{ConfluenceClient, ConfluenceHost};
use wv_dom::LiveDocument;

use crate::commands::RunArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the confluence render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Confluence page ID.
    page_id: String,

    #[command(flatten)]
    run: RunArgs,
}

impl RenderArgs {
    /// Execute the render command.
    pub(crate) async fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = self.run.load_config()?;
        let conf_config = require_confluence_config(&config, output)?;
        let client = Arc::new(ConfluenceClient::from_config(conf_config));

        output.info(&format!("Fetching page {}...", self.page_id));
        let host = ConfluenceHost::load(
            client,
            &self.page_id,
            &config.site,
            &config.directives.view_prefix,
        )
        .await?;

        let view = host.view_markup().ok_or_else(|| {
            CliError::Validation(format!("page {} has no rendered view", self.page_id))
        })?;
        let mut live = LiveDocument::parse(view)?;
        self.run.run(&config, &host, &mut live, output).await
    }
}

fn require_confluence_config<'a>(
    config: &'a Config,
    output: &Output,
) -> Result<&'a ConfluenceConfig, CliError> {
    config.require_confluence().map_err(|err| {
        output.info("\nAdd the following to your wv.toml:");
        output.info("\n[confluence]");
        output.info(r#"base_url = "https://confluence.example.com""#);
        output.info(r#"token = "${CONFLUENCE_TOKEN}""#);
        CliError::from(err)
    })
}

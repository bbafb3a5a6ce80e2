//! `wv confluence` subcommand group.

mod render;

use clap::Subcommand;

use render::RenderArgs;

use crate::error::CliError;
use crate::output::Output;

/// Confluence commands.
#[derive(Subcommand)]
pub(crate) enum ConfluenceCommand {
    /// Render directives for a Confluence page.
    Render(RenderArgs),
}

impl ConfluenceCommand {
    /// Execute the confluence subcommand.
    pub(crate) async fn execute(self, output: &Output) -> Result<(), CliError> {
        match self {
            Self::Render(args) => args.execute(output).await,
        }
    }
}

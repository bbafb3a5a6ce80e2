//! CLI command implementations.

pub(crate) mod confluence;
pub(crate) mod render;

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Args;
use tracing::debug;
use wv_config::{CliSettings, Config};
use wv_directives::{ContentSource, Orchestrator, Phase, RunOutcome};
use wv_dom::LiveDocument;

pub(crate) use confluence::ConfluenceCommand;
pub(crate) use render::RenderArgs;

use crate::error::CliError;
use crate::output::Output;

/// Options shared by every rendering command.
#[derive(Args)]
pub(crate) struct RunArgs {
    /// Path to configuration file (default: auto-discover wv.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the augmented page HTML here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the page source, including write-back, to this file.
    #[arg(long)]
    emit_storage: Option<PathBuf>,

    /// Write the page metadata, including seeded widget state, to this JSON file.
    #[arg(long)]
    emit_metadata: Option<PathBuf>,

    /// Wrap rendered source nodes in span macros (overrides config).
    #[arg(long)]
    writeback: bool,

    /// Site base URL (overrides config).
    #[arg(long, env = "WV_BASE_URL")]
    base_url: Option<String>,

    /// Space key (overrides config).
    #[arg(long)]
    space_key: Option<String>,

    /// Localization bundle (overrides config).
    #[arg(long)]
    lang: Option<PathBuf>,
}

impl RunArgs {
    pub(crate) fn load_config(&self) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            base_url: self.base_url.clone(),
            space_key: self.space_key.clone(),
            writeback: self.writeback.then_some(true),
            lang_path: self.lang.clone(),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        debug!(path = ?config.config_path, "Loaded configuration");
        Ok(config)
    }

    /// Run the orchestrator and report the outcome.
    pub(crate) async fn run<H: ContentSource + ?Sized>(
        &self,
        config: &Config,
        host: &H,
        live: &mut LiveDocument,
        output: &Output,
    ) -> Result<(), CliError> {
        let messages = config.messages()?;
        output.info(&messages.render("basic.loading", &[]));

        let outcome = Orchestrator::new(config)?.run(host, live).await?;
        report(&outcome, &messages, output);

        write_output(self.output.as_deref(), &live.to_html())?;
        if let Some(path) = &self.emit_storage {
            match &outcome.source {
                Some(source) => {
                    std::fs::write(path, source.serialize())?;
                    debug!(path = %path.display(), "Wrote page source");
                }
                None => output.warning("Page is not tracked; no source written."),
            }
        }
        if let Some(path) = &self.emit_metadata {
            match &outcome.page_metadata {
                Some(metadata) => {
                    write_json(path, metadata)?;
                    debug!(path = %path.display(), "Wrote page metadata");
                }
                None => output.warning("Page is not tracked; no metadata written."),
            }
        }
        Ok(())
    }
}

fn report(outcome: &RunOutcome, messages: &wv_config::Messages, output: &Output) {
    for notice in &outcome.notices {
        output.notice(notice);
    }
    if outcome.phase == Phase::Aborted {
        output.info(&messages.render("basic.not_tracked", &[]));
        return;
    }
    let summary = messages.render("basic.ready", &[("count", &outcome.rendered.to_string())]);
    if outcome.failures.is_empty() {
        output.success(&summary);
    } else {
        output.warning(&summary);
        for failure in &outcome.failures {
            output.warning(&format!("  - {}: {}", failure.directive, failure.error));
        }
    }
}

fn write_output(path: Option<&Path>, html: &str) -> Result<(), CliError> {
    match path {
        Some(path) => std::fs::write(path, html)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(html.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<(), CliError> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_write_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.html");
        write_output(Some(&path), "<p>x</p>").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<p>x</p>");
    }

    #[test]
    fn test_write_json_round_trips_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let metadata = serde_json::json!({
            "elements": {"serialized": {"queryTable": {"u_1": {"uuid": "u_1"}}}}
        });
        write_json(&path, &metadata).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, metadata);
    }
}

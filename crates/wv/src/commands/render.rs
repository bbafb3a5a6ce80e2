//! `wv render` command implementation.

use std::path::{Path, PathBuf};

use clap::Args;
use serde_json::Value;
use wv_directives::{DocumentHandle, LocalHost, PageMeta};
use wv_dom::LiveDocument;

use super::RunArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the render command.
#[derive(Args)]
pub(crate) struct RenderArgs {
    /// Storage-format markup of the page.
    #[arg(long)]
    storage: PathBuf,

    /// Rendered HTML of the page.
    #[arg(long)]
    view: PathBuf,

    /// Page title (default: storage file stem).
    #[arg(long)]
    title: Option<String>,

    /// Page metadata JSON.
    #[arg(long)]
    metadata: Option<PathBuf>,

    /// Document metadata JSON. Without it the page is treated as untracked.
    #[arg(long)]
    document: Option<PathBuf>,

    /// Title of the document the page belongs to.
    #[arg(long, default_value = "Document", requires = "document")]
    document_title: String,

    #[command(flatten)]
    run: RunArgs,
}

impl RenderArgs {
    /// Execute the render command.
    pub(crate) async fn execute(self, output: &Output) -> Result<(), CliError> {
        let config = self.run.load_config()?;

        let title = self.title.clone().unwrap_or_else(|| {
            self.storage
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        let page = PageMeta {
            page_id: title.clone(),
            title,
            space_key: config.site.space_key.clone().unwrap_or_default(),
            base_url: config.site.base_url.clone().unwrap_or_default(),
        };

        let mut host = LocalHost::new(page).with_source(std::fs::read_to_string(&self.storage)?);
        if let Some(path) = &self.metadata {
            host = host.with_page_metadata(read_json(path)?);
        }
        if let Some(path) = &self.document {
            let handle = DocumentHandle {
                page_id: self.document_title.clone(),
                title: self.document_title.clone(),
            };
            host = host.with_document(handle, Some(read_json(path)?));
        }

        let mut live = LiveDocument::parse(&std::fs::read_to_string(&self.view)?)?;
        self.run.run(&config, &host, &mut live, output).await
    }
}

fn read_json(path: &Path) -> Result<Value, CliError> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_read_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta.json");
        std::fs::write(&path, r#"{"elements": {}}"#).unwrap();
        assert_eq!(read_json(&path).unwrap(), json!({"elements": {}}));

        std::fs::write(&path, "{").unwrap();
        assert!(matches!(read_json(&path), Err(CliError::Json(_))));
    }
}

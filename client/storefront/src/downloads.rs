//! Direct delivery of free projects: build the file links from the
//! project's references and fetch them to disk.

use std::path::{Path, PathBuf};

use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::errors::Result;
use crate::models::Project;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadLink {
    pub url: String,
    /// Suggested name for the saved file.
    pub filename: String,
}

/// Links for the documentation and source bundle, documentation first.
/// Projects without either reference yield an empty list.
pub fn links_for(project: &Project, uploads_base_url: &str) -> Vec<DownloadLink> {
    let stem = file_stem(&project.title);
    let mut links = Vec::new();

    if let Some(doc) = &project.documentation {
        links.push(DownloadLink {
            url: upload_url(uploads_base_url, doc),
            filename: format!("{stem}_documentation.pdf"),
        });
    }
    if let Some(code) = &project.code_files {
        links.push(DownloadLink {
            url: upload_url(uploads_base_url, code),
            filename: format!("{stem}_source_code.zip"),
        });
    }
    links
}

/// Save `link` into `dir`, returning the written path.
pub async fn fetch_to_dir(client: &Client, link: &DownloadLink, dir: &Path) -> Result<PathBuf> {
    let bytes = client
        .get(&link.url)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(&link.filename);
    tokio::fs::write(&path, &bytes).await?;
    info!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}

fn upload_url(base: &str, reference: &str) -> String {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        reference.to_string()
    } else {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            reference.trim_start_matches('/')
        )
    }
}

/// Whitespace runs become `_`; path separators are not allowed through.
fn file_stem(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .replace(['/', '\\'], "_")
}

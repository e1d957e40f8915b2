use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};
use url::Url;
use walkdir::WalkDir;

use super::content_store::{ContentStore, StoreError};

const DIRECTORY_MIME: &str = "application/x-directory";

/// One line of the newline-delimited JSON returned by `/api/v0/add`.
#[derive(Debug, Deserialize)]
struct AddEntry {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Hash")]
    hash: String,
}

/// Client for an IPFS node's HTTP RPC API (`/api/v0/add`).
#[derive(Clone)]
pub struct IpfsStore {
    client: Client,
    add_url: Url,
}

impl IpfsStore {
    /// `api_url` is the node's RPC root, e.g. `http://127.0.0.1:5001`.
    pub fn new(api_url: &Url, pin: bool, cid_version: u8) -> Result<Self, url::ParseError> {
        let mut add_url = api_url.join("api/v0/add")?;
        add_url
            .query_pairs_mut()
            .append_pair("pin", if pin { "true" } else { "false" })
            .append_pair("cid-version", &cid_version.to_string())
            .append_pair("progress", "false");

        info!("✅ Using IPFS node at {}", api_url);

        Ok(Self {
            client: Client::new(),
            add_url,
        })
    }

    async fn file_part(path: &Path, name: String) -> Result<Part, StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        let file = tokio::fs::File::open(path).await.map_err(io_err)?;
        let len = file.metadata().await.map_err(io_err)?.len();
        let body = Body::wrap_stream(ReaderStream::new(file));

        let content_type = mime_guess::from_path(path).first_or_octet_stream();

        Ok(Part::stream_with_length(body, len)
            .file_name(name)
            .mime_str(content_type.essence_str())?)
    }

    async fn post(&self, form: Form) -> Result<Vec<AddEntry>, StoreError> {
        let response = self.client.post(self.add_url.clone()).multipart(form).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }

        parse_add_response(&body)
    }
}

fn parse_add_response(body: &str) -> Result<Vec<AddEntry>, StoreError> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str::<AddEntry>(line).map_err(StoreError::from))
        .collect()
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl ContentStore for IpfsStore {
    async fn add_directory(&self, path: &Path) -> Result<String, StoreError> {
        if !path.is_dir() {
            return Err(StoreError::NotADirectory(path.to_path_buf()));
        }
        let root = base_name(path);

        let mut form = Form::new().part(
            "file",
            Part::bytes(Vec::new())
                .file_name(root.clone())
                .mime_str(DIRECTORY_MIME)?,
        );

        let mut files: Vec<PathBuf> = Vec::new();
        for entry in WalkDir::new(path).min_depth(1).sort_by_file_name() {
            let entry = entry?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }

        for file in &files {
            let relative = file.strip_prefix(path).unwrap_or(file);
            let name = format!("{}/{}", root, relative.to_string_lossy().replace('\\', "/"));
            form = form.part("file", Self::file_part(file, name).await?);
        }

        debug!("Adding {} files from {} to IPFS", files.len(), path.display());
        let entries = self.post(form).await?;

        entries
            .into_iter()
            .find(|e| e.name == root)
            .map(|e| e.hash)
            .ok_or(StoreError::MissingEntry(root))
    }

    async fn add_file(&self, path: &Path) -> Result<String, StoreError> {
        let name = base_name(path);
        let form = Form::new().part("file", Self::file_part(path, name.clone()).await?);

        let entries = self.post(form).await?;
        entries
            .into_iter()
            .last()
            .map(|e| e.hash)
            .ok_or(StoreError::MissingEntry(name))
    }
}

//! A development server for a built site, built on `tiny_http`.
//!
//! Only files that exist in the output directory when the server starts can
//! be served: the tree is walked once into a [`SiteIndex`] mapping normalized
//! URL paths to files, and every request is answered from that map. Request
//! paths are never joined onto the filesystem.

use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tiny_http::{Header, Method, Request, Response, Server};
use url::Url;
use walkdir::WalkDir;

const INDEX_FILE: &str = "index.html";

/// An allow-list of servable files keyed by URL path (e.g. `/tag/go.html`).
#[derive(Debug)]
pub struct SiteIndex {
    base: Url,
    files: HashMap<String, PathBuf>,
}

impl SiteIndex {
    /// Walks `root` and records every regular file in it.
    pub fn scan(root: &Path) -> Result<SiteIndex> {
        let base = Url::parse("http://localhost/")?;
        let mut files = HashMap::new();
        for result in WalkDir::new(root).min_depth(1) {
            let entry = result.with_context(|| format!("Walking `{}`", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(root)
                .with_context(|| format!("`{}` is outside `{}`", entry.path().display(), root.display()))?;
            let segments: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let mut url = base.clone();
            url.path_segments_mut()
                .map_err(|_| anyhow!("`{}` can't hold a path", base))?
                .pop_if_empty()
                .extend(segments.iter());
            files.insert(url.path().to_owned(), entry.into_path());
        }
        Ok(SiteIndex { base, files })
    }

    /// Maps a request URL (path plus optional query) to a file. Dot segments
    /// are resolved before the lookup and paths ending in `/` map to their
    /// `index.html`.
    pub fn resolve(&self, request_url: &str) -> Option<&Path> {
        let url = self.base.join(request_url).ok()?;
        if url.host_str() != self.base.host_str() || url.scheme() != self.base.scheme() {
            return None;
        }
        let mut path = url.path().to_owned();
        if path.ends_with('/') {
            path.push_str(INDEX_FILE);
        }
        self.files.get(&path).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Serves `config.output_directory` on `config.address` until the process is
/// killed.
pub fn serve(config: &Config) -> Result<()> {
    let index = SiteIndex::scan(&config.output_directory)?;
    let server = Server::http(config.address)
        .map_err(|e| anyhow!("Listening on {}: {}", config.address, e))?;
    tracing::info!(
        address = %config.address,
        files = index.len(),
        "serving `{}`",
        config.output_directory.display()
    );

    for request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_owned();
        match respond(&index, request) {
            Ok(status) => tracing::debug!(%method, %url, status, "request"),
            Err(err) => tracing::warn!(%method, %url, "responding: {}", err),
        }
    }
    Ok(())
}

fn respond(index: &SiteIndex, request: Request) -> std::io::Result<u16> {
    if !matches!(request.method(), Method::Get | Method::Head) {
        request.respond(Response::from_string("method not allowed").with_status_code(405))?;
        return Ok(405);
    }

    let path = match index.resolve(request.url()) {
        Some(path) => path,
        None => {
            request.respond(Response::from_string("not found").with_status_code(404))?;
            return Ok(404);
        }
    };

    let mut response = Response::from_file(File::open(path)?);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type(path).as_bytes()) {
        response = response.with_header(header);
    }
    request.respond(response)?;
    Ok(200)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("txt") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("ico") => "image/x-icon",
        Some("woff2") => "font/woff2",
        _ => "application/octet-stream",
    }
}

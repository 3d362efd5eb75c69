#![forbid(unsafe_code)]

use std::path::{Component, Path, PathBuf};

use log::debug;
use poem::http::{header, Method, StatusCode};
use poem::{Endpoint, Request, Response, Result};

use crate::utils::errors::Errors;

// ***************************************************************************
//                                Constants
// ***************************************************************************
const INDEX_FILE   : &str = "index.html";
const DEFAULT_MIME : &str = "text/plain";
const NOT_FOUND    : &str = "Not Found";

// ***************************************************************************
//                              Static Assets
// ***************************************************************************
/// Serves the browser front end from a single directory.
pub struct StaticAssets {
    root: PathBuf,
}

impl StaticAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Endpoint for StaticAssets {
    type Output = Response;

    async fn call(&self, req: Request) -> Result<Self::Output> {
        if req.method() != Method::GET && req.method() != Method::HEAD {
            return Ok(Response::builder().status(StatusCode::METHOD_NOT_ALLOWED).finish());
        }

        let file_path = match resolve_asset_path(&self.root, req.uri().path()) {
            Ok(p) => p,
            Err(e) => {
                debug!("{}", e);
                return Ok(not_found());
            }
        };

        match tokio::fs::read(&file_path).await {
            Ok(content) => Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type_for(&file_path))
                .body(content)),
            Err(e) => {
                debug!("{}: {}", Errors::AssetNotFound(file_path.to_string_lossy().to_string()), e);
                Ok(not_found())
            }
        }
    }
}

// ***************************************************************************
//                            Public Functions
// ***************************************************************************
// ---------------------------------------------------------------------------
// content_type_for:
// ---------------------------------------------------------------------------
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        _ => DEFAULT_MIME,
    }
}

// ---------------------------------------------------------------------------
// resolve_asset_path:
// ---------------------------------------------------------------------------
/** Map a request path onto a file below root.  The empty path and "/" name
 * the index page.  Only plain path segments are accepted so a request can
 * never address anything outside of root.
 */
pub fn resolve_asset_path(root: &Path, uri_path: &str) -> Result<PathBuf, Errors> {
    let rel = uri_path.trim_start_matches('/');
    let rel = if rel.is_empty() {INDEX_FILE} else {rel};

    let mut path = root.to_path_buf();
    for component in Path::new(rel).components() {
        match component {
            Component::Normal(seg) => path.push(seg),
            _ => return Err(Errors::AssetNotFound(
                format!("{} (rejected below {})", uri_path, root.display()))),
        }
    }

    Ok(path)
}

// ***************************************************************************
//                            Private Functions
// ***************************************************************************
fn not_found() -> Response {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header(header::CONTENT_TYPE, DEFAULT_MIME)
        .body(NOT_FOUND)
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use poem::test::TestClient;
    use std::fs;

    #[test]
    fn content_types() {
        assert_eq!(content_type_for(Path::new("index.html")), "text/html");
        assert_eq!(content_type_for(Path::new("style.css")), "text/css");
        assert_eq!(content_type_for(Path::new("script.js")), "application/javascript");
        assert_eq!(content_type_for(Path::new("favicon.ico")), "text/plain");
        assert_eq!(content_type_for(Path::new("README")), "text/plain");
    }

    #[test]
    fn root_is_index() {
        let root = Path::new("/srv/public");
        assert_eq!(resolve_asset_path(root, "/").unwrap(), root.join("index.html"));
        assert_eq!(resolve_asset_path(root, "").unwrap(), root.join("index.html"));
        assert_eq!(resolve_asset_path(root, "/css/style.css").unwrap(),
                   root.join("css").join("style.css"));
    }

    #[test]
    fn traversal_is_rejected() {
        let root = Path::new("/srv/public");
        assert!(resolve_asset_path(root, "/../secret.txt").is_err());
        assert!(resolve_asset_path(root, "/css/../../.env").is_err());
    }

    #[test]
    fn rejection_names_request_and_root() {
        let root = Path::new("/srv/public");
        let msg = resolve_asset_path(root, "/../secret.txt").unwrap_err().to_string();
        assert!(msg.contains("/../secret.txt"));
        assert!(msg.contains("/srv/public"));
    }

    #[tokio::test]
    async fn serves_files_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        fs::write(dir.path().join("script.js"), "let x = 1;").unwrap();

        let cli = TestClient::new(StaticAssets::new(dir.path()));

        let resp = cli.get("/").send().await;
        resp.assert_status_is_ok();
        resp.assert_content_type("text/html");
        resp.assert_text("<html></html>").await;

        let resp = cli.get("/script.js").send().await;
        resp.assert_status_is_ok();
        resp.assert_content_type("application/javascript");
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let cli = TestClient::new(StaticAssets::new(dir.path()));

        let resp = cli.get("/nope.css").send().await;
        resp.assert_status(StatusCode::NOT_FOUND);

        let resp = cli.post("/index.html").send().await;
        resp.assert_status(StatusCode::METHOD_NOT_ALLOWED);
    }
}

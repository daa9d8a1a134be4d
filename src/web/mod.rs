//! Static-file web interface
//!
//! A small decoy site: an index page plus file listings and downloads from
//! two fixed directories. The listeners never read these directories; this
//! surface only hands out bait files.

use anyhow::{Context, Result};
use axum::{
    extract::{Path as UrlPath, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use std::path::Path;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tracing::info;

use crate::config::{Config, WebConfig};

const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Internal File Server</title></head>
<body>
<h1>Internal File Server</h1>
<p>Authorized personnel only. All activity is logged.</p>
<ul>
<li><a href="/download">Tool downloads</a></li>
<li><a href="/document">Documents</a></li>
</ul>
</body>
</html>
"#;

struct AppState {
    web: WebConfig,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

/// List the files of one fixed directory as download links
async fn listing_page(title: &str, route: &str, dir: &str) -> Html<String> {
    let mut items = String::new();
    for name in list_files(dir).await {
        let escaped = html_escape::encode_text(&name);
        items.push_str(&format!(
            "<li><a href=\"{}/{}\">{}</a></li>\n",
            route, escaped, escaped
        ));
    }
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{title}</title></head>\n<body>\n<h1>{title}</h1>\n<ul>\n{items}</ul>\n</body>\n</html>\n"
    ))
}

async fn download_page(State(state): State<Arc<AppState>>) -> Html<String> {
    listing_page("Tool Downloads", "/download", &state.web.downloads_dir).await
}

async fn document_page(State(state): State<Arc<AppState>>) -> Html<String> {
    listing_page("Documents", "/document", &state.web.documents_dir).await
}

async fn download_file(
    State(state): State<Arc<AppState>>,
    UrlPath(filename): UrlPath<String>,
) -> Response {
    serve_attachment(&state.web.downloads_dir, &filename).await
}

async fn document_file(
    State(state): State<Arc<AppState>>,
    UrlPath(filename): UrlPath<String>,
) -> Response {
    serve_attachment(&state.web.documents_dir, &filename).await
}

async fn list_files(dir: &str) -> Vec<String> {
    let mut names = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
    }
    names.sort();
    names
}

/// Serve one direct child of `dir` as an attachment. Anything that is not a
/// bare file name is refused.
async fn serve_attachment(dir: &str, filename: &str) -> Response {
    if filename.is_empty()
        || filename == ".."
        || filename.contains('/')
        || filename.contains('\\')
    {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    }

    let path = Path::new(dir).join(filename);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let headers = [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", filename),
                ),
            ];
            (headers, bytes).into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

pub fn router(web: WebConfig) -> Router {
    let state = Arc::new(AppState { web });

    Router::new()
        .route("/", get(index))
        .route("/download", get(download_page))
        .route("/download/:filename", get(download_file))
        .route("/document", get(document_page))
        .route("/document/:filename", get(document_file))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
}

pub async fn start_server(config: &Config) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.web.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind web interface on {}", addr))?;

    info!("Web interface listening on {}", addr);

    let app = router(config.web.clone());
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn traversal_names_are_refused() {
        for name in ["..", "a/b", "..\\x", ""] {
            let resp = serve_attachment("static/tools", name).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{:?}", name);
        }
    }

    #[tokio::test]
    async fn listing_missing_directory_is_empty() {
        assert!(list_files("/nonexistent/netsnare-test-dir").await.is_empty());
    }
}

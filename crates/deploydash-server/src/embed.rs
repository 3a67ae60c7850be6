use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "$CARGO_MANIFEST_DIR/assets/"]
struct Assets;

/// GET /assets/{*path}: serve an embedded stylesheet or script.
pub async fn asset_handler(Path(path): Path<String>) -> Response {
    match <Assets as Embed>::get(&path) {
        Some(content) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, mime.as_ref())],
                content.data.to_vec(),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "asset not found").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_stylesheet_with_css_mime() {
        let resp = asset_handler(Path("style.css".into())).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let ct = resp.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(ct.to_str().unwrap().starts_with("text/css"));
    }

    #[test]
    fn refresh_script_reloads_on_every_tick() {
        let script = <Assets as Embed>::get("dashboard.js").unwrap();
        let text = std::str::from_utf8(&script.data).unwrap();
        assert!(text.contains("window.location.reload()"));
        assert!(!text.contains("activeElement"));
    }

    #[tokio::test]
    async fn unknown_asset_is_404() {
        let resp = asset_handler(Path("nope.js".into())).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}

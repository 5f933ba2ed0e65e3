//! Static files for the browser UI, embedded into the binary.

use rust_embed::RustEmbed;
use warp::{http::StatusCode, reply, Reply};

use super::types::ApiError;

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/static/"]
struct Assets;

/// Reply with the embedded file at `path`, or a 404.
pub fn serve_asset(path: &str) -> reply::Response {
    match Assets::get(path) {
        Some(file) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            reply::with_header(file.data.into_owned(), "Content-Type", mime.to_string())
                .into_response()
        }
        None => reply::with_status(
            reply::json(&ApiError {
                message: format!("No such file: {}", path),
            }),
            StatusCode::NOT_FOUND,
        )
        .into_response(),
    }
}

use crate::app::App;
use axum::{
    body::Body,
    extract::State,
    http::{Request, Response, StatusCode, Uri},
    response::{IntoResponse, Response as AxumResponse},
};
use leptos::*;
use tower::ServiceExt;
use tower_http::services::ServeDir;

/// Serves a static asset when one exists at `uri`, otherwise renders the app,
/// whose router shows the not found page.
pub async fn file_and_error_handler(
    uri: Uri,
    State(options): State<LeptosOptions>,
    req: Request<Body>,
) -> AxumResponse {
    let root = options.site_root.clone();
    match get_static_file(uri, &root).await {
        Ok(res) if res.status() == StatusCode::OK => res.into_response(),
        Ok(_) => {
            let handler = leptos_axum::render_app_to_stream(options.to_owned(), App);
            handler(req).await.into_response()
        }
        Err((status, message)) => {
            logging::error!("{message}");
            (status, message).into_response()
        }
    }
}

async fn get_static_file(uri: Uri, root: &str) -> Result<Response<Body>, (StatusCode, String)> {
    let req = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .map_err(|err| (StatusCode::BAD_REQUEST, format!("Invalid request: {err}")))?;
    // `ServeDir` implements `tower::Service` so we can call it with `tower::ServiceExt::oneshot`
    // This path is relative to the cargo root
    match ServeDir::new(root).oneshot(req).await {
        Ok(res) => Ok(res.into_response()),
        Err(err) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong: {err}"),
        )),
    }
}

//! HTTP surface: directory pages plus the streaming endpoints.
//!
//! | Path | Body |
//! |---|---|
//! | `/` | index page listing the files |
//! | `/stream/all` | one auto-scrolling frame per file |
//! | `/stream/all/interleaved` | a single frame on the merged stream |
//! | `/stream/raw/{file}` | `text/plain`, the lines of one file |
//! | `/stream/all/raw/interleaved` | `text/plain`, `<file>: <line>` for every file |
//!
//! Streaming bodies never end on their own. When a client goes away its body
//! is dropped, which drops the [`Session`](crate::Session) and stops every
//! tail that was feeding it.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{Stream, StreamExt};
use maud::{html, PreEscaped, DOCTYPE};
use tracing::{info, warn};

use crate::{Config, Error, Multiplexer, Tail};

const RAW_PREFIX: &str = "/stream/raw/";
const INTERLEAVED_PREFIX: &str = "/stream/all/raw/";

/// Builds the application router for the files under `config`'s root.
pub fn router(config: Config) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/stream/all", get(stream_all))
        .route("/stream/all/interleaved", get(stream_all_interleaved))
        .route("/stream/raw/{file}", get(raw))
        .route("/stream/all/raw/interleaved", get(raw_interleaved))
        .with_state(Multiplexer::new(config))
}

/// Maps core errors onto HTTP statuses.
#[derive(Debug)]
pub struct ServerError(Error);

impl From<Error> for ServerError {
    fn from(err: Error) -> Self {
        ServerError(err)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = if self.0.is_open_failure() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        warn!(status = %status, error = %self.0, "request failed");

        (status, self.0.to_string()).into_response()
    }
}

async fn index(State(mux): State<Multiplexer>) -> Result<Html<String>, ServerError> {
    let files = mux.directory().list().await?;
    Ok(Html(render_index(&files)))
}

async fn stream_all(State(mux): State<Multiplexer>) -> Result<Html<String>, ServerError> {
    let files = mux.directory().list().await?;
    Ok(Html(render_frames(&files, RAW_PREFIX)))
}

async fn stream_all_interleaved() -> Html<String> {
    Html(render_frames(&["interleaved".to_string()], INTERLEAVED_PREFIX))
}

async fn raw(
    State(mux): State<Multiplexer>,
    Path(file): Path<String>,
) -> Result<Response, ServerError> {
    let path = mux.directory().resolve(&file)?;
    let tail = Tail::open(path, mux.config()).await?;

    info!(file = %file, "streaming file");
    Ok(text_stream(tail.into_session()))
}

async fn raw_interleaved(State(mux): State<Multiplexer>) -> Result<Response, ServerError> {
    let merged = mux.merge_all().await?;

    info!(files = merged.sources().len(), "streaming interleaved");
    let lines = merged
        .into_session()
        .map(|line| Ok::<_, Infallible>(line.to_string()));
    Ok(text_stream(lines))
}

fn text_stream<S, E>(lines: S) -> Response
where
    S: Stream<Item = Result<String, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(lines),
    )
        .into_response()
}

const FRAME_STYLE: &str = "
div {
width: 50%;
float: left;
}
iframe {
width: 100%;
}
";

const AUTOSCROLL: &str = r#"
setInterval(function autoScroll() {
    var checkboxes = document.querySelectorAll('input:checked');

    for (var i = 0; i < checkboxes.length; i += 1) {
        var checkbox = checkboxes[i];
        var iframe = document.getElementById(checkbox.getAttribute("data-target"));
        iframe.contentWindow.document.body.scrollTop += 20;
    }
}, 10)
"#;

fn render_index(files: &[String]) -> String {
    html! {
        (DOCTYPE)
        head {
            title { "Webtail" }
        }
        body {
            p {
                "Welcome to Webtail. You can choose to stream "
                a href="/stream/all" { "all" }
                " files in separate containers, or stream all files "
                a href="/stream/all/interleaved" { "interleaved" }
                " in the same container."
            }
            p {
                "You can also choose to stream one file at a time:"
                br;
                @for file in files {
                    a href={ (RAW_PREFIX) (urlencoding::encode(file).into_owned()) } { (file) }
                    br;
                }
            }
        }
    }
    .into_string()
}

fn render_frames(files: &[String], prefix: &str) -> String {
    html! {
        (DOCTYPE)
        head {
            title { "Webtail" }
            style { (PreEscaped(FRAME_STYLE)) }
        }
        body {
            form {
                @for file in files {
                    div {
                        label {
                            input type="checkbox" data-target=(file) checked;
                            "Autoscroll " (file)
                        }
                        br;
                        iframe src={ (prefix) (urlencoding::encode(file).into_owned()) } id=(file) {}
                    }
                }
            }
            script type="text/javascript" { (PreEscaped(AUTOSCROLL)) }
        }
    }
    .into_string()
}

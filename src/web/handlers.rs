use super::{pages, AppState};
use crate::favorites::ARCHIVE_FILE_NAME;
use crate::media::MessageId;
use crate::session::BrowserSessionId;
use crate::workflow::{Action, Page, WorkflowError};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::{Extension, Form};
use serde::Deserialize;
use tracing::info;

#[derive(Deserialize)]
pub struct PhoneForm {
    #[serde(default)]
    phone: String,
}

#[derive(Deserialize)]
pub struct CodeForm {
    #[serde(default)]
    code: String,
}

#[derive(Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    password: String,
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn index(
    State(state): State<AppState>,
    Extension(browser): Extension<BrowserSessionId>,
) -> Html<String> {
    let workflow = state.workflow(&browser).await;
    let mut workflow = workflow.lock().await;

    let favorites = if matches!(workflow.page(), Page::Dashboard { .. }) {
        workflow.load_dashboard(state.services()).await.ok()
    } else {
        None
    };
    let notice = workflow.take_notice();
    Html(pages::render(workflow.page(), notice.as_deref(), favorites.as_deref()))
}

/// Apply `action` and send the browser back to `/`
///
/// Failures are already stored as the notice the next render shows.
async fn act(state: &AppState, browser: &BrowserSessionId, action: Action) -> Redirect {
    let workflow = state.workflow(browser).await;
    let mut workflow = workflow.lock().await;
    let _ = workflow.apply(action, state.services()).await;
    Redirect::to("/")
}

pub async fn start(
    State(state): State<AppState>,
    Extension(browser): Extension<BrowserSessionId>,
) -> Redirect {
    act(&state, &browser, Action::Start).await
}

pub async fn login(
    State(state): State<AppState>,
    Extension(browser): Extension<BrowserSessionId>,
    Form(form): Form<PhoneForm>,
) -> Redirect {
    act(&state, &browser, Action::SubmitPhone(form.phone)).await
}

pub async fn verify(
    State(state): State<AppState>,
    Extension(browser): Extension<BrowserSessionId>,
    Form(form): Form<CodeForm>,
) -> Redirect {
    act(&state, &browser, Action::SubmitCode(form.code)).await
}

pub async fn password(
    State(state): State<AppState>,
    Extension(browser): Extension<BrowserSessionId>,
    Form(form): Form<PasswordForm>,
) -> Redirect {
    act(&state, &browser, Action::SubmitPassword(form.password)).await
}

pub async fn back(
    State(state): State<AppState>,
    Extension(browser): Extension<BrowserSessionId>,
) -> Redirect {
    act(&state, &browser, Action::Back).await
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(browser): Extension<BrowserSessionId>,
) -> Redirect {
    act(&state, &browser, Action::Logout).await
}

pub async fn download(
    State(state): State<AppState>,
    Extension(browser): Extension<BrowserSessionId>,
    Path(id): Path<MessageId>,
) -> Response {
    let workflow = state.workflow(&browser).await;
    let mut workflow = workflow.lock().await;

    match workflow.download_item(state.services(), id).await {
        Ok(blob) => {
            info!(browser_session = %browser, id, bytes = blob.bytes.len(), "Serving favorite");
            let disposition = content_disposition(&blob.item.filename);
            (
                [
                    (header::CONTENT_TYPE, blob.content_type().to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                blob.bytes,
            )
                .into_response()
        }
        Err(WorkflowError::MediaAbsent(_)) => {
            let notice = workflow.take_notice().unwrap_or_default();
            (StatusCode::NOT_FOUND, Html(pages::not_found(&notice))).into_response()
        }
        Err(_) => Redirect::to("/").into_response(),
    }
}

pub async fn archive(
    State(state): State<AppState>,
    Extension(browser): Extension<BrowserSessionId>,
) -> Response {
    let workflow = state.workflow(&browser).await;
    let mut workflow = workflow.lock().await;

    match workflow.download_archive(state.services()).await {
        Ok(archive) => {
            info!(
                browser_session = %browser,
                entries = archive.entries.len(),
                skipped = archive.skipped.len(),
                bytes = archive.bytes.len(),
                "Serving favorites archive"
            );
            (
                [
                    (header::CONTENT_TYPE, "application/zip".to_string()),
                    (header::CONTENT_DISPOSITION, content_disposition(ARCHIVE_FILE_NAME)),
                ],
                archive.bytes,
            )
                .into_response()
        }
        Err(_) => Redirect::to("/").into_response(),
    }
}

/// `attachment` disposition with an ASCII fallback and the UTF-8 name
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        percent_encode(filename)
    )
}

/// RFC 5987 value encoding
fn percent_encode(value: &str) -> String {
    use std::fmt::Write as _;

    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

//! HTML screens
//!
//! Plain server-rendered forms. Every piece of user or Telegram data goes
//! through `html_escape` before it lands in the markup.

use crate::favorites::FavoriteItem;
use crate::workflow::Page;
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write as _;

const STYLE: &str = "\
body{font-family:system-ui,sans-serif;max-width:760px;margin:2rem auto;padding:0 1rem;color:#222}\
h1{color:#0088cc}\
button,.button{background:#0088cc;color:#fff;border:0;border-radius:6px;padding:.5rem 1rem;\
cursor:pointer;text-decoration:none;display:inline-block}\
button.link{background:none;color:#0088cc;padding:0}\
input{padding:.45rem;border:1px solid #ccc;border-radius:6px;width:16rem}\
table{border-collapse:collapse;width:100%;margin-top:1rem}\
td,th{border-bottom:1px solid #eee;padding:.4rem;text-align:left}\
.notice{background:#fdecea;border-left:4px solid #d93025;padding:.6rem;margin:1rem 0}\
.muted{color:#777;font-size:.85rem}\
footer{margin-top:3rem}";

const FOOTER: &str =
    "This service uses the Telegram API and is not affiliated with Telegram Inc.";

/// Render the screen for `page`
///
/// `favorites` is only used on the dashboard; `None` there means listing failed.
#[must_use]
pub fn render(page: &Page, notice: Option<&str>, favorites: Option<&[FavoriteItem]>) -> String {
    let body = match page {
        Page::Landing => landing(),
        Page::Login => login(),
        Page::VerifyCode { pending } => verify_code(&pending.phone),
        Page::TwoFactor { .. } => two_factor(),
        Page::Dashboard { .. } => dashboard(favorites),
    };
    layout(&notice_block(notice), &body)
}

/// Page for a favorite that could not be found
#[must_use]
pub fn not_found(notice: &str) -> String {
    let body = "<p><a class=\"button\" href=\"/\">Back to favorites</a></p>";
    layout(&notice_block(Some(notice)), body)
}

fn layout(notice: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\
         <title>Telegram Favorites</title><style>{STYLE}</style></head>\
         <body><h1>Telegram Favorites</h1>{notice}{body}\
         <footer class=\"muted\">{FOOTER}</footer></body></html>"
    )
}

fn notice_block(notice: Option<&str>) -> String {
    notice.map_or_else(String::new, |text| {
        format!("<div class=\"notice\" role=\"alert\">{}</div>", encode_text(text))
    })
}

fn back_button() -> &'static str {
    "<form method=\"post\" action=\"/back\"><button class=\"link\" type=\"submit\">&larr; Back</button></form>"
}

fn landing() -> String {
    "<p>Browse and download the photos, videos and files you keep in your \
     Saved Messages.</p>\
     <form method=\"post\" action=\"/start\"><button type=\"submit\">Log in with Telegram</button></form>"
        .to_string()
}

fn login() -> String {
    format!(
        "<h2>Log in</h2>\
         <form method=\"post\" action=\"/login\">\
         <p><label>Phone number<br><input name=\"phone\" type=\"tel\" \
         placeholder=\"+10000000000\" autocomplete=\"tel\" required></label></p>\
         <p><button type=\"submit\">Send code</button></p></form>{}",
        back_button()
    )
}

fn verify_code(phone: &str) -> String {
    format!(
        "<h2>Enter the code</h2>\
         <p>Telegram sent a login code to <strong>{}</strong>.</p>\
         <form method=\"post\" action=\"/verify\">\
         <p><label>Code<br><input name=\"code\" inputmode=\"numeric\" \
         autocomplete=\"one-time-code\" required></label></p>\
         <p><button type=\"submit\">Verify</button></p></form>{}",
        encode_text(phone),
        back_button()
    )
}

fn two_factor() -> String {
    format!(
        "<h2>Two-step verification</h2>\
         <p>Your account is protected with an additional password.</p>\
         <form method=\"post\" action=\"/password\">\
         <p><label>Password<br><input name=\"password\" type=\"password\" \
         autocomplete=\"current-password\" required></label></p>\
         <p><button type=\"submit\">Log in</button></p></form>{}",
        back_button()
    )
}

fn dashboard(items: Option<&[FavoriteItem]>) -> String {
    let mut html = String::from(
        "<form method=\"post\" action=\"/logout\" style=\"float:right\">\
         <button type=\"submit\">Log out</button></form><h2>Your favorites</h2>",
    );
    let Some(items) = items else {
        html.push_str("<p>Could not load your favorites. Reload the page to try again.</p>");
        return html;
    };
    if items.is_empty() {
        html.push_str("<p>No favorites with media found.</p>");
        return html;
    }

    html.push_str("<p><a class=\"button\" href=\"/archive\">Download all (.zip)</a></p>");
    html.push_str("<table><tr><th>Date</th><th>Type</th><th>File</th><th>Size</th><th></th></tr>");
    for item in items {
        let _ = write!(
            html,
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td><a href=\"/download/{}\" title=\"{}\">Download</a></td></tr>",
            item.date.format("%Y-%m-%d %H:%M:%S"),
            item.kind.label(),
            encode_text(&item.filename),
            item.size.map_or_else(|| "-".to_string(), format_size),
            item.id,
            encode_double_quoted_attribute(&item.filename),
        );
    }
    html.push_str("</table>");
    html
}

/// Human-readable byte count
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

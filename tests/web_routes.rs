mod common;

use common::{photo, FakeAccount, Harness, GOOD_CODE};
use std::net::SocketAddr;
use std::time::Duration;
use tg_favorites::web::{self, AppState};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

struct Server {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
}

async fn start(harness: &Harness) -> Server {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = AppState::new(harness.services.clone(), Duration::from_secs(60));
    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(web::serve(listener, state, async {
        let _ = stopped.await;
    }));
    Server { addr, stop }
}

async fn send(addr: SocketAddr, method: &str, path: &str, cookie: Option<&str>, body: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    let mut request = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n");
    if let Some(cookie) = cookie {
        request.push_str(&format!("Cookie: {cookie}\r\n"));
    }
    if method == "POST" {
        request.push_str("Content-Type: application/x-www-form-urlencoded\r\n");
    }
    request.push_str(&format!("Content-Length: {}\r\n\r\n{body}", body.len()));
    stream.write_all(request.as_bytes()).await.expect("write");

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.expect("read");
    String::from_utf8_lossy(&response).into_owned()
}

fn session_cookie(response: &str) -> String {
    response
        .lines()
        .find_map(|line| line.strip_prefix("set-cookie: "))
        .and_then(|value| value.split(';').next())
        .expect("session cookie")
        .to_string()
}

#[tokio::test]
async fn health_needs_no_session() {
    let harness = Harness::new(FakeAccount::default());
    let server = start(&harness).await;

    let response = send(server.addr, "GET", "/health", None, "").await;
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("OK"));
    assert!(!response.to_lowercase().contains("set-cookie"));
    let _ = server.stop.send(());
}

#[tokio::test]
async fn login_through_forms_and_download() {
    let account = FakeAccount::default();
    account.push(photo(7), b"jpeg-bytes");
    let harness = Harness::new(account);
    let server = start(&harness).await;

    let landing = send(server.addr, "GET", "/", None, "").await;
    assert!(landing.contains("action=\"/start\""));
    let cookie = session_cookie(&landing);
    assert!(cookie.starts_with("tgfav_session="));

    let redirect = send(server.addr, "POST", "/start", Some(&cookie), "").await;
    assert!(redirect.starts_with("HTTP/1.1 303"));
    assert!(redirect.contains("location: /"));

    send(server.addr, "POST", "/login", Some(&cookie), "phone=%2B10000000000").await;
    let code_page = send(server.addr, "GET", "/", Some(&cookie), "").await;
    assert!(code_page.contains("action=\"/verify\""));

    send(server.addr, "POST", "/verify", Some(&cookie), &format!("code={GOOD_CODE}")).await;
    let dashboard = send(server.addr, "GET", "/", Some(&cookie), "").await;
    assert!(dashboard.contains("photo_7.jpg"));
    assert!(dashboard.contains("/download/7"));

    let file = send(server.addr, "GET", "/download/7", Some(&cookie), "").await;
    assert!(file.starts_with("HTTP/1.1 200"));
    assert!(file.contains("content-type: image/jpeg"));
    assert!(file.contains("attachment; filename=\"photo_7.jpg\""));
    assert!(file.ends_with("jpeg-bytes"));

    let missing = send(server.addr, "GET", "/download/8", Some(&cookie), "").await;
    assert!(missing.starts_with("HTTP/1.1 404"));
    assert!(missing.contains("no longer available"));

    let zip = send(server.addr, "GET", "/archive", Some(&cookie), "").await;
    assert!(zip.contains("content-type: application/zip"));
    assert!(zip.contains("telegram_favorites.zip"));

    send(server.addr, "POST", "/logout", Some(&cookie), "").await;
    let landing = send(server.addr, "GET", "/", Some(&cookie), "").await;
    assert!(landing.contains("action=\"/start\""));

    let _ = server.stop.send(());
    harness.assert_all_closed();
}

#[tokio::test]
async fn wrong_code_shows_notice() {
    let harness = Harness::new(FakeAccount::default());
    let server = start(&harness).await;

    let landing = send(server.addr, "GET", "/", None, "").await;
    let cookie = session_cookie(&landing);
    send(server.addr, "POST", "/start", Some(&cookie), "").await;
    send(server.addr, "POST", "/login", Some(&cookie), "phone=%2B10000000000").await;
    send(server.addr, "POST", "/verify", Some(&cookie), "code=00000").await;

    let page = send(server.addr, "GET", "/", Some(&cookie), "").await;
    assert!(page.contains("class=\"notice\""));
    assert!(page.contains("action=\"/verify\""));

    // Notice is shown once
    let page = send(server.addr, "GET", "/", Some(&cookie), "").await;
    assert!(!page.contains("class=\"notice\""));
    let _ = server.stop.send(());
}

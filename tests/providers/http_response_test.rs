//! HTTP response checking: success passthrough, key redaction, truncation.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use babushka::providers::{check_http_response, sanitize_http_error_body, ProviderError};

async fn serve_once(status_line: &str, body: &str) -> String {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => panic!("listener should bind: {err}"),
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => panic!("listener should expose local addr: {err}"),
    };

    let status_line_owned = status_line.to_owned();
    let body_owned = body.to_owned();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut read_buf = [0_u8; 1024];
            let _ = socket.read(&mut read_buf).await;

            let response = format!(
                "HTTP/1.1 {status_line_owned}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body_owned}",
                body_owned.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });

    format!("http://{addr}/")
}

async fn checked(status_line: &str, body: &str) -> Result<String, ProviderError> {
    let url = serve_once(status_line, body).await;
    let response = match reqwest::get(url).await {
        Ok(response) => response,
        Err(err) => panic!("request should complete: {err}"),
    };
    check_http_response(response).await
}

#[tokio::test]
async fn success_returns_body() {
    let result = checked("200 OK", "{\"ok\":true}").await;
    assert_eq!(result.ok().as_deref(), Some("{\"ok\":true}"));
}

#[tokio::test]
async fn check_http_response_redacts_api_keys() {
    let raw_key = "sk-ant-REDACTED";
    let err = match checked("401 Unauthorized", &format!("invalid x-api-key: {raw_key}")).await {
        Ok(_) => panic!("response should fail on non-success status"),
        Err(err) => err,
    };

    match err {
        ProviderError::HttpStatus { status, body } => {
            assert_eq!(status, 401);
            assert!(!body.contains(raw_key));
            assert!(body.contains("[REDACTED]"));
        }
        other => panic!("expected http status error, got: {other}"),
    }
}

#[tokio::test]
async fn check_http_response_truncates_long_error_body() {
    let err = match checked("500 Internal Server Error", &"x".repeat(400)).await {
        Ok(_) => panic!("response should fail on non-success status"),
        Err(err) => err,
    };

    match err {
        ProviderError::HttpStatus { body, .. } => {
            assert!(body.ends_with("...[truncated]"));
        }
        other => panic!("expected http status error, got: {other}"),
    }
}

#[test]
fn sanitize_collapses_whitespace() {
    assert_eq!(
        sanitize_http_error_body("  overloaded \n\t try   later "),
        "overloaded try later"
    );
}

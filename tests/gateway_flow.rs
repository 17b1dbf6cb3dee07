//! End-to-end tests: gateway in front of a mock link service and file host.

use serde_json::{json, Value};

use download_gateway::security::SignatureVerifier;

mod common;

use common::{
    client, gateway_config, link_ok, FileHost, Gateway, LinkService, LogCapture, FILE_BODY, TOKEN,
};

fn signed(path: &str) -> String {
    let sign = SignatureVerifier::new(TOKEN.as_bytes()).sign(path, 0);
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("sign", &sign)
        .finish()
}

fn assert_gateway_cors(response: &reqwest::Response) {
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "GET,HEAD,OPTIONS");
    assert_eq!(
        headers["access-control-allow-headers"],
        "Range,Content-Type,Authorization"
    );
    assert_eq!(
        headers["access-control-expose-headers"],
        "Content-Length,Content-Range,Accept-Ranges"
    );
}

#[tokio::test]
async fn domestic_caller_gets_partial_content_streamed() {
    let files = FileHost::start().await;
    let links = LinkService::start(link_ok(
        &files.link("/movies/a.mkv"),
        json!({ "X-Upstream-Hint": ["from-link"], "Range": ["bytes=100-200"] }),
    ))
    .await;
    let gateway = Gateway::start(gateway_config(&links.url())).await;

    let response = client()
        .get(gateway.url(&format!("/movies/a.mkv?{}", signed("/movies/a.mkv"))))
        .header("range", "bytes=0-4")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 206);
    assert!(response.headers().get("location").is_none());
    assert!(response.headers().get("set-cookie").is_none());
    assert_gateway_cors(&response);
    assert_eq!(response.headers()["content-range"], "bytes 0-4/20");
    assert_eq!(response.headers()["accept-ranges"], "bytes");
    // Caller's Range wins over the suggested one; other suggestions are added.
    assert_eq!(response.headers()["x-seen-range"], "bytes=0-4");
    assert_eq!(response.headers()["x-seen-hint"], "from-link");
    assert_eq!(
        response.headers()["x-seen-host"].to_str().unwrap(),
        files.addr.to_string()
    );
    // The gateway's request ID is returned to the caller, not sent to the file host.
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-seen-request-id"], "");
    assert_eq!(response.text().await.unwrap(), "hello");

    assert_eq!(links.calls(), 1);
    let requests = links.requests();
    assert_eq!(requests[0].0.as_deref(), Some(TOKEN));
    assert_eq!(requests[0].1, json!({ "path": "/movies/a.mkv" }));
    assert_eq!(files.calls(), 1);
}

#[tokio::test]
async fn full_download_is_not_reported_as_abort() {
    let logs = LogCapture::default();
    let _guard = logs.install();

    let files = FileHost::start().await;
    let links = LinkService::start(link_ok(&files.link("/a.bin"), json!({}))).await;
    let gateway = Gateway::start(gateway_config(&links.url())).await;

    let response = client()
        .get(gateway.url(&format!("/a.bin?{}", signed("/a.bin"))))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.content_length(), Some(FILE_BODY.len() as u64));
    assert_eq!(response.text().await.unwrap(), FILE_BODY);

    // Let the server drop the finished body.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let output = logs.contents();
    assert!(output.contains("Stream complete"), "{}", output);
    assert!(!output.contains("caller disconnected"), "{}", output);
    assert!(!output.contains("failed mid-stream"), "{}", output);
}

#[tokio::test]
async fn download_manager_is_redirected() {
    let files = FileHost::start().await;
    let links = LinkService::start(link_ok(&files.link("/movies/a.mkv"), json!({}))).await;
    let gateway = Gateway::start(gateway_config(&links.url())).await;

    let response = client()
        .get(gateway.url(&format!("/movies/a.mkv?{}", signed("/movies/a.mkv"))))
        .header("user-agent", "Wget/1.21")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 302);
    assert_eq!(
        response.headers()["location"].to_str().unwrap(),
        format!("http://{}/movies/a.mkv", files.addr)
    );
    assert_gateway_cors(&response);
    assert_eq!(links.calls(), 1);
    assert_eq!(files.calls(), 0);
}

#[tokio::test]
async fn client_ua_override_takes_precedence() {
    let files = FileHost::start().await;
    let links = LinkService::start(link_ok(&files.link("/a.bin"), json!({}))).await;
    let gateway = Gateway::start(gateway_config(&links.url())).await;

    let response = client()
        .get(gateway.url(&format!("/a.bin?{}", signed("/a.bin"))))
        .header("user-agent", "Mozilla/5.0")
        .header("x-client-ua", "aria2/1.36.0")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 302);
    assert_eq!(files.calls(), 0);
}

#[tokio::test]
async fn foreign_caller_is_redirected() {
    let files = FileHost::start().await;
    let links = LinkService::start(link_ok(&files.link("/a.bin"), json!({}))).await;
    let gateway = Gateway::start(gateway_config(&links.url())).await;

    let response = client()
        .get(gateway.url(&format!("/a.bin?{}", signed("/a.bin"))))
        .header("x-forwarded-for", "8.8.8.8, 10.0.0.1")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 302);
    assert_eq!(files.calls(), 0);
}

#[tokio::test]
async fn failed_geo_lookup_counts_as_domestic() {
    let files = FileHost::start().await;
    let links = LinkService::start(link_ok(&files.link("/a.bin"), json!({}))).await;
    let gateway = Gateway::start(gateway_config(&links.url())).await;

    let response = client()
        .get(gateway.url(&format!("/a.bin?{}", signed("/a.bin"))))
        .header("x-real-ip", "192.0.2.1")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), FILE_BODY);
}

#[tokio::test]
async fn business_error_is_passed_through() {
    let files = FileHost::start().await;
    let links = LinkService::start(json!({ "code": 403, "message": "path not allowed" })).await;
    let gateway = Gateway::start(gateway_config(&links.url())).await;

    let response = client()
        .get(gateway.url(&format!("/secret.bin?{}", signed("/secret.bin"))))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    assert_gateway_cors(&response);
    assert_eq!(
        response.headers()["content-type"],
        "application/json; charset=utf-8"
    );
    assert_eq!(
        response.text().await.unwrap(),
        r#"{"code":403,"msg":"path not allowed"}"#
    );
    assert_eq!(links.calls(), 1);
    assert_eq!(files.calls(), 0);
}

#[tokio::test]
async fn disabled_signing_accepts_unsigned_requests() {
    let files = FileHost::start().await;
    let links = LinkService::start(link_ok(&files.link("/a.bin"), json!({}))).await;
    let mut config = gateway_config(&links.url());
    config.security.disable_sign = true;
    let gateway = Gateway::start(config).await;

    let response = client().get(gateway.url("/a.bin")).send().await.unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), FILE_BODY);
    assert_eq!(links.requests()[0].1, json!({ "path": "/a.bin" }));
}

#[tokio::test]
async fn bad_signatures_are_rejected_before_resolution() {
    let links = LinkService::start(link_ok("//127.0.0.1:1/a.bin", json!({}))).await;
    let gateway = Gateway::start(gateway_config(&links.url())).await;
    let client = client();

    let cases = [
        ("/a.bin".to_string(), "expire missing"),
        (format!("/a.bin?{}", signed("/b.bin")), "sign invalid"),
        ("/a.bin?sign=abc:soon".to_string(), "expire invalid"),
        ("/a.bin?sign=abc:1".to_string(), "sign expired"),
    ];

    for (uri, message) in cases {
        let response = client.get(gateway.url(&uri)).send().await.unwrap();
        assert_eq!(response.status(), 401, "{}", uri);
        assert_gateway_cors(&response);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "code": 401, "msg": message }));
    }
    assert_eq!(links.calls(), 0);
}

#[tokio::test]
async fn signature_covers_the_decoded_path() {
    let files = FileHost::start().await;
    let links = LinkService::start(link_ok(&files.link("/a%20b.bin"), json!({}))).await;
    let gateway = Gateway::start(gateway_config(&links.url())).await;

    let response = client()
        .get(gateway.url(&format!("/dir/a%20b.bin?{}", signed("/dir/a b.bin"))))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(links.requests()[0].1, json!({ "path": "/dir/a b.bin" }));
}

#[tokio::test]
async fn unsupported_methods_are_rejected() {
    let links = LinkService::start(link_ok("//127.0.0.1:1/a.bin", json!({}))).await;
    let gateway = Gateway::start(gateway_config(&links.url())).await;

    let response = client()
        .post(gateway.url(&format!("/a.bin?{}", signed("/a.bin"))))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 405);
    assert_gateway_cors(&response);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "code": 405, "msg": "Only GET/HEAD/OPTIONS are allowed" })
    );
    assert_eq!(links.calls(), 0);
}

#[tokio::test]
async fn preflight_needs_no_signature() {
    let links = LinkService::start(link_ok("//127.0.0.1:1/a.bin", json!({}))).await;
    let gateway = Gateway::start(gateway_config(&links.url())).await;

    let response = client()
        .request(reqwest::Method::OPTIONS, gateway.url("/any/path"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 204);
    assert_gateway_cors(&response);
    assert!(response.bytes().await.unwrap().is_empty());
    assert_eq!(links.calls(), 0);
}

#[tokio::test]
async fn head_is_proxied_without_body() {
    let files = FileHost::start().await;
    let links = LinkService::start(link_ok(&files.link("/a.bin"), json!({}))).await;
    let gateway = Gateway::start(gateway_config(&links.url())).await;

    let response = client()
        .head(gateway.url(&format!("/a.bin?{}", signed("/a.bin"))))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-seen-method"], "HEAD");
    assert!(response.headers().get("set-cookie").is_none());
    assert_gateway_cors(&response);
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_link_service_is_bad_gateway() {
    let gateway = Gateway::start(gateway_config("http://127.0.0.1:1")).await;

    let response = client()
        .get(gateway.url(&format!("/a.bin?{}", signed("/a.bin"))))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    assert_gateway_cors(&response);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 502);
}

#[tokio::test]
async fn unreachable_file_host_is_bad_gateway() {
    let links = LinkService::start(link_ok("http://127.0.0.1:1/a.bin", json!({}))).await;
    let gateway = Gateway::start(gateway_config(&links.url())).await;

    let response = client()
        .get(gateway.url(&format!("/a.bin?{}", signed("/a.bin"))))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], 502);
    assert_eq!(links.calls(), 1);
}

#[tokio::test]
async fn empty_link_is_bad_gateway() {
    let links = LinkService::start(link_ok("", json!({}))).await;
    let gateway = Gateway::start(gateway_config(&links.url())).await;

    let response = client()
        .get(gateway.url(&format!("/a.bin?{}", signed("/a.bin"))))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["msg"], "upstream returned an empty link");
}

use filegate::{
    FileBackend, GatewayError, HttpFileBackend, ProviderSettings,
    backend::settings_from_pairs,
};
use httpmock::Method::{DELETE, GET, POST};
use httpmock::MockServer;
use serde_json::json;

fn backend_for(server: &MockServer) -> HttpFileBackend {
    HttpFileBackend::new()
        .expect("http client")
        .with_api_base(server.base_url())
        .with_api_key("sk-default")
}

#[tokio::test]
async fn retrieve_hits_the_files_endpoint_with_bearer_auth() {
    let upstream = MockServer::start();
    let mock = upstream.mock(|when, then| {
        when.method(GET)
            .path("/files/file-abc")
            .header("authorization", "Bearer sk-default");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id":"file-abc","object":"file","purpose":"batch"}"#);
    });

    let backend = backend_for(&upstream);
    let reply = backend
        .retrieve_file("openai", &ProviderSettings::new(), "file-abc")
        .await
        .expect("retrieve");

    mock.assert();
    assert_eq!(reply.body["id"], "file-abc");
    assert_eq!(reply.meta.api_base.as_deref(), Some(upstream.base_url().as_str()));
    assert!(reply.content.is_none());
}

#[tokio::test]
async fn settings_override_base_url_and_key() {
    let upstream = MockServer::start();
    let mock = upstream.mock(|when, then| {
        when.method(GET)
            .path("/custom/files/file-1")
            .header("authorization", "Bearer sk-override");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id":"file-1"}"#);
    });

    // defaults point somewhere unroutable; only the overrides can succeed
    let backend = HttpFileBackend::new()
        .expect("http client")
        .with_api_base("http://127.0.0.1:9")
        .with_api_key("sk-default");
    let settings = settings_from_pairs([
        ("api_base", format!("{}/custom", upstream.base_url())),
        ("api_key", "sk-override".to_string()),
    ]);
    let reply = backend
        .retrieve_file("openai", &settings, "file-1")
        .await
        .expect("retrieve with overrides");

    mock.assert();
    assert_eq!(reply.body["id"], "file-1");
}

#[tokio::test]
async fn create_posts_a_multipart_form_with_purpose_and_file() {
    let upstream = MockServer::start();
    let mock = upstream.mock(|when, then| {
        when.method(POST)
            .path("/files")
            .header_exists("content-type")
            .body_includes("name=\"purpose\"")
            .body_includes("batch")
            .body_includes("filename=\"batch.jsonl\"")
            .body_includes("{\"custom_id\": \"1\"}");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id":"file-new","object":"file"}"#);
    });

    let backend = backend_for(&upstream);
    let upload = filegate::CreateFileUpload {
        filename: "batch.jsonl".to_string(),
        content_type: Some("application/json".to_string()),
        bytes: bytes::Bytes::from_static(b"{\"custom_id\": \"1\"}\n"),
        purpose: "batch".to_string(),
    };
    let reply = backend
        .create_file("openai", &ProviderSettings::new(), upload)
        .await
        .expect("create");

    mock.assert();
    assert_eq!(reply.body["id"], "file-new");
}

#[tokio::test]
async fn delete_and_list_use_the_expected_paths() {
    let upstream = MockServer::start();
    let delete_mock = upstream.mock(|when, then| {
        when.method(DELETE).path("/files/file-gone");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id":"file-gone","deleted":true}"#);
    });
    let list_mock = upstream.mock(|when, then| {
        when.method(GET)
            .path("/files")
            .query_param("purpose", "batch");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({"object": "list", "data": []}));
    });

    let backend = backend_for(&upstream);
    let deleted = backend
        .delete_file("openai", &ProviderSettings::new(), "file-gone")
        .await
        .expect("delete");
    assert_eq!(deleted.body["deleted"], true);

    let listed = backend
        .list_files("openai", &ProviderSettings::new(), Some("batch"))
        .await
        .expect("list");
    assert_eq!(listed.body["object"], "list");

    delete_mock.assert();
    list_mock.assert();
}

#[tokio::test]
async fn content_wraps_the_raw_transport_response() {
    let upstream = MockServer::start();
    let mock = upstream.mock(|when, then| {
        when.method(GET).path("/files/file-abc/content");
        then.status(200)
            .header("content-type", "application/jsonl")
            .body("{\"custom_id\": \"1\"}\n{\"custom_id\": \"2\"}\n");
    });

    let backend = backend_for(&upstream);
    let reply = backend
        .file_content("openai", &ProviderSettings::new(), "file-abc")
        .await
        .expect("content");

    mock.assert();
    let raw = reply.content.expect("wrapped transport response");
    assert_eq!(raw.status, 200);
    assert_eq!(
        &raw.body[..],
        b"{\"custom_id\": \"1\"}\n{\"custom_id\": \"2\"}\n"
    );
    assert!(
        raw.headers
            .iter()
            .any(|(name, value)| name == "content-type" && value == "application/jsonl")
    );
}

#[tokio::test]
async fn upstream_failures_keep_their_status_and_body() {
    let upstream = MockServer::start();
    let mock = upstream.mock(|when, then| {
        when.method(GET).path("/files/file-missing");
        then.status(404)
            .header("content-type", "application/json")
            .body(r#"{"error": {"message": "No such file object"}}"#);
    });

    let backend = backend_for(&upstream);
    let err = backend
        .retrieve_file("openai", &ProviderSettings::new(), "file-missing")
        .await
        .expect_err("upstream 404");

    mock.assert();
    let GatewayError::Backend { status, message } = err else {
        panic!("expected a backend error, got {err}");
    };
    assert_eq!(status, 404);
    assert!(message.contains("No such file object"));
}

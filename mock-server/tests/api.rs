use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Pipeline, Stage, StreakBox};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tower::ServiceExt;

// base64("test-key:")
const AUTH: &str = "Basic dGVzdC1rZXk6";

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get_request(uri: &str) -> Request<String> {
    Request::builder()
        .uri(uri)
        .header(http::header::AUTHORIZATION, AUTH)
        .body(String::new())
        .unwrap()
}

fn delete_request(uri: &str) -> Request<String> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(http::header::AUTHORIZATION, AUTH)
        .body(String::new())
        .unwrap()
}

fn form_request(uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header(http::header::AUTHORIZATION, AUTH)
        .header(
            http::header::CONTENT_TYPE,
            "application/x-www-form-urlencoded",
        )
        .body(body.to_string())
        .unwrap()
}

fn json_request(uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(http::header::AUTHORIZATION, AUTH)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn assert_marker(body: &JsonValue, message: &str) {
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], message);
}

// --- auth ---

#[tokio::test]
async fn missing_auth_is_rejected_with_marker() {
    let resp = app()
        .oneshot(
            Request::builder()
                .uri("/api/v1/pipelines/")
                .body(String::new())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: JsonValue = body_json(resp).await;
    assert_marker(&body, "Authentication required");
}

// --- users ---

#[tokio::test]
async fn users_me_returns_current_user() {
    let resp = app().oneshot(get_request("/api/v1/users/me")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body: JsonValue = body_json(resp).await;
    assert_eq!(body["displayName"], "Mock User");
    assert!(body.get("success").is_none());
}

#[tokio::test]
async fn unknown_user_has_marker() {
    let resp = app()
        .oneshot(get_request("/api/v1/users/somebody-else"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: JsonValue = body_json(resp).await;
    assert_marker(&body, "User not found");
}

// --- pipelines ---

#[tokio::test]
async fn list_pipelines_empty() {
    let resp = app().oneshot(get_request("/api/v1/pipelines/")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let pipelines: Vec<Pipeline> = body_json(resp).await;
    assert!(pipelines.is_empty());
}

#[tokio::test]
async fn create_pipeline_reads_form_body() {
    let resp = app()
        .oneshot(form_request(
            "/api/v1/pipelines/",
            "name=Sales%20Team&stageNames=Lead,Won",
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let pipeline: Pipeline = body_json(resp).await;
    assert_eq!(pipeline.name, "Sales Team");
    assert!(!pipeline.pipeline_key.is_empty());
    assert_eq!(pipeline.stage_order.len(), 2);
}

#[tokio::test]
async fn create_pipeline_without_name_has_marker() {
    let resp = app()
        .oneshot(form_request("/api/v1/pipelines/", "description=nameless"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: JsonValue = body_json(resp).await;
    assert_marker(&body, "name is required");
}

#[tokio::test]
async fn get_pipeline_not_found() {
    let resp = app()
        .oneshot(get_request("/api/v1/pipelines/missing"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: JsonValue = body_json(resp).await;
    assert_marker(&body, "Pipeline not found");
}

#[tokio::test]
async fn edit_pipeline_not_found() {
    let resp = app()
        .oneshot(json_request("/api/v1/pipelines/missing", r#"{"name":"Nope"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_box_not_found() {
    let resp = app()
        .oneshot(delete_request("/api/v1/boxes/missing"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: JsonValue = body_json(resp).await;
    assert_eq!(body["success"], false);
}

// --- full lifecycle ---

#[tokio::test]
async fn pipeline_lifecycle() {
    use tower::Service;

    let mut app = app().into_service();

    // create pipeline
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request("/api/v1/pipelines/", "name=Sales"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let pipeline: Pipeline = body_json(resp).await;
    let pk = pipeline.pipeline_key;

    // add a stage; stage listing is an object keyed by stage key
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(&format!("/api/v1/pipelines/{pk}/stages"), "name=Lead"))
        .await
        .unwrap();
    let stage: Stage = body_json(resp).await;

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request(&format!("/api/v1/pipelines/{pk}/stages")))
        .await
        .unwrap();
    let stages: BTreeMap<String, Stage> = body_json(resp).await;
    assert_eq!(stages.len(), 1);
    assert_eq!(stages[&stage.key].name, "Lead");

    // create a box; it lands in the first stage
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(&format!("/api/v1/pipelines/{pk}/boxes"), "name=Acme"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let created: StreakBox = body_json(resp).await;
    assert_eq!(created.stage_key, stage.key);
    let bk = created.box_key;

    // define a field and set its value on the box
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(form_request(
            &format!("/api/v1/pipelines/{pk}/fields"),
            "name=Budget&type=TEXT_INPUT",
        ))
        .await
        .unwrap();
    let field: JsonValue = body_json(resp).await;
    let fk = field["key"].as_str().unwrap().to_string();

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            &format!("/api/v1/boxes/{bk}/fields/{fk}"),
            r#"{"value":"10k"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request(&format!("/api/v1/boxes/{bk}/fields")))
        .await
        .unwrap();
    let values: JsonValue = body_json(resp).await;
    assert_eq!(values[0]["key"], fk.as_str());
    assert_eq!(values[0]["value"], "10k");

    // rename through JSON POST
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request(
            &format!("/api/v1/pipelines/{pk}"),
            r#"{"name":"Renamed"}"#,
        ))
        .await
        .unwrap();
    let renamed: Pipeline = body_json(resp).await;
    assert_eq!(renamed.name, "Renamed");

    // delete the pipeline; its boxes go with it
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(delete_request(&format!("/api/v1/pipelines/{pk}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_bytes(resp).await;
    assert_eq!(&body[..], br#"{"success":true}"#);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request(&format!("/api/v1/boxes/{bk}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(get_request("/api/v1/pipelines/"))
        .await
        .unwrap();
    let pipelines: Vec<Pipeline> = body_json(resp).await;
    assert!(pipelines.is_empty());
}

//! Integration tests for the Lattice REST clients
//!
//! Each test starts an in-process axum server on an ephemeral port that
//! plays the part of the Lattice API and records what the client sent.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use recon_common::client::{EntityClient, LatticeHttp, TaskClient};
use recon_common::config::LatticeEndpoint;
use recon_common::lattice::{
    AgentListener, EntityIdsSelector, EntityOverride, Principal, TaskStatusUpdate, WireEntity,
    WireProvenance, WireTaskStatus,
};
use recon_common::Error;
use serde_json::{json, Value};

/// Requests captured by the fake server
#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(String, Value)>>>,
    auth_headers: Arc<Mutex<Vec<(String, String)>>>,
}

impl Captured {
    fn record(&self, route: &str, headers: &HeaderMap, body: Value) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let sandbox = headers
            .get("anduril-sandbox-authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.auth_headers.lock().unwrap().push((auth, sandbox));
        self.requests.lock().unwrap().push((route.to_string(), body));
    }

    fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

async fn events(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    captured.record("events", &headers, body);
    Json(json!({
        "sessionToken": "next-token",
        "entityEvents": [{
            "eventType": "EVENT_TYPE_UPDATE",
            "entity": {
                "entityId": "asset-01",
                "location": {"position": {"latitudeDegrees": 0.0, "longitudeDegrees": 0.0}},
                "ontology": {"template": "TEMPLATE_ASSET"}
            }
        }]
    }))
}

async fn override_field(
    State(captured): State<Captured>,
    Path((entity_id, field_path)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    captured.record(&format!("override:{}:{}", entity_id, field_path), &headers, body);
    StatusCode::OK
}

async fn create_task(
    State(captured): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    captured.record("create_task", &headers, body);
    Json(json!({
        "version": {"taskId": "task-42", "definitionVersion": 1, "statusVersion": 1},
        "status": {"status": "STATUS_CREATED"}
    }))
}

async fn get_task(Path(task_id): Path<String>) -> Result<Json<Value>, StatusCode> {
    if task_id == "missing" {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(json!({
        "version": {"taskId": task_id},
        "status": {"status": "STATUS_EXECUTING"}
    })))
}

async fn update_status(
    State(captured): State<Captured>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    captured.record(&format!("status:{}", task_id), &headers, body);
    StatusCode::OK
}

async fn listen(State(captured): State<Captured>, headers: HeaderMap, Json(body): Json<Value>) -> String {
    captured.record("listen", &headers, body);
    // No work pending: the service answers with an empty body
    String::new()
}

async fn get_entity(Path(entity_id): Path<String>) -> Json<Value> {
    Json(json!({
        "entityId": entity_id,
        "ontology": {"template": "TEMPLATE_TRACK"}
    }))
}

async fn start_fake_lattice() -> (LatticeHttp, Captured) {
    let captured = Captured::default();
    let app = Router::new()
        .route("/api/v1/entities/events", post(events))
        .route("/api/v1/entities/:entity_id", get(get_entity))
        .route("/api/v1/entities/:entity_id/override/:field_path", put(override_field))
        .route("/api/v1/tasks", post(create_task))
        .route("/api/v1/tasks/:task_id", get(get_task))
        .route("/api/v1/tasks/:task_id/status", put(update_status))
        .route("/api/v1/agent/listen", post(listen))
        .with_state(captured.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let endpoint = LatticeEndpoint {
        base_url: format!("http://{}", addr),
        bearer_token: "secret".to_string(),
        sandbox_token: Some("sandbox".to_string()),
        request_timeout_secs: 5,
    };
    (LatticeHttp::new(&endpoint).unwrap(), captured)
}

#[tokio::test]
async fn test_long_poll_sends_session_token_and_auth() {
    let (http, captured) = start_fake_lattice().await;
    let client = EntityClient::new(http);

    let response = client.long_poll_events("prev-token").await.unwrap();
    assert_eq!(response.session_token, "next-token");
    assert_eq!(response.entity_events.len(), 1);

    let requests = captured.requests();
    assert_eq!(requests[0].0, "events");
    assert_eq!(requests[0].1["sessionToken"], "prev-token");

    let auth = captured.auth_headers.lock().unwrap().clone();
    assert_eq!(auth[0].0, "Bearer secret");
    assert_eq!(auth[0].1, "Bearer sandbox");
}

#[tokio::test]
async fn test_override_hits_field_path() {
    let (http, captured) = start_fake_lattice().await;
    let client = EntityClient::new(http);

    let entity_override = EntityOverride {
        entity: WireEntity {
            entity_id: "track-01".to_string(),
            ..Default::default()
        },
        provenance: WireProvenance {
            integration_name: Some("auto-reconnaissance".to_string()),
            ..Default::default()
        },
    };
    client
        .put_override("track-01", "mil_view.disposition", &entity_override)
        .await
        .unwrap();

    let requests = captured.requests();
    assert_eq!(requests[0].0, "override:track-01:mil_view.disposition");
    assert_eq!(requests[0].1["entity"]["entityId"], "track-01");
    assert_eq!(requests[0].1["provenance"]["integrationName"], "auto-reconnaissance");
}

#[tokio::test]
async fn test_get_entity() {
    let (http, _captured) = start_fake_lattice().await;
    let client = EntityClient::new(http);

    let entity = client.get_entity("track-99").await.unwrap();
    assert_eq!(entity.entity_id, "track-99");
}

#[tokio::test]
async fn test_task_lifecycle_calls() {
    let (http, captured) = start_fake_lattice().await;
    let client = TaskClient::new(http);

    let creation = serde_json::from_value(json!({
        "displayName": "Asset a -> Track t",
        "description": "d",
        "specification": {"@type": "x"},
        "author": {"system": {"serviceName": "svc"}},
        "relations": {"assignee": {"system": {"entityId": "a"}}},
        "isExecutedElsewhere": false,
        "initialEntities": []
    }))
    .unwrap();
    let task = client.create_task(&creation).await.unwrap();
    assert_eq!(task.task_id(), Some("task-42"));

    let task = client.get_task("task-42").await.unwrap();
    assert_eq!(task.status.unwrap().status, "STATUS_EXECUTING");

    let update = TaskStatusUpdate {
        new_status: WireTaskStatus {
            status: "STATUS_EXECUTING".to_string(),
        },
        author: Principal::entity("a"),
        status_version: 3,
    };
    client.update_task_status("task-42", &update).await.unwrap();

    let requests = captured.requests();
    assert_eq!(requests[0].0, "create_task");
    assert_eq!(requests[0].1["displayName"], "Asset a -> Track t");
    assert_eq!(requests[1].0, "status:task-42");
    assert_eq!(requests[1].1["statusVersion"], 3);
    assert_eq!(requests[1].1["author"]["system"]["entityId"], "a");
}

#[tokio::test]
async fn test_not_found_maps_to_api_error() {
    let (http, _captured) = start_fake_lattice().await;
    let client = TaskClient::new(http);

    match client.get_task("missing").await {
        Err(Error::Api { status, .. }) => assert_eq!(status, 404),
        other => panic!("expected API error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_listen_response_is_no_work() {
    let (http, captured) = start_fake_lattice().await;
    let client = TaskClient::new(http);

    let listener = AgentListener {
        agent_selector: EntityIdsSelector {
            entity_ids: vec!["asset-01".to_string()],
        },
    };
    let request = client.listen_as_agent(&listener).await.unwrap();
    assert!(request.execute_request.is_none());
    assert!(request.cancel_request.is_none());

    let requests = captured.requests();
    assert_eq!(requests[0].1["agentSelector"]["entityIds"][0], "asset-01");
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    // Bind then drop to get a port nobody listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let endpoint = LatticeEndpoint {
        base_url: format!("http://{}", addr),
        bearer_token: "secret".to_string(),
        sandbox_token: None,
        request_timeout_secs: 2,
    };
    let client = EntityClient::new(LatticeHttp::new(&endpoint).unwrap());

    let err = client.long_poll_events("").await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert!(err.is_transient());
}

//! Entity ingestion: routing into caches, malformed payloads, poll loop
//! backoff and session token handling

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakeEntities;
use recon_arbiter::cache::EntityCache;
use recon_arbiter::ingest::{EntityIngestor, IngestConfig, Route};
use recon_common::config::TrackFilter;
use recon_common::lattice::{EntityEventResponse, WireEntity};
use recon_common::{Disposition, Error};
use serde_json::json;
use tokio_util::sync::CancellationToken;

struct Setup {
    entities: Arc<FakeEntities>,
    assets: Arc<EntityCache>,
    tracks: Arc<EntityCache>,
    ingestor: EntityIngestor,
}

fn setup(track_filter: TrackFilter) -> Setup {
    let entities = Arc::new(FakeEntities::default());
    let assets = Arc::new(EntityCache::new(10));
    let tracks = Arc::new(EntityCache::new(10));
    let config = IngestConfig {
        poll_interval: Duration::from_millis(100),
        error_backoff: Duration::from_secs(30),
        track_filter,
    };
    let ingestor = EntityIngestor::new(
        entities.clone(),
        Arc::clone(&assets),
        Arc::clone(&tracks),
        config,
    );
    Setup {
        entities,
        assets,
        tracks,
        ingestor,
    }
}

fn wire(id: &str, template: &str, disposition: &str) -> serde_json::Value {
    json!({
        "entityId": id,
        "location": {"position": {"latitudeDegrees": 1.0, "longitudeDegrees": 2.0}, "speedMps": 3.0},
        "milView": {"disposition": disposition},
        "ontology": {"template": template}
    })
}

fn response(token: &str, entities: Vec<serde_json::Value>) -> EntityEventResponse {
    let events: Vec<_> = entities
        .into_iter()
        .map(|entity| json!({"eventType": "EVENT_TYPE_UPDATE", "entity": entity}))
        .collect();
    serde_json::from_value(json!({"sessionToken": token, "entityEvents": events})).unwrap()
}

#[tokio::test]
async fn test_poll_routes_assets_and_tracks() {
    let s = setup(TrackFilter::NonFriendly);
    s.entities.script(Ok(response(
        "t1",
        vec![
            wire("asset-1", "TEMPLATE_ASSET", "DISPOSITION_FRIENDLY"),
            wire("track-1", "TEMPLATE_TRACK", "DISPOSITION_UNKNOWN"),
            wire("track-2", "TEMPLATE_TRACK", "DISPOSITION_FRIENDLY"),
            wire("poi-1", "TEMPLATE_GEO", "DISPOSITION_HOSTILE"),
        ],
    )));

    let token = s.ingestor.poll_once("").await.unwrap();

    assert_eq!(token, "t1");
    assert_eq!(s.assets.len().await, 1);
    assert_eq!(s.tracks.len().await, 1);
    let cached = s.tracks.get("track-1").await.unwrap();
    assert_eq!(cached.disposition, Disposition::Unknown);
    assert_eq!(cached.speed_mps, 3.0);

    let stats = s.ingestor.stats().snapshot();
    assert_eq!(stats.events, 4);
    assert_eq!(stats.assets_routed, 1);
    assert_eq!(stats.tracks_routed, 1);
    assert_eq!(stats.dropped, 2);
}

#[tokio::test]
async fn test_strict_filter_keeps_only_escalated_tracks() {
    let s = setup(TrackFilter::SuspiciousOrHostile);
    s.entities.script(Ok(response(
        "",
        vec![
            wire("track-1", "TEMPLATE_TRACK", "DISPOSITION_UNKNOWN"),
            wire("track-2", "TEMPLATE_TRACK", "DISPOSITION_SUSPICIOUS"),
            wire("track-3", "TEMPLATE_TRACK", "DISPOSITION_HOSTILE"),
        ],
    )));

    s.ingestor.poll_once("").await.unwrap();

    assert_eq!(s.tracks.len().await, 2);
    assert!(s.tracks.get("track-1").await.is_none());
}

#[tokio::test]
async fn test_later_sighting_replaces_snapshot() {
    let s = setup(TrackFilter::NonFriendly);
    s.entities.script(Ok(response("", vec![wire("track-1", "TEMPLATE_TRACK", "DISPOSITION_UNKNOWN")])));
    s.entities.script(Ok(response("", vec![wire("track-1", "TEMPLATE_TRACK", "DISPOSITION_HOSTILE")])));

    s.ingestor.poll_once("").await.unwrap();
    s.ingestor.poll_once("").await.unwrap();

    assert_eq!(s.tracks.len().await, 1);
    assert_eq!(s.tracks.get("track-1").await.unwrap().disposition, Disposition::Hostile);
}

#[tokio::test]
async fn test_track_turning_friendly_is_removed() {
    let s = setup(TrackFilter::NonFriendly);
    s.entities.script(Ok(response("", vec![wire("track-1", "TEMPLATE_TRACK", "DISPOSITION_UNKNOWN")])));
    s.entities.script(Ok(response("", vec![wire("track-1", "TEMPLATE_TRACK", "DISPOSITION_FRIENDLY")])));

    s.ingestor.poll_once("").await.unwrap();
    assert_eq!(s.tracks.len().await, 1);
    s.ingestor.poll_once("").await.unwrap();

    assert_eq!(s.tracks.len().await, 0);
}

#[tokio::test]
async fn test_deleted_entity_is_removed() {
    let s = setup(TrackFilter::NonFriendly);
    s.entities.script(Ok(response("", vec![wire("asset-1", "TEMPLATE_ASSET", "DISPOSITION_FRIENDLY")])));
    let deleted: EntityEventResponse = serde_json::from_value(json!({
        "entityEvents": [{"eventType": "EVENT_TYPE_DELETED", "entity": {"entityId": "asset-1"}}]
    }))
    .unwrap();
    s.entities.script(Ok(deleted));

    s.ingestor.poll_once("").await.unwrap();
    s.ingestor.poll_once("").await.unwrap();

    assert!(s.assets.is_empty().await);
}

#[tokio::test]
async fn test_malformed_entities_are_dropped() {
    let s = setup(TrackFilter::NonFriendly);
    s.entities.script(Ok(response(
        "",
        vec![
            // No id
            wire("", "TEMPLATE_TRACK", "DISPOSITION_HOSTILE"),
            // No position
            json!({"entityId": "track-2", "ontology": {"template": "TEMPLATE_TRACK"}}),
            // Latitude out of range
            json!({
                "entityId": "track-3",
                "location": {"position": {"latitudeDegrees": 95.0, "longitudeDegrees": 0.0}},
                "ontology": {"template": "TEMPLATE_TRACK"}
            }),
            // No template
            json!({
                "entityId": "track-4",
                "location": {"position": {"latitudeDegrees": 1.0, "longitudeDegrees": 0.0}}
            }),
            wire("track-5", "TEMPLATE_TRACK", "DISPOSITION_HOSTILE"),
        ],
    )));

    s.ingestor.poll_once("").await.unwrap();

    assert_eq!(s.tracks.len().await, 1);
    assert_eq!(s.ingestor.stats().snapshot().malformed, 4);
}

#[tokio::test]
async fn test_ingest_reports_route() {
    let s = setup(TrackFilter::NonFriendly);
    let entity: WireEntity =
        serde_json::from_value(wire("asset-1", "TEMPLATE_ASSET", "DISPOSITION_FRIENDLY")).unwrap();

    assert_eq!(s.ingestor.ingest(entity).await, Some(Route::Asset));
    assert_eq!(s.ingestor.ingest(WireEntity::default()).await, None);
}

#[tokio::test]
async fn test_poll_failure_propagates_from_poll_once() {
    let s = setup(TrackFilter::NonFriendly);
    s.entities.script(Err(Error::Transport("connection refused".to_string())));

    assert!(s.ingestor.poll_once("t").await.is_err());
}

// =============================================================================
// Loop timing (paused clock)
// =============================================================================

async fn run_for(s: &Setup, duration: Duration) {
    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    let stop = async move {
        tokio::time::sleep(duration).await;
        stopper.cancel();
    };
    tokio::join!(s.ingestor.run(cancel), stop);
}

#[tokio::test(start_paused = true)]
async fn test_session_token_carried_between_polls() {
    let s = setup(TrackFilter::NonFriendly);
    s.entities.script(Ok(response("t1", vec![])));
    s.entities.script(Ok(response("t2", vec![])));

    // Polls at 0, 100 and 200 ms
    run_for(&s, Duration::from_millis(250)).await;

    assert_eq!(s.entities.tokens(), vec!["", "t1", "t2"]);
}

#[tokio::test(start_paused = true)]
async fn test_error_backs_off_and_resets_token() {
    let s = setup(TrackFilter::NonFriendly);
    s.entities.script(Ok(response("t1", vec![])));
    s.entities.script(Err(Error::Transport("connection reset".to_string())));

    // Poll at 0 ms, failing poll at 100 ms, then nothing until the 30 s backoff ends
    run_for(&s, Duration::from_secs(20)).await;
    assert_eq!(s.entities.tokens(), vec!["", "t1"]);
    assert_eq!(s.ingestor.stats().snapshot().poll_failures, 1);
}

#[tokio::test(start_paused = true)]
async fn test_loop_resumes_after_backoff() {
    let s = setup(TrackFilter::NonFriendly);
    s.entities.script(Ok(response("t1", vec![])));
    s.entities.script(Err(Error::Api {
        status: 502,
        body: "bad gateway".to_string(),
    }));

    // Third poll lands at 30.1 s with a fresh session
    run_for(&s, Duration::from_millis(30_150)).await;
    assert_eq!(s.entities.tokens(), vec!["", "t1", ""]);
}

//! End-to-end sync passes: mock document store and index, checkpoints on disk

use harvest_common::Position;
use harvest_ingest::checkpoint::{CheckpointStore, FileBackend};
use harvest_ingest::feed::CouchChangeFeed;
use harvest_ingest::index::SolrIndex;
use harvest_ingest::sync::{SyncEngine, SyncOptions};
use harvest_ingest::HarvestError;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SCOPE: &str = "stage";
const ARK: &str = "ark:/13030/kt7580382j";

fn stored_record(id: &str) -> Value {
    json!({
        "_id": id,
        "_rev": "4-1f0b",
        "id": id,
        "isShownAt": "http://www.oac.cdlib.org/ark:/13030/kt7580382j/",
        "sourceResource": {
            "title": ["The Golden Gate, 1935"],
            "identifier": [format!("http://ark.cdlib.org/{}", ARK)],
            "date": [{"displayDate": "1933-1937"}],
            "type": "text"
        },
        "originalRecord": {
            "collection": [{
                "@id": "https://registry.cdlib.org/api/v1/collection/26094/",
                "name": "Bridge Construction",
                "harvest_type": "OAC",
                "repository": [{
                    "@id": "https://registry.cdlib.org/api/v1/repository/12/",
                    "name": "Bancroft Library"
                }]
            }]
        }
    })
}

async fn mount_store(couch: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/ucldc/_changes"))
        .and(query_param("since", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"seq": 1, "id": "26094--kt7580382j", "changes": [{"rev": "4-1f0b"}]},
                {"seq": 2, "id": "26094--gone", "changes": [{"rev": "2-aa"}], "deleted": true},
                {"seq": 3, "id": "_design/all_provider_docs", "changes": [{"rev": "1-bb"}]},
                {"seq": 4, "id": "26094--purged", "changes": [{"rev": "1-cc"}]},
                {"seq": 5, "id": "26094--untitled", "changes": [{"rev": "1-dd"}]}
            ],
            "last_seq": 5
        })))
        .mount(couch)
        .await;
    Mock::given(method("GET"))
        .and(path("/ucldc/26094--kt7580382j"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stored_record("26094--kt7580382j")))
        .mount(couch)
        .await;
    Mock::given(method("GET"))
        .and(path("/ucldc/26094--purged"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "not_found"})))
        .mount(couch)
        .await;

    let mut untitled = stored_record("26094--untitled");
    untitled["sourceResource"]
        .as_object_mut()
        .unwrap()
        .remove("title");
    Mock::given(method("GET"))
        .and(path("/ucldc/26094--untitled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(untitled))
        .mount(couch)
        .await;
}

fn engine(
    couch: &MockServer,
    solr: &MockServer,
    dir: &TempDir,
) -> SyncEngine<CouchChangeFeed, SolrIndex, FileBackend> {
    let client = reqwest::Client::new();
    SyncEngine::new(
        CouchChangeFeed::new(client.clone(), &couch.uri(), "ucldc"),
        SolrIndex::new(client, &format!("{}/solr/dc", solr.uri())),
        CheckpointStore::new(FileBackend::new(dir.path())),
        SCOPE,
    )
}

async fn stored_checkpoint(dir: &TempDir) -> Position {
    CheckpointStore::new(FileBackend::new(dir.path()))
        .read(SCOPE)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_sync_pass_indexes_deletes_and_advances_checkpoint() {
    let couch = MockServer::start().await;
    let solr = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_store(&couch).await;
    Mock::given(method("POST"))
        .and(path("/solr/dc/update"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&solr)
        .await;

    let report = engine(&couch, &solr, &dir)
        .run(&SyncOptions::default())
        .await
        .unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(report.admin_skipped, 1);
    assert_eq!(report.vanished, 1);
    assert_eq!(report.rejected, 1);
    assert!(report.checkpoint_written);
    assert_eq!(stored_checkpoint(&dir).await, Position::Seq(5));

    let requests = solr.received_requests().await.unwrap();
    let bodies: Vec<Value> = requests
        .iter()
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(bodies.len(), 3);
    assert_eq!(bodies[0][0]["id"], ARK);
    assert_eq!(bodies[0][0]["sort_title"], "golden gate 1935");
    assert_eq!(bodies[0][0]["facet_decade"], json!(["1930s"]));
    assert_eq!(bodies[1], json!({"delete": {"id": "26094--gone"}}));
    assert_eq!(bodies[2], json!({"commit": {}}));
    assert_eq!(requests[2].url.query(), Some("commit=true"));
}

#[tokio::test]
async fn test_failed_commit_keeps_checkpoint() {
    let couch = MockServer::start().await;
    let solr = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_store(&couch).await;
    Mock::given(method("POST"))
        .and(path("/solr/dc/update"))
        .and(query_param("commit", "true"))
        .respond_with(ResponseTemplate::new(500).set_body_string("commit failed"))
        .with_priority(1)
        .mount(&solr)
        .await;
    Mock::given(method("POST"))
        .and(path("/solr/dc/update"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&solr)
        .await;

    let err = engine(&couch, &solr, &dir)
        .run(&SyncOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::IndexFatal(_)));
    assert_eq!(stored_checkpoint(&dir).await, Position::start());
}

#[tokio::test]
async fn test_full_reindex_leaves_checkpoint_alone() {
    let couch = MockServer::start().await;
    let solr = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_store(&couch).await;
    Mock::given(method("POST"))
        .and(path("/solr/dc/update"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&solr)
        .await;

    // A later position is stored; the full replay still starts from 0
    CheckpointStore::new(FileBackend::new(dir.path()))
        .write(SCOPE, &Position::Seq(3))
        .await
        .unwrap();

    let report = engine(&couch, &solr, &dir)
        .run(&SyncOptions::full_reindex())
        .await
        .unwrap();

    assert_eq!(report.previous, Position::start());
    assert_eq!(report.updated, 1);
    assert!(!report.checkpoint_written);
    assert_eq!(stored_checkpoint(&dir).await, Position::Seq(3));
}

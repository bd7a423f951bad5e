//! End-to-end audit trail behavior through the full middleware stack

use serde_json::{json, Value};
use std::sync::Arc;
use trailmark_audit::{
    AuditConfig, AuditDraft, AuditError, AuditQuery, AuditQueryBuilder, AuditRecord,
    AuditRecordId, AuditResult, AuditStore, FileAuditStore, InMemoryAuditStore,
};
use trailmark_core::{TestClient, TestRequest, TestResponse};
use trailmark_extras::TokenVerifier;
use trailmark_server::{build_app, AppContext, ServerConfig};

const SECRET: &str = "integration-secret";
// The seeded admin user.
const ACTOR: i64 = 1;

struct Fixture {
    ctx: AppContext,
    client: TestClient,
    token: String,
}

impl Fixture {
    async fn with_store(store: Arc<dyn AuditStore>) -> Self {
        let ctx = AppContext::new(TokenVerifier::new(SECRET), store, AuditConfig::default());
        ctx.seed().await;
        let token = ctx.verifier.issue(ACTOR).unwrap();
        let client = TestClient::new(build_app(&ctx));
        Self { ctx, client, token }
    }

    async fn new() -> Self {
        Self::with_store(Arc::new(InMemoryAuditStore::new())).await
    }

    async fn send(&self, req: TestRequest) -> TestResponse {
        let response = self.client.request(req.bearer(&self.token)).await;
        self.ctx.recorder.settle().await;
        response
    }

    fn records(&self) -> Vec<AuditRecord> {
        self.ctx
            .recorder
            .store()
            .execute_query(&AuditQuery::new())
            .unwrap()
    }

    async fn logs(&self, path: &str) -> TestResponse {
        self.client
            .request(TestRequest::get(path).bearer(&self.token))
            .await
    }
}

fn data(response: &TestResponse) -> Value {
    response.json::<Value>().unwrap()["data"].clone()
}

struct FailingStore;

impl AuditStore for FailingStore {
    fn create(&self, _draft: AuditDraft) -> AuditResult<AuditRecord> {
        Err(AuditError::IoError("disk full".into()))
    }
    fn get(&self, _id: AuditRecordId) -> AuditResult<Option<AuditRecord>> {
        Ok(None)
    }
    fn execute_query(&self, _query: &AuditQuery) -> AuditResult<Vec<AuditRecord>> {
        Ok(Vec::new())
    }
    fn count(&self, _query: &AuditQuery) -> AuditResult<usize> {
        Ok(0)
    }
    fn total_count(&self) -> AuditResult<usize> {
        Ok(0)
    }
    fn clear(&self) -> AuditResult<()> {
        Ok(())
    }
    fn flush(&self) -> AuditResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn update_with_changed_field_records_one_change() {
    let fx = Fixture::new().await;

    let response = fx
        .send(TestRequest::put("/api/widgets/1").json(&json!({"id": 1, "color": "red"})))
        .await;
    response.assert_status(200);
    assert_eq!(data(&response)["color"], json!("red"));

    let records = fx.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.actor_id, ACTOR);
    assert_eq!(record.entity_name, "widgets");
    assert_eq!(record.entity_id, 1);
    assert_eq!(record.operation_label, "PUT /api/widgets/1");
    assert_eq!(
        serde_json::to_value(&record.changed_fields).unwrap(),
        json!({"color": {"old": "blue", "new": "red"}})
    );
    assert_eq!(record.action.as_str(), "UPDATE");
}

#[tokio::test]
async fn update_with_identical_body_records_nothing() {
    let fx = Fixture::new().await;

    fx.send(TestRequest::put("/api/widgets/1").json(&json!({
        "id": 1,
        "name": "sprocket",
        "color": "blue",
        "size": 3
    })))
    .await
    .assert_status(200);

    assert!(fx.records().is_empty());
}

#[tokio::test]
async fn operation_label_keeps_query_string() {
    let fx = Fixture::new().await;

    fx.send(TestRequest::put("/api/widgets/1?source=admin").json(&json!({"color": "red"})))
        .await
        .assert_status(200);

    let records = fx.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].operation_label, "PUT /api/widgets/1?source=admin");
}

#[tokio::test]
async fn nested_api_prefix_is_audited() {
    let config =
        ServerConfig::from_pairs([("JWT_SECRET", SECRET), ("API_PREFIX", "/v1/admin")]).unwrap();
    let ctx = AppContext::from_config(&config).unwrap();
    ctx.seed().await;
    let token = ctx.verifier.issue(ACTOR).unwrap();
    let client = TestClient::new(build_app(&ctx));

    client
        .request(TestRequest::delete("/v1/admin/widgets/1").bearer(&token))
        .await
        .assert_status(204);
    client
        .request(
            TestRequest::put("/v1/admin/widgets/2")
                .bearer(&token)
                .json(&json!({"color": "red"})),
        )
        .await
        .assert_status(200);
    ctx.recorder.settle().await;

    let records = AuditQueryBuilder::new(ctx.recorder.store().as_ref())
        .oldest_first()
        .execute()
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!((records[0].entity_id, records[0].action.as_str()), (1, "DELETE"));
    assert_eq!((records[1].entity_id, records[1].action.as_str()), (2, "UPDATE"));
    assert!(records.iter().all(|r| r.entity_name == "widgets"));
}

#[tokio::test]
async fn patch_is_audited_as_update() {
    let fx = Fixture::new().await;

    fx.send(TestRequest::patch("/api/widgets/2").json(&json!({"size": 8})))
        .await
        .assert_status(200);

    let records = fx.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entity_id, 2);
    assert_eq!(records[0].operation_label, "PATCH /api/widgets/2");
}

#[tokio::test]
async fn delete_records_sentinel() {
    let fx = Fixture::new().await;

    fx.send(TestRequest::delete("/api/widgets/1"))
        .await
        .assert_status(204);

    let records = fx.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action.as_str(), "DELETE");
    assert_eq!(
        serde_json::to_value(&records[0].changed_fields).unwrap(),
        json!({"deleted": {"old": true, "new": false}})
    );
}

#[tokio::test]
async fn expired_credential_is_rejected_and_not_audited() {
    let fx = Fixture::new().await;
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let expired = fx
        .ctx
        .verifier
        .issue_with_times(ACTOR, now - 7200, now - 3600)
        .unwrap();

    let response = fx
        .client
        .request(
            TestRequest::put("/api/widgets/1")
                .bearer(&expired)
                .json(&json!({"color": "red"})),
        )
        .await;
    fx.ctx.recorder.settle().await;

    response
        .assert_status(401)
        .assert_body_contains("Token has expired");
    assert!(fx.records().is_empty());
}

#[tokio::test]
async fn credential_for_missing_user_is_rejected() {
    let fx = Fixture::new().await;
    let stranger = fx.ctx.verifier.issue(404).unwrap();

    let response = fx
        .client
        .request(
            TestRequest::put("/api/widgets/1")
                .bearer(&stranger)
                .json(&json!({"color": "red"})),
        )
        .await;
    fx.ctx.recorder.settle().await;

    response
        .assert_status(401)
        .assert_body_contains("User not found");
    assert!(fx.records().is_empty());
}

#[tokio::test]
async fn unknown_entity_is_not_audited() {
    let fx = Fixture::new().await;

    fx.send(TestRequest::put("/api/gadgets/1").json(&json!({"color": "red"})))
        .await
        .assert_status(404);

    assert!(fx.records().is_empty());
}

#[tokio::test]
async fn failed_mutation_is_not_audited() {
    let fx = Fixture::new().await;

    // The payload id points at an existing widget, the path at a missing one.
    fx.send(TestRequest::put("/api/widgets/99").json(&json!({"id": 1, "color": "red"})))
        .await
        .assert_status(404);

    assert!(fx.records().is_empty());
}

#[tokio::test]
async fn store_failure_leaves_response_untouched() {
    let fx = Fixture::with_store(Arc::new(FailingStore)).await;

    let response = fx
        .send(TestRequest::put("/api/widgets/1").json(&json!({"color": "red"})))
        .await;

    response.assert_status(200);
    assert_eq!(data(&response)["color"], json!("red"));
    assert_eq!(fx.ctx.recorder.pending(), 0);
}

#[tokio::test]
async fn user_routes_are_excluded() {
    let fx = Fixture::new().await;

    fx.send(TestRequest::put("/api/users/1").json(&json!({"name": "root"})))
        .await
        .assert_status(200);
    fx.send(TestRequest::delete("/api/users/1"))
        .await
        .assert_status(200);

    assert!(fx.records().is_empty());
}

#[tokio::test]
async fn health_is_public_and_logs_require_auth() {
    let fx = Fixture::new().await;

    let health = fx.client.get("/health").await;
    health.assert_status(200);
    assert_eq!(health.json::<Value>().unwrap()["status"], json!("ok"));

    fx.client.get("/api/logs").await.assert_status(401);
}

#[tokio::test]
async fn log_routes_query_recorded_changes() {
    let fx = Fixture::new().await;

    fx.send(TestRequest::put("/api/widgets/1").json(&json!({"color": "red"})))
        .await
        .assert_status(200);
    fx.send(TestRequest::delete("/api/widgets/2"))
        .await
        .assert_status(204);

    let all = fx.logs("/api/logs").await;
    all.assert_status(200);
    let all = data(&all);
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert_eq!(all[0]["action"], json!("DELETE"));

    let page = fx.logs("/api/logs?limit=1&offset=1").await;
    assert_eq!(data(&page)[0]["action"], json!("UPDATE"));

    let one = fx.logs("/api/logs/1").await;
    one.assert_status(200);
    assert_eq!(data(&one)["entity_id"], json!(1));

    fx.logs("/api/logs/999").await.assert_status(404);

    let by_user = fx.logs(&format!("/api/logs/user/{}", ACTOR)).await;
    assert_eq!(data(&by_user).as_array().unwrap().len(), 2);
    let nobody = fx.logs("/api/logs/user/12345").await;
    assert!(data(&nobody).as_array().unwrap().is_empty());

    let by_entity = fx.logs("/api/logs/entity/Widgets/2").await;
    by_entity.assert_status(200);
    assert_eq!(data(&by_entity).as_array().unwrap().len(), 1);

    fx.logs("/api/logs/entity/widgets/abc")
        .await
        .assert_status(400)
        .assert_body_contains("Entity id must be a valid number");

    let updates = fx.logs("/api/logs/action/UPDATE").await;
    assert_eq!(data(&updates).as_array().unwrap().len(), 1);

    fx.logs("/api/logs/action/PURGE")
        .await
        .assert_status(400)
        .assert_body_contains("Invalid action. Use: CREATE, UPDATE or DELETE");
}

#[tokio::test]
async fn file_store_persists_across_restarts() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("audit.jsonl");
    let config = ServerConfig::from_pairs([
        ("JWT_SECRET", SECRET),
        ("AUDIT_LOG_PATH", path.to_str().unwrap()),
    ])
    .unwrap();

    {
        let ctx = AppContext::from_config(&config).unwrap();
        ctx.seed().await;
        let token = ctx.verifier.issue(ACTOR).unwrap();
        let client = TestClient::new(build_app(&ctx));

        client
            .request(
                TestRequest::put("/api/widgets/1")
                    .bearer(&token)
                    .json(&json!({"color": "red"})),
            )
            .await
            .assert_status(200);
        ctx.recorder.settle().await;
        ctx.recorder.store().flush().unwrap();
    }

    let reopened = FileAuditStore::open(&path).unwrap();
    let records = reopened.execute_query(&AuditQuery::new()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entity_name, "widgets");
}

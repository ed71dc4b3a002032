//! Engine tests against PostgreSQL. Run with `DATABASE_URL` set:
//! `cargo test --test engine -- --ignored`

use formsync::{
    ensure_registry_table, map_schema, FormSpec, FormSync, MemorySpecStore, SchemaProvisioner, Submission,
    SyncError, SyncOutcome,
};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::OnceCell;

const SCHEMA: &str = "public";

static DATABASE_READY: OnceCell<()> = OnceCell::const_new();

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/formsync_test".into());
    DATABASE_READY
        .get_or_init(|| async { formsync::ensure_database_exists(&url).await.unwrap() })
        .await;
    let pool = PgPoolOptions::new().max_connections(5).connect(&url).await.unwrap();
    ensure_registry_table(&pool, SCHEMA).await.unwrap();
    pool
}

/// Unique form name so tests can run side by side.
fn form_name(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..8])
}

fn intake_spec(form_name: &str) -> FormSpec {
    serde_json::from_value(json!({
        "formName": form_name,
        "sections": [
            { "heading": "Employee", "fields": [
                { "type": "text", "name": "full_name" },
                { "type": "checkbox", "name": "agree" },
                { "type": "dropdown", "name": "dept", "options": ["eng", "ops"] },
                { "type": "text", "name": "age" },
                { "type": "text", "name": "tags" }
            ] },
            { "heading": "Family", "fields": [
                { "type": "table", "name": "dependents", "columns": [
                    { "name": "name", "type": "text" },
                    { "name": "age", "type": "text" }
                ] }
            ] }
        ]
    }))
    .unwrap()
}

async fn engine(form_name: &str) -> (FormSync, Arc<MemorySpecStore>) {
    let specs = Arc::new(MemorySpecStore::new());
    specs.insert(intake_spec(form_name));
    (FormSync::new(Some(pool().await), specs.clone(), SCHEMA), specs)
}

fn submission(form_name: &str, session_id: &str, data: Value) -> Submission {
    Submission::new(form_name, session_id, data.as_object().unwrap().clone())
}

async fn table_exists(pool: &PgPool, table: &str) -> bool {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2)",
    )
    .bind(SCHEMA)
    .bind(table)
    .fetch_one(pool)
    .await
    .unwrap()
}

#[tokio::test]
#[ignore = "requires running PostgreSQL database"]
async fn provisioning_is_idempotent() {
    let form = form_name("prov");
    let (engine, _) = engine(&form).await;
    let pool = engine.pool().unwrap();
    let layout = map_schema(&intake_spec(&form));

    assert!(SchemaProvisioner::provision(pool, SCHEMA, &form, &layout).await.unwrap());
    assert!(!SchemaProvisioner::provision(pool, SCHEMA, &form, &layout).await.unwrap());
    assert!(table_exists(pool, &form).await);
    assert!(table_exists(pool, &format!("{}_dependents", form)).await);
    assert!(engine.registered_forms().await.unwrap().contains(&form));

    let (a, b) = tokio::join!(
        SchemaProvisioner::provision(pool, SCHEMA, &form, &layout),
        SchemaProvisioner::provision(pool, SCHEMA, &form, &layout)
    );
    assert!(!a.unwrap() && !b.unwrap());

    engine.drop_form(&form).await;
}

async fn column_set(pool: &PgPool, table: &str) -> Vec<(String, String)> {
    sqlx::query_as(
        "SELECT column_name::text, data_type::text FROM information_schema.columns \
         WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position",
    )
    .bind(SCHEMA)
    .bind(table)
    .fetch_all(pool)
    .await
    .unwrap()
}

#[tokio::test]
#[ignore = "requires running PostgreSQL database"]
async fn reprovisioning_leaves_columns_untouched() {
    let form = form_name("cols");
    let (engine, _) = engine(&form).await;
    let pool = engine.pool().unwrap();
    let child = format!("{}_dependents", form);
    let layout = map_schema(&intake_spec(&form));

    assert!(SchemaProvisioner::provision(pool, SCHEMA, &form, &layout).await.unwrap());
    let main_before = column_set(pool, &form).await;
    let child_before = column_set(pool, &child).await;
    assert_eq!(main_before.len(), 2 + layout.main_columns.len());
    assert_eq!(
        child_before.iter().map(|(c, _)| c.as_str()).collect::<Vec<_>>(),
        ["id", "session_id", "row_index", "name", "age"]
    );

    let mut grown = layout.clone();
    grown.main_columns.push("extra".into());
    grown.child_tables[0].columns.push("relation".into());
    assert!(!SchemaProvisioner::provision(pool, SCHEMA, &form, &layout).await.unwrap());
    assert!(!SchemaProvisioner::provision(pool, SCHEMA, &form, &grown).await.unwrap());
    assert_eq!(column_set(pool, &form).await, main_before);
    assert_eq!(column_set(pool, &child).await, child_before);

    engine.drop_form(&form).await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL database"]
async fn concurrent_first_submissions_provision_once() {
    let form = form_name("race");
    let (engine, specs) = engine(&form).await;
    let s1 = submission(&form, "s1", json!({ "full_name": "A" }));
    let s2 = submission(&form, "s2", json!({ "full_name": "B" }));
    let (a, b) = tokio::join!(engine.synchronize(&s1), engine.synchronize(&s2));
    assert!(a.unwrap().is_synced());
    assert!(b.unwrap().is_synced());
    assert_eq!(engine.list_records(&form).await.unwrap().len(), 2);
    assert!(specs.get(&form).unwrap().provisioned);

    engine.drop_form(&form).await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL database"]
async fn upsert_keeps_one_row_with_latest_values() {
    let form = form_name("upsert");
    let (engine, _) = engine(&form).await;

    engine
        .synchronize(&submission(&form, "s1", json!({ "full_name": "Jane", "dept": "eng" })))
        .await
        .unwrap();
    engine
        .synchronize(&submission(&form, "s1", json!({ "full_name": "Jane Doe" })))
        .await
        .unwrap();

    let records = engine.list_records(&form).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["full_name"], "Jane Doe");
    assert_eq!(records[0]["dept"], "eng", "absent field keeps its stored value");

    engine.drop_form(&form).await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL database"]
async fn child_rows_are_replaced_in_order() {
    let form = form_name("child");
    let (engine, _) = engine(&form).await;

    let three = json!({ "dependents": [
        { "name": "Sam", "age": "10" }, { "name": "Ann", "age": "7" }, { "name": "Bo", "age": "3" }
    ] });
    let outcome = engine.synchronize(&submission(&form, "s1", three)).await.unwrap();
    match outcome {
        SyncOutcome::Synced(summary) => assert_eq!(summary.child_rows.get("dependents"), Some(&3)),
        other => panic!("unexpected outcome {:?}", other),
    }

    let two = json!({ "dependents": [{ "name": "Zed", "age": "40" }, { "table_name": "Yan", "age": 38 }] });
    engine.synchronize(&submission(&form, "s1", two)).await.unwrap();

    let record = engine.get_record(&form, "s1").await.unwrap().unwrap();
    let rows = record["dependents"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], "Zed");
    assert_eq!(rows[0]["row_index"], 0);
    assert_eq!(rows[1]["name"], "Yan");
    assert_eq!(rows[1]["age"], "38");

    engine.synchronize(&submission(&form, "s1", json!({ "full_name": "kept" }))).await.unwrap();
    let record = engine.get_record(&form, "s1").await.unwrap().unwrap();
    assert_eq!(record["dependents"].as_array().unwrap().len(), 2, "absent table field leaves rows");

    engine.synchronize(&submission(&form, "s1", json!({ "dependents": [] }))).await.unwrap();
    let record = engine.get_record(&form, "s1").await.unwrap().unwrap();
    assert_eq!(record["dependents"], json!([]));

    engine.drop_form(&form).await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL database"]
async fn scalars_round_trip_as_text() {
    let form = form_name("scalar");
    let (engine, _) = engine(&form).await;
    let data = json!({ "full_name": "Jane", "agree": true, "age": 30, "tags": ["a", "b"], "dept": null });
    engine.synchronize(&submission(&form, "s1", data)).await.unwrap();

    let record = engine.get_record(&form, "s1").await.unwrap().unwrap();
    assert_eq!(record["session_id"], "s1");
    assert_eq!(record["full_name"], "Jane");
    assert_eq!(record["agree"], "true");
    assert_eq!(record["age"], "30");
    assert_eq!(record["tags"], r#"["a","b"]"#);
    assert_eq!(record["dept"], Value::Null);
    assert!(record["submitted_at"].is_string());

    engine.drop_form(&form).await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL database"]
async fn missing_child_table_reads_as_empty() {
    let form = form_name("absent");
    let (engine, _) = engine(&form).await;
    let data = json!({ "full_name": "Jane", "dependents": [{ "name": "Sam" }] });
    engine.synchronize(&submission(&form, "s1", data)).await.unwrap();

    let pool = engine.pool().unwrap();
    sqlx::query(&format!("DROP TABLE \"{}_dependents\"", form)).execute(pool).await.unwrap();
    let record = engine.get_record(&form, "s1").await.unwrap().unwrap();
    assert_eq!(record["dependents"], json!([]));
    assert!(engine.get_record(&form, "nobody").await.unwrap().is_none());

    engine.drop_form(&form).await;
    assert!(engine.list_records(&form).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL database"]
async fn mismatched_payload_leaves_session_unchanged() {
    let form = form_name("mismatch");
    let (engine, _) = engine(&form).await;
    engine
        .synchronize(&submission(&form, "s1", json!({ "full_name": "Jane" })))
        .await
        .unwrap();

    let err = engine
        .synchronize(&submission(&form, "s1", json!({ "full_name": "Other", "kids": [{ "name": "x" }] })))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::SchemaMismatch(_)));
    let record = engine.get_record(&form, "s1").await.unwrap().unwrap();
    assert_eq!(record["full_name"], "Jane");

    engine.drop_form(&form).await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL database"]
async fn employee_intake_end_to_end() {
    let form = form_name("employee_intake");
    let (engine, specs) = engine(&form).await;
    let pool = engine.pool().unwrap().clone();

    let data = json!({
        "_meta": { "formName": form, "sessionId": "abc123", "submittedAt": "2026-03-01T10:00:00.000Z" },
        "full_name": "Jane Doe",
        "dependents": [{ "name": "Sam", "age": "10" }, { "name": "Ann", "age": "7" }]
    });
    let s = Submission::from_payload(None, None, data).unwrap();
    assert_eq!(s.session_id, "abc123");
    engine.synchronize(&s).await.unwrap();

    let records = engine.list_records(&form).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["full_name"], "Jane Doe");
    assert_eq!(records[0]["submitted_at"], "2026-03-01T10:00:00.000Z");

    let record = engine.get_record(&form, "abc123").await.unwrap().unwrap();
    let names: Vec<&str> = record["dependents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Sam", "Ann"]);

    let report = engine.drop_form(&form).await;
    assert_eq!(report.tables.len(), 2);
    assert_eq!(report.tables[0].table, format!("{}_dependents", form));
    assert!(report.tables.iter().all(|t| t.dropped && t.error.is_none()));
    assert!(report.registry_cleared);
    assert!(report.spec_reset);
    assert!(!specs.get(&form).unwrap().provisioned);
    assert!(!table_exists(&pool, &form).await);

    let again = engine.drop_form(&form).await;
    assert!(again.tables.iter().all(|t| t.dropped), "dropping twice is harmless");

    engine.synchronize(&s).await.unwrap();
    assert_eq!(engine.list_records(&form).await.unwrap().len(), 1, "re-provisions after teardown");
    engine.drop_form(&form).await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL database"]
async fn concurrent_saves_of_one_session_apply_whole() {
    let form = form_name("same");
    let (engine, _) = engine(&form).await;
    engine
        .synchronize(&submission(&form, "s1", json!({ "full_name": "seed" })))
        .await
        .unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..8usize {
        let engine = engine.clone();
        let rows: Vec<Value> = (0..=i).map(|k| json!({ "name": format!("v{}-{}", i, k) })).collect();
        let s = submission(&form, "s1", json!({ "full_name": format!("v{}", i), "dependents": rows }));
        tasks.spawn(async move { engine.synchronize(&s).await });
    }
    while let Some(result) = tasks.join_next().await {
        assert!(result.unwrap().unwrap().is_synced());
    }

    assert_eq!(engine.list_records(&form).await.unwrap().len(), 1);
    let record = engine.get_record(&form, "s1").await.unwrap().unwrap();
    let winner = record["full_name"].as_str().unwrap().to_string();
    let i: usize = winner.trim_start_matches('v').parse().unwrap();
    let rows = record["dependents"].as_array().unwrap();
    assert_eq!(rows.len(), i + 1, "child rows come from one submission");
    for (k, row) in rows.iter().enumerate() {
        assert_eq!(row["name"], format!("{}-{}", winner, k));
        assert_eq!(row["row_index"], k);
    }

    engine.drop_form(&form).await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL database"]
async fn teardown_uses_registered_layout_after_spec_change() {
    let form = form_name("respec");
    let (engine, specs) = engine(&form).await;
    let pool = engine.pool().unwrap().clone();
    let child = format!("{}_dependents", form);
    let data = json!({ "full_name": "Jane", "dependents": [{ "name": "Sam" }] });
    engine.synchronize(&submission(&form, "s1", data)).await.unwrap();

    let mut trimmed: FormSpec = serde_json::from_value(json!({
        "formName": form,
        "sections": [{ "heading": "Employee", "fields": [{ "type": "text", "name": "full_name" }] }]
    }))
    .unwrap();
    trimmed.provisioned = true;
    specs.insert(trimmed);

    let report = engine.drop_form(&form).await;
    assert!(report.tables.iter().any(|t| t.table == child && t.dropped));
    assert!(report.registry_cleared);
    assert!(!table_exists(&pool, &child).await);
    assert!(!table_exists(&pool, &form).await);
}

#[tokio::test]
#[ignore = "requires running PostgreSQL database"]
async fn provisioned_flag_skips_registry_lookup() {
    let form = form_name("flag");
    let (engine, specs) = engine(&form).await;
    let pool = engine.pool().unwrap().clone();
    engine
        .synchronize(&submission(&form, "s1", json!({ "full_name": "Jane" })))
        .await
        .unwrap();
    assert!(specs.get(&form).unwrap().provisioned);

    sqlx::query("DELETE FROM \"_formsync_registry\" WHERE form_name = $1")
        .bind(&form)
        .execute(&pool)
        .await
        .unwrap();
    engine
        .synchronize(&submission(&form, "s2", json!({ "full_name": "Ann" })))
        .await
        .unwrap();
    assert!(!engine.registered_forms().await.unwrap().contains(&form));
    assert_eq!(engine.list_records(&form).await.unwrap().len(), 2);

    engine.drop_form(&form).await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL database"]
async fn stale_provisioned_flag_recreates_tables() {
    let form = form_name("stale");
    let (engine, specs) = engine(&form).await;
    let mut spec = intake_spec(&form);
    spec.provisioned = true;
    specs.insert(spec);

    let data = json!({ "full_name": "Jane", "dependents": [{ "name": "Sam" }] });
    let outcome = engine.synchronize(&submission(&form, "s1", data)).await.unwrap();
    assert!(outcome.is_synced());
    assert!(engine.registered_forms().await.unwrap().contains(&form));
    let record = engine.get_record(&form, "s1").await.unwrap().unwrap();
    assert_eq!(record["dependents"][0]["name"], "Sam");

    engine.drop_form(&form).await;
}

#[tokio::test]
#[ignore = "requires running PostgreSQL database"]
async fn table_field_added_after_provisioning_is_a_mismatch() {
    let form = form_name("grown");
    let (engine, specs) = engine(&form).await;
    engine
        .synchronize(&submission(&form, "s1", json!({ "full_name": "Jane" })))
        .await
        .unwrap();

    let mut spec = specs.get(&form).unwrap();
    spec.sections[0].fields.push(
        serde_json::from_value(json!({ "type": "table", "name": "pets", "columns": [{ "name": "kind" }] })).unwrap(),
    );
    specs.insert(spec);

    let err = engine
        .synchronize(&submission(&form, "s1", json!({ "full_name": "Other", "pets": [{ "kind": "cat" }] })))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::SchemaMismatch(_)), "got {:?}", err);
    let record = engine.get_record(&form, "s1").await.unwrap().unwrap();
    assert_eq!(record["full_name"], "Jane");

    engine.drop_form(&form).await;
}

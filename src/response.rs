//! Response envelopes: every success body carries `"ok": true` beside its payload.

use axum::Json;
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
pub struct OkBody<T> {
    pub ok: bool,
    #[serde(flatten)]
    pub body: T,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

#[derive(Serialize)]
pub struct RecordList {
    pub records: Vec<Value>,
    pub meta: MetaCount,
}

/// `{ "ok": true, ..body }`. `body` must serialize as an object.
pub fn ok<T: Serialize>(body: T) -> Json<OkBody<T>> {
    Json(OkBody { ok: true, body })
}

pub fn record_list(records: Vec<Value>) -> Json<OkBody<RecordList>> {
    let count = records.len() as u64;
    ok(RecordList {
        records,
        meta: MetaCount { count },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelopes_flatten_payload() {
        let Json(body) = ok(json!({ "file": "login_s1.json" }));
        assert_eq!(serde_json::to_value(body).unwrap(), json!({ "ok": true, "file": "login_s1.json" }));

        let Json(body) = record_list(vec![json!({ "session_id": "s1" })]);
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({ "ok": true, "records": [{ "session_id": "s1" }], "meta": { "count": 1 } })
        );
    }
}

//! Outcome loop behavior through the full engine.

use actuate_action::memory::{Fixture, LookupCalls, MemoryStore};
use actuate_action::testing::{MockPerformer, RecordingQueue};
use actuate_action::{
    ActionCatalog, ActionEngine, ActionResponse, ActionError, ActionRequest, HandlerError, StepOutput,
};
use actuate_auth::{AccessDenied, Actor};
use actuate_hook::interceptor::testing::MockInterceptor;
use actuate_hook::{InterceptError, InterceptPoint, Verb};
use actuate_types::ReferenceId;
use serde_json::{json, Value};
use std::sync::Arc;

const CATALOG: &str = r#"[
  {
    "type": "note",
    "name": "chain",
    "instance_optional": true,
    "out_fields": [
      {"type": "step.a", "method": "EXECUTE", "reference": "r", "attributes": {"n": "1"}},
      {"type": "step.b", "method": "EXECUTE", "reference": "b"},
      {"type": "step.c", "method": "EXECUTE", "reference": "c"}
    ]
  },
  {
    "type": "note",
    "name": "pairs",
    "instance_optional": true,
    "out_fields": [
      {"type": "step.pair", "method": "EXECUTE", "reference": "r", "skip_in_response": true},
      {
        "type": "client.notify",
        "method": "ACTIONRESPONSE",
        "attributes": {"first": "$r[0].field", "second": "$r[1].field", "count": "!#r"}
      }
    ]
  },
  {
    "type": "note",
    "name": "maybe",
    "instance_optional": true,
    "out_fields": [
      {"type": "step.a", "method": "EXECUTE", "reference": "skipped", "condition": "false"},
      {"type": "client.notify", "method": "ACTIONRESPONSE", "attributes": {"seen": "!skipped == nil"}}
    ]
  },
  {
    "type": "note",
    "name": "rename",
    "out_fields": [
      {"type": "note", "method": "PATCH", "attributes": {"reference_id": "~reference_id", "title": "$attributes.title"}}
    ]
  },
  {
    "type": "note",
    "name": "retitle",
    "instance_optional": true,
    "out_fields": [
      {"type": "note", "method": "PATCH", "attributes": {"reference_id": "$attributes.target", "title": "$attributes.title"}}
    ]
  }
]"#;

struct Harness {
    engine: ActionEngine,
    step_c: Arc<MockPerformer>,
    after_gates: Arc<MockInterceptor>,
    store: Arc<MemoryStore>,
    note: ReferenceId,
}

fn harness() -> Harness {
    let note = ReferenceId::new();
    let fixture: Fixture = serde_json::from_value(json!({
        "tables": {
            "note": {
                "permission": {"world": "peek|read"},
                "rows": [{
                    "reference_id": note.to_string(),
                    "title": "draft",
                    "permission": {"world": "peek|read|update|execute"}
                }]
            }
        },
        "actions": [
            {"type": "note", "name": "chain", "permission": {"world": "execute"}},
            {"type": "note", "name": "pairs", "permission": {"world": "execute"}},
            {"type": "note", "name": "maybe", "permission": {"world": "execute"}},
            {"type": "note", "name": "rename", "permission": {"world": "execute"}},
            {"type": "note", "name": "retitle", "permission": {"world": "execute"}}
        ]
    }))
    .expect("fixture");
    let store = Arc::new(MemoryStore::from_fixture(fixture));

    let step_c = Arc::new(MockPerformer::returning("step.c", json!({"c": true})));
    let after_gates = Arc::new(
        MockInterceptor::pass_through("after-gates", InterceptPoint::before(Verb::Update)).with_priority(50),
    );
    let engine = ActionEngine::builder(
        ActionCatalog::from_json_str(CATALOG).expect("catalog"),
        store.clone(),
        Arc::new(RecordingQueue::new()),
    )
    .with_performer(Arc::new(MockPerformer::new("step.a", |attrs| {
        Ok(StepOutput::result(json!({"a": attrs["n"]}))
            .and_respond(ActionResponse::notify("success", "Success", "a done")))
    })))
    .with_performer(Arc::new(MockPerformer::failing("step.b", "boom")))
    .with_performer(step_c.clone())
    .with_performer(Arc::new(MockPerformer::returning(
        "step.pair",
        json!([{"field": "first"}, {"field": "second"}]),
    )))
    .with_interceptor(after_gates.clone())
    .build();

    Harness {
        engine,
        step_c,
        after_gates,
        store,
        note,
    }
}

#[test]
fn failing_step_stops_the_loop() {
    let h = harness();
    let failure = h
        .engine
        .invoke(&ActionRequest::new("note", "chain"), &Actor::guest())
        .expect_err("step.b fails");

    assert_eq!(failure.responses.len(), 2);
    assert_eq!(failure.responses[0].attributes["message"], json!("a done"));
    assert!(failure.responses[1].is_notify("error"));
    assert!(matches!(
        failure.error,
        ActionError::Handler {
            source: HandlerError::Performer(_),
            ..
        }
    ));
    assert!(h.step_c.calls().is_empty());
}

#[test]
fn list_reference_is_addressable_by_index() {
    let h = harness();
    let responses = h
        .engine
        .invoke(&ActionRequest::new("note", "pairs"), &Actor::guest())
        .expect("invoke");

    assert_eq!(responses.len(), 1);
    assert_eq!(
        responses[0].attributes,
        json!({"first": "first", "second": "second", "count": 2})
    );
}

#[test]
fn false_condition_is_skipped() {
    let h = harness();
    let responses = h
        .engine
        .invoke(&ActionRequest::new("note", "maybe"), &Actor::guest())
        .expect("invoke");

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].attributes["seen"], Value::Bool(true));
}

#[test]
fn table_gate_rejects_update_before_rows_are_touched() {
    let h = harness();
    let request = ActionRequest::new("note", "rename")
        .with_attribute("note_id", json!(h.note.to_string()))
        .with_attribute("title", json!("final"));

    let failure = h.engine.invoke(&request, &Actor::guest()).expect_err("denied");
    match &failure.error {
        ActionError::Handler {
            source: HandlerError::Intercept(InterceptError::Denied(denied)),
            ..
        } => assert!(matches!(denied, AccessDenied::Table { .. })),
        other => panic!("expected table denial, got {other:?}"),
    }
    assert!(failure.error.is_permission_denied());
    assert_eq!(h.after_gates.calls(), 0);
    assert_eq!(h.store.rows("note")[0]["title"], json!("draft"));
}

#[test]
fn table_gate_denial_skips_row_lookups() {
    let h = harness();
    let request = ActionRequest::new("note", "retitle")
        .with_attribute("target", json!(h.note.to_string()))
        .with_attribute("title", json!("final"));

    let failure = h.engine.invoke(&request, &Actor::guest()).expect_err("denied");
    assert!(failure.error.is_permission_denied());
    assert_eq!(h.store.lookup_calls(), LookupCalls::default());
    assert_eq!(h.store.rows("note")[0]["title"], json!("draft"));

    // The subject check of a subject-bound action does reach the row level.
    let request = ActionRequest::new("note", "rename")
        .with_attribute("note_id", json!(h.note.to_string()))
        .with_attribute("title", json!("final"));
    h.engine.invoke(&request, &Actor::guest()).expect_err("denied");
    assert_eq!(h.store.lookup_calls().row_permission, 1);
    assert_eq!(h.store.lookup_calls().fetch_rows, 0);
}

//! `password.reset.begin` end to end.

use actuate_action::config::ActuateConfig;
use actuate_action::memory::{Fixture, MemoryStore};
use actuate_action::testing::{RecordingMailer, RecordingQueue};
use actuate_action::{
    ActionCatalog, ActionEngine, ActionError, ActionRequest, ActionResponse, ResetTokenIssuer,
};
use actuate_auth::Actor;
use serde_json::json;
use std::sync::Arc;

const CATALOG: &str = r#"
[[action]]
type = "user_account"
name = "password.reset.begin"
instance_optional = true

[[action.in_fields]]
column_name = "email"

[[action.validations]]
column_name = "email"
tags = "email"

[[action.conformations]]
column_name = "email"
tags = "email"

[[action.out_fields]]
type = "password.reset.begin"
method = "EXECUTE"
reference = "reset"
attributes = { email = "~email" }

[[action.out_fields]]
type = "client.notify"
method = "ACTIONRESPONSE"
attributes = { type = "!reset.sent and 'success' or 'error'", title = "!reset.sent and 'Success' or 'Failed'", message = "!reset.sent and 'Check your inbox' or 'No such account'" }
"#;

fn engine(mailer: Arc<RecordingMailer>) -> ActionEngine {
    let fixture: Fixture = serde_json::from_value(json!({
        "tables": {
            "user_account": {
                "rows": [{"email": "ada@example.com", "name": "Ada"}]
            }
        },
        "actions": [
            {"type": "user_account", "name": "password.reset.begin", "permission": {"world": "execute"}}
        ]
    }))
    .expect("fixture");

    let mut config = ActuateConfig::default();
    config.password_reset.secret = "integration-secret".into();

    ActionEngine::builder(
        ActionCatalog::from_toml_str(CATALOG).expect("catalog"),
        Arc::new(MemoryStore::from_fixture(fixture)),
        Arc::new(RecordingQueue::new()),
    )
    .with_config(config)
    .with_mailer(mailer)
    .build()
}

fn begin(engine: &ActionEngine, email: &str) -> Vec<ActionResponse> {
    let request =
        ActionRequest::new("user_account", "password.reset.begin").with_attribute("email", json!(email));
    engine.invoke(&request, &Actor::guest()).expect("invoke")
}

#[test]
fn unknown_email_yields_one_error_notice() {
    let mailer = Arc::new(RecordingMailer::new());
    let responses = begin(&engine(mailer.clone()), "nobody@example.com");

    assert_eq!(responses.len(), 1);
    assert!(responses[0].is_notify("error"));
    assert!(mailer.sent().is_empty());
}

#[test]
fn known_email_yields_one_success_notice_without_token() {
    let mailer = Arc::new(RecordingMailer::new());
    // Conformation lower-cases before lookup.
    let responses = begin(&engine(mailer.clone()), "Ada@Example.com");

    assert_eq!(responses.len(), 1);
    assert!(responses[0].is_notify("success"));

    let sent = mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ada@example.com");
    let token = sent[0].body.rsplit(' ').next().expect("token").to_string();
    let claims = ResetTokenIssuer::new("integration-secret", 30)
        .verify(&token)
        .expect("token signed with configured secret");
    assert_eq!(claims.email, "ada@example.com");

    let rendered = serde_json::to_string(&responses).expect("serialize");
    assert!(!rendered.contains(&token));
}

#[test]
fn malformed_email_fails_validation() {
    let mailer = Arc::new(RecordingMailer::new());
    let request = ActionRequest::new("user_account", "password.reset.begin")
        .with_attribute("email", json!("not-an-email"));
    let failure = engine(mailer.clone())
        .invoke(&request, &Actor::guest())
        .expect_err("invalid email");

    assert!(matches!(failure.error, ActionError::Validation(_)));
    assert!(failure.responses.is_empty());
    assert!(mailer.sent().is_empty());
}

#[test]
fn untrimmed_email_fails_validation_before_conformation() {
    let mailer = Arc::new(RecordingMailer::new());
    let request = ActionRequest::new("user_account", "password.reset.begin")
        .with_attribute("email", json!(" ada@example.com "));
    let failure = engine(mailer.clone())
        .invoke(&request, &Actor::guest())
        .expect_err("untrimmed email");

    assert!(matches!(failure.error, ActionError::Validation(_)));
    assert!(failure.responses.is_empty());
    assert!(mailer.sent().is_empty());
}

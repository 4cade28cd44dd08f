//! The outcome state machine.
//!
//! ```text
//! prepare:  subject -> action EXECUTE -> conform / validate / extract -> seed context
//!
//! per outcome:
//!   condition false? ---------------------------------> skip
//!   resolve attributes --- error --> error response --> stop (or next, continue_on_error)
//!   system route | method route
//!        |            |
//!        +-- error ---+--> client.notify failure -----> stop
//!        +-- ok ------+--> store under reference, collect responses -> next
//! ```
//!
//! Outcomes run strictly in order against one transaction. Nothing is
//! retried; the caller commits or rolls back.

use crate::context::{ATTRIBUTES_KEY, SUBJECT_KEY, USER_KEY};
use crate::guarded::row_type;
use crate::validate::{conform, extract_in_fields, validate};
use crate::{
    ActionDefinition, ActionError, ActionFailure, ActionRequest, ActionResponse,
    HandlerError, ListQuery, Method, Outcome, PerformerRegistry, RequestContext, Route,
    StepContext, StepOutput, SystemRoutes, Transaction, WorkQueue,
};
use actuate_auth::{AccessDenied, Actor, PermissionPolicy};
use actuate_hook::InterceptorChain;
use actuate_script::Resolver;
use actuate_types::{column, render_text, ReferenceId, Row, StoreError};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Response type emitted when an outcome's attributes cannot be resolved.
pub const BUILD_ERROR: &str = "error";

/// Runs action definitions. Built once; shared by every invocation.
pub struct OutcomeDispatcher {
    resolver: Resolver,
    chain: InterceptorChain,
    performers: PerformerRegistry,
    routes: SystemRoutes,
    policy: Arc<dyn PermissionPolicy>,
}

impl OutcomeDispatcher {
    /// Assembles a dispatcher.
    #[must_use]
    pub fn new(
        resolver: Resolver,
        chain: InterceptorChain,
        performers: PerformerRegistry,
        routes: SystemRoutes,
        policy: Arc<dyn PermissionPolicy>,
    ) -> Self {
        Self {
            resolver,
            chain,
            performers,
            routes,
            policy,
        }
    }

    /// The interceptor chain wrapping every CRUD verb.
    #[must_use]
    pub fn chain(&self) -> &InterceptorChain {
        &self.chain
    }

    /// The performer registry.
    #[must_use]
    pub fn performers(&self) -> &PerformerRegistry {
        &self.performers
    }

    /// Runs a whole invocation: [`prepare`](Self::prepare), then
    /// [`run_outcomes`](Self::run_outcomes).
    ///
    /// # Errors
    ///
    /// Returns [`ActionFailure`] with the responses emitted before the
    /// failure.
    pub fn run(
        &self,
        definition: &ActionDefinition,
        request: &ActionRequest,
        actor: &Actor,
        tx: &mut dyn Transaction,
        queue: &dyn WorkQueue,
    ) -> Result<Vec<ActionResponse>, ActionFailure> {
        info!(
            table = %definition.on_type,
            action = %definition.name,
            user = ?actor.user_id(),
            "action started"
        );
        let mut ctx = self
            .prepare(definition, request, actor, &*tx)
            .map_err(ActionFailure::bare)?;
        let responses = self.run_outcomes(definition, &mut ctx, actor, tx, queue)?;
        info!(
            table = %definition.on_type,
            action = %definition.name,
            responses = responses.len(),
            "action finished"
        );
        Ok(responses)
    }

    /// Gates the invocation and seeds its context.
    ///
    /// # Errors
    ///
    /// - [`ActionError::SubjectNotFound`] when a well-formed subject id
    ///   matches no row, or no subject is given and the action needs one
    /// - [`ActionError::PermissionDenied`] when the actor may not execute on
    ///   the subject or invoke the action
    /// - [`ActionError::Validation`] when input is rejected
    pub fn prepare(
        &self,
        definition: &ActionDefinition,
        request: &ActionRequest,
        actor: &Actor,
        tx: &dyn Transaction,
    ) -> Result<RequestContext, ActionError> {
        let table = definition.on_type.as_str();
        let subject_key = definition.subject_key();

        let reference = match request.attributes.get(&subject_key) {
            None | Some(Value::Null) => String::new(),
            Some(raw) => render_text(raw),
        };
        let subject = self.load_subject(table, &reference, actor, tx)?;
        if subject.is_none() && !definition.instance_optional {
            return Err(ActionError::SubjectNotFound {
                on_type: table.to_string(),
                reference,
            });
        }

        let action = tx.action_permission(table, &definition.name)?;
        if !self.policy.can_execute(actor, &action) {
            warn!(table, action = %definition.name, user = ?actor.user_id(), "action denied");
            return Err(AccessDenied::Action {
                table: table.to_string(),
                action: definition.name.clone(),
            }
            .into());
        }

        let mut attributes = request.attributes.clone();
        validate(&definition.validations, &attributes)?;
        conform(&definition.conformations, &mut attributes);
        let in_fields = extract_in_fields(&definition.in_fields, &attributes)?;

        let mut ctx = RequestContext::new();
        for (key, value) in in_fields {
            ctx.insert(key, value);
        }
        ctx.insert(ATTRIBUTES_KEY, Value::Object(attributes));
        ctx.insert(USER_KEY, self.load_user(actor, tx)?);
        if let Some((id, row)) = subject {
            ctx.insert(SUBJECT_KEY, Value::Object(row));
            ctx.insert(subject_key, Value::String(id.to_string()));
        }
        debug!(table, action = %definition.name, keys = ctx.len(), "context seeded");
        Ok(ctx)
    }

    /// Loads the subject named by `reference`.
    ///
    /// An empty or unparsable reference means no subject. A well-formed id
    /// that matches no row is an error.
    fn load_subject(
        &self,
        table: &str,
        reference: &str,
        actor: &Actor,
        tx: &dyn Transaction,
    ) -> Result<Option<(ReferenceId, Row)>, ActionError> {
        if reference.is_empty() {
            return Ok(None);
        }
        let Ok(id) = reference.parse::<ReferenceId>() else {
            debug!(table, reference, "subject id is not a reference id");
            return Ok(None);
        };
        let row = match tx.read_one(table, id) {
            Ok(row) => row,
            Err(err) if err.is_not_found() => {
                return Err(ActionError::SubjectNotFound {
                    on_type: table.to_string(),
                    reference: reference.to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        let permission = tx.row_permission(table, &row)?;
        if !self.policy.can_execute(actor, &permission) {
            warn!(table, %id, user = ?actor.user_id(), "subject denied");
            return Err(AccessDenied::Subject {
                table: table.to_string(),
                id: id.to_string(),
            }
            .into());
        }
        Ok(Some((id, row)))
    }

    fn load_user(&self, actor: &Actor, tx: &dyn Transaction) -> Result<Value, ActionError> {
        let Some(id) = actor.user_id() else {
            return Ok(Value::Object(Row::new()));
        };
        match tx.read_one(column::USER_TABLE, id) {
            Ok(row) => Ok(Value::Object(row)),
            Err(err) if err.is_not_found() || matches!(err, StoreError::UnknownTable(_)) => {
                debug!(%id, "no profile row for actor");
                Ok(json!({ column::REFERENCE_ID: id.to_string() }))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Runs the outcome list against a prepared context.
    ///
    /// # Errors
    ///
    /// Returns [`ActionFailure`] at the first resolution or handler error.
    pub fn run_outcomes(
        &self,
        definition: &ActionDefinition,
        ctx: &mut RequestContext,
        actor: &Actor,
        tx: &mut dyn Transaction,
        queue: &dyn WorkQueue,
    ) -> Result<Vec<ActionResponse>, ActionFailure> {
        let mut responses = Vec::new();

        for (index, outcome) in definition.out_fields.iter().enumerate() {
            if !self.condition_holds(outcome, ctx) {
                debug!(index, outcome = %outcome.outcome_type, condition = %outcome.condition, "outcome skipped");
                continue;
            }

            let mut attributes = match self.resolver.resolve_map(&outcome.attributes, ctx.as_map()) {
                Ok(attributes) => attributes,
                Err(source) => {
                    warn!(index, outcome = %outcome.outcome_type, error = %source, "outcome build failed");
                    responses.push(ActionResponse::new(
                        BUILD_ERROR,
                        json!({ "message": format!("Failed to build outcome {}", outcome.outcome_type) }),
                    ));
                    if outcome.continue_on_error {
                        continue;
                    }
                    return Err(ActionFailure {
                        error: ActionError::OutcomeBuild {
                            outcome: outcome.outcome_type.clone(),
                            source,
                        },
                        responses,
                    });
                }
            };

            debug!(index, outcome = %outcome.outcome_type, method = %outcome.method, "dispatching outcome");
            let mut step = StepContext {
                tx: &mut *tx,
                actor,
                queue,
                chain: &self.chain,
            };
            let output = match self.handle(outcome, &mut attributes, &mut step) {
                Ok(output) => output,
                Err(source) => {
                    warn!(index, outcome = %outcome.outcome_type, error = %source, "outcome failed");
                    responses.push(ActionResponse::notify(
                        "error",
                        "Failed",
                        format!("Failed to {} {}. {}", verb(&outcome.method), outcome.outcome_type, source),
                    ));
                    return Err(ActionFailure {
                        error: ActionError::Handler {
                            outcome: outcome.outcome_type.clone(),
                            source,
                        },
                        responses,
                    });
                }
            };

            if !outcome.reference.is_empty() {
                match &output.result {
                    Some(result) => ctx.store_result(&outcome.reference, result),
                    None if !output.responses.is_empty() => {
                        ctx.store_responses(&outcome.reference, &output.responses);
                    }
                    None => {}
                }
            }
            if outcome.log_to_console {
                for response in &output.responses {
                    info!(
                        outcome = %outcome.outcome_type,
                        response = %response.response_type,
                        attributes = %response.attributes,
                        "outcome response"
                    );
                }
            }
            if !outcome.skip_in_response {
                responses.extend(output.responses);
            }
        }

        Ok(responses)
    }

    /// `true` when the outcome has no condition or it resolves truthy.
    fn condition_holds(&self, outcome: &Outcome, ctx: &RequestContext) -> bool {
        if outcome.condition.is_empty() {
            return true;
        }
        match self.resolver.evaluate(&outcome.condition, ctx.as_map()) {
            Ok(Value::Bool(b)) => b,
            Ok(other) => {
                let text = render_text(&other);
                let text = text.trim();
                text == "1" || text.eq_ignore_ascii_case("true")
            }
            Err(err) => {
                debug!(outcome = %outcome.outcome_type, error = %err, "condition failed to resolve");
                false
            }
        }
    }

    fn handle(
        &self,
        outcome: &Outcome,
        attributes: &mut Row,
        step: &mut StepContext<'_>,
    ) -> Result<StepOutput, HandlerError> {
        match self.routes.route(outcome, attributes)? {
            Route::Respond(kind) => Ok(respond(kind, attributes)),
            Route::Execute(name) => self.execute(&name, outcome, attributes, step),
            Route::Method => self.by_method(outcome, attributes, step),
        }
    }

    fn execute(
        &self,
        name: &str,
        outcome: &Outcome,
        attributes: &Row,
        step: &mut StepContext<'_>,
    ) -> Result<StepOutput, HandlerError> {
        let performer = self
            .performers
            .get(name)
            .ok_or_else(|| HandlerError::UnknownPerformer(name.to_string()))?;
        Ok(performer.do_action(outcome, attributes, step)?)
    }

    fn by_method(
        &self,
        outcome: &Outcome,
        attributes: &mut Row,
        step: &mut StepContext<'_>,
    ) -> Result<StepOutput, HandlerError> {
        let table = outcome.outcome_type.as_str();
        match &outcome.method {
            Method::Create => {
                let row = step.guarded().create(table, attributes.clone())?;
                Ok(passthrough(table, row))
            }
            Method::ReadList => {
                let query = ListQuery::from_attributes(table, attributes);
                let rows = step.guarded().read_list(&query)?;
                Ok(StepOutput {
                    result: Some(rows.clone()),
                    responses: vec![ActionResponse::new(table, rows)],
                })
            }
            Method::ReadById => {
                let id = reference_id(&outcome.method, table, attributes)?;
                let row = step.guarded().read_one(table, id)?;
                Ok(StepOutput {
                    result: Some(row.clone()),
                    responses: vec![ActionResponse::new(table, row)],
                })
            }
            Method::Update => {
                let id = reference_id(&outcome.method, table, attributes)?;
                attributes.remove(column::REFERENCE_ID);
                let row = step.guarded().update(table, id, attributes.clone())?;
                Ok(passthrough(table, row))
            }
            Method::Delete => {
                let id = reference_id(&outcome.method, table, attributes)?;
                step.guarded().delete(table, id)?;
                Ok(StepOutput::respond(ActionResponse::notify(
                    "success",
                    "Success",
                    format!("Deleted {table}"),
                )))
            }
            Method::Execute => self.execute(table, outcome, attributes, step),
            Method::ActionResponse => Ok(respond(table.to_string(), attributes)),
            Method::Other(method) => {
                if self.performers.contains(table) {
                    self.execute(table, outcome, attributes, step)
                } else {
                    warn!(outcome = table, method = %method, "no handler for outcome, skipping");
                    Ok(StepOutput::default())
                }
            }
        }
    }
}

impl fmt::Debug for OutcomeDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutcomeDispatcher")
            .field("chain", &self.chain)
            .field("performers", &self.performers)
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

/// Response of a created or updated row, typed by the row's table.
fn passthrough(table: &str, row: Value) -> StepOutput {
    let kind = row_type(&row).unwrap_or(table).to_string();
    StepOutput {
        result: Some(row.clone()),
        responses: vec![ActionResponse::new(kind, row)],
    }
}

fn respond(kind: String, attributes: &Row) -> StepOutput {
    let value = Value::Object(attributes.clone());
    StepOutput {
        result: Some(value.clone()),
        responses: vec![ActionResponse::new(kind, value)],
    }
}

fn reference_id(method: &Method, table: &str, attributes: &Row) -> Result<ReferenceId, HandlerError> {
    let raw = match attributes.get(column::REFERENCE_ID) {
        None | Some(Value::Null) => None,
        Some(value) => Some(render_text(value)),
    };
    match raw {
        Some(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|_| StoreError::invalid(table, format!("bad reference_id {raw}")).into()),
        _ => Err(HandlerError::MissingReferenceId {
            method: method.to_string(),
        }),
    }
}

/// Lower-case verb for failure messages.
fn verb(method: &Method) -> String {
    match method {
        Method::Other(name) if name.is_empty() => "execute".to_string(),
        other => other.as_str().to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{Fixture, MemoryStore};
    use crate::testing::{tiered_policy, MockPerformer, RecordingQueue};
    use crate::{Store, ValidationError};
    use actuate_hook::{RowAccessGate, TableAccessGate};
    use actuate_script::Template;

    fn dispatcher(performers: PerformerRegistry) -> OutcomeDispatcher {
        let policy = tiered_policy();
        let mut chain = InterceptorChain::new();
        chain.register(Arc::new(TableAccessGate::new(policy.clone())));
        chain.register(Arc::new(RowAccessGate::new(policy.clone())));
        OutcomeDispatcher::new(
            Resolver::default(),
            chain,
            performers,
            SystemRoutes::with_defaults("./schema"),
            policy,
        )
    }

    fn store() -> (MemoryStore, ReferenceId) {
        let id = ReferenceId::new();
        let fixture: Fixture = serde_json::from_value(json!({
            "tables": {
                "note": {
                    "permission": {"world": "peek|read|create|update|delete|execute"},
                    "rows": [{"reference_id": id.to_string(), "title": "first", "permission": {"world": "peek|read|update|delete|execute"}}]
                }
            },
            "actions": [
                {"type": "note", "name": "touch", "permission": {"world": "execute"}},
                {"type": "note", "name": "locked", "permission": {"world": "read"}}
            ]
        }))
        .expect("fixture");
        (MemoryStore::from_fixture(fixture), id)
    }

    fn definition(name: &str, outcomes: Vec<Outcome>) -> ActionDefinition {
        ActionDefinition {
            on_type: "note".into(),
            name: name.into(),
            label: String::new(),
            in_fields: Vec::new(),
            out_fields: outcomes,
            validations: Vec::new(),
            conformations: Vec::new(),
            instance_optional: true,
        }
    }

    fn run(
        dispatcher: &OutcomeDispatcher,
        store: &MemoryStore,
        definition: &ActionDefinition,
        request: ActionRequest,
    ) -> Result<Vec<ActionResponse>, ActionFailure> {
        let mut tx = store.begin().expect("begin");
        let queue = RecordingQueue::new();
        dispatcher.run(definition, &request, &Actor::guest(), tx.as_mut(), &queue)
    }

    #[test]
    fn crud_methods_route_through_the_chain() {
        let (store, id) = store();
        let d = dispatcher(PerformerRegistry::default());
        let def = definition(
            "touch",
            vec![
                Outcome::new("note", Method::Create)
                    .attribute("title", "$attributes.title")
                    .attribute("permission", Template::from("!262143"))
                    .reference("created"),
                Outcome::new("note", Method::ReadList).attribute("title", "second").reference("found"),
                Outcome::new("note", Method::Update)
                    .attribute("reference_id", "$subject.reference_id")
                    .attribute("title", "renamed"),
                Outcome::new("note", Method::Delete).attribute("reference_id", "$found[0].reference_id"),
            ],
        );
        let request = ActionRequest::new("note", "touch")
            .with_attribute("title", json!("second"))
            .with_attribute("note_id", json!(id.to_string()));

        let responses = run(&d, &store, &def, request).expect("run");
        assert_eq!(responses.len(), 4);
        assert_eq!(responses[0].response_type, "note");
        assert_eq!(responses[0].attributes["title"], json!("second"));
        assert_eq!(responses[1].attributes.as_array().map(Vec::len), Some(1));
        assert_eq!(responses[2].attributes["title"], json!("renamed"));
        assert!(responses[3].is_notify("success"));
        assert_eq!(responses[3].attributes["message"], json!("Deleted note"));
    }

    #[test]
    fn missing_reference_id_fails_the_step() {
        let (store, _) = store();
        let d = dispatcher(PerformerRegistry::default());
        let def = definition("touch", vec![Outcome::new("note", Method::ReadById)]);
        let failure = run(&d, &store, &def, ActionRequest::new("note", "touch")).expect_err("fails");
        assert!(matches!(
            failure.error,
            ActionError::Handler {
                source: HandlerError::MissingReferenceId { .. },
                ..
            }
        ));
        assert_eq!(failure.responses.len(), 1);
        assert!(failure.responses[0].is_notify("error"));
        assert_eq!(
            failure.responses[0].attributes["message"],
            json!("Failed to get_by_id note. no reference_id provided for GET_BY_ID")
        );
    }

    #[test]
    fn unknown_method_falls_back_to_performer_or_skips() {
        let (store, _) = store();
        let performers = PerformerRegistry::builder()
            .register(Arc::new(MockPerformer::returning("note.touch", json!({"ok": true}))))
            .build();
        let d = dispatcher(performers);
        let def = definition(
            "touch",
            vec![
                Outcome::new("note.touch", Method::from("CUSTOM")).reference("t"),
                Outcome::new("nobody", Method::from("CUSTOM")),
                Outcome::new("client.notify", Method::ActionResponse).attribute("message", "$t.ok"),
            ],
        );
        let responses = run(&d, &store, &def, ActionRequest::new("note", "touch")).expect("run");
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].attributes, json!({"message": "true"}));
    }

    #[test]
    fn execute_unknown_performer_is_an_error() {
        let (store, _) = store();
        let d = dispatcher(PerformerRegistry::default());
        let def = definition("touch", vec![Outcome::new("ghost", Method::Execute)]);
        let failure = run(&d, &store, &def, ActionRequest::new("note", "touch")).expect_err("fails");
        assert!(matches!(
            failure.error,
            ActionError::Handler {
                source: HandlerError::UnknownPerformer(ref name),
                ..
            } if name == "ghost"
        ));
    }

    #[test]
    fn conditions_coerce_to_bool() {
        let (store, _) = store();
        let d = dispatcher(PerformerRegistry::default());
        let notify = |condition: &str| {
            Outcome::new("client.notify", Method::ActionResponse)
                .attribute("message", condition)
                .condition(condition)
        };
        let def = definition(
            "touch",
            vec![
                notify("!true"),
                notify("1"),
                notify("TRUE"),
                notify("false"),
                notify("yes"),
                notify("!error('boom')"),
                notify("$missing.key"),
            ],
        );
        let responses = run(&d, &store, &def, ActionRequest::new("note", "touch")).expect("run");
        assert_eq!(responses.len(), 3);
    }

    #[test]
    fn build_error_continues_when_flagged() {
        let (store, _) = store();
        let d = dispatcher(PerformerRegistry::default());
        let mut broken = Outcome::new("client.notify", Method::ActionResponse).attribute("x", "!error('nope')");
        broken.continue_on_error = true;
        let def = definition(
            "touch",
            vec![broken, Outcome::new("client.notify", Method::ActionResponse).attribute("message", "after")],
        );
        let responses = run(&d, &store, &def, ActionRequest::new("note", "touch")).expect("run");
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].response_type, BUILD_ERROR);
        assert_eq!(responses[1].attributes["message"], json!("after"));
    }

    #[test]
    fn build_error_stops_the_loop() {
        let (store, _) = store();
        let d = dispatcher(PerformerRegistry::default());
        let def = definition(
            "touch",
            vec![
                Outcome::new("client.notify", Method::ActionResponse).attribute("x", "!error('nope')"),
                Outcome::new("client.notify", Method::ActionResponse).attribute("message", "after"),
            ],
        );
        let failure = run(&d, &store, &def, ActionRequest::new("note", "touch")).expect_err("fails");
        assert!(matches!(failure.error, ActionError::OutcomeBuild { .. }));
        assert_eq!(failure.responses.len(), 1);
        assert_eq!(
            failure.responses[0].attributes,
            json!({"message": "Failed to build outcome client.notify"})
        );
    }

    #[test]
    fn skip_in_response_still_stores_reference() {
        let (store, _) = store();
        let d = dispatcher(PerformerRegistry::default());
        let mut hidden = Outcome::new("note", Method::ReadList).reference("all");
        hidden.skip_in_response = true;
        let def = definition(
            "touch",
            vec![
                hidden,
                Outcome::new("client.notify", Method::ActionResponse).attribute("message", "$all[0].title"),
            ],
        );
        let responses = run(&d, &store, &def, ActionRequest::new("note", "touch")).expect("run");
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].attributes["message"], json!("first"));
    }

    #[test]
    fn prepare_gates_in_order() {
        let (store, id) = store();
        let d = dispatcher(PerformerRegistry::default());

        let mut needs_subject = definition("touch", Vec::new());
        needs_subject.instance_optional = false;
        let err = run(&d, &store, &needs_subject, ActionRequest::new("note", "touch")).expect_err("no subject");
        assert!(matches!(err.error, ActionError::SubjectNotFound { .. }));

        let bogus = ActionRequest::new("note", "touch").with_attribute("note_id", json!(ReferenceId::new().to_string()));
        let err = run(&d, &store, &needs_subject, bogus).expect_err("unknown subject");
        assert!(matches!(err.error, ActionError::SubjectNotFound { .. }));

        let locked = definition("locked", Vec::new());
        let err = run(&d, &store, &locked, ActionRequest::new("note", "locked")).expect_err("denied");
        assert!(matches!(err.error, ActionError::PermissionDenied(AccessDenied::Action { .. })));

        let mut validated = definition("touch", Vec::new());
        validated.validations = vec![crate::Rule::new("email", "required,email")];
        let request = ActionRequest::new("note", "touch")
            .with_attribute("note_id", json!(id.to_string()))
            .with_attribute("email", json!("nope"));
        let err = run(&d, &store, &validated, request).expect_err("invalid");
        assert_eq!(
            err.error,
            ActionError::Validation(ValidationError::Invalid {
                column: "email".into(),
                reason: "email".into()
            })
        );
    }

    #[test]
    fn prepare_seeds_context() {
        let (store, id) = store();
        let d = dispatcher(PerformerRegistry::default());
        let mut def = definition("touch", Vec::new());
        def.in_fields = vec![crate::Field::new("title")];
        def.conformations = vec![crate::Rule::new("title", "trim")];
        let request = ActionRequest::new("note", "touch")
            .with_attribute("title", json!("  hi "))
            .with_attribute("note_id", json!(id.to_string()));

        let tx = store.begin().expect("begin");
        let ctx = d
            .prepare(&def, &request, &Actor::user(ReferenceId::new()), tx.as_ref())
            .expect("prepare");
        assert_eq!(ctx.get("title"), Some(&json!("hi")));
        assert_eq!(ctx.get("note_id"), Some(&json!(id.to_string())));
        assert_eq!(ctx.get(SUBJECT_KEY).and_then(|s| s.get("title")), Some(&json!("first")));
        assert!(ctx.get(USER_KEY).and_then(|u| u.get(column::REFERENCE_ID)).is_some());
        assert_eq!(ctx.get(ATTRIBUTES_KEY).and_then(|a| a.get("title")), Some(&json!("hi")));
    }

    #[test]
    fn unparsable_subject_id_means_no_subject() {
        let (store, _) = store();
        let d = dispatcher(PerformerRegistry::default());
        let request = ActionRequest::new("note", "touch").with_attribute("note_id", json!("not-an-id"));

        let optional = definition("touch", Vec::new());
        let tx = store.begin().expect("begin");
        let ctx = d.prepare(&optional, &request, &Actor::guest(), tx.as_ref()).expect("prepare");
        assert!(ctx.get(SUBJECT_KEY).is_none());
        assert!(ctx.get("note_id").is_none());

        let mut required = definition("touch", Vec::new());
        required.instance_optional = false;
        let err = d.prepare(&required, &request, &Actor::guest(), tx.as_ref()).expect_err("required");
        assert_eq!(
            err,
            ActionError::SubjectNotFound {
                on_type: "note".into(),
                reference: "not-an-id".into()
            }
        );
    }

    #[test]
    fn validation_sees_input_before_conformation() {
        let (store, _) = store();
        let d = dispatcher(PerformerRegistry::default());
        let mut def = definition("touch", Vec::new());
        def.in_fields = vec![crate::Field::new("email")];
        def.validations = vec![crate::Rule::new("email", "email")];
        def.conformations = vec![crate::Rule::new("email", "email")];
        let tx = store.begin().expect("begin");

        let padded = ActionRequest::new("note", "touch").with_attribute("email", json!(" Ada@Example.com "));
        let err = d.prepare(&def, &padded, &Actor::guest(), tx.as_ref()).expect_err("untrimmed");
        assert_eq!(
            err,
            ActionError::Validation(ValidationError::Invalid {
                column: "email".into(),
                reason: "email".into()
            })
        );

        let clean = ActionRequest::new("note", "touch").with_attribute("email", json!("Ada@Example.com"));
        let ctx = d.prepare(&def, &clean, &Actor::guest(), tx.as_ref()).expect("prepare");
        assert_eq!(ctx.get("email"), Some(&json!("ada@example.com")));
    }
}

use super::optional_text;
use crate::{ActionPerformer, ActionResponse, Outcome, PerformerError, StepContext, StepOutput};
use actuate_types::Row;
use serde_json::Value;

/// `response.create`: echoes its attributes as a response.
///
/// The response type is the `response_type` attribute when given,
/// otherwise the outcome type. The attributes also become the result.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseCreate;

impl ResponseCreate {
    /// Registry name.
    pub const NAME: &'static str = "response.create";
}

impl ActionPerformer for ResponseCreate {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn do_action(
        &self,
        outcome: &Outcome,
        attributes: &Row,
        _step: &mut StepContext<'_>,
    ) -> Result<StepOutput, PerformerError> {
        let response_type =
            optional_text(attributes, "response_type").unwrap_or_else(|| outcome.outcome_type.clone());
        let mut payload = attributes.clone();
        payload.remove("response_type");
        let payload = Value::Object(payload);
        Ok(StepOutput::result(payload.clone()).and_respond(ActionResponse::new(response_type, payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::testing::StepHarness;
    use crate::Method;
    use serde_json::json;

    #[test]
    fn type_comes_from_attribute_or_outcome() {
        let store = MemoryStore::new();
        let mut harness = StepHarness::new(&store).expect("harness");
        let outcome = Outcome::new(ResponseCreate::NAME, Method::Execute);

        let attrs = json!({"response_type": "client.store.set", "key": "token"});
        let out = ResponseCreate
            .do_action(&outcome, attrs.as_object().expect("object"), &mut harness.step())
            .expect("respond");
        assert_eq!(out.responses[0].response_type, "client.store.set");
        assert_eq!(out.responses[0].attributes, json!({"key": "token"}));
        assert_eq!(out.result, Some(json!({"key": "token"})));

        let out = ResponseCreate
            .do_action(&outcome, &Row::new(), &mut harness.step())
            .expect("respond");
        assert_eq!(out.responses[0].response_type, ResponseCreate::NAME);
    }
}

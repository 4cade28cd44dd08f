use super::optional_text;
use crate::{ActionPerformer, Outcome, PerformerError, StepContext, StepOutput};
use actuate_types::Row;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};
use uuid::Uuid;

const DEFAULT_LENGTH: usize = 10;
const MAX_LENGTH: usize = 4096;

/// `random.generate`: a random alphanumeric string, or a v4 UUID when
/// `type` is `uuid`. Result is `{value}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomGenerate;

impl RandomGenerate {
    /// Registry name.
    pub const NAME: &'static str = "random.generate";

    fn length(attributes: &Row) -> Result<usize, PerformerError> {
        let length = match attributes.get("length") {
            None | Some(Value::Null) => return Ok(DEFAULT_LENGTH),
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            Some(_) => None,
        };
        match length.and_then(|n| usize::try_from(n).ok()) {
            Some(n) if (1..=MAX_LENGTH).contains(&n) => Ok(n),
            _ => Err(PerformerError::invalid(
                "length",
                format!("expected an integer between 1 and {MAX_LENGTH}"),
            )),
        }
    }
}

impl ActionPerformer for RandomGenerate {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn do_action(
        &self,
        _outcome: &Outcome,
        attributes: &Row,
        _step: &mut StepContext<'_>,
    ) -> Result<StepOutput, PerformerError> {
        let value = match optional_text(attributes, "type").as_deref() {
            Some("uuid") => Uuid::new_v4().to_string(),
            None | Some("string") => {
                let length = Self::length(attributes)?;
                rand::thread_rng()
                    .sample_iter(&Alphanumeric)
                    .take(length)
                    .map(char::from)
                    .collect()
            }
            Some(other) => {
                return Err(PerformerError::invalid("type", format!("unknown kind '{other}'")));
            }
        };
        Ok(StepOutput::result(json!({ "value": value })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::testing::StepHarness;
    use crate::Method;

    fn generate(attributes: Value) -> Result<String, PerformerError> {
        let store = MemoryStore::new();
        let mut harness = StepHarness::new(&store).expect("harness");
        let out = RandomGenerate.do_action(
            &Outcome::new(RandomGenerate::NAME, Method::Execute),
            &attributes.as_object().cloned().unwrap_or_default(),
            &mut harness.step(),
        )?;
        let value = out.result.expect("result")["value"].clone();
        Ok(value.as_str().expect("string").to_string())
    }

    #[test]
    fn default_and_explicit_length() {
        let value = generate(json!({})).expect("generate");
        assert_eq!(value.len(), DEFAULT_LENGTH);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(generate(json!({"length": "32"})).expect("generate").len(), 32);
    }

    #[test]
    fn uuid_kind() {
        let value = generate(json!({"type": "uuid"})).expect("generate");
        assert!(Uuid::parse_str(&value).is_ok());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            generate(json!({"length": 0})),
            Err(PerformerError::InvalidAttribute { .. })
        ));
        assert!(matches!(
            generate(json!({"type": "dice"})),
            Err(PerformerError::InvalidAttribute { .. })
        ));
    }
}

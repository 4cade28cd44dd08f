//! Password reset: token issue by mail, and token verification.

use super::{optional_text, required_text};
use crate::token::{ResetTokenIssuer, TokenError};
use crate::{
    ActionPerformer, ActionResponse, ListQuery, Outcome, PerformerError, StepContext, StepOutput,
};
use actuate_types::{column, Row, StoreError};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An outgoing mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Sender address.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

/// Mail transport.
pub trait Mailer: Send + Sync {
    /// Delivers a message. `Err` carries the transport's reason.
    fn send(&self, message: &MailMessage) -> Result<(), String>;
}

/// [`Mailer`] that only logs recipients and subject.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &MailMessage) -> Result<(), String> {
        info!(from = %message.from, to = %message.to, subject = %message.subject, "mail not delivered (log mailer)");
        Ok(())
    }
}

/// `password.reset.begin`: mails a signed reset token to a known account.
///
/// Looks the account up by `email` directly on the transaction, outside
/// the interceptor chain. The result is `{sent, email}`; the token itself
/// only ever leaves through the mailer.
pub struct PasswordResetBegin {
    issuer: ResetTokenIssuer,
    mailer: Arc<dyn Mailer>,
    sender: String,
    subject: String,
}

impl PasswordResetBegin {
    /// Registry name.
    pub const NAME: &'static str = "password.reset.begin";

    /// Creates the performer.
    #[must_use]
    pub fn new(
        issuer: ResetTokenIssuer,
        mailer: Arc<dyn Mailer>,
        sender: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            issuer,
            mailer,
            sender: sender.into(),
            subject: subject.into(),
        }
    }

    fn not_sent(email: &str) -> StepOutput {
        StepOutput::result(json!({"sent": false, "email": email}))
    }
}

impl ActionPerformer for PasswordResetBegin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn do_action(
        &self,
        _outcome: &Outcome,
        attributes: &Row,
        step: &mut StepContext<'_>,
    ) -> Result<StepOutput, PerformerError> {
        let email = required_text(attributes, "email")?;
        let query = ListQuery::new(column::USER_TABLE).param("email", email.as_str());
        let accounts = match step.tx.read_list(&query) {
            Ok(rows) => rows,
            Err(StoreError::UnknownTable(_)) => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        let Some(account) = accounts.first() else {
            debug!("password reset requested for unknown account");
            return Ok(Self::not_sent(&email));
        };
        let to = account
            .get("email")
            .and_then(Value::as_str)
            .unwrap_or(email.as_str())
            .to_string();

        let (token, claims) = self
            .issuer
            .issue(&to)
            .map_err(|e| PerformerError::failed(Self::NAME, e.to_string()))?;
        let message = MailMessage {
            from: self.sender.clone(),
            to: to.clone(),
            subject: format!("{} {}", self.subject, to),
            body: format!("Reset your password by clicking on this link: {token}"),
        };
        self.mailer.send(&message).map_err(|reason| {
            warn!(error = %reason, "password reset mail failed");
            PerformerError::failed(Self::NAME, "failed to send password reset mail")
        })?;

        info!(jti = %claims.jti, "password reset mail sent");
        Ok(StepOutput::result(json!({"sent": true, "email": to})))
    }
}

/// `password.reset.verify`: checks a reset token.
pub struct PasswordResetVerify {
    issuer: ResetTokenIssuer,
}

impl PasswordResetVerify {
    /// Registry name.
    pub const NAME: &'static str = "password.reset.verify";

    /// Creates the performer.
    #[must_use]
    pub fn new(issuer: ResetTokenIssuer) -> Self {
        Self { issuer }
    }
}

impl ActionPerformer for PasswordResetVerify {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn do_action(
        &self,
        _outcome: &Outcome,
        attributes: &Row,
        _step: &mut StepContext<'_>,
    ) -> Result<StepOutput, PerformerError> {
        let token = required_text(attributes, "token")?;
        let expected = optional_text(attributes, "email");

        let response = match self.issuer.verify(&token) {
            Ok(claims) if expected.as_deref().is_some_and(|e| e != claims.email) => {
                ActionResponse::notify("error", "Failed", "Invalid token")
            }
            Ok(claims) => {
                debug!(jti = %claims.jti, "reset token verified");
                return Ok(StepOutput {
                    result: Some(json!({"verified": true, "email": claims.email})),
                    responses: vec![ActionResponse::notify("success", "Success", "Token verified")],
                });
            }
            Err(TokenError::Expired) => ActionResponse::notify("error", "Failed", "Token has expired"),
            Err(err) => {
                debug!(error = %err, "reset token rejected");
                ActionResponse::notify("error", "Failed", "Invalid token")
            }
        };
        Ok(StepOutput {
            result: Some(json!({"verified": false})),
            responses: vec![response],
        })
    }
}

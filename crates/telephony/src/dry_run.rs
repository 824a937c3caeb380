//! Simulated provider
//!
//! Used when `DRY_RUN` is set and in tests. Nothing leaves the process;
//! every request is validated the same way as the live client, logged,
//! and kept in memory for inspection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use callguard_core::{
    validate_call_id, CallAction, CallControl, CallControlError, Notifier, NotifyError,
    PhoneNumber,
};

/// A call-control action the simulator accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedAction {
    pub command_id: Uuid,
    pub call_id: String,
    pub action: CallAction,
    pub issued_at: DateTime<Utc>,
}

/// A text message the simulator accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentMessage {
    pub message_id: Uuid,
    pub from: PhoneNumber,
    pub to: PhoneNumber,
    pub text: String,
}

#[derive(Default)]
pub struct DryRunCallControl {
    issued: Mutex<Vec<IssuedAction>>,
}

impl DryRunCallControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every action accepted so far, in order
    pub fn actions(&self) -> Vec<IssuedAction> {
        self.issued.lock().clone()
    }

    pub fn actions_for(&self, call_id: &str) -> Vec<CallAction> {
        self.issued
            .lock()
            .iter()
            .filter(|a| a.call_id == call_id)
            .map(|a| a.action.clone())
            .collect()
    }

    pub fn count(&self) -> usize {
        self.issued.lock().len()
    }
}

#[async_trait]
impl CallControl for DryRunCallControl {
    async fn execute(&self, call_id: &str, action: &CallAction) -> Result<(), CallControlError> {
        validate_call_id(call_id)?;

        let record = IssuedAction {
            command_id: Uuid::new_v4(),
            call_id: call_id.to_string(),
            action: action.clone(),
            issued_at: Utc::now(),
        };
        tracing::info!(
            call_id = %call_id,
            action = action.name(),
            command_id = %record.command_id,
            "Call-control action (dry run)"
        );
        self.issued.lock().push(record);
        Ok(())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub struct DryRunNotifier {
    sent: Mutex<Vec<SentMessage>>,
}

impl DryRunNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Notifier for DryRunNotifier {
    async fn send(
        &self,
        from: &PhoneNumber,
        to: &PhoneNumber,
        text: &str,
    ) -> Result<(), NotifyError> {
        let message = SentMessage {
            message_id: Uuid::new_v4(),
            from: from.clone(),
            to: to.clone(),
            text: text.to_string(),
        };
        tracing::info!(
            to = %to,
            message_id = %message.message_id,
            "Alert SMS (dry run)"
        );
        tracing::debug!(text = %text, "Alert SMS content (dry run)");
        self.sent.lock().push(message);
        Ok(())
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_actions_in_order() {
        let cc = DryRunCallControl::new();
        cc.execute("a", &CallAction::Answer).await.unwrap();
        cc.execute("b", &CallAction::Answer).await.unwrap();
        cc.execute("a", &CallAction::Hangup).await.unwrap();

        assert_eq!(cc.count(), 3);
        assert_eq!(cc.actions_for("a"), vec![CallAction::Answer, CallAction::Hangup]);
    }

    #[tokio::test]
    async fn test_validates_call_id_like_live_client() {
        let cc = DryRunCallControl::new();
        assert_eq!(
            cc.execute(" ", &CallAction::Answer).await,
            Err(CallControlError::InvalidCallId)
        );
        assert_eq!(cc.count(), 0);
    }

    #[tokio::test]
    async fn test_notifier_records() {
        let n = DryRunNotifier::new();
        let from = PhoneNumber::parse("+18135550100").unwrap();
        let to = PhoneNumber::parse("+17545550000").unwrap();
        n.send(&from, &to, "hello").await.unwrap();
        let sent = n.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "hello");
        assert_eq!(sent[0].to, to);
    }
}

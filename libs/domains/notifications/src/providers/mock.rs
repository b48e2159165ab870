use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use super::{DeliveryError, EmailProvider, OutboundEmail, SentEmail};

type Outcome = Result<(), DeliveryError>;

#[derive(Default)]
struct State {
    script: VecDeque<Outcome>,
    fallback: Option<DeliveryError>,
    sent: Vec<OutboundEmail>,
    calls: usize,
}

/// Scriptable in-process provider.
///
/// Each call pops the next scripted outcome; once the script is exhausted the
/// fallback applies (success unless [`MockProvider::always_fail`] was used).
/// Cloned handles share state.
#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<State>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider that fails every call with `error`.
    pub fn always_fail(error: DeliveryError) -> Self {
        let provider = Self::new();
        provider.with_state(|s| s.fallback = Some(error));
        provider
    }

    /// Queue outcomes for the next calls, in order.
    pub fn script(&self, outcomes: impl IntoIterator<Item = Result<(), DeliveryError>>) {
        self.with_state(|s| s.script.extend(outcomes));
    }

    /// Messages the provider accepted.
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.with_state(|s| s.sent.clone())
    }

    /// Every call, accepted or not.
    pub fn call_count(&self) -> usize {
        self.with_state(|s| s.calls)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

#[async_trait]
impl EmailProvider for MockProvider {
    async fn send(&self, email: &OutboundEmail) -> Result<SentEmail, DeliveryError> {
        self.with_state(|s| {
            s.calls += 1;
            let outcome = match s.script.pop_front() {
                Some(outcome) => outcome,
                None => s.fallback.clone().map_or(Ok(()), Err),
            };
            outcome?;
            s.sent.push(email.clone());
            Ok(SentEmail {
                message_id: format!("mock-{}", Uuid::now_v7()),
            })
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> OutboundEmail {
        OutboundEmail {
            to_email: "a@x.com".to_string(),
            to_name: None,
            subject: "Hi".to_string(),
            html_body: "<p>Hi</p>".to_string(),
            text_body: "Hi".to_string(),
            unsubscribe_url: "http://localhost/api/unsubscribe?email=a%40x.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_script_then_default_success() {
        let provider = MockProvider::new();
        provider.script([Err(DeliveryError::Transient("429".to_string()))]);

        assert!(provider.send(&email()).await.is_err());
        assert!(provider.send(&email()).await.is_ok());
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_always_fail() {
        let provider = MockProvider::always_fail(DeliveryError::Permanent("550".to_string()));
        let err = provider.send(&email()).await.unwrap_err();
        assert!(err.is_permanent());
        assert!(provider.sent().is_empty());
    }
}

//! The chat widget: input, conversation and transport wired together.
//!
//! All state here is owned by the UI task. Requests run in spawned tasks and
//! report back through a [`Completion`] channel; the UI task applies each
//! completion with [`ChatWidget::resolve`].

use std::collections::BTreeMap;
use std::sync::Arc;

use crossterm::event::KeyEvent;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::exchange::{Exchange, ExchangeId, ExchangeState};
use crate::input::{InputAction, InputController};
use crate::message::Message;
use crate::transport::{ChatReply, ChatTransport, TransportError};
use crate::view::ConversationView;

pub const THINKING_LABEL: &str = "Thinking...";
pub const FALLBACK_REPLY: &str =
    "I apologize, but I couldn't generate a response. Please try again.";

pub fn error_text(reason: &str) -> String {
    format!("Sorry, there was an error: {reason}. Please try again.")
}

/// Result of one request, routed back to its exchange
#[derive(Debug)]
pub struct Completion {
    pub exchange: ExchangeId,
    pub outcome: Result<ChatReply, TransportError>,
}

#[derive(Debug, Clone, Copy)]
pub struct WidgetOptions {
    /// When false, submissions are ignored while a request is in flight.
    pub allow_overlapping_sends: bool,
}

impl Default for WidgetOptions {
    fn default() -> Self {
        Self {
            allow_overlapping_sends: true,
        }
    }
}

pub struct ChatWidget {
    view: ConversationView,
    input: InputController,
    transport: Arc<dyn ChatTransport>,
    exchanges: BTreeMap<ExchangeId, Exchange>,
    next_exchange: u64,
    options: WidgetOptions,
    completions: mpsc::UnboundedSender<Completion>,
}

impl ChatWidget {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        completions: mpsc::UnboundedSender<Completion>,
        options: WidgetOptions,
    ) -> Self {
        Self {
            view: ConversationView::new(),
            input: InputController::new(),
            transport,
            exchanges: BTreeMap::new(),
            next_exchange: 0,
            options,
            completions,
        }
    }

    pub fn view(&self) -> &ConversationView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ConversationView {
        &mut self.view
    }

    pub fn input(&self) -> &InputController {
        &self.input
    }

    pub fn exchange(&self, id: ExchangeId) -> Option<&Exchange> {
        self.exchanges.get(&id)
    }

    pub fn awaiting_count(&self) -> usize {
        self.exchanges.values().filter(|e| e.is_awaiting()).count()
    }

    /// Feed a key to the input box, sending if it fired a submit trigger.
    pub fn handle_key(&mut self, key: KeyEvent) -> InputAction {
        let action = self.input.handle_key(key);
        if action == InputAction::Submit {
            self.submit_input();
        }
        action
    }

    pub fn handle_paste(&mut self, text: &str) {
        self.input.handle_paste(text);
    }

    /// True when a new exchange may start now.
    fn may_send(&self) -> bool {
        self.options.allow_overlapping_sends || self.awaiting_count() == 0
    }

    /// Send whatever is in the input box. Blank input does nothing.
    pub fn submit_input(&mut self) -> Option<ExchangeId> {
        if !self.may_send() {
            debug!("submit ignored while a request is in flight");
            return None;
        }
        let text = self.input.take_submission()?;
        Some(self.send(text))
    }

    /// Start an exchange: show the user message and the placeholder, then
    /// issue the request in the background.
    pub fn send(&mut self, text: String) -> ExchangeId {
        let id = ExchangeId::new(self.next_exchange);
        self.next_exchange += 1;

        self.view.append(Message::user(text.clone()));
        let placeholder = self.view.append_placeholder(THINKING_LABEL);

        self.exchanges.insert(
            id,
            Exchange {
                id,
                text: text.clone(),
                state: ExchangeState::AwaitingResponse { placeholder },
            },
        );
        info!(exchange = %id, chars = text.chars().count(), "sending message");

        let transport = Arc::clone(&self.transport);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let outcome = transport.send(&text).await;
            // The receiver is gone only when the app is shutting down
            let _ = completions.send(Completion {
                exchange: id,
                outcome,
            });
        });

        id
    }

    /// Apply a finished request to its exchange.
    pub fn resolve(&mut self, completion: Completion) {
        let Completion { exchange: id, outcome } = completion;

        let Some(exchange) = self.exchanges.get_mut(&id) else {
            warn!(exchange = %id, "completion for unknown exchange");
            return;
        };
        let ExchangeState::AwaitingResponse { placeholder } = exchange.state else {
            warn!(exchange = %id, state = ?exchange.state, "completion for exchange not awaiting a response");
            return;
        };

        self.view.remove(placeholder);

        match outcome {
            Ok(reply) => {
                let text = match reply.response {
                    Some(text) => text,
                    None => {
                        debug!(exchange = %id, "empty response, showing fallback");
                        FALLBACK_REPLY.to_string()
                    }
                };
                self.view.append(Message::bot(text));
                self.settle(id, ExchangeState::Resolved);
                info!(exchange = %id, "exchange resolved");
            }
            Err(err) => {
                error!(exchange = %id, error = ?err, "chat request failed");
                let error_entry = self.view.append(Message::bot(error_text(&err.reason())));
                let retry_entry = self.view.append_retry_offer(id);
                exchange.state = ExchangeState::FailedAwaitingRetry {
                    error_entry,
                    retry_entry,
                };
            }
        }
    }

    /// Drop an exchange that reached a terminal state; nothing routes to it
    /// any more.
    fn settle(&mut self, id: ExchangeId, state: ExchangeState) {
        if let Some(mut exchange) = self.exchanges.remove(&id) {
            exchange.state = state;
            debug!(exchange = %id, state = ?exchange.state, "exchange settled");
        }
    }

    /// Use the retry offer of a failed exchange. Returns the new exchange,
    /// or `None` if `id` is not awaiting a retry or the retry is held back
    /// by the overlap guard. A held-back offer stays on screen.
    pub fn retry(&mut self, id: ExchangeId) -> Option<ExchangeId> {
        let exchange = self.exchanges.get(&id)?;
        let ExchangeState::FailedAwaitingRetry {
            error_entry,
            retry_entry,
        } = exchange.state
        else {
            return None;
        };
        if !self.may_send() {
            debug!(exchange = %id, "retry ignored while a request is in flight");
            return None;
        }
        let text = exchange.text.clone();

        self.view.remove(error_entry);
        self.view.remove(retry_entry);

        let next = self.send(text);
        self.settle(id, ExchangeState::Retried { next });
        info!(exchange = %id, next = %next, "retrying exchange");
        Some(next)
    }

    /// Retry the most recent failed exchange, if any.
    pub fn retry_latest(&mut self) -> Option<ExchangeId> {
        let id = self
            .exchanges
            .values()
            .rev()
            .find(|e| e.is_retryable())
            .map(|e| e.id)?;
        self.retry(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Sender;
    use crate::view::EntryKind;
    use async_trait::async_trait;
    use crossterm::event::{KeyCode, KeyModifiers};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Transport that replays canned outcomes and records what was sent.
    #[derive(Default)]
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<Result<ChatReply, TransportError>>>,
        sent: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn with(outcomes: Vec<Result<ChatReply, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(&self, text: &str) -> Result<ChatReply, TransportError> {
            self.sent.lock().unwrap().push(text.to_string());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Other("no scripted reply".into())))
        }
    }

    fn reply(text: &str) -> Result<ChatReply, TransportError> {
        Ok(ChatReply {
            response: Some(text.to_string()),
        })
    }

    fn server_error(reason: &str) -> Result<ChatReply, TransportError> {
        Err(TransportError::Server {
            status: reqwest::StatusCode::TOO_MANY_REQUESTS,
            reason: reason.to_string(),
        })
    }

    fn widget(
        transport: Arc<ScriptedTransport>,
        options: WidgetOptions,
    ) -> (ChatWidget, mpsc::UnboundedReceiver<Completion>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChatWidget::new(transport, tx, options), rx)
    }

    fn type_and_enter(widget: &mut ChatWidget, text: &str) {
        widget.handle_paste(text);
        widget.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE));
    }

    fn summary(widget: &ChatWidget) -> Vec<(Sender, String)> {
        widget
            .view()
            .entries()
            .iter()
            .map(|e| {
                let text = match &e.kind {
                    EntryKind::Message { message, .. } => message.text.clone(),
                    EntryKind::Placeholder { label } => format!("<{label}>"),
                    EntryKind::RetryOffer { .. } => "<retry>".to_string(),
                };
                (e.sender(), text)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_blank_input_sends_nothing() {
        let transport = ScriptedTransport::with(vec![]);
        let (mut widget, mut rx) = widget(Arc::clone(&transport), WidgetOptions::default());

        type_and_enter(&mut widget, "   \n  ");
        assert!(widget.view().is_empty());
        assert_eq!(widget.submit_input(), None);

        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_success_exchange() {
        let transport = ScriptedTransport::with(vec![reply("Hi there")]);
        let (mut widget, mut rx) = widget(Arc::clone(&transport), WidgetOptions::default());

        type_and_enter(&mut widget, "hello");
        assert_eq!(widget.input().text(), "");
        assert_eq!(
            summary(&widget),
            vec![
                (Sender::User, "hello".to_string()),
                (Sender::Bot, "<Thinking...>".to_string()),
            ]
        );

        widget.resolve(rx.recv().await.unwrap());
        assert_eq!(
            summary(&widget),
            vec![
                (Sender::User, "hello".to_string()),
                (Sender::Bot, "Hi there".to_string()),
            ]
        );
        assert_eq!(widget.view().placeholder_count(), 0);
        assert_eq!(transport.sent(), vec!["hello"]);
    }

    #[tokio::test]
    async fn test_empty_response_shows_fallback() {
        let transport = ScriptedTransport::with(vec![Ok(ChatReply::default())]);
        let (mut widget, mut rx) = widget(transport, WidgetOptions::default());

        let id = widget.send("hello".to_string());
        widget.resolve(rx.recv().await.unwrap());

        let last = widget.view().entries().last().unwrap();
        assert_eq!(last.text(), Some(FALLBACK_REPLY));
        // Settled exchanges are not kept around
        assert!(widget.exchange(id).is_none());
    }

    #[tokio::test]
    async fn test_server_error_then_retry() {
        let transport =
            ScriptedTransport::with(vec![server_error("rate limited"), reply("Hi there")]);
        let (mut widget, mut rx) = widget(Arc::clone(&transport), WidgetOptions::default());

        let first = widget.send("hello".to_string());
        widget.resolve(rx.recv().await.unwrap());

        let entries = summary(&widget);
        assert_eq!(entries.len(), 3);
        assert!(entries[1].1.contains("rate limited"));
        assert_eq!(
            entries[1].1,
            "Sorry, there was an error: rate limited. Please try again."
        );
        assert_eq!(entries[2], (Sender::Bot, "<retry>".to_string()));
        assert!(widget.exchange(first).unwrap().is_retryable());

        let second = widget.retry(first).unwrap();
        // Error and retry entries are gone before the new exchange shows up
        assert_eq!(
            summary(&widget),
            vec![
                (Sender::User, "hello".to_string()),
                (Sender::User, "hello".to_string()),
                (Sender::Bot, "<Thinking...>".to_string()),
            ]
        );
        assert!(widget.exchange(first).is_none());
        assert!(widget.exchange(second).unwrap().is_awaiting());

        // The offer is single-use
        assert_eq!(widget.retry(first), None);

        widget.resolve(rx.recv().await.unwrap());
        assert_eq!(transport.sent(), vec!["hello", "hello"]);
        assert_eq!(
            summary(&widget).last().unwrap(),
            &(Sender::Bot, "Hi there".to_string())
        );
    }

    #[tokio::test]
    async fn test_network_failure_uses_same_template() {
        let transport = ScriptedTransport::with(vec![Err(TransportError::Other(
            "connection refused".to_string(),
        ))]);
        let (mut widget, mut rx) = widget(transport, WidgetOptions::default());

        widget.send("hello".to_string());
        widget.resolve(rx.recv().await.unwrap());

        let entries = summary(&widget);
        assert_eq!(
            entries[1].1,
            "Sorry, there was an error: connection refused. Please try again."
        );
        assert_eq!(entries[2].1, "<retry>");
        assert_eq!(widget.view().placeholder_count(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_sends_resolve_independently() {
        let transport = ScriptedTransport::with(vec![reply("one"), reply("two")]);
        let (mut widget, mut rx) = widget(transport, WidgetOptions::default());

        let a = widget.send("first".to_string());
        let b = widget.send("second".to_string());
        assert_eq!(widget.view().placeholder_count(), 2);
        assert_eq!(widget.awaiting_count(), 2);

        let mut done = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        // Resolve in reverse issue order
        done.sort_by_key(|c| std::cmp::Reverse(c.exchange));
        for completion in done {
            widget.resolve(completion);
        }

        assert_eq!(widget.view().placeholder_count(), 0);
        assert!(widget.exchange(a).is_none());
        assert!(widget.exchange(b).is_none());
        assert_eq!(widget.awaiting_count(), 0);
        assert_eq!(widget.view().len(), 4);
    }

    #[tokio::test]
    async fn test_overlap_guard_keeps_input() {
        let transport = ScriptedTransport::with(vec![reply("ok")]);
        let options = WidgetOptions {
            allow_overlapping_sends: false,
        };
        let (mut widget, mut rx) = widget(Arc::clone(&transport), options);

        type_and_enter(&mut widget, "first");
        type_and_enter(&mut widget, "second");
        assert_eq!(widget.input().text(), "second");
        assert_eq!(widget.awaiting_count(), 1);

        widget.resolve(rx.recv().await.unwrap());
        assert!(widget.submit_input().is_some());
        assert_eq!(widget.input().text(), "");
    }

    #[tokio::test]
    async fn test_overlap_guard_holds_back_retry() {
        let transport = ScriptedTransport::with(vec![
            server_error("rate limited"),
            reply("ok"),
            reply("Hi there"),
        ]);
        let options = WidgetOptions {
            allow_overlapping_sends: false,
        };
        let (mut widget, mut rx) = widget(Arc::clone(&transport), options);

        widget.handle_paste("a");
        let a = widget.submit_input().unwrap();
        widget.resolve(rx.recv().await.unwrap());

        type_and_enter(&mut widget, "b");
        assert_eq!(widget.awaiting_count(), 1);
        let before = summary(&widget);

        assert_eq!(widget.retry(a), None);
        assert_eq!(widget.retry_latest(), None);
        assert_eq!(widget.awaiting_count(), 1);
        assert_eq!(summary(&widget), before);
        assert!(widget.exchange(a).unwrap().is_retryable());

        widget.resolve(rx.recv().await.unwrap());
        assert!(widget.retry(a).is_some());
        widget.resolve(rx.recv().await.unwrap());
        assert_eq!(transport.sent(), vec!["a", "b", "a"]);
        assert!(!summary(&widget).iter().any(|(_, text)| text == "<retry>"));
    }

    #[tokio::test]
    async fn test_duplicate_completion_is_ignored() {
        let transport = ScriptedTransport::with(vec![reply("ok")]);
        let (mut widget, mut rx) = widget(transport, WidgetOptions::default());

        let id = widget.send("hello".to_string());
        widget.resolve(rx.recv().await.unwrap());
        widget.resolve(Completion {
            exchange: id,
            outcome: reply("again"),
        });

        assert_eq!(widget.view().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_latest_picks_newest_failure() {
        let transport = ScriptedTransport::with(vec![
            server_error("first failed"),
            server_error("second failed"),
        ]);
        let (mut widget, mut rx) = widget(transport, WidgetOptions::default());

        let a = widget.send("a".to_string());
        widget.resolve(rx.recv().await.unwrap());
        let b = widget.send("b".to_string());
        widget.resolve(rx.recv().await.unwrap());

        assert!(widget.retry_latest().is_some());
        assert!(widget.exchange(a).unwrap().is_retryable());
        assert!(widget.exchange(b).is_none());
    }
}

//! Terminal chat widget.
//!
//! Captures user text, renders the conversation thread and relays each
//! message to a chat endpoint, showing the reply or an error with a retry
//! offer.
//!
//! - [`widget`]: the exchange protocol (send, resolve, retry)
//! - [`input`], [`view`]: input box and conversation thread
//! - [`transport`]: HTTP requests to the chat endpoint
//! - [`format`]: markdown-style text formatting
//! - [`app`], [`handler`], [`tui`], [`ui`]: the ratatui front end

pub mod app;
pub mod config;
pub mod exchange;
pub mod format;
pub mod handler;
pub mod input;
pub mod message;
pub mod transport;
pub mod tui;
pub mod ui;
pub mod view;
pub mod widget;

// Re-export main types for convenience
pub use config::Config;
pub use exchange::{Exchange, ExchangeId, ExchangeState};
pub use message::{Message, Sender};
pub use transport::{ChatReply, ChatTransport, HttpTransport, TransportError};
pub use view::{ConversationView, EntryId};
pub use widget::{ChatWidget, Completion, WidgetOptions};

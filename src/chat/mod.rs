//! Chat page state.
//!
//! A [`ChatController`] owns one conversation: the pending prompt, the
//! [`Transcript`], the last reply and the loading/error flags. Its
//! [`ChatController::submit`] checks the connection, builds (and caches) an
//! API client from the user's token, sends the transcript plus the prompt and
//! records the reply.
//!
//! By default only the assistant's reply is recorded; the user's turn is sent
//! to the model but not kept. Set
//! [`ChatSettings::persist_user_messages`] to keep both.

mod controller;
mod transcript;

pub use controller::{
    ChatController, ChatSettings, ChatView, EMPTY_PROMPT_MESSAGE, NO_RESPONSE_FALLBACK,
    NOT_CONNECTED_MESSAGE, SubmitOutcome,
};
pub use transcript::Transcript;

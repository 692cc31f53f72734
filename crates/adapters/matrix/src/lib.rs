//! Matrix adapter for hfbot: a [`lib::messaging::MessagingClient`] over matrix-sdk plus the sync loop
//! that feeds room timeline events to the message handler.

mod channel;

pub use channel::{BotHandler, MatrixChannel};

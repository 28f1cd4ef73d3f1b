//! # Ferry Core
//!
//! Sender and receiver protocol state machines for ferry.
//!
//! This crate provides:
//! - `Sender`: create a session (or serve the LAN directly), negotiate
//!   consent, stream each file as compressed chunks
//! - `Receiver`: join a session, accept the offer, write files under the
//!   output path
//! - `CancelToken`: cooperative cancellation selected on at every
//!   suspension point
//! - `Ui`: the seam through which all prompts and progress flow
//!
//! Both machines run on one driver task fed by a bounded event queue; file
//! handles and transfer cursors never leave that task.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod error;
mod events;
pub mod options;
pub mod receiver;
pub mod sender;
pub mod ui;

pub use cancel::CancelToken;
pub use error::TransferError;
pub use options::{DEFAULT_RELAY_ADDR, ReceiverOptions, SenderOptions};
pub use receiver::Receiver;
pub use sender::Sender;
pub use ui::{HeadlessUi, Ui};

#![cfg_attr(docsrs, feature(doc_cfg))]
//! # chanexpect
//!
//! Layered expectations for messages arriving over async channels.
//!
//! chanexpect lets a test declare, up front, which messages it expects a
//! channel to deliver and in what order, then checks what actually arrived.
//! Declarations are grouped into ordered *layers*: while one layer is active
//! every message is matched against it, and once it is satisfied the next
//! layer takes over. Every decision is recorded with a trace explaining it.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::time::Duration;
//! use chanexpect::*;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result {
//!     let (tx, rx) = tokio::sync::mpsc::channel::<String>(16);
//!
//!     let mut expecter = Expecter::new(rx)
//!         .ignore([contains("heartbeat")])
//!         .expect([one_of([eq("login")])?])
//!         .expect([at_least_n_of(2, [contains("order")])?])
//!         .expect([one_of([eq("logout")])?]);
//!     expecter.listen()?;
//!
//!     for m in ["login", "heartbeat", "order:1", "order:2", "logout"] {
//!         tx.send(m.to_string()).await.unwrap();
//!     }
//!
//!     expecter.assert_satisfied(Duration::from_secs(1)).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Core Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Matcher`] | Stateless predicate over one message |
//! | [`Combiner`] | Counts matches per matcher under EACH / ANY / SUM rules |
//! | [`Layer`] | Groups combiners with AND / OR, optionally with a timeout |
//! | [`Expecter`] | Drains a [`Source`] through its layers in the background |
//! | [`MessageResult`] | Status and [`Trace`] recorded for each message |
//! | [`Errors`] | Everything wrong with a finished expecter |
//!
//! ## Combiners
//!
//! A combiner is satisfied once its matchers have matched between `min` and
//! `max` messages, counted one of three ways ([`CombinerMode`]):
//!
//! - **EACH**: every matcher individually ([`all_of`], `*_n_of_each`)
//! - **ANY**: at least one matcher individually (`*_n_of_any`)
//! - **SUM**: all matchers together ([`one_of`], `*_n_of`)
//!
//! Only the first matcher (in declaration order) that accepts a message is
//! credited with it. A combiner that reached its maximum is *saturated* and
//! rejects everything that follows.
//!
//! ## Failures
//!
//! Unexpected messages do not stop the expecter. They are recorded and
//! reported together by [`Expecter::await_satisfied`], alongside a timeout
//! ([`Error::Terminated`]) and an unsatisfied active layer
//! ([`Error::Unsatisfied`]). Enable [`Config::verbose`] to include debug
//! detail (counts, saturation, layer status) in every trace.
//!
//! ## Features
//!
//! - **`serde`** - `Serialize`/`Deserialize` for [`Config`] and the mode enums, and
//!   the JSON `subset` matcher
//!
//! ## Examples
//!
//! See the `examples/` directory:
//!
//! - `handshake.rs` - A connection handshake checked layer by layer

mod combiner;
mod config;
mod error;
mod expecter;
mod layer;
mod matcher;
mod message_result;
mod mode;
mod reporter;
mod source;
mod trace;

mod internal;

pub use combiner::{
    Combiner, all_of, at_least_n_of, at_least_n_of_any, at_least_n_of_each, between_n_of,
    between_n_of_any, between_n_of_each, exactly_n_of, exactly_n_of_any, exactly_n_of_each,
    one_of,
};
pub use config::Config;
pub use error::{Error, Errors};
pub use expecter::Expecter;
pub use layer::Layer;
pub use matcher::{BoxMatcher, Contains, Equal, Matcher, Not, Predicate, contains, eq, not, predicate};
pub use message_result::{MessageResult, MessageStatus};
pub use mode::{CombinerMode, LayerMode};
pub use reporter::{Recorder, Reporter};
pub use source::{Source, StreamSource};
pub use trace::{Trace, TraceLevel};

#[cfg(feature = "serde")]
#[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
pub use matcher::{Subset, subset};

/// Convenience alias for `Result<T, chanexpect::Error>`.
pub type Result<T = ()> = std::result::Result<T, Error>;

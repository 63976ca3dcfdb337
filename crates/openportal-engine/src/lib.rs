//! OpenPortal Page Engine
//!
//! Wires the action and datasource engines into one page session and
//! provides an [`ActionRunner`] for channel-based action triggering.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ActionRunner                         │
//! │  - owns mpsc channel (sender + receiver)                    │
//! │  - run(action) queues an event                              │
//! │  - start(cancel) spawns one task per event                  │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        PageSession                          │
//! │  - state store, route/user/tenant inputs, host              │
//! │  - trigger(action) → ActionResult                           │
//! │  - attach_datasource(config) → DatasourceHandle             │
//! └─────────────────────────────────────────────────────────────┘
//!                  │                             │
//!                  ▼                             ▼
//! ┌──────────────────────────────┐ ┌────────────────────────────┐
//! │        ActionExecutor        │ │     DatasourceManager      │
//! └──────────────────────────────┘ └────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let services = Services::new(http, transport, host);
//! let session = Arc::new(PageSession::new(&config, PageInputs::default(), services)?);
//!
//! let runner = ActionRunner::new(session.clone());
//! let sender = runner.sender();
//!
//! let cancel = CancellationToken::new();
//! tokio::spawn(runner.start(cancel.clone()));
//! sender.send(action).await?;
//! ```

mod error;
mod runner;
mod session;

pub use error::{RunnerError, SessionError};
pub use runner::{ActionOutcome, ActionRunner};
pub use session::{PageInputs, PageSession, Services};

//! Search dispatch to an external engine.
//!
//! The engine itself is a capability behind [`SearchEngine`]: [`ProcessEngine`] runs a real
//! subprocess, [`FakeEngine`] answers deterministically in-process. [`SearchDispatcher`] feeds
//! it paths or content units and reports results through a [`Reporter`].

pub mod dispatcher;
pub mod engine;
pub mod fake;
pub mod process;
pub mod report;

pub use dispatcher::SearchDispatcher;
pub use engine::{ExitClass, SearchEngine, SearchInvocation, SearchTarget};
pub use fake::FakeEngine;
pub use process::ProcessEngine;
pub use report::{Reporter, SharedBuffer};

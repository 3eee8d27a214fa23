//! External collaborators: the review host and the fix worker.
//!
//! Both are consumed strictly through traits so the pipeline stages stay
//! testable against in-memory doubles. Adding a new host backend means
//! implementing [`ReviewHost`]; nothing in `triage/` or `remedy/` changes.

pub mod command;
pub mod http;
pub mod traits;

pub use self::command::CommandFixWorker;
pub use self::http::HttpReviewHost;
pub use self::traits::{
    FixOutcome, FixRequest, FixStatus, FixWorker, ReviewHost, ThreadPage, ThreadState,
};

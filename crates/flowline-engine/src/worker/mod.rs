//! Worker: in-process timer that resumes due scheduled executions

mod poller;

pub use poller::{PollerConfig, ResumePoller};

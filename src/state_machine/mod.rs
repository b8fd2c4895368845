mod history;
mod job;
mod state;
mod step;

pub use history::{Fact, FactSink, FileSink, History, format_log_line};
pub use job::{Job, JobError, JobStatus};
pub use state::{Metadata, RequestState, RequestStatus, is_terminal};
pub use step::Step;

//! The background download pipeline: queue, job, process supervision,
//! identifier extraction, and per-track post-processing.

pub mod ids;
pub mod job;
pub mod postprocess;
pub mod queue;
pub mod supervisor;

pub use job::DownloadJobRunner;
pub use queue::DownloadQueue;
pub use supervisor::ProcessSupervisor;

mod launcher;
mod queue;
mod retention;
mod runner;

pub use launcher::{JobLauncher, LaunchError, TaskLauncher};
pub use queue::{enqueue_job, wait_for_job_completion};
pub use retention::{PruneReport, prune_jobs};
pub use runner::{JobRunner, RunError};

//! User progress records.

mod progress;
mod record;

pub use progress::{ProgressUpdate, UserProgress};
pub use record::UserRecord;

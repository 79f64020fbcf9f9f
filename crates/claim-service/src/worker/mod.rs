//! 后台 Worker

mod follow_up_worker;

pub use follow_up_worker::FollowUpWorker;

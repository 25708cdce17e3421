pub mod clusters;
pub mod listener;
pub mod master_clusters;
pub mod subscription;
pub mod worker_clusters;
pub mod worker_group_notifier;

pub use clusters::*;
pub use listener::*;
pub use master_clusters::*;
pub use subscription::*;
pub use worker_clusters::*;
pub use worker_group_notifier::*;

//! Master 集群协调
//!
//! 维护 Master/Worker 集群成员视图、计算当前 Master 的槽位，
//! 并协调任务组的并发名额。

pub mod cluster;
pub mod slot_manager;
pub mod task_group;

pub use cluster::*;
pub use slot_manager::*;
pub use task_group::*;

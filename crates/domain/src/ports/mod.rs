//! 外部协作方的抽象：注册中心、分布式锁、跨Master的RPC

pub mod registry;
pub mod rpc;

pub use registry::*;
pub use rpc::*;

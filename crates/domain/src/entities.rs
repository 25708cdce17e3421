use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scheduler_errors::SchedulerResult;

/// 默认Worker分组名称，始终包含全部Worker
pub const DEFAULT_WORKER_GROUP: &str = "default";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum ServerStatus {
    #[serde(rename = "NORMAL")]
    #[default]
    Normal,
    #[serde(rename = "BUSY")]
    Busy,
    /// 无法识别的状态一律视为异常，而不是解析失败
    #[serde(rename = "ABNORMAL", other)]
    Abnormal,
}

impl ServerStatus {
    pub fn is_normal(&self) -> bool {
        matches!(self, ServerStatus::Normal)
    }
}

/// Master进程上报到注册中心的心跳
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MasterHeartbeat {
    pub host: String,
    pub port: u16,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub server_status: ServerStatus,
    #[serde(default)]
    pub startup_time: i64,
    #[serde(default)]
    pub report_time: i64,
    #[serde(default)]
    pub process_id: i32,
}

/// Worker进程上报到注册中心的心跳
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerHeartbeat {
    pub host: String,
    pub port: u16,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub server_status: ServerStatus,
    #[serde(default)]
    pub task_thread_pool_usage: f64,
    #[serde(default = "default_worker_host_weight")]
    pub worker_host_weight: i32,
    #[serde(default)]
    pub startup_time: i64,
    #[serde(default)]
    pub report_time: i64,
    #[serde(default)]
    pub process_id: i32,
}

fn default_worker_host_weight() -> i32 {
    100
}

/// 集群成员的公共视图，按地址唯一标识
pub trait ServerMetadata: Clone + Send + Sync + 'static {
    fn address(&self) -> &str;
    fn server_status(&self) -> ServerStatus;
    fn cpu_usage(&self) -> f64;
    fn memory_usage(&self) -> f64;

    /// 从注册中心的原始心跳数据解析
    fn parse_heartbeat(data: &str) -> SchedulerResult<Self>;

    fn is_normal(&self) -> bool {
        self.server_status().is_normal()
    }
}

pub fn format_address(host: &str, port: u16) -> String {
    format!("{host}:{port}")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MasterServerMetadata {
    pub address: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub server_status: ServerStatus,
    pub startup_time: i64,
}

impl From<MasterHeartbeat> for MasterServerMetadata {
    fn from(heartbeat: MasterHeartbeat) -> Self {
        Self {
            address: format_address(&heartbeat.host, heartbeat.port),
            cpu_usage: heartbeat.cpu_usage,
            memory_usage: heartbeat.memory_usage,
            server_status: heartbeat.server_status,
            startup_time: heartbeat.startup_time,
        }
    }
}

impl ServerMetadata for MasterServerMetadata {
    fn address(&self) -> &str {
        &self.address
    }

    fn server_status(&self) -> ServerStatus {
        self.server_status
    }

    fn cpu_usage(&self) -> f64 {
        self.cpu_usage
    }

    fn memory_usage(&self) -> f64 {
        self.memory_usage
    }

    fn parse_heartbeat(data: &str) -> SchedulerResult<Self> {
        let heartbeat: MasterHeartbeat = serde_json::from_str(data)?;
        Ok(heartbeat.into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerServerMetadata {
    pub address: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub server_status: ServerStatus,
    pub task_thread_pool_usage: f64,
    pub worker_weight: i32,
    pub startup_time: i64,
}

impl From<WorkerHeartbeat> for WorkerServerMetadata {
    fn from(heartbeat: WorkerHeartbeat) -> Self {
        Self {
            address: format_address(&heartbeat.host, heartbeat.port),
            cpu_usage: heartbeat.cpu_usage,
            memory_usage: heartbeat.memory_usage,
            server_status: heartbeat.server_status,
            task_thread_pool_usage: heartbeat.task_thread_pool_usage,
            worker_weight: heartbeat.worker_host_weight,
            startup_time: heartbeat.startup_time,
        }
    }
}

impl ServerMetadata for WorkerServerMetadata {
    fn address(&self) -> &str {
        &self.address
    }

    fn server_status(&self) -> ServerStatus {
        self.server_status
    }

    fn cpu_usage(&self) -> f64 {
        self.cpu_usage
    }

    fn memory_usage(&self) -> f64 {
        self.memory_usage
    }

    fn parse_heartbeat(data: &str) -> SchedulerResult<Self> {
        let heartbeat: WorkerHeartbeat = serde_json::from_str(data)?;
        Ok(heartbeat.into())
    }
}

/// Worker分组定义，由持久层维护
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkerGroup {
    pub id: i64,
    pub name: String,
    /// 逗号分隔的Worker地址列表
    pub addr_list: String,
    pub description: Option<String>,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl WorkerGroup {
    pub fn worker_addresses(&self) -> Vec<String> {
        self.addr_list
            .split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Flag {
    #[serde(rename = "NO")]
    No,
    #[serde(rename = "YES")]
    Yes,
}

/// 任务组，限制组内任务实例的并发数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskGroup {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub group_size: i32,
    /// 缓存的占用数，以队列记录为准，由协调器定期修正
    pub use_size: i32,
    pub project_code: i64,
    pub status: Flag,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl TaskGroup {
    pub fn is_enabled(&self) -> bool {
        self.status == Flag::Yes
    }

    pub fn available_size(&self) -> i32 {
        (self.group_size - self.use_size).max(0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskGroupQueueStatus {
    #[serde(rename = "WAIT_QUEUE")]
    WaitQueue,
    #[serde(rename = "ACQUIRE_SUCCESS")]
    AcquireSuccess,
    #[serde(rename = "RELEASE")]
    Release,
}

/// 任务组队列记录
///
/// 状态流转: WAIT_QUEUE -> ACQUIRE_SUCCESS -> RELEASE，
/// 强制启动的记录直接从 WAIT_QUEUE 进入 RELEASE，不占用任务组容量。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskGroupQueue {
    pub id: i64,
    pub task_id: i64,
    pub task_name: String,
    pub group_id: i64,
    pub process_id: i64,
    pub priority: i32,
    pub status: TaskGroupQueueStatus,
    pub force_start: bool,
    pub in_queue: bool,
    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl TaskGroupQueue {
    pub fn is_released(&self) -> bool {
        self.status == TaskGroupQueueStatus::Release && !self.in_queue
    }

    /// 是否正在占用任务组容量
    pub fn is_using_slot(&self) -> bool {
        self.status == TaskGroupQueueStatus::AcquireSuccess && !self.force_start
    }

    pub fn is_waiting(&self) -> bool {
        self.status == TaskGroupQueueStatus::WaitQueue && self.in_queue && !self.force_start
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum TaskExecutionStatus {
    #[serde(rename = "SUBMITTED_SUCCESS")]
    SubmittedSuccess,
    #[serde(rename = "DISPATCH")]
    Dispatch,
    #[serde(rename = "RUNNING_EXECUTION")]
    RunningExecution,
    #[serde(rename = "DELAY_EXECUTION")]
    DelayExecution,
    #[serde(rename = "PAUSE")]
    Pause,
    #[serde(rename = "STOP")]
    Stop,
    #[serde(rename = "FAILURE")]
    Failure,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "KILL")]
    Kill,
    #[serde(rename = "FORCED_SUCCESS")]
    ForcedSuccess,
}

impl TaskExecutionStatus {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TaskExecutionStatus::Pause
                | TaskExecutionStatus::Stop
                | TaskExecutionStatus::Failure
                | TaskExecutionStatus::Success
                | TaskExecutionStatus::Kill
                | TaskExecutionStatus::ForcedSuccess
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskInstance {
    pub id: i64,
    pub name: String,
    pub process_instance_id: i64,
    /// 小于等于0表示不使用任务组
    pub task_group_id: i64,
    pub task_group_priority: i32,
    pub state: TaskExecutionStatus,
    pub host: Option<String>,
}

impl TaskInstance {
    pub fn uses_task_group(&self) -> bool {
        self.task_group_id > 0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WorkflowExecutionStatus {
    #[serde(rename = "SUBMITTED_SUCCESS")]
    SubmittedSuccess,
    #[serde(rename = "RUNNING_EXECUTION")]
    RunningExecution,
    #[serde(rename = "READY_PAUSE")]
    ReadyPause,
    #[serde(rename = "PAUSE")]
    Pause,
    #[serde(rename = "READY_STOP")]
    ReadyStop,
    #[serde(rename = "STOP")]
    Stop,
    #[serde(rename = "FAILURE")]
    Failure,
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "SERIAL_WAIT")]
    SerialWait,
}

impl WorkflowExecutionStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, WorkflowExecutionStatus::RunningExecution)
    }
}

/// 工作流实例，`host` 为负责该实例的Master地址
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInstance {
    pub id: i64,
    pub name: String,
    pub state: WorkflowExecutionStatus,
    pub host: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_master_heartbeat() {
        let data = r#"{"host":"10.0.0.1","port":5678,"cpuUsage":0.3,"memoryUsage":0.5,"serverStatus":"NORMAL","startupTime":1700000000000}"#;
        let metadata = MasterServerMetadata::parse_heartbeat(data).unwrap();

        assert_eq!(metadata.address(), "10.0.0.1:5678");
        assert_eq!(metadata.server_status(), ServerStatus::Normal);
        assert_eq!(metadata.startup_time, 1700000000000);
        assert!(metadata.is_normal());
    }

    #[test]
    fn test_parse_worker_heartbeat_defaults() {
        let data = r#"{"host":"10.0.0.2","port":1234,"cpuUsage":0.1,"memoryUsage":0.2,"serverStatus":"BUSY"}"#;
        let metadata = WorkerServerMetadata::parse_heartbeat(data).unwrap();

        assert_eq!(metadata.address(), "10.0.0.2:1234");
        assert_eq!(metadata.server_status(), ServerStatus::Busy);
        assert_eq!(metadata.worker_weight, 100);
        assert_eq!(metadata.task_thread_pool_usage, 0.0);
        assert!(!metadata.is_normal());
    }

    #[test]
    fn test_unknown_server_status_is_abnormal() {
        let data = r#"{"host":"h","port":1,"cpuUsage":0.0,"memoryUsage":0.0,"serverStatus":"WAITING"}"#;
        let metadata = MasterServerMetadata::parse_heartbeat(data).unwrap();
        assert_eq!(metadata.server_status(), ServerStatus::Abnormal);
    }

    #[test]
    fn test_malformed_heartbeat_is_error() {
        assert!(MasterServerMetadata::parse_heartbeat("not a heartbeat").is_err());
        assert!(WorkerServerMetadata::parse_heartbeat(r#"{"host":"h"}"#).is_err());
    }

    #[test]
    fn test_worker_group_addresses() {
        let group = WorkerGroup {
            id: 1,
            name: "gpu".to_string(),
            addr_list: "10.0.0.1:1234, 10.0.0.2:1234,,".to_string(),
            description: None,
            create_time: Utc::now(),
            update_time: Utc::now(),
        };

        assert_eq!(
            group.worker_addresses(),
            vec!["10.0.0.1:1234".to_string(), "10.0.0.2:1234".to_string()]
        );
    }

    #[test]
    fn test_task_group_available_size() {
        let mut group = TaskGroup {
            id: 1,
            name: "tg".to_string(),
            description: None,
            group_size: 3,
            use_size: 1,
            project_code: 1,
            status: Flag::Yes,
            create_time: Utc::now(),
            update_time: Utc::now(),
        };
        assert_eq!(group.available_size(), 2);
        assert!(group.is_enabled());

        group.use_size = 5;
        assert_eq!(group.available_size(), 0);

        group.status = Flag::No;
        assert!(!group.is_enabled());
    }

    #[test]
    fn test_task_execution_status_finished() {
        assert!(TaskExecutionStatus::Success.is_finished());
        assert!(TaskExecutionStatus::Kill.is_finished());
        assert!(!TaskExecutionStatus::SubmittedSuccess.is_finished());
        assert!(!TaskExecutionStatus::RunningExecution.is_finished());
    }
}

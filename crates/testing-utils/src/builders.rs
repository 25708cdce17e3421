//! Test data builders for creating test entities
//!
//! This module provides builder patterns for creating test data with
//! sensible defaults and easy customization.

use chrono::Utc;
use scheduler_domain::entities::{
    Flag, ProcessInstance, ServerStatus, TaskExecutionStatus, TaskGroup, TaskGroupQueue,
    TaskGroupQueueStatus, TaskInstance, WorkerGroup, WorkflowExecutionStatus,
};

/// Builder for creating test TaskGroup entities
pub struct TaskGroupBuilder {
    task_group: TaskGroup,
}

impl TaskGroupBuilder {
    pub fn new() -> Self {
        Self {
            task_group: TaskGroup {
                id: 1,
                name: "test_task_group".to_string(),
                description: None,
                group_size: 1,
                use_size: 0,
                project_code: 1,
                status: Flag::Yes,
                create_time: Utc::now(),
                update_time: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.task_group.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.task_group.name = name.to_string();
        self
    }

    pub fn with_group_size(mut self, group_size: i32) -> Self {
        self.task_group.group_size = group_size;
        self
    }

    pub fn with_use_size(mut self, use_size: i32) -> Self {
        self.task_group.use_size = use_size;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.task_group.status = Flag::No;
        self
    }

    pub fn build(self) -> TaskGroup {
        self.task_group
    }
}

impl Default for TaskGroupBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test TaskGroupQueue entities
pub struct TaskGroupQueueBuilder {
    queue: TaskGroupQueue,
}

impl TaskGroupQueueBuilder {
    pub fn new() -> Self {
        Self {
            queue: TaskGroupQueue {
                id: 1,
                task_id: 1,
                task_name: "test_task".to_string(),
                group_id: 1,
                process_id: 1,
                priority: 0,
                status: TaskGroupQueueStatus::WaitQueue,
                force_start: false,
                in_queue: true,
                create_time: Utc::now(),
                update_time: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.queue.id = id;
        self
    }

    pub fn with_task_id(mut self, task_id: i64) -> Self {
        self.queue.task_id = task_id;
        self.queue.task_name = format!("task-{task_id}");
        self
    }

    pub fn with_group_id(mut self, group_id: i64) -> Self {
        self.queue.group_id = group_id;
        self
    }

    pub fn with_process_id(mut self, process_id: i64) -> Self {
        self.queue.process_id = process_id;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.queue.priority = priority;
        self
    }

    pub fn with_status(mut self, status: TaskGroupQueueStatus) -> Self {
        self.queue.status = status;
        self
    }

    pub fn force_start(mut self) -> Self {
        self.queue.force_start = true;
        self
    }

    pub fn released(mut self) -> Self {
        self.queue.status = TaskGroupQueueStatus::Release;
        self.queue.in_queue = false;
        self
    }

    pub fn build(self) -> TaskGroupQueue {
        self.queue
    }
}

impl Default for TaskGroupQueueBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test TaskInstance entities
pub struct TaskInstanceBuilder {
    task_instance: TaskInstance,
}

impl TaskInstanceBuilder {
    pub fn new() -> Self {
        Self {
            task_instance: TaskInstance {
                id: 1,
                name: "test_task".to_string(),
                process_instance_id: 1,
                task_group_id: 1,
                task_group_priority: 0,
                state: TaskExecutionStatus::SubmittedSuccess,
                host: None,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.task_instance.id = id;
        self.task_instance.name = format!("task-{id}");
        self
    }

    pub fn with_process_instance_id(mut self, process_instance_id: i64) -> Self {
        self.task_instance.process_instance_id = process_instance_id;
        self
    }

    pub fn with_task_group_id(mut self, task_group_id: i64) -> Self {
        self.task_instance.task_group_id = task_group_id;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.task_instance.task_group_priority = priority;
        self
    }

    pub fn with_state(mut self, state: TaskExecutionStatus) -> Self {
        self.task_instance.state = state;
        self
    }

    pub fn build(self) -> TaskInstance {
        self.task_instance
    }
}

impl Default for TaskInstanceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test ProcessInstance entities
pub struct ProcessInstanceBuilder {
    process_instance: ProcessInstance,
}

impl ProcessInstanceBuilder {
    pub fn new() -> Self {
        Self {
            process_instance: ProcessInstance {
                id: 1,
                name: "test_workflow".to_string(),
                state: WorkflowExecutionStatus::RunningExecution,
                host: Some("127.0.0.1:5678".to_string()),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.process_instance.id = id;
        self
    }

    pub fn with_state(mut self, state: WorkflowExecutionStatus) -> Self {
        self.process_instance.state = state;
        self
    }

    pub fn with_host(mut self, host: Option<&str>) -> Self {
        self.process_instance.host = host.map(str::to_string);
        self
    }

    pub fn build(self) -> ProcessInstance {
        self.process_instance
    }
}

impl Default for ProcessInstanceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn worker_group(id: i64, name: &str, addr_list: &str) -> WorkerGroup {
    WorkerGroup {
        id,
        name: name.to_string(),
        addr_list: addr_list.to_string(),
        description: None,
        create_time: Utc::now(),
        update_time: Utc::now(),
    }
}

/// Serialized master heartbeat as delivered by the registry
pub fn master_heartbeat_json(host: &str, port: u16, status: ServerStatus) -> String {
    serde_json::json!({
        "host": host,
        "port": port,
        "cpuUsage": 0.2,
        "memoryUsage": 0.4,
        "serverStatus": status,
        "startupTime": Utc::now().timestamp_millis(),
        "reportTime": Utc::now().timestamp_millis(),
        "processId": 1,
    })
    .to_string()
}

/// Serialized worker heartbeat as delivered by the registry
pub fn worker_heartbeat_json(host: &str, port: u16, status: ServerStatus) -> String {
    serde_json::json!({
        "host": host,
        "port": port,
        "cpuUsage": 0.2,
        "memoryUsage": 0.4,
        "serverStatus": status,
        "taskThreadPoolUsage": 0.1,
        "workerHostWeight": 100,
    })
    .to_string()
}

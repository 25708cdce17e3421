use crate::*;

#[test]
fn test_scheduler_error_display() {
    let invalid = SchedulerError::invalid_argument("taskGroupId必须大于0");
    assert_eq!(invalid.to_string(), "参数校验失败: taskGroupId必须大于0");

    let registry = SchedulerError::registry("session expired");
    assert_eq!(registry.to_string(), "注册中心错误: session expired");

    let stale = SchedulerError::not_applicable("任务实例已结束");
    assert_eq!(stale.to_string(), "任务组队列记录已不适用: 任务实例已结束");

    let rpc = SchedulerError::rpc("connection refused");
    assert_eq!(rpc.to_string(), "RPC调用失败: connection refused");
}

#[test]
fn test_not_applicable_is_distinguishable() {
    assert!(SchedulerError::not_applicable("gone").is_not_applicable());
    assert!(!SchedulerError::rpc("timeout").is_not_applicable());
    assert!(!SchedulerError::not_applicable("gone").is_retryable());
}

#[test]
fn test_error_classification() {
    assert!(SchedulerError::rpc("x").is_retryable());
    assert!(SchedulerError::persistence("x").is_retryable());
    assert!(SchedulerError::Timeout("x".to_string()).is_retryable());
    assert!(!SchedulerError::invalid_argument("x").is_retryable());

    assert!(SchedulerError::Internal("x".to_string()).is_fatal());
    assert!(SchedulerError::config_error("x").is_fatal());
    assert!(!SchedulerError::registry("x").is_fatal());
}

#[test]
fn test_from_serde_json_error() {
    let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let converted: SchedulerError = err.into();
    assert!(matches!(converted, SchedulerError::Serialization(_)));
}

#[test]
fn test_from_anyhow_error() {
    let converted: SchedulerError = anyhow::anyhow!("boom").into();
    assert_eq!(converted.to_string(), "内部错误: boom");
}

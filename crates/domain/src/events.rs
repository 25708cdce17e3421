use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventType {
    #[serde(rename = "ADD")]
    Add,
    #[serde(rename = "REMOVE")]
    Remove,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "UNKNOWN", other)]
    Unknown,
}

impl EventType {
    pub fn from_raw(raw: &str) -> Self {
        match raw.to_ascii_uppercase().as_str() {
            "ADD" => EventType::Add,
            "REMOVE" => EventType::Remove,
            "UPDATE" => EventType::Update,
            _ => EventType::Unknown,
        }
    }
}

/// 注册中心推送的节点变更事件，`data` 为序列化后的心跳
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryEvent {
    pub path: String,
    pub event_type: EventType,
    pub data: String,
}

impl RegistryEvent {
    pub fn new<P: Into<String>, D: Into<String>>(path: P, event_type: EventType, data: D) -> Self {
        Self {
            path: path.into(),
            event_type,
            data: data.into(),
        }
    }
}

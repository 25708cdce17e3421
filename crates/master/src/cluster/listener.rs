use std::sync::Arc;

/// 集群成员变更监听器，只需实现关心的回调
pub trait ClusterChangeListener<T>: Send + Sync {
    fn on_server_added(&self, _server: &T) {}

    fn on_server_removed(&self, _server: &T) {}

    fn on_server_updated(&self, _server: &T) {}
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// 以闭包形式注册的监听器，未设置的回调不做任何处理
pub struct ClusterCallbacks<T> {
    on_added: Option<Callback<T>>,
    on_removed: Option<Callback<T>>,
    on_updated: Option<Callback<T>>,
}

impl<T> ClusterCallbacks<T> {
    pub fn new() -> Self {
        Self {
            on_added: None,
            on_removed: None,
            on_updated: None,
        }
    }

    pub fn on_added<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_added = Some(Arc::new(f));
        self
    }

    pub fn on_removed<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_removed = Some(Arc::new(f));
        self
    }

    pub fn on_updated<F>(mut self, f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_updated = Some(Arc::new(f));
        self
    }

    /// 三种变更共用同一个回调
    pub fn on_any_change<F>(self, f: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(f);
        Self {
            on_added: Some(callback.clone()),
            on_removed: Some(callback.clone()),
            on_updated: Some(callback),
        }
    }
}

impl<T> Default for ClusterCallbacks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ClusterChangeListener<T> for ClusterCallbacks<T> {
    fn on_server_added(&self, server: &T) {
        if let Some(callback) = &self.on_added {
            callback(server);
        }
    }

    fn on_server_removed(&self, server: &T) {
        if let Some(callback) = &self.on_removed {
            callback(server);
        }
    }

    fn on_server_updated(&self, server: &T) {
        if let Some(callback) = &self.on_updated {
            callback(server);
        }
    }
}

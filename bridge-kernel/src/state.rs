use parking_lot::RwLock;
use std::sync::Arc;

/// État partagé entre la task MQTT, les handlers et l'API HTTP
pub type Shared<T> = Arc<RwLock<T>>;

pub fn new_state<T>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}

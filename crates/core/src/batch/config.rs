use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            flush_interval: Duration::from_secs(5),
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

/// Tunables for the job service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Number of workers in the pool; caps concurrent in-flight jobs.
    pub workers: usize,
    /// Capacity of the submission buffer.
    pub queue_depth: usize,
    /// Capacity of each dispatcher request channel.
    pub request_buffer: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_depth: 100,
            request_buffer: 64,
        }
    }
}

impl ServiceConfig {
    pub fn new(workers: usize, queue_depth: usize) -> Self {
        Self {
            workers,
            queue_depth,
            ..Default::default()
        }
    }

    pub fn with_request_buffer(mut self, request_buffer: usize) -> Self {
        self.request_buffer = request_buffer;
        self
    }
}

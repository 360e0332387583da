/// What a worker is currently doing with its run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkerPhase {
    #[default]
    Unpacking,
    Draining,
    Finished,
}

#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub run_number: i32,
    pub worker_id: usize,
    pub phase: WorkerPhase,
}

impl WorkerStatus {
    pub fn new(progress: f32, run_number: i32, worker_id: usize, phase: WorkerPhase) -> Self {
        Self {
            progress,
            run_number,
            worker_id,
            phase,
        }
    }
}

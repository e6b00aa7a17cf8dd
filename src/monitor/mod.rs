pub mod clock;
pub mod controller;
pub mod evaluator;
pub mod loop_worker;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{MonitorController, TickReport};
pub use evaluator::{
    evaluate, intervals_passed, CleaningInterval, Decision, Evaluation, EvaluationInput,
    MagnetStatus,
};
pub use state::{AlertCheckpoint, AlertState, CheckpointStore};

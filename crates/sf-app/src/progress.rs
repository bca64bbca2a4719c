use crate::solver_stage::SolverPhase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Initializing,
    Preprocessing,
    RunningSolver,
    Postprocessing,
    Presenting,
    Completed,
}

impl RunStage {
    pub fn label(self) -> &'static str {
        match self {
            RunStage::Initializing => "initializing",
            RunStage::Preprocessing => "preprocessing",
            RunStage::RunningSolver => "running solver",
            RunStage::Postprocessing => "postprocessing",
            RunStage::Presenting => "plotting",
            RunStage::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverProgress {
    pub event: usize,
    pub n_events: usize,
    pub phase: SolverPhase,
}

#[derive(Debug, Clone)]
pub struct RunProgressEvent {
    pub stage: RunStage,
    pub elapsed_wall_s: f64,
    pub message: Option<String>,
    pub solver: Option<SolverProgress>,
}

impl RunProgressEvent {
    pub fn stage(stage: RunStage, elapsed_wall_s: f64, message: Option<String>) -> Self {
        Self {
            stage,
            elapsed_wall_s,
            message,
            solver: None,
        }
    }
}

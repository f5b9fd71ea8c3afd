pub mod execution_orchestrator;
pub mod optimization_orchestrator;

pub use execution_orchestrator::ExecutionOrchestrator;
pub use optimization_orchestrator::OptimizationOrchestrator;

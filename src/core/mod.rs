//! 核心编排层：错误分类、会话状态、配图扇出、会话监管、阶段编排器与命令运行时

pub mod builder;
pub mod error;
pub mod fanout;
pub mod orchestrator;
pub mod runtime;
pub mod session_supervisor;
pub mod state;

pub use builder::build_orchestrator;
pub use error::{ErrorKind, ErrorRecord, Operation, StudioError};
pub use fanout::{FanoutReport, ImageFanout};
pub use orchestrator::{OrchestratorOptions, SlideImageReport, StageOrchestrator, REGENERATE_SENTINEL};
pub use runtime::{create_studio, spawn_studio, Command, Notice};
pub use session_supervisor::{GenerationTicket, SessionSupervisor};
pub use state::{OperationId, PendingOps, Session, SessionSnapshot, Stage};

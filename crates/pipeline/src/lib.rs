//! Order processing pipeline: a per-order asynchronous multi-stage state machine.
//!
//! An order moves through OCR, credit deduction, AI solution generation, and
//! video assembly. The [`PipelineOrchestrator`] is the only writer of order
//! status: it durably records each stage's in-progress status before calling
//! the external collaborator, so a crash mid-call leaves the order in a state
//! a reconciler can safely re-drive. Failed stages are terminal until an
//! operator re-enters the pipeline via [`PipelineOrchestrator::retry`].

pub mod error;
pub mod memory;
pub mod orchestrator;
pub mod order;
pub mod postgres;
pub mod providers;
pub mod queue;
pub mod status;
pub mod store;

pub use common::{AccountId, OrderId};
pub use error::{PipelineError, Result};
pub use memory::InMemoryOrderStore;
pub use orchestrator::PipelineOrchestrator;
pub use order::{Order, OrderPatch};
pub use postgres::PostgresOrderStore;
pub use providers::{
    AssemblyService, FileStorage, InMemoryAssemblyService, InMemoryFileStorage,
    InMemoryOcrProvider, InMemorySolutionProvider, OcrExtraction, OcrProvider, ProviderError,
    SolutionProvider, SolutionSteps,
};
pub use queue::PipelineQueue;
pub use status::OrderStatus;
pub use store::{OrderStore, Transition};

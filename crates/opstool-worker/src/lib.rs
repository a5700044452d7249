pub mod config;
pub mod escalation;
pub mod executor;
pub mod handlers;
pub mod notifier;
pub mod orchestrator;
pub mod worker;

pub use config::WorkerConfig;
pub use escalation::{AlertPredicate, EscalationPolicy, EscalationRule};
pub use executor::TaskExecutor;
pub use handlers::{HandlerRegistry, TaskHandler};
pub use notifier::{Notifier, NotifyError, WebhookNotifier};
pub use orchestrator::{CliOrchestrator, Orchestrator, OrchestratorError, RemedialAction};
pub use worker::{ShutdownHandle, Worker, WorkerStats};

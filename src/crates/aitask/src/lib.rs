//! Streaming AI task engine
//!
//! Runs cancellable, retry-capable generation tasks over a language model
//! and tracks one state per task:
//!
//! - [`TaskRegistry`] owns task states and drives `generate`, `cancel` and
//!   `reset`, publishing every state replacement to subscribers.
//! - [`tasks`] defines the built-in task types (`enhance`, `title`): their
//!   argument transformers, workflows and transform stages.
//! - [`store`] is the read-only data contract argument transformers use.
//! - [`config`] loads layered configuration.
//!
//! The streaming primitives (events, transforms, validation retry, the tool
//! loop) live in [`aitask_core`].
//!
//! ```no_run
//! use aitask::{GenerateOptions, TaskConfigs, TaskId, TaskRegistry};
//! use aitask::store::InMemoryStore;
//! use aitask::tasks::TitleArgs;
//! use aitask_core::testing::{Script, ScriptedModel};
//! use aitask_core::ToolSet;
//! use std::sync::Arc;
//!
//! # async fn example() -> aitask::Result<()> {
//! let configs = TaskConfigs::from_config(&Default::default())?;
//! let store = Arc::new(InMemoryStore::load("fixture.json").await?);
//! let registry = TaskRegistry::new(configs, store, ToolSet::new());
//!
//! let model = Arc::new(ScriptedModel::new(vec![Script::text("Quarterly budget review")]));
//! let state = registry
//!     .generate(TaskId::title("s1"), GenerateOptions::new(model, TitleArgs::new("s1")))
//!     .await;
//! println!("{}", state.streamed_text);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod registry;
pub mod state;
pub mod store;
pub mod task;
pub mod tasks;

pub use config::{load_config, AppConfig, ConfigLoader};
pub use error::{AppError, Result};
pub use registry::{GenerateOptions, OnComplete, TaskRegistry};
pub use state::{CurrentStep, StepInfo, TaskState, TaskStatus, TaskUpdate};
pub use store::{DataAccess, InMemoryStore};
pub use task::{TaskId, TaskType};
pub use tasks::{TaskArgs, TaskConfigs, TaskDefinition};

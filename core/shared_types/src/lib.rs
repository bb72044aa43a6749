pub mod config;
pub mod error;
pub mod intent;
pub mod memory;
pub mod model;
pub mod plan;
pub mod profile;
pub mod sql;

pub use config::{AppConfig, CoreLimitsConfig, LLMConfig, ProviderConfig, RedisConfig};
pub use error::{CoreError, CoreResult};
pub use intent::{AmountFilter, AmountOp, DateRange, Entities, Intent};
pub use memory::{ActiveContextRecord, MemoryRecord, MemoryRole};
pub use model::{Computation, ModelResponse, NextDataRequest, UiBlock, UiBlockType};
pub use plan::{IntentContract, InvariantTag, Plan, TimeRangePolicy, ToolCall};
pub use profile::{
    Account, Budgets, BudgetCategory, DerivedMetrics, Goal, Holding, ManualAsset,
    ManualLiability, ProfilePack, RecentTransaction, RecurringIncome, UserCore,
    MAX_ACCOUNTS, MAX_GOALS, MAX_HOLDINGS, MAX_MANUAL_ASSETS, MAX_MANUAL_LIABILITIES,
};
pub use sql::{ExecutionResult, SQLConstraints, SQLRequest, SQLRequestContext, SQLResponse};

/// Correlation identifier used to join logs/traces across orchestrator
/// components, matching the ambient observability stack.
pub type CorrelationId = uuid::Uuid;

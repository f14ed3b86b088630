//! Convenient imports for common functionality.

pub use crate::batch::{Batch, BatchInput, StatementUnit, bindings_from_json};
pub use crate::binder::{Binder, Bindings, Placeholder, StandardBinder};
pub use crate::classify::{is_insert, is_select_like, require_insert, require_select_like};
pub use crate::config::{EngineConfig, EngineConfigFile};
pub use crate::driver::{Connection, ConnectionProvider, DriverError, PreparedStatement};
pub use crate::engine::{BatchEngine, Outcome, QueryOptions, QueryOutput, classify};
pub use crate::error::SqlBatchError;
pub use crate::flavor::{FetchMode, Flavor};
pub use crate::results::{CustomDbRow, Fetched, ResultSet};
pub use crate::split::split_statements;
pub use crate::state::{LastInsertId, ResultEnvelope};
pub use crate::stats::QueryStats;
pub use crate::types::{BindValue, Dialect, LikeMode, RowValues};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteConnection, SqliteManager, SqliteProvider};

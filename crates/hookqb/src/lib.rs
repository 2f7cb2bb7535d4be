//! # hookqb
//!
//! A chainable SQL query builder with lifecycle hooks.
//!
//! ## Features
//!
//! - **Fluent builder**: select, filter, join, order and page with consuming method chains
//! - **Hook pipeline**: before-insert/update/delete/select hooks may rewrite or veto a write
//! - **Statement gateway**: SQL is routed to a driver primitive by its leading keyword
//! - **Read-through cache**: opt-in per query, keyed by a fingerprint of SQL and bindings, purgeable by tag
//! - **Soft deletes**: `delete()` stamps a marker column, reads hide marked rows
//! - **Lazy pagination**: pull rows page by page without loading the full result
//!
//! ```ignore
//! use hookqb::{Db, PgConnection, TracingHook, record};
//! use std::time::Duration;
//!
//! let db = Db::new(PgConnection::new(client).with_table_prefix("app_"))
//!     .with_hook(TracingHook::new())
//!     .with_memory_cache();
//!
//! db.table("users")
//!     .insert_one(record! { "email" => "alice@example.com", "status" => "active" })
//!     .await?;
//!
//! let active = db
//!     .table("users")
//!     .where_eq("status", "active")
//!     .order_by_desc("created_at")
//!     .remember(Duration::from_secs(60))
//!     .tag("users")
//!     .get()
//!     .await?;
//!
//! let mut pages = db.table("events").order_by("id").lazy(500);
//! while let Some(row) = pages.next().await? {
//!     // ...
//! }
//! ```

pub mod builder;
pub mod cache;
pub mod clock;
pub mod compile;
pub mod conditions;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod hook;
pub mod paginate;
pub mod pg;
pub mod query;
pub mod row;
pub mod soft_delete;
pub mod value;

pub use builder::Builder;
pub use cache::{CacheStats, CacheStore, Fingerprint, MemoryStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use compile::{CompiledStatement, Compiler};
pub use conditions::{Condition, Conditions};
pub use config::DbConfig;
pub use db::Db;
pub use error::{OrmError, OrmResult};
pub use gateway::{Connection, Gateway, Route, StatementKind, StatementResult};
pub use hook::{
    AuditEntry, AuditHook, HookContext, HookEvent, HookPipeline, QueryHook, TimestampsHook,
    TracingHook,
};
pub use paginate::RowPages;
pub use pg::PgConnection;
pub use query::{Expr, ExprGroup, QueryState};
pub use row::{FromRow, FromValue, Row};
pub use soft_delete::{SoftDeletes, TrashedMode};
pub use value::{Record, Value};

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{PoolConnection, create_pool};

//! 피드 테이블, 워터마크, 동기화 로그 저장소.
//!
//! 모든 저장소는 trait으로 정의되며 PostgreSQL 구현과
//! 테스트용 메모리 구현([`memory`])을 함께 제공합니다.

pub mod database;
pub mod error;
pub mod feed_table;
pub mod memory;
pub mod reference;
pub mod sync_log;
pub mod watermark;

pub use database::{Database, DatabaseConfig};
pub use error::{DataError, Result};
pub use feed_table::{FeedStore, Filter, PgFeedStore, WriteOp};
pub use memory::{MemoryFeedStore, MemorySyncLog, MemoryWatermarkStore};
pub use reference::{EntityQuery, PgReferenceSource, ReferenceSource, ReferenceTables, StaticReference};
pub use sync_log::{PgSyncLog, SyncLog, SyncLogEntry, SyncState};
pub use watermark::{PgWatermarkStore, WatermarkStore};

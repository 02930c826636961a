//! 시장 데이터 동기화 핵심 타입.
//!
//! 외부 API 레코드를 정규화된 배치로 변환하고,
//! 워터마크 기준으로 수집 구간을 계획하는 데 필요한 타입을 제공합니다.
//!
//! - [`value`]: 셀 값과 타입 변환
//! - [`schema`]: 테이블/컬럼 정의
//! - [`batch`]: 배치, 중복 제거
//! - [`calendar`]: 분기/주/거래일 날짜 계산
//! - [`planner`]: 워터마크 기반 수집 구간 계획
//! - [`reference`]: 실행 단위 참조 데이터 스냅샷
//! - [`target`]: 워터마크 대상 식별자

pub mod batch;
pub mod calendar;
pub mod error;
pub mod planner;
pub mod reference;
pub mod schema;
pub mod target;
pub mod value;

pub use batch::Batch;
pub use error::{CoreError, Result};
pub use planner::{plan, Cadence, EndRule, Epoch, WorkUnit};
pub use reference::{Entity, EntitySet, ReferenceData};
pub use schema::{ColumnDef, ColumnKind, Source, TableSchema};
pub use target::SyncTarget;
pub use value::Value;

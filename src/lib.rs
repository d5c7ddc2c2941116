pub mod config;
pub mod error;
pub mod export;
pub mod registry;
pub mod session;
pub mod totals;

pub use config::Config;
pub use error::{RegistryError, Result};
pub use registry::{
    DEFAULT_RESERVED_THRESHOLD, MAX_RESERVED_THRESHOLD, ParentRowIndex, RowId, RowRegistry,
    ScoreAddress,
};
pub use session::{ScriptOp, Session};
pub use totals::SectionTotals;

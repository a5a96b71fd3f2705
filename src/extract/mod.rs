//! Lab-report extraction core: panel detection, label aliasing, value normalization,
//! receipt-time recovery, row assembly and batch aggregation into the flowsheet.

mod alias;
mod batch;
mod panel;
mod receipt;
mod rows;
mod text;
mod value;
mod vocabulary;


pub use alias::RuleSet;
pub use batch::{BatchSummary, Flowsheet, build_flowsheet};
pub use rows::{RawRow, RowAssembler};

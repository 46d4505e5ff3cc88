pub mod directory;
pub mod overview;
pub mod safety;

pub use directory::{DirectoryRecord, StructuredDirectory};
pub use overview::OverviewRecord;
pub use safety::{BasicCategory, BasicMeasure, SafetyBlock, SAFETY_BLOCK_MARKER};

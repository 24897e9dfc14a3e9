pub mod analysis;
pub mod call;

pub use analysis::{AnalysisResult, TranscriptEntry};
pub use call::{CallHandle, CallMessage, CallRecord, CallRequest, PartyNumber, StructuredData};

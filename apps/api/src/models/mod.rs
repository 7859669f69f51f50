pub mod assessment;
pub mod record;

pub use assessment::{ApplicationPriority, AssessmentResult};
pub use record::Record;

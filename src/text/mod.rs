pub mod quality;
pub mod string_utils;
pub mod token_reduction;

pub use quality::{calculate_quality_score, clean_extracted_text};
pub use string_utils::{normalize_spaces, safe_decode, strip_control_characters};
pub use token_reduction::{ReductionLevel, ReductionStatistics, get_reduction_statistics, reduce_tokens};

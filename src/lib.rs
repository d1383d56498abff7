#[macro_export]
macro_rules! debug_log {
	($($arg:tt)*) => {{
		#[cfg(debug_assertions)]
		{
			eprintln!($($arg)*);
		}
	}};
}

pub mod acquire;
pub mod aggregate;
pub mod cache;
pub mod census;
pub mod config;
pub mod error;
pub mod language;
pub mod lexer;
pub mod pipeline;
pub mod remote;
pub mod repo;
pub mod scanner;

pub use census::{AnalysisResult, FrequencyTable, Meta};
pub use error::AnalyticsError;

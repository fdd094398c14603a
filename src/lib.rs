pub mod error;
pub mod filter;
pub(crate) mod parser;
pub mod reader;
pub mod record;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use error::{Result, VcfError};
pub use filter::{FilterPipeline, MatchType, RangeFilter};
pub use reader::{Control, Observer, Progress, VcfStream};
pub use record::{GenotypeAllele, VariantRecord};
pub use types::{FieldScope, FieldType, FieldValue, Header, HeaderBuilder, Value};

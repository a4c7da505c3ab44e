pub mod extractor;
pub mod jwt;

pub use extractor::{Operator, Submitter};

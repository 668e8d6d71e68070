pub mod completions;
pub mod convert;
pub mod filter;
pub mod inspect;
pub mod options;
pub mod validate;

//! Token parsing and verification.

mod algorithm;
pub mod classify;
mod es512;
mod parser;
mod token;

pub use algorithm::{SigningAlgorithm, UnknownAlgorithm};

pub use parser::{DEFAULT_ALGORITHMS, JwtParser, ParserOptions, TokenParser};
pub use token::{Entity, ParsedToken};

//! Text analysis for Tessera.
//!
//! The index writer only depends on the [`Analyzer`](analyzer::Analyzer)
//! trait: anything that turns a string into a sequence of tokens with byte
//! offsets. Two small analyzers are provided so the crate works end to end.

pub mod analyzer;
pub mod token;

pub use analyzer::{Analyzer, StandardAnalyzer, WhitespaceAnalyzer};
pub use token::{Token, TokenStream};

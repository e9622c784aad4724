//! Randomizer-Gen is a random text generator driven by plain-text randomizer files.
//!
//! A randomizer file declares named text generators separated by blank lines:
//! plain templates, uniform and weighted lists, rotations that step through
//! their items in order, first/subsequent branches, and repeaters. Templates
//! embed references to other declarations with `{NAME}`, `{<NAME}` and
//! `{2<NAME}`. Randomness flows through the [`EntropySource`] trait, so a
//! seeded generator reproduces the same output.
//!
//! # Example
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use randomizer_gen::Registry;
//!
//! let source = "GREETING\nHello, {NAME}!\n\nNAME\n- Ann\n- Bo";
//! let mut registry = Registry::from_source(source).unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(7);
//! let text = registry.evaluate("GREETING", &mut rng).unwrap();
//! assert!(text == "Hello, Ann!" || text == "Hello, Bo!");
//! ```

pub mod ast;
pub mod eval;
pub mod parser;
pub mod registry;
pub mod utils;

pub use eval::{DEFAULT_MAX_DEPTH, evaluate};
pub use parser::parse;
pub use registry::Registry;
pub use utils::{
    EntropySource, EvalError, FixedEntropy, ParseError, RandomizerError, ResolveError, Result,
};

// Re-export the syntax tree types
pub use ast::{Body, Document, RandomizerDef, Segment, StringTemplate};

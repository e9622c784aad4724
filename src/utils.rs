use rand::Rng;
use std::io;
use thiserror::Error;

/// Errors produced while parsing randomizer source text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("duplicate randomizer name '{name}' (line {line})")]
    DuplicateName { name: String, line: usize },

    #[error("malformed reference (line {line}): {reason} in '{snippet}'")]
    MalformedReference {
        line: usize,
        snippet: String,
        reason: String,
    },

    #[error("randomizer '{name}' has an empty body (line {line})")]
    EmptyBody { name: String, line: usize },

    #[error("unexpected token (line {line}): {reason} in '{snippet}'")]
    UnexpectedToken {
        line: usize,
        snippet: String,
        reason: String,
    },
}

/// Errors produced while resolving references at registry build time
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("undefined reference '{name}' in randomizer '{in_definition}'")]
    UndefinedReference { name: String, in_definition: String },
}

/// Errors produced while evaluating a randomizer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("undefined randomizer '{0}'")]
    UndefinedReference(String),

    #[error("recursion limit exceeded expanding '{name}' (depth {depth})")]
    RecursionLimitExceeded { name: String, depth: usize },

    #[error(
        "invalid back-reference {{{depth}<{name}}} in '{in_definition}': {available} prior output(s) recorded"
    )]
    InvalidBackReference {
        name: String,
        depth: usize,
        in_definition: String,
        available: usize,
    },
}

/// Any failure the crate can produce, for callers that funnel the whole
/// load-parse-evaluate pipeline through a single error type
#[derive(Error, Debug)]
pub enum RandomizerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),
}

/// Result type for randomizer operations
pub type Result<T, E = RandomizerError> = std::result::Result<T, E>;

/// Source of uniform random draws consumed by the evaluation engine.
///
/// The engine only ever asks for a draw when there is something to choose
/// between, so `bound` is always at least 1. Deterministic runs are the
/// caller's responsibility: pass a seeded [`StdRng`](rand::rngs::StdRng)
/// or a fixed source such as [`FixedEntropy`].
pub trait EntropySource {
    /// Return a value in `[0, bound)`
    fn next_uniform(&mut self, bound: u64) -> u64;
}

impl EntropySource for rand::rngs::StdRng {
    fn next_uniform(&mut self, bound: u64) -> u64 {
        self.gen_range(0..bound)
    }
}

impl EntropySource for rand::rngs::ThreadRng {
    fn next_uniform(&mut self, bound: u64) -> u64 {
        self.gen_range(0..bound)
    }
}

/// Entropy source that always yields the same draw, clamped to the bound.
///
/// `FixedEntropy(0)` always selects the first item of a list; useful for
/// exercising a specific branch of a grammar without a full RNG.
#[derive(Debug, Clone, Copy)]
pub struct FixedEntropy(pub u64);

impl EntropySource for FixedEntropy {
    fn next_uniform(&mut self, bound: u64) -> u64 {
        self.0.min(bound - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_fixed_entropy_clamps_to_bound() {
        let mut entropy = FixedEntropy(7);
        assert_eq!(entropy.next_uniform(3), 2);
        assert_eq!(entropy.next_uniform(100), 7);
        assert_eq!(entropy.next_uniform(1), 0);
    }

    #[test]
    fn test_rng_entropy_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let draw = rng.next_uniform(5);
            assert!(draw < 5);
        }
    }

    #[test]
    fn test_error_display() {
        let err = ParseError::DuplicateName {
            name: "GREETING".to_string(),
            line: 7,
        };
        assert_eq!(
            err.to_string(),
            "duplicate randomizer name 'GREETING' (line 7)"
        );

        let err = EvalError::InvalidBackReference {
            name: "COIN".to_string(),
            depth: 2,
            in_definition: "STORY".to_string(),
            available: 1,
        };
        assert_eq!(
            err.to_string(),
            "invalid back-reference {2<COIN} in 'STORY': 1 prior output(s) recorded"
        );
    }

    #[test]
    fn test_combined_error_conversions() {
        fn parse_stage() -> Result<()> {
            Err(ParseError::EmptyBody {
                name: "X".to_string(),
                line: 1,
            })?;
            Ok(())
        }

        let err = parse_stage().unwrap_err();
        assert!(matches!(err, RandomizerError::Parse(_)));
        assert_eq!(
            err.to_string(),
            "parse error: randomizer 'X' has an empty body (line 1)"
        );
    }
}

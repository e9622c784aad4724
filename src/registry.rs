//! Name resolution and evaluation state for a parsed document.
//!
//! A [`Registry`] is built once from a [`Document`]: every reference name
//! is checked against the declared names up front, so evaluation never
//! discovers an undefined name mid-expansion. The registry also carries
//! the mutable pieces of a session: rotation cursors and first-use flags,
//! one slot per definition. Cloning a registry starts an independent
//! session over the same shared document.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::ast::Document;
use crate::eval::{self, DEFAULT_MAX_DEPTH};
use crate::parser::parse;
use crate::utils::{EntropySource, EvalError, ResolveError, Result};

/// Mutable per-definition state: the rotation cursor and the
/// first/subsequent flag
#[derive(Debug, Clone)]
pub(crate) struct EvalState {
    pub(crate) cursor: usize,
    pub(crate) first_use: bool,
}

impl EvalState {
    fn new() -> Self {
        EvalState {
            cursor: 0,
            first_use: true,
        }
    }
}

/// A resolved document plus the session state needed to evaluate it
#[derive(Debug, Clone)]
pub struct Registry {
    pub(crate) document: Arc<Document>,
    pub(crate) index: HashMap<String, usize>,
    pub(crate) states: Vec<EvalState>,
    pub(crate) cyclic: Vec<bool>,
}

impl Registry {
    /// Resolve a document into a registry, checking every reference
    pub fn build(document: Document) -> Result<Self, ResolveError> {
        let mut index = HashMap::new();
        for (position, def) in document.defs().iter().enumerate() {
            index.insert(def.name.clone(), position);
        }

        // Check definitions in document order so the first bad reference
        // in the file is the one reported.
        for def in document.defs() {
            for template in def.body.templates() {
                for name in template.reference_names() {
                    if !index.contains_key(name) {
                        return Err(ResolveError::UndefinedReference {
                            name: name.to_string(),
                            in_definition: def.name.clone(),
                        });
                    }
                }
            }
        }

        let cyclic = self_reachability(&document, &index);
        let states = vec![EvalState::new(); document.len()];

        Ok(Registry {
            document: Arc::new(document),
            index,
            states,
            cyclic,
        })
    }

    /// Parse source text and resolve it in one step
    pub fn from_source(source: &str) -> Result<Self> {
        let document = parse(source)?;
        Ok(Registry::build(document)?)
    }

    /// Load and resolve a grammar file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Registry::from_source(&source)
    }

    /// The document this registry was built from
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.document.len()
    }

    pub fn is_empty(&self) -> bool {
        self.document.is_empty()
    }

    /// Whether a definition with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Declared names in document order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.document.defs().iter().map(|def| def.name.as_str())
    }

    /// Whether the named definition can reach itself through references
    /// that re-evaluate. Returns `None` for unknown names.
    pub fn is_cyclic(&self, name: &str) -> Option<bool> {
        self.index.get(name).map(|&position| self.cyclic[position])
    }

    /// Evaluate a definition by name, drawing randomness from `entropy`,
    /// with the default recursion limit
    pub fn evaluate<E: EntropySource + ?Sized>(
        &mut self,
        start: &str,
        entropy: &mut E,
    ) -> Result<String, EvalError> {
        eval::evaluate(self, start, entropy, DEFAULT_MAX_DEPTH)
    }

    /// Restore all rotation cursors and first-use flags to their initial
    /// values, as if nothing had been evaluated yet
    pub fn reset(&mut self) {
        for state in &mut self.states {
            *state = EvalState::new();
        }
    }
}

/// For each definition, whether it can reach itself by following caller
/// references and depthless pointer references. Depth pointers splice
/// previously recorded output without re-evaluating, so they do not count
/// as edges here.
fn self_reachability(document: &Document, index: &HashMap<String, usize>) -> Vec<bool> {
    let mut edges: Vec<Vec<usize>> = Vec::with_capacity(document.len());
    for def in document.defs() {
        let mut targets = Vec::new();
        for template in def.body.templates() {
            for name in template.live_reference_names() {
                targets.push(index[name]);
            }
        }
        targets.sort_unstable();
        targets.dedup();
        edges.push(targets);
    }

    (0..document.len())
        .map(|node| {
            let mut visited = vec![false; document.len()];
            reaches(node, node, &edges, &mut visited)
        })
        .collect()
}

fn reaches(from: usize, target: usize, edges: &[Vec<usize>], visited: &mut [bool]) -> bool {
    for &next in &edges[from] {
        if next == target {
            return true;
        }
        if !visited[next] {
            visited[next] = true;
            if reaches(next, target, edges, visited) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::RandomizerError;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_build_and_lookup() {
        let registry =
            Registry::from_source("GREETING\nHello, {NAME}!\n\nNAME\n- Ann\n- Bo").unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("GREETING"));
        assert!(registry.contains("NAME"));
        assert!(!registry.contains("OTHER"));
    }

    #[test]
    fn test_names_in_document_order() {
        let registry = Registry::from_source("B\nx\n\nA\ny\n\nC\nz").unwrap();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_empty_document_builds() {
        let registry = Registry::from_source("").unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.names().count(), 0);
    }

    #[test]
    fn test_undefined_reference_names_both_sides() {
        let document = parse("STORY\n{HERO} sets out").unwrap();
        let err = Registry::build(document).unwrap_err();
        assert_eq!(
            err,
            ResolveError::UndefinedReference {
                name: "HERO".to_string(),
                in_definition: "STORY".to_string(),
            }
        );
    }

    #[test]
    fn test_forward_references_resolve() {
        let registry = Registry::from_source("GREETING\nHello, {NAME}!\n\nNAME\n- Ann").unwrap();
        assert!(registry.contains("GREETING"));
    }

    #[test]
    fn test_pointer_targets_resolve() {
        assert!(Registry::from_source("A\n- x\n\nB\n{2<A}").is_ok());

        let err = Registry::from_source("B\n{2<A}").unwrap_err();
        assert!(matches!(err, RandomizerError::Resolve(_)));
    }

    #[test]
    fn test_cyclic_flags() {
        let registry = Registry::from_source(concat!(
            "GREETING\nHello, {NAME}!\n\n",
            "NAME\n- Ann\n- Bo\n\n",
            "SELF\n({SELF})\n\n",
            "PING\n{PONG}\n\n",
            "PONG\n2- {PING}\n1- done\n\n",
            "ECHO\n{1<ECHO}\n\n",
            "MIRROR\n{<MIRROR}",
        ))
        .unwrap();

        assert_eq!(registry.is_cyclic("GREETING"), Some(false));
        assert_eq!(registry.is_cyclic("NAME"), Some(false));
        assert_eq!(registry.is_cyclic("SELF"), Some(true));
        assert_eq!(registry.is_cyclic("PING"), Some(true));
        assert_eq!(registry.is_cyclic("PONG"), Some(true));
        // A depth pointer at itself replays output, it does not recurse.
        assert_eq!(registry.is_cyclic("ECHO"), Some(false));
        // A depthless pointer re-evaluates, so it does.
        assert_eq!(registry.is_cyclic("MIRROR"), Some(true));
        assert_eq!(registry.is_cyclic("NOPE"), None);
    }

    #[test]
    fn test_from_source_error_variants() {
        let err = Registry::from_source("BAD NAME\nx").unwrap_err();
        assert!(matches!(err, RandomizerError::Parse(_)));

        let err = Registry::from_source("A\n{MISSING}").unwrap_err();
        assert!(matches!(err, RandomizerError::Resolve(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "COIN\n- heads\n- tails").unwrap();

        let registry = Registry::from_file(file.path()).unwrap();
        assert!(registry.contains("COIN"));
    }

    #[test]
    fn test_from_file_missing() {
        let err = Registry::from_file("/no/such/file.rand").unwrap_err();
        assert!(matches!(err, RandomizerError::Io(_)));
    }

    #[test]
    fn test_clone_shares_document() {
        let registry = Registry::from_source("COIN\n- heads\n- tails").unwrap();
        let clone = registry.clone();
        assert!(Arc::ptr_eq(&registry.document, &clone.document));
    }

    #[test]
    fn test_reset_restores_state() {
        let mut registry = Registry::from_source("CYCLE\n+ a\n+ b").unwrap();
        registry.states[0].cursor = 1;
        registry.states[0].first_use = false;

        registry.reset();
        assert_eq!(registry.states[0].cursor, 0);
        assert!(registry.states[0].first_use);
    }
}

//! The evaluation engine.
//!
//! Evaluating a name expands its body into text, recursively evaluating
//! every reference it contains. Three rules shape the engine:
//!
//! - Rotation cursors and first-use flags are advanced before the chosen
//!   template expands, and stay advanced even if the expansion fails.
//! - Each top-level call keeps a private trace of every output produced
//!   per definition, newest last. A depth pointer such as `{2<NAME}`
//!   splices the n-th most recent entry and records the spliced value as
//!   if it were produced again. The trace is discarded when the call
//!   returns, so back-references never cross call boundaries.
//! - The recursion limit applies only to definitions that can reach
//!   themselves through re-evaluating references. A deep but acyclic
//!   chain of templates expands regardless of the limit.

use std::collections::HashMap;

use crate::ast::{Body, RandomizerDef, Segment, StringTemplate};
use crate::registry::{EvalState, Registry};
use crate::utils::{EntropySource, EvalError};

/// Recursion limit used by [`Registry::evaluate`]
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Evaluate a definition by name with an explicit recursion limit.
///
/// Randomness comes from `entropy`; pass a seeded generator for
/// reproducible output. Rotation and first-use state advances on the
/// registry, so repeated calls continue the same session.
pub fn evaluate<E: EntropySource + ?Sized>(
    registry: &mut Registry,
    start: &str,
    entropy: &mut E,
    max_depth: usize,
) -> Result<String, EvalError> {
    let mut ctx = EvalCtx {
        defs: registry.document.defs(),
        index: &registry.index,
        cyclic: registry.cyclic.as_slice(),
        states: registry.states.as_mut_slice(),
        entropy,
        max_depth,
        stack: Vec::new(),
        trace: HashMap::new(),
    };
    ctx.eval_name(start)
}

/// Working set for one top-level evaluation
struct EvalCtx<'a, E: ?Sized> {
    defs: &'a [RandomizerDef],
    index: &'a HashMap<String, usize>,
    cyclic: &'a [bool],
    states: &'a mut [EvalState],
    entropy: &'a mut E,
    max_depth: usize,
    /// Definitions currently being expanded, outermost first
    stack: Vec<usize>,
    /// Outputs recorded so far in this call, keyed by definition
    trace: HashMap<usize, Vec<String>>,
}

impl<E: EntropySource + ?Sized> EvalCtx<'_, E> {
    fn eval_name(&mut self, name: &str) -> Result<String, EvalError> {
        match self.index.get(name) {
            Some(&position) => self.eval_position(position),
            None => Err(EvalError::UndefinedReference(name.to_string())),
        }
    }

    fn eval_position(&mut self, position: usize) -> Result<String, EvalError> {
        self.stack.push(position);
        if self.cyclic[position] && self.stack.len() > self.max_depth {
            let error = EvalError::RecursionLimitExceeded {
                name: self.defs[position].name.clone(),
                depth: self.stack.len(),
            };
            self.stack.pop();
            return Err(error);
        }

        let result = self.eval_body(position);
        self.stack.pop();

        let output = result?;
        self.trace.entry(position).or_default().push(output.clone());
        Ok(output)
    }

    fn eval_body(&mut self, position: usize) -> Result<String, EvalError> {
        let defs = self.defs;
        match &defs[position].body {
            Body::Literal(template) => self.expand(template),
            Body::List(items) => {
                let choice = self.draw(items.len());
                self.expand(&items[choice])
            }
            Body::WeightedList(items) => {
                let choice = self.pick_weighted(items);
                self.expand(&items[choice].1)
            }
            Body::RotateList(items) => {
                let cursor = self.states[position].cursor;
                self.states[position].cursor = (cursor + 1) % items.len();
                self.expand(&items[cursor])
            }
            Body::IfBranch { first, subsequent } => {
                if self.states[position].first_use {
                    self.states[position].first_use = false;
                    self.expand(first)
                } else {
                    self.expand(subsequent)
                }
            }
            Body::Repeater { count, template } => {
                let mut output = String::new();
                for _ in 0..*count {
                    output.push_str(&self.expand(template)?);
                }
                Ok(output)
            }
        }
    }

    fn expand(&mut self, template: &StringTemplate) -> Result<String, EvalError> {
        let mut output = String::new();
        for segment in &template.segments {
            match segment {
                Segment::Text(text) => output.push_str(text),
                Segment::CallerRef(name) | Segment::PointerRef { depth: None, name } => {
                    let value = self.eval_name(name)?;
                    output.push_str(&value);
                }
                Segment::PointerRef {
                    depth: Some(depth),
                    name,
                } => {
                    let value = self.splice_back_reference(name, *depth)?;
                    output.push_str(&value);
                }
            }
        }
        Ok(output)
    }

    fn splice_back_reference(&mut self, name: &str, depth: usize) -> Result<String, EvalError> {
        let position = match self.index.get(name) {
            Some(&position) => position,
            None => return Err(EvalError::UndefinedReference(name.to_string())),
        };

        let available = self.trace.get(&position).map_or(0, Vec::len);
        if depth == 0 || depth > available {
            return Err(EvalError::InvalidBackReference {
                name: name.to_string(),
                depth,
                in_definition: self.current_name(),
                available,
            });
        }

        let outputs = self.trace.entry(position).or_default();
        let value = outputs[available - depth].clone();
        outputs.push(value.clone());
        Ok(value)
    }

    fn current_name(&self) -> String {
        self.stack
            .last()
            .map(|&position| self.defs[position].name.clone())
            .unwrap_or_default()
    }

    fn draw(&mut self, bound: usize) -> usize {
        self.entropy.next_uniform(bound as u64) as usize
    }

    fn pick_weighted(&mut self, items: &[(u32, StringTemplate)]) -> usize {
        let total: u64 = items.iter().map(|(weight, _)| u64::from(*weight)).sum();
        let mut roll = self.entropy.next_uniform(total);
        for (position, (weight, _)) in items.iter().enumerate() {
            let weight = u64::from(*weight);
            if roll < weight {
                return position;
            }
            roll -= weight;
        }
        // roll < total, so with positive weights the loop returned above
        items.len() - 1
    }
}

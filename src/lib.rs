//! nidus: a hierarchical NFA matching engine for schema content models.
//!
//! The engine recognizes sequences of opaque symbols and supports *nested*
//! sub-automata attached to individual states, with event bubbling between a
//! nested level and its enclosing state. It is the matching core of an XML
//! Schema style validator: element-content models, pattern facets and
//! complex-type particles all compile down to these graphs. The key
//! components are:
//!
//! - [`Nfa`]: arena-backed graph store plus the builder primitives
//!   (`add_state`, `add_transition`, nested attachment, the `repeat`
//!   occurrence transform)
//! - [`Matcher`]: a per-run active frontier consuming one symbol per step,
//!   with transactional failure and hierarchical propagation
//! - [`DumpMode`]: textual / Graphviz introspection of compiled graphs
//!
//! # Module Organization
//!
//! - `graph`: handles, arenas, intrusive transition lists, builder primitives
//! - `repeat`: the `{min,max}` occurrence transform (sub-graph cloning)
//! - `matcher`: frontier bookkeeping, `process`, acceptance, diagnostics
//! - `dump`: pretty-printers, no semantics
//!
//! # Example
//!
//! ```
//! use nidus::{Nfa, StateId};
//!
//! // Content model (ab){1,2}: "ab" or "abab".
//! let mut nfa: Nfa<char, ()> = Nfa::new(false);
//! let s1 = nfa.add_state(());
//! let s2 = nfa.add_state(());
//! nfa.add_transition(StateId::START, s1, 'a');
//! nfa.add_transition(s1, s2, 'b');
//! nfa.add_empty_transition(s2, StateId::FINAL);
//! nfa.repeat(StateId::START, s2, 1, Some(2));
//!
//! let mut matcher = nfa.start_match();
//! for c in "abab".chars() {
//!     assert!(matcher.process(&c));
//! }
//! assert!(matcher.in_final());
//! ```
//!
//! After construction the graph is immutable: any number of matchers may run
//! against it independently, each owning its own frontier.

mod dump;
mod graph;
mod matcher;
mod repeat;

pub use dump::DumpMode;
pub use graph::{Nested, Nfa, StateId};
pub use matcher::Matcher;

/// A transition symbol.
///
/// The engine never inspects symbols beyond this trait: `matches` decides
/// whether a transition accepts a runtime input, and `image` renders the
/// symbol for [`Matcher::expected`] and the dumps. Symbol and input types
/// may differ; a schema validator typically carries compiled particles as
/// symbols and offers element names as inputs.
pub trait Symbol {
    /// The runtime input offered to [`Matcher::process`].
    type Input: ?Sized;

    /// Does this transition symbol accept the given input?
    fn matches(&self, input: &Self::Input) -> bool;

    /// Short printable form used in diagnostics.
    fn image(&self) -> String;
}

impl Symbol for char {
    type Input = char;

    fn matches(&self, input: &char) -> bool {
        self == input
    }

    fn image(&self) -> String {
        self.to_string()
    }
}

impl Symbol for &'static str {
    type Input = str;

    fn matches(&self, input: &str) -> bool {
        *self == input
    }

    fn image(&self) -> String {
        (*self).to_string()
    }
}

impl Symbol for String {
    type Input = str;

    fn matches(&self, input: &str) -> bool {
        self.as_str() == input
    }

    fn image(&self) -> String {
        self.clone()
    }
}

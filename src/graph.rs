//! Arena-based graph store for hierarchical NFAs.
//!
//! States and transitions live in two append-only arenas addressed by small
//! integer handles. This allows true cyclic references (needed for `*` and
//! `+` style repetition loops) without ownership gymnastics: a `StateId` is
//! just an index, so states can point at each other freely and the matcher
//! can hold a shared reference to the whole graph.
//!
//! Transitions form intrusive singly linked lists threaded through the
//! transition arena. Each state carries two list heads: the ordinary
//! transition list, and the on-nested-exit list that fires when the state's
//! nested sub-automaton completes. Prepending is O(1) and the repetition
//! transform can splice entries between lists in place.

use crate::Symbol;

/// A state identifier - an index into the state arena.
///
/// Two values are reserved: [`StateId::START`], created implicitly by
/// [`Nfa::new`], and [`StateId::FINAL`], the acceptance sentinel which has no
/// backing record and can only appear as a transition target.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct StateId(u32);

impl StateId {
    /// The implicit entry state of every NFA.
    pub const START: StateId = StateId(0);

    /// The acceptance sentinel. Not stored in the arena; no transitions may
    /// originate from it.
    pub const FINAL: StateId = StateId(u32::MAX);

    #[inline]
    pub fn is_final(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) fn from_index(index: usize) -> StateId {
        StateId(index as u32)
    }
}

impl std::fmt::Display for StateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_final() {
            write!(f, "F")
        } else {
            write!(f, "S{}", self.0)
        }
    }
}

/// A transition identifier - an index into the transition arena.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct TransId(u32);

impl TransId {
    pub(crate) const NONE: TransId = TransId(u32::MAX);

    #[inline]
    pub(crate) fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A state record in the arena.
pub(crate) struct StateNode<D> {
    /// Caller-defined payload.
    pub(crate) data: D,
    /// Entry state of an attached nested NFA, if any.
    pub(crate) nested: Option<StateId>,
    /// Head of the ordinary transition list.
    pub(crate) first_trans: TransId,
    /// Head of the on-nested-exit transition list.
    pub(crate) first_exit: TransId,
}

/// A transition record in the arena. `sym == None` marks an ε transition.
pub(crate) struct TransNode<S> {
    pub(crate) to: StateId,
    pub(crate) sym: Option<S>,
    pub(crate) next: TransId,
}

/// A lightweight reference to a nested sub-automaton.
///
/// Produced by [`Nfa::create_nested`] and installed with [`Nfa::set_nested`].
/// The descriptor carries only the entry state; the same sub-graph may be
/// attached to any number of states, and the runtime matcher gives each
/// attachment its own independent frontier.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Nested {
    start: StateId,
}

impl Nested {
    /// The entry state of the sub-automaton.
    #[inline]
    pub fn start(&self) -> StateId {
        self.start
    }
}

/// A hierarchical NFA.
///
/// `S` is the transition symbol type (see [`Symbol`]); `D` is the payload
/// attached to every state. The graph is grown during compilation and treated
/// as immutable once matchers are running against it.
pub struct Nfa<S, D> {
    pub(crate) states: Vec<StateNode<D>>,
    pub(crate) transitions: Vec<TransNode<S>>,
    pub(crate) stateful_states: bool,
}

impl<S, D: Default> Nfa<S, D> {
    /// Create an empty NFA holding only the [`StateId::START`] state.
    ///
    /// `stateful_states` tells the repetition transform that state payloads
    /// are meaningful, so the payload of a repeated sub-graph's sink must not
    /// end up inside the cloned region (see [`Nfa::repeat`]).
    pub fn new(stateful_states: bool) -> Self {
        let mut nfa = Nfa {
            states: Vec::new(),
            transitions: Vec::new(),
            stateful_states,
        };
        nfa.add_state(D::default());
        nfa
    }
}

impl<S, D> Nfa<S, D> {
    /// Append a state with the given payload, returning its handle.
    pub fn add_state(&mut self, data: D) -> StateId {
        let id = StateId(self.states.len() as u32);
        self.states.push(StateNode {
            data,
            nested: None,
            first_trans: TransId::NONE,
            first_exit: TransId::NONE,
        });
        id
    }

    /// Add a transition consuming `sym` from `from` to `to`.
    ///
    /// Panics if `from` is [`StateId::FINAL`].
    pub fn add_transition(&mut self, from: StateId, to: StateId, sym: S) {
        self.push_edge(from, to, Some(sym), false);
    }

    /// Add an ε transition from `from` to `to`.
    ///
    /// Panics if `from` is [`StateId::FINAL`].
    pub fn add_empty_transition(&mut self, from: StateId, to: StateId) {
        self.push_edge(from, to, None, false);
    }

    /// Add a transition consuming `sym` from `from` to `to` that is eligible
    /// only once `from`'s nested frontier has reached [`StateId::FINAL`] or
    /// the nested automaton has bubbled the event out.
    pub fn on_nested_exit(&mut self, from: StateId, to: StateId, sym: S) {
        self.push_edge(from, to, Some(sym), true);
    }

    /// ε variant of [`Nfa::on_nested_exit`]: fires as soon as `from`'s nested
    /// frontier reaches [`StateId::FINAL`], without consuming input.
    pub fn on_empty_nested_exit(&mut self, from: StateId, to: StateId) {
        self.push_edge(from, to, None, true);
    }

    pub(crate) fn push_edge(&mut self, from: StateId, to: StateId, sym: Option<S>, exit: bool) {
        if from.is_final() {
            panic!("no transition may originate from the final state");
        }
        let id = TransId(self.transitions.len() as u32);
        let head = if exit {
            &mut self.states[from.index()].first_exit
        } else {
            &mut self.states[from.index()].first_trans
        };
        let next = std::mem::replace(head, id);
        self.transitions.push(TransNode { to, sym, next });
    }

    /// Create a descriptor for a sub-automaton entered at `start`.
    pub fn create_nested(&self, start: StateId) -> Nested {
        Nested { start }
    }

    /// Attach `nested` to `state`: whenever `state` becomes active, the
    /// matcher opens an independent frontier on the sub-automaton.
    pub fn set_nested(&mut self, state: StateId, nested: &Nested) {
        self.node_mut(state).nested = Some(nested.start);
    }

    /// The nested sub-automaton attached to `state`, if any.
    pub fn get_nested(&self, state: StateId) -> Option<Nested> {
        self.node(state).nested.map(|start| Nested { start })
    }

    /// Shared access to a state's payload.
    pub fn data(&self, state: StateId) -> &D {
        &self.node(state).data
    }

    /// Mutable access to a state's payload.
    pub fn data_mut(&mut self, state: StateId) -> &mut D {
        &mut self.node_mut(state).data
    }

    /// Number of states in the arena (the final sentinel is not counted).
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Number of transitions in the arena, both ordinary and on-nested-exit.
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    #[inline]
    pub(crate) fn node(&self, state: StateId) -> &StateNode<D> {
        assert!(!state.is_final(), "the final state has no record");
        &self.states[state.index()]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, state: StateId) -> &mut StateNode<D> {
        assert!(!state.is_final(), "the final state has no record");
        &mut self.states[state.index()]
    }

    /// Iterate a transition list starting at `head`.
    pub(crate) fn edges(&self, head: TransId) -> EdgeIter<'_, S> {
        EdgeIter {
            transitions: &self.transitions,
            cur: head,
        }
    }
}

impl<S: Symbol, D> Nfa<S, D> {
    /// `|`-joined images of the symbols on `state`'s ordinary transitions.
    /// Diagnostics helper shared by the matcher and the dumps.
    pub(crate) fn push_symbol_images(&self, head: TransId, out: &mut Vec<String>) {
        for tr in self.edges(head) {
            if let Some(sym) = &tr.sym {
                let image = sym.image();
                if !out.contains(&image) {
                    out.push(image);
                }
            }
        }
    }
}

pub(crate) struct EdgeIter<'a, S> {
    transitions: &'a [TransNode<S>],
    cur: TransId,
}

impl<'a, S> Iterator for EdgeIter<'a, S> {
    type Item = &'a TransNode<S>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur.is_none() {
            return None;
        }
        let tr = &self.transitions[self.cur.index()];
        self.cur = tr.next;
        Some(tr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_state_exists() {
        let nfa: Nfa<char, ()> = Nfa::new(false);
        assert_eq!(nfa.state_count(), 1);
        assert_eq!(StateId::START.index(), 0);
        assert!(StateId::FINAL.is_final());
    }

    #[test]
    fn transitions_prepend() {
        let mut nfa: Nfa<char, ()> = Nfa::new(false);
        let s1 = nfa.add_state(());
        nfa.add_transition(StateId::START, s1, 'a');
        nfa.add_transition(StateId::START, s1, 'b');
        nfa.add_empty_transition(StateId::START, StateId::FINAL);

        let head = nfa.node(StateId::START).first_trans;
        let syms: Vec<Option<char>> = nfa.edges(head).map(|t| t.sym).collect();
        // Prepend order: last added comes first.
        assert_eq!(syms, vec![None, Some('b'), Some('a')]);
        assert_eq!(nfa.transition_count(), 3);
    }

    #[test]
    fn exit_list_is_separate() {
        let mut nfa: Nfa<char, ()> = Nfa::new(false);
        let s1 = nfa.add_state(());
        nfa.add_transition(StateId::START, s1, 'a');
        nfa.on_nested_exit(StateId::START, s1, 'b');
        nfa.on_empty_nested_exit(StateId::START, StateId::FINAL);

        let ordinary: Vec<Option<char>> = nfa
            .edges(nfa.node(StateId::START).first_trans)
            .map(|t| t.sym)
            .collect();
        let exits: Vec<Option<char>> = nfa
            .edges(nfa.node(StateId::START).first_exit)
            .map(|t| t.sym)
            .collect();
        assert_eq!(ordinary, vec![Some('a')]);
        assert_eq!(exits, vec![None, Some('b')]);
    }

    #[test]
    fn nested_descriptor_round_trip() {
        let mut nfa: Nfa<char, ()> = Nfa::new(false);
        let inner = nfa.add_state(());
        let nested = nfa.create_nested(inner);
        let outer = nfa.add_state(());
        assert!(nfa.get_nested(outer).is_none());
        nfa.set_nested(outer, &nested);
        assert_eq!(nfa.get_nested(outer).map(|n| n.start()), Some(inner));
    }

    #[test]
    fn data_is_mutable() {
        let mut nfa: Nfa<char, u32> = Nfa::new(true);
        let s1 = nfa.add_state(7);
        *nfa.data_mut(s1) += 1;
        assert_eq!(*nfa.data(s1), 8);
        assert_eq!(*nfa.data(StateId::START), 0);
    }

    #[test]
    #[should_panic(expected = "final state")]
    fn transition_from_final_panics() {
        let mut nfa: Nfa<char, ()> = Nfa::new(false);
        nfa.add_transition(StateId::FINAL, StateId::START, 'a');
    }
}

//! Stateful matcher over a hierarchical NFA.
//!
//! The matcher owns a frontier: the set of states currently active at every
//! nesting level. Frontier entries live in one flat array and carry explicit
//! `next` indices, so a whole nested level is identified by a single head
//! index stored in its parent entry. This keeps the per-step bookkeeping to
//! one allocation-free array rebuild and makes the transactional snapshot a
//! plain `Vec` swap.
//!
//! ε transitions are closed at activation time, not during [`Matcher::process`]:
//! marking a state active immediately marks everything reachable through ε
//! edges (and, for states with a completed nested frontier, through ε
//! on-nested-exit edges). The hot path then only has to look at symbol
//! transitions.
//!
//! Event bubbling follows hierarchical state machine semantics: an input is
//! offered to a state's nested frontier first. If the nested level consumes
//! it, the enclosing state's ordinary transitions are not offered that same
//! input, but its on-nested-exit transitions become eligible whenever the
//! nested frontier is in the final state. If the nested level cannot consume
//! the input it dies, and the event bubbles to the enclosing state's exit and
//! ordinary transitions.

use crate::graph::{Nfa, StateId};
use crate::Symbol;

/// Index of a frontier slot. `NONE` terminates a level's intrusive list.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct SlotId(u32);

impl SlotId {
    const NONE: SlotId = SlotId(u32::MAX);

    #[inline]
    fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One active state at one nesting level.
///
/// Kept trivially copyable: the transactional `process` step snapshots the
/// whole slot array by value.
#[derive(Clone, Copy)]
struct Slot {
    state: StateId,
    /// Next active entry at the same level.
    next: SlotId,
    /// Head of this state's nested frontier, or `NONE`.
    nested: SlotId,
}

/// A matching run against an [`Nfa`].
///
/// Created by [`Nfa::start_match`]; drive it with one symbol per
/// [`Matcher::process`] call. Many matchers may run against the same graph
/// concurrently, each owning its own frontier.
pub struct Matcher<'a, S: Symbol, D> {
    nfa: &'a Nfa<S, D>,
    slots: Vec<Slot>,
    first_active: SlotId,
}

impl<S: Symbol, D> Nfa<S, D> {
    /// Start a match at [`StateId::START`].
    pub fn start_match(&self) -> Matcher<'_, S, D> {
        self.start_match_at(StateId::START)
    }

    /// Start a match at an arbitrary state.
    pub fn start_match_at(&self, state: StateId) -> Matcher<'_, S, D> {
        let mut matcher = Matcher {
            nfa: self,
            slots: Vec::new(),
            first_active: SlotId::NONE,
        };
        matcher.first_active = matcher.mark_active(SlotId::NONE, state);
        matcher
    }
}

impl<'a, S: Symbol, D> Matcher<'a, S, D> {
    /// Consume one input symbol.
    ///
    /// The step is transactional: when no state at any level can make
    /// progress, the frontier is left exactly as it was and the call returns
    /// `false`. The caller may retry with a different symbol or tear the
    /// matcher down.
    pub fn process(&mut self, input: &S::Input) -> bool {
        let saved_slots = std::mem::take(&mut self.slots);
        let saved_head = self.first_active;
        let new_head = self.step_level(&saved_slots, saved_head, input);
        if new_head.is_none() {
            self.slots = saved_slots;
            self.first_active = saved_head;
            false
        } else {
            self.first_active = new_head;
            true
        }
    }

    /// True when the matcher accepts the input consumed so far.
    ///
    /// Acceptance is probed at the head of the top-level frontier; activation
    /// order guarantees the final sentinel sits there whenever it is active.
    pub fn in_final(&self) -> bool {
        self.level_in_final(self.first_active) || self.first_active.is_none()
    }

    /// Visit every top-level active state (the final sentinel is skipped).
    ///
    /// With `ignore_if_nested` set, states whose nested frontier has not yet
    /// reached the final state are skipped as well: they are still busy
    /// below and not candidates at this level.
    pub fn for_each_active_state<F>(&self, mut callback: F, ignore_if_nested: bool)
    where
        F: FnMut(StateId),
    {
        let mut cur = self.first_active;
        while !cur.is_none() {
            let slot = self.slots[cur.index()];
            cur = slot.next;
            if slot.state.is_final() {
                continue;
            }
            if ignore_if_nested && !slot.nested.is_none() && !self.level_in_final(slot.nested) {
                continue;
            }
            callback(slot.state);
        }
    }

    /// `|`-joined images of the symbols the matcher could consume next.
    ///
    /// Walks every active state at every level; for states whose nested
    /// frontier is complete, the on-nested-exit symbols are included too.
    pub fn expected(&self) -> String {
        let mut images = Vec::new();
        self.collect_expected(self.first_active, &mut images);
        images.join("|")
    }

    /// One-line picture of the frontier, nested levels in parentheses.
    pub fn debug_print(&self) -> String {
        let mut out = String::from("[");
        self.format_level(self.first_active, &mut out);
        out.push(']');
        out
    }

    // Rebuild one level of the frontier for a single input symbol, reading
    // the saved pre-step slots and appending the new ones. Returns the head
    // of the rebuilt level, or `NONE` when nothing could make progress.
    fn step_level(&mut self, old: &[Slot], old_head: SlotId, input: &S::Input) -> SlotId {
        let mut head = SlotId::NONE;
        let mut cur = old_head;
        while !cur.is_none() {
            let entry = old[cur.index()];
            cur = entry.next;
            if !entry.nested.is_none() {
                let new_nested = self.step_level(old, entry.nested, input);
                if !new_nested.is_none() {
                    // Consumed below: the enclosing state survives with the
                    // advanced nested frontier and its ordinary transitions
                    // are not offered this input.
                    head = self.mark_active_carrying(head, entry.state, new_nested);
                    if self.level_in_final(new_nested) {
                        head = self.offer_edges(head, entry.state, input, true);
                    }
                    continue;
                }
                // The nested automaton dies; the event bubbles out to the
                // enclosing state's exit and ordinary transitions.
                head = self.offer_edges(head, entry.state, input, true);
            }
            if !entry.state.is_final() {
                head = self.offer_edges(head, entry.state, input, false);
            }
        }
        head
    }

    // Offer one state's symbol transitions (ordinary or on-nested-exit)
    // against the input, activating every target that matches.
    fn offer_edges(&mut self, mut head: SlotId, state: StateId, input: &S::Input, exit: bool) -> SlotId {
        let nfa = self.nfa;
        let node = nfa.node(state);
        let list = if exit { node.first_exit } else { node.first_trans };
        for tr in nfa.edges(list) {
            if let Some(sym) = &tr.sym {
                if sym.matches(input) {
                    head = self.mark_active(head, tr.to);
                }
            }
        }
        head
    }

    fn mark_active(&mut self, head: SlotId, state: StateId) -> SlotId {
        self.mark_active_carrying(head, state, SlotId::NONE)
    }

    // Activate `state` on the level headed by `head`, returning the new head.
    //
    // Activation closes over ε transitions, opens a fresh frontier on the
    // state's nested sub-automaton (unless one is carried over from the
    // previous step), and, when that nested frontier is already complete,
    // closes over the ε on-nested-exit transitions as well.
    fn mark_active_carrying(&mut self, head: SlotId, state: StateId, carried: SlotId) -> SlotId {
        if self.is_active(head, state) {
            return head;
        }
        let nfa = self.nfa;
        let nested = if !carried.is_none() {
            carried
        } else if !state.is_final() {
            match nfa.node(state).nested {
                Some(entry) => self.mark_active(SlotId::NONE, entry),
                None => SlotId::NONE,
            }
        } else {
            SlotId::NONE
        };
        let id = SlotId(self.slots.len() as u32);
        self.slots.push(Slot {
            state,
            next: SlotId::NONE,
            nested,
        });
        let mut head = self.insert_slot(head, id);
        if !state.is_final() {
            let node = nfa.node(state);
            for tr in nfa.edges(node.first_trans) {
                if tr.sym.is_none() {
                    head = self.mark_active(head, tr.to);
                }
            }
            if !nested.is_none() && self.level_in_final(nested) {
                for tr in nfa.edges(node.first_exit) {
                    if tr.sym.is_none() {
                        head = self.mark_active(head, tr.to);
                    }
                }
            }
        }
        head
    }

    // Link a freshly allocated slot into a level. The final sentinel, when
    // present, is kept at the head so acceptance stays a head probe.
    fn insert_slot(&mut self, head: SlotId, id: SlotId) -> SlotId {
        if !head.is_none()
            && self.slots[head.index()].state.is_final()
            && !self.slots[id.index()].state.is_final()
        {
            self.slots[id.index()].next = self.slots[head.index()].next;
            self.slots[head.index()].next = id;
            head
        } else {
            self.slots[id.index()].next = head;
            id
        }
    }

    fn is_active(&self, head: SlotId, state: StateId) -> bool {
        let mut cur = head;
        while !cur.is_none() {
            let slot = self.slots[cur.index()];
            if slot.state == state {
                return true;
            }
            cur = slot.next;
        }
        false
    }

    fn level_in_final(&self, head: SlotId) -> bool {
        !head.is_none() && self.slots[head.index()].state.is_final()
    }

    fn collect_expected(&self, head: SlotId, out: &mut Vec<String>) {
        let mut cur = head;
        while !cur.is_none() {
            let slot = self.slots[cur.index()];
            cur = slot.next;
            if slot.state.is_final() {
                continue;
            }
            let node = self.nfa.node(slot.state);
            self.nfa.push_symbol_images(node.first_trans, out);
            if !slot.nested.is_none() {
                self.collect_expected(slot.nested, out);
                if self.level_in_final(slot.nested) {
                    self.nfa.push_symbol_images(node.first_exit, out);
                }
            }
        }
    }

    fn format_level(&self, head: SlotId, out: &mut String) {
        let mut cur = head;
        let mut first = true;
        while !cur.is_none() {
            let slot = self.slots[cur.index()];
            cur = slot.next;
            if !first {
                out.push(' ');
            }
            first = false;
            out.push_str(&slot.state.to_string());
            if !slot.nested.is_none() {
                out.push('(');
                self.format_level(slot.nested, out);
                out.push(')');
            }
        }
    }
}

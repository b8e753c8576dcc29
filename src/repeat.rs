//! The repetition transform: rewrite a bounded sub-graph so its language is
//! matched between `min` and `max` times.
//!
//! Small occurrence ranges are pure ε wiring. Anything with a bound above one
//! clones the sub-graph into a chain, one copy per permitted iteration, and
//! lets every endpoint past the minimum ε-exit into the sub-graph's public
//! sink. The caller guarantees the sub-graph between `from` and `to` has a
//! single external entry (into `from`) and a single external exit (out of
//! `to`); the transform preserves that shape.
//!
//! Cloning works on a spliced graph: a fresh stateless state takes over
//! `to`'s interior position (all inbound edges retargeted, transition lists
//! and nested attachment moved), after which `to` keeps only its payload,
//! its handle, and the re-anchored external edges. Clone copies are chained
//! by identifying each copy's `from` with the previous copy's endpoint, so
//! the endpoint inherits the entry transitions (and nested attachment) of
//! the following copy. Nested attachments are shared by reference: the
//! matcher opens an independent frontier per active state, so the clones can
//! all point at the same sub-graph.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::graph::{Nfa, StateId, TransId};

/// A by-value snapshot of one region state, taken before cloning starts.
struct SourceState<S> {
    id: StateId,
    nested: Option<StateId>,
    ordinary: SmallVec<[(StateId, Option<S>); 4]>,
    exits: SmallVec<[(StateId, Option<S>); 4]>,
}

impl<S, D> Nfa<S, D> {
    /// Rewrite the sub-graph between `from` and `to` so it matches `min` to
    /// `max` times (`None` = unbounded).
    ///
    /// `min > max` and `(1, 1)` are silently accepted no-ops.
    ///
    /// Panics on `(0, 0)`: a zero occurrence range prohibits the sub-graph
    /// outright, and a transform that leaves the existing `from → to` path in
    /// place cannot express that. Callers drop prohibited particles instead
    /// of compiling them.
    pub fn repeat(&mut self, from: StateId, to: StateId, min: u32, max: Option<u32>)
    where
        S: Clone,
        D: Default + Clone,
    {
        if let Some(m) = max {
            if min > m {
                return;
            }
        }
        match (min, max) {
            (0, Some(0)) => {
                panic!("a zero occurrence range prohibits the sub-graph; drop it instead")
            }
            (1, Some(1)) => {}
            (0, Some(1)) => self.add_empty_transition(from, to),
            (1, None) => self.add_empty_transition(to, from),
            (0, None) => {
                self.add_empty_transition(from, to);
                self.add_empty_transition(to, from);
            }
            _ => self.repeat_cloned(from, to, min, max),
        }
    }

    // The cloning path: bounded max >= 2, or unbounded with min >= 2.
    fn repeat_cloned(&mut self, from: StateId, to: StateId, min: u32, max: Option<u32>)
    where
        S: Clone,
        D: Default + Clone,
    {
        let copies = max.unwrap_or(min);

        // Splice `to` out of the interior: new_to assumes its graph position.
        let new_to = self.add_state(D::default());
        for tr in &mut self.transitions {
            if tr.to == to {
                tr.to = new_to;
            }
        }
        {
            let node = self.node_mut(to);
            let first_trans = std::mem::replace(&mut node.first_trans, TransId::NONE);
            let first_exit = std::mem::replace(&mut node.first_exit, TransId::NONE);
            let nested = node.nested.take();
            let new_node = self.node_mut(new_to);
            new_node.first_trans = first_trans;
            new_node.first_exit = first_exit;
            new_node.nested = nested;
        }

        let region = self.collect_region(from, new_to);

        // External edges stay anchored at the public sink.
        self.relocate_external(new_to, to, &region, false);
        self.relocate_external(new_to, to, &region, true);

        // Snapshot the region before cloning: the chain identification keeps
        // prepending onto earlier endpoints, and clones must reproduce the
        // original lists, not the accumulated ones.
        let sources: Vec<SourceState<S>> = region
            .iter()
            .map(|&state| self.snapshot_state(state))
            .collect();

        // endpoints[k] is the state active after k completed iterations.
        let mut endpoints: SmallVec<[StateId; 8]> = SmallVec::new();
        endpoints.push(from);
        endpoints.push(new_to);
        let mut prev = new_to;
        for _ in 1..copies {
            prev = self.clone_region(&sources, from, new_to, prev);
            endpoints.push(prev);
        }

        // With payload-bearing states, the sink's payload is hoisted onto a
        // pass-through so it never sits inside the merge fan-in.
        let merge = if self.stateful_states {
            let data = std::mem::take(&mut self.node_mut(to).data);
            let hoisted = self.add_state(data);
            self.add_empty_transition(hoisted, to);
            hoisted
        } else {
            to
        };

        match max {
            Some(_) => {
                for (k, &endpoint) in endpoints.iter().enumerate() {
                    if k as u32 >= min {
                        self.add_empty_transition(endpoint, merge);
                    }
                }
            }
            None => {
                // min copies, the last one looping: L^(min-1) L+.
                let last = endpoints[endpoints.len() - 1];
                let last_entry = endpoints[endpoints.len() - 2];
                self.add_empty_transition(last, last_entry);
                self.add_empty_transition(last, merge);
            }
        }
    }

    // Every state reachable from `from` without expanding past `boundary`.
    // Both ends are part of the region; the final sentinel never is.
    fn collect_region(&self, from: StateId, boundary: StateId) -> FxHashSet<StateId> {
        let mut region = FxHashSet::default();
        region.insert(from);
        region.insert(boundary);
        let mut stack: SmallVec<[StateId; 8]> = SmallVec::new();
        stack.push(from);
        while let Some(state) = stack.pop() {
            if state == boundary {
                continue;
            }
            let node = self.node(state);
            for head in [node.first_trans, node.first_exit] {
                for tr in self.edges(head) {
                    if !tr.to.is_final() && region.insert(tr.to) {
                        stack.push(tr.to);
                    }
                }
            }
        }
        region
    }

    // Move transitions of `source` whose target lies outside the region
    // (including the final sentinel) onto `sink`, preserving relative order
    // of the survivors on both lists.
    fn relocate_external(
        &mut self,
        source: StateId,
        sink: StateId,
        region: &FxHashSet<StateId>,
        exit: bool,
    ) {
        let mut cur = {
            let node = self.node(source);
            if exit {
                node.first_exit
            } else {
                node.first_trans
            }
        };
        let mut prev = TransId::NONE;
        while !cur.is_none() {
            let (target, next) = {
                let tr = &self.transitions[cur.index()];
                (tr.to, tr.next)
            };
            if target.is_final() || !region.contains(&target) {
                // Unlink from source, prepend onto sink.
                if prev.is_none() {
                    let node = self.node_mut(source);
                    if exit {
                        node.first_exit = next;
                    } else {
                        node.first_trans = next;
                    }
                } else {
                    self.transitions[prev.index()].next = next;
                }
                let sink_node = self.node_mut(sink);
                let head = if exit {
                    &mut sink_node.first_exit
                } else {
                    &mut sink_node.first_trans
                };
                let old_head = std::mem::replace(head, cur);
                self.transitions[cur.index()].next = old_head;
            } else {
                prev = cur;
            }
            cur = next;
        }
    }

    // Capture one region state's lists and nested attachment by value.
    fn snapshot_state(&self, state: StateId) -> SourceState<S>
    where
        S: Clone,
    {
        let node = self.node(state);
        let collect = |head| {
            self.edges(head)
                .map(|tr| (tr.to, tr.sym.clone()))
                .collect::<SmallVec<[(StateId, Option<S>); 4]>>()
        };
        SourceState {
            id: state,
            nested: node.nested,
            ordinary: collect(node.first_trans),
            exits: collect(node.first_exit),
        }
    }

    // Clone the region once, chaining onto `prev`: `from` maps onto `prev`
    // (which inherits its transitions and nested attachment) and `boundary`
    // maps onto a fresh endpoint, which is returned.
    fn clone_region(
        &mut self,
        sources: &[SourceState<S>],
        from: StateId,
        boundary: StateId,
        prev: StateId,
    ) -> StateId
    where
        S: Clone,
        D: Default + Clone,
    {
        let mut map: FxHashMap<StateId, StateId> = FxHashMap::default();
        map.insert(from, prev);
        let endpoint = self.add_state(D::default());
        map.insert(boundary, endpoint);
        for source in sources {
            if source.id == from || source.id == boundary {
                continue;
            }
            let data = self.node(source.id).data.clone();
            map.insert(source.id, self.add_state(data));
        }

        for source in sources {
            let clone = map[&source.id];
            // Nested attachments are shared, not deep-copied: the matcher
            // opens an independent frontier per active state.
            if let Some(nested) = source.nested {
                self.node_mut(clone).nested = Some(nested);
            }
            for (edges, exit) in [(&source.ordinary, false), (&source.exits, true)] {
                // Reverse so prepending reproduces the original list order.
                for (target, sym) in edges.iter().rev() {
                    let mapped = map.get(target).copied().unwrap_or(*target);
                    self.push_edge(clone, mapped, sym.clone(), exit);
                }
            }
        }
        endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // S0 --x--> S1, S1 accepting.
    fn single() -> (Nfa<char, ()>, StateId) {
        let mut nfa: Nfa<char, ()> = Nfa::new(false);
        let s1 = nfa.add_state(());
        nfa.add_transition(StateId::START, s1, 'x');
        nfa.add_empty_transition(s1, StateId::FINAL);
        (nfa, s1)
    }

    fn accepts(nfa: &Nfa<char, ()>, input: &str) -> bool {
        let mut matcher = nfa.start_match();
        for c in input.chars() {
            if !matcher.process(&c) {
                return false;
            }
        }
        matcher.in_final()
    }

    #[test]
    fn min_above_max_is_a_noop() {
        let (mut nfa, s1) = single();
        let transitions = nfa.transition_count();
        nfa.repeat(StateId::START, s1, 3, Some(2));
        assert_eq!(nfa.transition_count(), transitions);
    }

    #[test]
    #[should_panic(expected = "zero occurrence range")]
    fn zero_max_is_rejected() {
        let (mut nfa, s1) = single();
        nfa.repeat(StateId::START, s1, 0, Some(0));
    }

    #[test]
    fn one_one_is_a_noop() {
        let (mut nfa, s1) = single();
        let states = nfa.state_count();
        nfa.repeat(StateId::START, s1, 1, Some(1));
        assert_eq!(nfa.state_count(), states);
        assert!(accepts(&nfa, "x"));
        assert!(!accepts(&nfa, ""));
    }

    #[test]
    fn optional_adds_a_skip() {
        let (mut nfa, s1) = single();
        nfa.repeat(StateId::START, s1, 0, Some(1));
        assert!(accepts(&nfa, ""));
        assert!(accepts(&nfa, "x"));
        assert!(!accepts(&nfa, "xx"));
    }

    #[test]
    fn one_or_more_adds_a_loop() {
        let (mut nfa, s1) = single();
        nfa.repeat(StateId::START, s1, 1, None);
        assert!(!accepts(&nfa, ""));
        for k in 1..6 {
            assert!(accepts(&nfa, &"x".repeat(k)), "x^{} should match", k);
        }
    }

    #[test]
    fn zero_or_more_adds_both() {
        let (mut nfa, s1) = single();
        nfa.repeat(StateId::START, s1, 0, None);
        for k in 0..6 {
            assert!(accepts(&nfa, &"x".repeat(k)), "x^{} should match", k);
        }
        assert!(!accepts(&nfa, "xy"));
    }

    #[test]
    fn bounded_range_clones_the_subgraph() {
        let (mut nfa, s1) = single();
        nfa.repeat(StateId::START, s1, 2, Some(3));
        assert!(!accepts(&nfa, ""));
        assert!(!accepts(&nfa, "x"));
        assert!(accepts(&nfa, "xx"));
        assert!(accepts(&nfa, "xxx"));
        assert!(!accepts(&nfa, "xxxx"));
    }

    #[test]
    fn exact_count() {
        let (mut nfa, s1) = single();
        nfa.repeat(StateId::START, s1, 3, Some(3));
        for k in 0..6 {
            assert_eq!(accepts(&nfa, &"x".repeat(k)), k == 3, "x^{}", k);
        }
    }

    #[test]
    fn zero_to_many_bounded() {
        let (mut nfa, s1) = single();
        nfa.repeat(StateId::START, s1, 0, Some(2));
        for k in 0..5 {
            assert_eq!(accepts(&nfa, &"x".repeat(k)), k <= 2, "x^{}", k);
        }
    }

    #[test]
    fn unbounded_with_high_minimum() {
        let (mut nfa, s1) = single();
        nfa.repeat(StateId::START, s1, 3, None);
        for k in 0..10 {
            assert_eq!(accepts(&nfa, &"x".repeat(k)), k >= 3, "x^{}", k);
        }
    }

    #[test]
    fn multi_state_subgraph_range() {
        // L = "ab"; repeat {1,2} accepts ab and abab.
        let mut nfa: Nfa<char, ()> = Nfa::new(false);
        let s1 = nfa.add_state(());
        let s2 = nfa.add_state(());
        nfa.add_transition(StateId::START, s1, 'a');
        nfa.add_transition(s1, s2, 'b');
        nfa.add_empty_transition(s2, StateId::FINAL);
        nfa.repeat(StateId::START, s2, 1, Some(2));
        assert!(accepts(&nfa, "ab"));
        assert!(accepts(&nfa, "abab"));
        assert!(!accepts(&nfa, ""));
        assert!(!accepts(&nfa, "a"));
        assert!(!accepts(&nfa, "aba"));
        assert!(!accepts(&nfa, "ababab"));
    }

    #[test]
    fn alternation_subgraph_range() {
        // L = a|b; {2,2} accepts every two-symbol word over {a, b}.
        let mut nfa: Nfa<char, ()> = Nfa::new(false);
        let sink = nfa.add_state(());
        nfa.add_transition(StateId::START, sink, 'a');
        nfa.add_transition(StateId::START, sink, 'b');
        nfa.add_empty_transition(sink, StateId::FINAL);
        nfa.repeat(StateId::START, sink, 2, Some(2));
        for word in ["aa", "ab", "ba", "bb"] {
            assert!(accepts(&nfa, word), "{} should match", word);
        }
        for word in ["", "a", "aab", "abc"] {
            assert!(!accepts(&nfa, word), "{} should not match", word);
        }
    }

    #[test]
    fn repeat_composes_with_itself() {
        // (x{2,2}){1,1} is still x{2,2}.
        let (mut nfa, s1) = single();
        nfa.repeat(StateId::START, s1, 2, Some(2));
        nfa.repeat(StateId::START, s1, 1, Some(1));
        for k in 0..5 {
            assert_eq!(accepts(&nfa, &"x".repeat(k)), k == 2, "x^{}", k);
        }
    }

    #[test]
    fn stateful_sink_payload_is_hoisted_once() {
        let mut nfa: Nfa<char, u32> = Nfa::new(true);
        let s1 = nfa.add_state(41);
        nfa.add_transition(StateId::START, s1, 'x');
        nfa.add_empty_transition(s1, StateId::FINAL);
        nfa.repeat(StateId::START, s1, 2, Some(3));

        // The sink's payload now lives on exactly one state.
        let holders = (0..nfa.state_count())
            .filter(|&i| *nfa.data(StateId::from_index(i)) == 41)
            .count();
        assert_eq!(holders, 1);
        assert_eq!(*nfa.data(s1), 0);

        // Language unchanged.
        let accepts = |input: &str| {
            let mut matcher = nfa.start_match();
            input.chars().all(|c| matcher.process(&c)) && matcher.in_final()
        };
        assert!(!accepts("x"));
        assert!(accepts("xx"));
        assert!(accepts("xxx"));
        assert!(!accepts("xxxx"));
    }

    #[test]
    fn nested_attachment_is_shared_by_clones() {
        // Inner machine accepting "i", attached to the single state of the
        // repeated sub-graph. Exiting the inner machine takes 'g'.
        let mut nfa: Nfa<char, ()> = Nfa::new(false);
        let inner = nfa.add_state(());
        nfa.add_transition(inner, StateId::FINAL, 'i');
        let nested = nfa.create_nested(inner);

        let sink = nfa.add_state(());
        nfa.set_nested(StateId::START, &nested);
        nfa.on_nested_exit(StateId::START, sink, 'g');
        nfa.add_empty_transition(sink, StateId::FINAL);
        nfa.repeat(StateId::START, sink, 2, Some(2));

        // Clones share the inner machine rather than deep-copying it.
        let attachments = (0..nfa.state_count())
            .filter(|&i| {
                nfa.get_nested(StateId::from_index(i))
                    .is_some_and(|n| n.start() == inner)
            })
            .count();
        assert_eq!(attachments, 2);

        let accepts = |input: &str| {
            let mut matcher = nfa.start_match();
            input.chars().all(|c| matcher.process(&c)) && matcher.in_final()
        };
        assert!(accepts("igig"));
        assert!(!accepts("ig"));
        assert!(!accepts("igigig"));
    }
}

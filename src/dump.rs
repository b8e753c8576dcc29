//! Textual and Graphviz dumps of NFA graphs.
//!
//! Nothing here carries semantics; the dumps exist for debugging schema
//! compilations and for pinning graph shapes in tests. Nested sub-automata
//! are emitted as dot clusters labelled with the first state that references
//! them, and each sub-graph is rendered once no matter how many states
//! attach it. ε edges are dashed, on-nested-exit edges dotted.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::graph::{Nested, Nfa, StateId};
use crate::Symbol;

/// Output flavor for [`Nfa::dump`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DumpMode {
    /// One line, transitions separated by spaces.
    Compact,
    /// One state per line with its transition list.
    Multiline,
    /// Graphviz dot with edge labels.
    Dot,
    /// Graphviz dot without edge labels.
    DotCompact,
}

impl<S: Symbol, D> Nfa<S, D> {
    /// Dump the graph reachable from [`StateId::START`].
    pub fn dump(&self, mode: DumpMode) -> String {
        self.dump_from(StateId::START, mode)
    }

    /// Dump the sub-graph reachable from a nested descriptor's entry.
    pub fn dump_nested(&self, nested: &Nested, mode: DumpMode) -> String {
        self.dump_from(nested.start(), mode)
    }

    fn dump_from(&self, start: StateId, mode: DumpMode) -> String {
        match mode {
            DumpMode::Compact | DumpMode::Multiline => self.dump_text(start, mode),
            DumpMode::Dot | DumpMode::DotCompact => self.dump_dot(start, mode),
        }
    }

    // States reachable from `start` through ordinary and exit edges, in
    // discovery order. Nested entries found along the way are pushed onto
    // `nested_queue` as (parent, entry) pairs.
    fn reachable(
        &self,
        start: StateId,
        nested_queue: &mut Vec<(StateId, StateId)>,
    ) -> Vec<StateId> {
        let mut seen = FxHashSet::default();
        let mut order = Vec::new();
        let mut stack: SmallVec<[StateId; 8]> = SmallVec::new();
        if !start.is_final() && seen.insert(start) {
            stack.push(start);
            order.push(start);
        }
        while let Some(state) = stack.pop() {
            let node = self.node(state);
            if let Some(entry) = node.nested {
                nested_queue.push((state, entry));
            }
            for head in [node.first_trans, node.first_exit] {
                for tr in self.edges(head) {
                    if !tr.to.is_final() && seen.insert(tr.to) {
                        stack.push(tr.to);
                        order.push(tr.to);
                    }
                }
            }
        }
        order.sort_by_key(|s| s.index());
        order
    }

    fn dump_text(&self, start: StateId, mode: DumpMode) -> String {
        let mut nested_queue = Vec::new();
        let mut out = String::new();
        let mut rendered: FxHashSet<StateId> = FxHashSet::default();
        let mut pending = vec![start];
        while let Some(entry) = pending.pop() {
            if !rendered.insert(entry) {
                continue;
            }
            if !out.is_empty() {
                match mode {
                    DumpMode::Multiline => out.push('\n'),
                    _ => out.push_str(" | "),
                }
            }
            for state in self.reachable(entry, &mut nested_queue) {
                self.dump_text_state(state, mode, &mut out);
            }
            while let Some((_, nested_entry)) = nested_queue.pop() {
                pending.push(nested_entry);
            }
        }
        out
    }

    fn dump_text_state(&self, state: StateId, mode: DumpMode, out: &mut String) {
        let node = self.node(state);
        match mode {
            DumpMode::Compact => {
                if let Some(entry) = node.nested {
                    out.push_str(&format!("{}{{{}}} ", state, entry));
                }
                for tr in self.edges(node.first_trans) {
                    match &tr.sym {
                        Some(sym) => out.push_str(&format!("{}-{}->{} ", state, sym.image(), tr.to)),
                        None => out.push_str(&format!("{}-.->{} ", state, tr.to)),
                    }
                }
                for tr in self.edges(node.first_exit) {
                    match &tr.sym {
                        Some(sym) => out.push_str(&format!("{}={}=>{} ", state, sym.image(), tr.to)),
                        None => out.push_str(&format!("{}=.=>{} ", state, tr.to)),
                    }
                }
            }
            _ => {
                out.push_str(&state.to_string());
                if let Some(entry) = node.nested {
                    out.push_str(&format!(" {{nested {}}}", entry));
                }
                out.push('\n');
                for tr in self.edges(node.first_trans) {
                    match &tr.sym {
                        Some(sym) => out.push_str(&format!("  -{}-> {}\n", sym.image(), tr.to)),
                        None => out.push_str(&format!("  -.-> {}\n", tr.to)),
                    }
                }
                for tr in self.edges(node.first_exit) {
                    match &tr.sym {
                        Some(sym) => out.push_str(&format!("  ={}=> {}\n", sym.image(), tr.to)),
                        None => out.push_str(&format!("  =.=> {}\n", tr.to)),
                    }
                }
            }
        }
    }

    fn dump_dot(&self, start: StateId, mode: DumpMode) -> String {
        let mut out = String::from("digraph nfa {\n\trankdir = LR;\n");
        out.push_str("\tnode [shape = doublecircle]; F;\n");
        out.push_str("\tnode [shape = circle];\n");

        let mut rendered: FxHashSet<StateId> = FxHashSet::default();
        let mut nested_queue = Vec::new();

        // Top level first, then each nested sub-graph as a cluster, rendered
        // once even when multiply referenced.
        for state in self.reachable(start, &mut nested_queue) {
            self.dump_dot_state(state, mode, 1, &mut out);
        }
        rendered.insert(start);
        while let Some((parent, entry)) = nested_queue.pop() {
            if !rendered.insert(entry) {
                continue;
            }
            out.push_str(&format!(
                "\tsubgraph cluster_{} {{\n\t\tlabel = \"{} nested\";\n",
                entry, parent
            ));
            for state in self.reachable(entry, &mut nested_queue) {
                self.dump_dot_state(state, mode, 2, &mut out);
            }
            out.push_str("\t}\n");
        }
        out.push_str("}\n");
        out
    }

    fn dump_dot_state(&self, state: StateId, mode: DumpMode, depth: usize, out: &mut String) {
        let tabs = "\t".repeat(depth);
        let node = self.node(state);
        for (head, style) in [(node.first_trans, None), (node.first_exit, Some("dotted"))] {
            for tr in self.edges(head) {
                let mut attrs: SmallVec<[String; 2]> = SmallVec::new();
                match (&tr.sym, mode) {
                    (Some(sym), DumpMode::Dot) => {
                        attrs.push(format!("label = \"{}\"", sym.image()));
                    }
                    (None, _) => attrs.push("style = dashed".to_string()),
                    _ => {}
                }
                if let Some(style) = style {
                    attrs.push(format!("style = {}", style));
                }
                if attrs.is_empty() {
                    out.push_str(&format!("{}{} -> {};\n", tabs, state, tr.to));
                } else {
                    out.push_str(&format!(
                        "{}{} -> {} [{}];\n",
                        tabs,
                        state,
                        tr.to,
                        attrs.join(", ")
                    ));
                }
            }
        }
        if let Some(entry) = node.nested {
            out.push_str(&format!(
                "{}{} -> {} [style = bold, arrowhead = empty];\n",
                tabs, state, entry
            ));
        }
    }
}

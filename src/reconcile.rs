//! Live display tree and minimal-diff reconciliation.
//!
//! The render loop re-parses the full accumulator each fragment and morphs
//! the live tree toward the new one: nodes whose kind matches at a position
//! are mutated in place (text and attributes updated, children recursed),
//! surplus nodes are removed, missing ones appended. Only the
//! reconciliation step mutates the live tree.
//!
//! Card instances live in a registry keyed by identifier and are synced
//! after each pass: an identifier entering the document gets an instance
//! whose fetch starts immediately (construction triggers the fetch — there
//! is no "reinsert notification" special case), an identifier leaving the
//! document drops its instance, and an identifier present across passes
//! keeps its instance untouched.

use crate::card::{CardRegistry, CardUpdate, FetchRequest};
use crate::markup::{card_keys, render_html, text_content, Node};

/// Counters from one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Nodes whose kind matched and were mutated in place.
    pub retained: usize,
    /// Nodes appended because the new tree is longer.
    pub created: usize,
    /// Nodes replaced wholesale because their kind changed.
    pub replaced: usize,
    /// Trailing nodes removed because the new tree is shorter.
    pub removed: usize,
    pub text_updates: usize,
    pub attr_updates: usize,
}

/// The live display region: markup tree plus card registry.
#[derive(Debug, Default)]
pub struct Document {
    roots: Vec<Node>,
    pub cards: CardRegistry,
    last_stats: ReconcileStats,
}

impl Document {
    pub fn new() -> Self {
        Document::default()
    }

    /// Reconcile the live tree against freshly parsed markup, then sync the
    /// card registry. Returns the fetches to start for newly (re)bound
    /// instances.
    pub fn apply_markup(&mut self, new: &[Node]) -> Vec<FetchRequest> {
        let mut stats = ReconcileStats::default();
        reconcile_children(&mut self.roots, new, &mut stats);
        self.last_stats = stats;
        let keys = card_keys(&self.roots);
        self.cards.sync(&keys)
    }

    /// Route a card fetch result; true when the rendered output changed.
    pub fn apply_card_update(&mut self, update: CardUpdate) -> bool {
        self.cards.apply(update)
    }

    pub fn to_html(&self) -> String {
        render_html(&self.roots, &self.cards)
    }

    pub fn text(&self) -> String {
        text_content(&self.roots)
    }

    pub fn roots(&self) -> &[Node] {
        &self.roots
    }

    pub fn last_stats(&self) -> ReconcileStats {
        self.last_stats
    }
}

fn reconcile_children(live: &mut Vec<Node>, new: &[Node], stats: &mut ReconcileStats) {
    for (index, incoming) in new.iter().enumerate() {
        if index < live.len() {
            morph_node(&mut live[index], incoming, stats);
        } else {
            live.push(incoming.clone());
            stats.created += 1;
        }
    }
    if live.len() > new.len() {
        stats.removed += live.len() - new.len();
        live.truncate(new.len());
    }
}

fn morph_node(live: &mut Node, incoming: &Node, stats: &mut ReconcileStats) {
    match (&mut *live, incoming) {
        (Node::Text(current), Node::Text(new_text)) => {
            stats.retained += 1;
            if *current != *new_text {
                *current = new_text.clone();
                stats.text_updates += 1;
            }
        }
        (
            Node::Element {
                tag: live_tag,
                attrs: live_attrs,
                children: live_children,
            },
            Node::Element {
                tag: new_tag,
                attrs: new_attrs,
                children: new_children,
            },
        ) if *live_tag == *new_tag => {
            stats.retained += 1;
            if *live_attrs != *new_attrs {
                *live_attrs = new_attrs.clone();
                stats.attr_updates += 1;
            }
            reconcile_children(live_children, new_children, stats);
        }
        (Node::Card { key: live_key }, Node::Card { key: new_key }) => {
            stats.retained += 1;
            if *live_key != *new_key {
                *live_key = new_key.clone();
                stats.attr_updates += 1;
            }
        }
        _ => {
            *live = incoming.clone();
            stats.replaced += 1;
        }
    }
}

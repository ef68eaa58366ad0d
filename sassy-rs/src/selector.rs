//! Selector matching and target collection.
//!
//! [`Selector::matches`] is a pure predicate over one node and its ancestor
//! chain.  [`collect_targets`] walks the candidate nodes once, before any
//! statement runs, and returns the nodes to mutate followed by the new nodes
//! to create for `+element` additions.

use std::collections::HashSet;

use crate::ast::Selector;
use crate::selectable::{walk, DocumentSet, NodePath, Selectable};

impl Selector {
    /// Does this selector match `node`, whose ancestors run from the document
    /// root (first) to its parent (last)?
    pub fn matches(&self, node: &dyn Selectable, ancestors: &[&dyn Selectable]) -> bool {
        match self {
            Selector::Wildcard => true,
            Selector::Element(tag) => node.element_type() == tag,
            Selector::Name(id) => node.name() == id,
            Selector::Class(c) => node.has_class(c),
            Selector::Ruleset(r) => node.in_ruleset(r),
            Selector::WithoutClass(c) => !node.has_class(c),
            Selector::WithoutName(id) => node.name() != id,
            Selector::Intersection(a, b) => a.matches(node, ancestors) && b.matches(node, ancestors),
            Selector::Child(parent, child) => {
                child.matches(node, ancestors)
                    && ancestors
                        .split_last()
                        .is_some_and(|(p, rest)| parent.matches(*p, rest))
            }
            Selector::Combination(a, b) => a.matches(node, ancestors) || b.matches(node, ancestors),
            Selector::ElementAddition(_) => false,
        }
    }
}

/// Where an `+element` addition appends its new node.
enum Addition<'s> {
    /// As a child of the context node (or of every document root).
    Context(&'s str),
    /// As a child of every candidate matching the parent selector.
    Under(&'s Selector, &'s str),
}

fn addition_rules<'s>(selector: &'s Selector, out: &mut Vec<Addition<'s>>) {
    match selector {
        Selector::ElementAddition(tag) => out.push(Addition::Context(tag)),
        Selector::Combination(a, b) => {
            addition_rules(a, out);
            addition_rules(b, out);
        }
        Selector::Child(parent, child) => {
            if let Selector::ElementAddition(tag) = child.as_ref() {
                out.push(Addition::Under(parent, tag));
            }
        }
        _ => {}
    }
}

/// A node a selection block runs against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// An existing node.
    Existing(NodePath),
    /// A node to append to `parent` just before the block runs against it.
    Insert { parent: NodePath, element: String },
}

/// Collect the targets of `selector`.
///
/// With no `context` every node of every document is a candidate and
/// context additions go under each document root.  With a context node only
/// its strict descendants are candidates and context additions go under the
/// context node itself.
pub fn collect_targets(
    selector: &Selector,
    docs: &DocumentSet,
    context: Option<&NodePath>,
) -> Vec<Target> {
    let mut rules = Vec::new();
    addition_rules(selector, &mut rules);

    let mut matched = Vec::new();
    let mut added = Vec::new();
    let mut under = Vec::new();

    let mut scan = |doc: usize,
                    prefix: &[usize],
                    steps: &[usize],
                    ancestors: &[&dyn Selectable],
                    node: &dyn Selectable| {
        let mut path = NodePath {
            doc,
            steps: prefix.to_vec(),
        };
        path.steps.extend_from_slice(steps);
        for rule in &rules {
            if let Addition::Under(parent, tag) = rule {
                if parent.matches(node, ancestors) {
                    under.push(Target::Insert {
                        parent: path.clone(),
                        element: (*tag).to_owned(),
                    });
                }
            }
        }
        if selector.matches(node, ancestors) {
            matched.push(Target::Existing(path));
        }
    };

    let context_parents: Vec<NodePath> = match context {
        None => (0..docs.len()).map(NodePath::root).collect(),
        Some(ctx) => vec![ctx.clone()],
    };
    for parent in &context_parents {
        for rule in &rules {
            if let Addition::Context(tag) = rule {
                added.push(Target::Insert {
                    parent: parent.clone(),
                    element: (*tag).to_owned(),
                });
            }
        }
    }

    match context {
        None => {
            for (doc, document) in docs.iter().enumerate() {
                walk(
                    document.root.as_ref(),
                    &mut Vec::new(),
                    &mut Vec::new(),
                    &mut |steps, ancestors, node| scan(doc, &[], steps, ancestors, node),
                );
            }
        }
        Some(ctx) => {
            let found = docs
                .get(ctx.doc)
                .and_then(|d| ancestry(d.root.as_ref(), &ctx.steps));
            if let Some((mut ancestors, ctx_node)) = found {
                ancestors.push(ctx_node);
                for i in 0..ctx_node.child_count() {
                    if let Some(child) = ctx_node.child(i) {
                        walk(
                            child,
                            &mut vec![i],
                            &mut ancestors,
                            &mut |steps, ancestors, node| {
                                scan(ctx.doc, &ctx.steps, steps, ancestors, node)
                            },
                        );
                    }
                }
            }
        }
    }

    let mut seen = HashSet::new();
    matched
        .into_iter()
        .chain(added)
        .chain(under)
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// The ancestor chain of the node at `steps`, and the node itself.
fn ancestry<'a>(
    root: &'a dyn Selectable,
    steps: &[usize],
) -> Option<(Vec<&'a dyn Selectable>, &'a dyn Selectable)> {
    let mut ancestors = Vec::with_capacity(steps.len());
    let mut node = root;
    for &i in steps {
        ancestors.push(node);
        node = node.child(i)?;
    }
    Some((ancestors, node))
}

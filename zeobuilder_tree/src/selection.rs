// Copyright 2025 the Zeobuilder Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Selection and the memoized facts derived from it.
//!
//! A [`Selection`] is an ordered set of nodes with a generation stamp. A
//! [`SelectionCache`] answers questions about the selection (its parents, the
//! lowest child index, whether anything is fixed, ...) and remembers each answer
//! until either the selection generation or the tree's structural epoch changes,
//! at which point everything is dropped at once.
//!
//! Entries are computed lazily, once per generation, dependencies first.
//! [`CacheKey::Nodes`] is the base every other entry derives from.
//!
//! ```
//! use zeobuilder_tree::class::{ATOM, UNIVERSE};
//! use zeobuilder_tree::selection::{CacheKey, Selection, SelectionCache};
//! use zeobuilder_tree::{NodeInit, Tree};
//!
//! let mut tree = Tree::new();
//! let root = tree.create(&UNIVERSE, NodeInit::named("root"));
//! let a = tree.create(&ATOM, NodeInit::named("a"));
//! let b = tree.create(&ATOM, NodeInit::named("b"));
//! tree.add(a, root, None).unwrap();
//! tree.add(b, root, None).unwrap();
//!
//! let mut selection = Selection::new();
//! selection.select(b);
//! selection.select(a);
//!
//! let mut cache = SelectionCache::new();
//! assert_eq!(cache.parent(&tree, &selection), Some(root));
//! assert_eq!(cache.lowest_index(&tree, &selection), Some(0));
//! assert!(cache.is_populated(CacheKey::Indices));
//! ```

use alloc::vec::Vec;

use crate::tree::Tree;
use crate::types::{Capabilities, NodeId, fresh_stamp};

/// Ordered set of selected nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    nodes: Vec<NodeId>,
    generation: u64,
}

impl Selection {
    /// Empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node at the end. Returns `false` if it was already selected.
    pub fn select(&mut self, id: NodeId) -> bool {
        if self.nodes.contains(&id) {
            return false;
        }
        self.nodes.push(id);
        self.generation = fresh_stamp();
        true
    }

    /// Remove a node. Returns `false` if it was not selected.
    pub fn deselect(&mut self, id: NodeId) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|n| *n != id);
        let changed = self.nodes.len() != before;
        if changed {
            self.generation = fresh_stamp();
        }
        changed
    }

    /// Replace the selection.
    pub fn set(&mut self, ids: impl IntoIterator<Item = NodeId>) {
        let mut nodes: Vec<NodeId> = Vec::new();
        for id in ids {
            if !nodes.contains(&id) {
                nodes.push(id);
            }
        }
        if nodes != self.nodes {
            self.nodes = nodes;
            self.generation = fresh_stamp();
        }
    }

    /// Deselect everything.
    pub fn clear(&mut self) {
        if !self.nodes.is_empty() {
            self.nodes.clear();
            self.generation = fresh_stamp();
        }
    }

    /// Drop nodes that are no longer alive.
    pub fn prune(&mut self, tree: &Tree) {
        let before = self.nodes.len();
        self.nodes.retain(|n| tree.is_alive(*n));
        if self.nodes.len() != before {
            self.generation = fresh_stamp();
        }
    }

    /// Whether `id` is selected.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Selected nodes in selection order.
    pub fn as_slice(&self) -> &[NodeId] {
        &self.nodes
    }

    /// Iterate over selected nodes in selection order.
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied()
    }

    /// Number of selected nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Stamp replaced on every change.
    ///
    /// Stamps are unique across selections: two selections share a generation only
    /// when one is an unchanged clone of the other.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Named facts derived from the selection.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CacheKey {
    /// Live selected nodes, in selection order.
    Nodes,
    /// Distinct parents of the selected nodes, in first-seen order.
    Parents,
    /// The single parent all selected nodes share, if any.
    Parent,
    /// Common ancestor of all parents.
    CommonParent,
    /// Child index of every attached selected node.
    Indices,
    /// Smallest of [`Indices`](Self::Indices).
    LowestIndex,
    /// Largest of [`Indices`](Self::Indices).
    HighestIndex,
    /// Children of all selected nodes, concatenated.
    ChildrenOfSelection,
    /// Whether any selected node is fixed.
    SomeFixed,
    /// Whether the selection is non-empty and every node is transformable.
    AllTransformable,
}

impl CacheKey {
    /// Number of keys.
    pub const COUNT: usize = 10;

    /// Every key, dependencies before dependents.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Nodes,
        Self::Parents,
        Self::Parent,
        Self::CommonParent,
        Self::Indices,
        Self::LowestIndex,
        Self::HighestIndex,
        Self::ChildrenOfSelection,
        Self::SomeFixed,
        Self::AllTransformable,
    ];

    /// Entries that must be computed before this one.
    pub const fn dependencies(self) -> &'static [Self] {
        match self {
            Self::Nodes => &[],
            Self::Parents
            | Self::Indices
            | Self::ChildrenOfSelection
            | Self::SomeFixed
            | Self::AllTransformable => &[Self::Nodes],
            Self::Parent | Self::CommonParent => &[Self::Parents],
            Self::LowestIndex | Self::HighestIndex => &[Self::Indices],
        }
    }

    const fn slot(self) -> usize {
        self as usize
    }
}

/// A memoized fact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheValue {
    /// A list of nodes.
    Nodes(Vec<NodeId>),
    /// At most one node.
    Node(Option<NodeId>),
    /// A list of child indices.
    Indices(Vec<usize>),
    /// At most one child index.
    Index(Option<usize>),
    /// A yes/no answer.
    Flag(bool),
}

impl CacheValue {
    /// The node list; empty for other variants.
    pub fn as_nodes(&self) -> &[NodeId] {
        match self {
            Self::Nodes(v) => v,
            _ => &[],
        }
    }

    /// The node; `None` for other variants.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(n) => *n,
            _ => None,
        }
    }

    /// The index list; empty for other variants.
    pub fn as_indices(&self) -> &[usize] {
        match self {
            Self::Indices(v) => v,
            _ => &[],
        }
    }

    /// The index; `None` for other variants.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(i) => *i,
            _ => None,
        }
    }

    /// The flag; `false` for other variants.
    pub fn as_flag(&self) -> bool {
        matches!(self, Self::Flag(true))
    }
}

/// Lazily populated facts about one selection of one tree.
#[derive(Clone, Debug)]
pub struct SelectionCache {
    selection_generation: u64,
    tree_epoch: u64,
    entries: [Option<CacheValue>; CacheKey::COUNT],
    populating: [bool; CacheKey::COUNT],
    computations: u64,
}

impl Default for SelectionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self {
            selection_generation: 0,
            tree_epoch: 0,
            entries: [const { None }; CacheKey::COUNT],
            populating: [false; CacheKey::COUNT],
            computations: 0,
        }
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries = [const { None }; CacheKey::COUNT];
    }

    /// Whether `key` is currently memoized.
    pub fn is_populated(&self, key: CacheKey) -> bool {
        self.entries[key.slot()].is_some()
    }

    /// Total number of entries computed since creation.
    pub fn computations(&self) -> u64 {
        self.computations
    }

    /// The value of `key`, computing it and its dependencies if needed.
    pub fn get(&mut self, tree: &Tree, selection: &Selection, key: CacheKey) -> &CacheValue {
        if selection.generation() != self.selection_generation || tree.epoch() != self.tree_epoch {
            self.clear();
            self.selection_generation = selection.generation();
            self.tree_epoch = tree.epoch();
        }
        self.ensure(tree, selection, key);
        self.entries[key.slot()]
            .as_ref()
            .expect("cache entry populated above")
    }

    fn ensure(&mut self, tree: &Tree, selection: &Selection, key: CacheKey) {
        if self.entries[key.slot()].is_some() {
            return;
        }
        debug_assert!(
            !self.populating[key.slot()],
            "selection cache entry {key:?} depends on itself"
        );
        self.populating[key.slot()] = true;
        for dep in key.dependencies() {
            self.ensure(tree, selection, *dep);
        }
        let value = self.compute(tree, selection, key);
        tracing::trace!(?key, "selection cache computed");
        self.entries[key.slot()] = Some(value);
        self.populating[key.slot()] = false;
        self.computations += 1;
    }

    fn entry(&self, key: CacheKey) -> Option<&CacheValue> {
        self.entries[key.slot()].as_ref()
    }

    fn compute(&self, tree: &Tree, selection: &Selection, key: CacheKey) -> CacheValue {
        let nodes = self.entry(CacheKey::Nodes).map_or(&[][..], CacheValue::as_nodes);
        match key {
            CacheKey::Nodes => {
                CacheValue::Nodes(selection.iter().filter(|n| tree.is_alive(*n)).collect())
            }
            CacheKey::Parents => {
                let mut parents = Vec::new();
                for p in nodes.iter().filter_map(|n| tree.parent(*n)) {
                    if !parents.contains(&p) {
                        parents.push(p);
                    }
                }
                CacheValue::Nodes(parents)
            }
            CacheKey::Parent => {
                let parents = self.entry(CacheKey::Parents).map_or(&[][..], CacheValue::as_nodes);
                let single = match parents {
                    [only] if nodes.iter().all(|n| tree.parent(*n).is_some()) => Some(*only),
                    _ => None,
                };
                CacheValue::Node(single)
            }
            CacheKey::CommonParent => {
                let parents = self.entry(CacheKey::Parents).map_or(&[][..], CacheValue::as_nodes);
                CacheValue::Node(tree.common_ancestor(parents))
            }
            CacheKey::Indices => {
                CacheValue::Indices(nodes.iter().filter_map(|n| tree.index_of(*n)).collect())
            }
            CacheKey::LowestIndex | CacheKey::HighestIndex => {
                let indices = self.entry(CacheKey::Indices).map_or(&[][..], CacheValue::as_indices);
                let index = if key == CacheKey::LowestIndex {
                    indices.iter().min()
                } else {
                    indices.iter().max()
                };
                CacheValue::Index(index.copied())
            }
            CacheKey::ChildrenOfSelection => CacheValue::Nodes(
                nodes
                    .iter()
                    .flat_map(|n| tree.children(*n).iter().copied())
                    .collect(),
            ),
            CacheKey::SomeFixed => CacheValue::Flag(nodes.iter().any(|n| tree.is_fixed(*n))),
            CacheKey::AllTransformable => CacheValue::Flag(
                !nodes.is_empty()
                    && nodes
                        .iter()
                        .all(|n| tree.capabilities(*n).contains(Capabilities::TRANSFORMABLE)),
            ),
        }
    }

    /// [`CacheKey::Nodes`].
    pub fn nodes(&mut self, tree: &Tree, selection: &Selection) -> &[NodeId] {
        self.get(tree, selection, CacheKey::Nodes).as_nodes()
    }

    /// [`CacheKey::Parents`].
    pub fn parents(&mut self, tree: &Tree, selection: &Selection) -> &[NodeId] {
        self.get(tree, selection, CacheKey::Parents).as_nodes()
    }

    /// [`CacheKey::Parent`].
    pub fn parent(&mut self, tree: &Tree, selection: &Selection) -> Option<NodeId> {
        self.get(tree, selection, CacheKey::Parent).as_node()
    }

    /// [`CacheKey::CommonParent`].
    pub fn common_parent(&mut self, tree: &Tree, selection: &Selection) -> Option<NodeId> {
        self.get(tree, selection, CacheKey::CommonParent).as_node()
    }

    /// [`CacheKey::Indices`].
    pub fn indices(&mut self, tree: &Tree, selection: &Selection) -> &[usize] {
        self.get(tree, selection, CacheKey::Indices).as_indices()
    }

    /// [`CacheKey::LowestIndex`].
    pub fn lowest_index(&mut self, tree: &Tree, selection: &Selection) -> Option<usize> {
        self.get(tree, selection, CacheKey::LowestIndex).as_index()
    }

    /// [`CacheKey::HighestIndex`].
    pub fn highest_index(&mut self, tree: &Tree, selection: &Selection) -> Option<usize> {
        self.get(tree, selection, CacheKey::HighestIndex).as_index()
    }

    /// [`CacheKey::ChildrenOfSelection`].
    pub fn children_of_selection(&mut self, tree: &Tree, selection: &Selection) -> &[NodeId] {
        self.get(tree, selection, CacheKey::ChildrenOfSelection).as_nodes()
    }

    /// [`CacheKey::SomeFixed`].
    pub fn some_fixed(&mut self, tree: &Tree, selection: &Selection) -> bool {
        self.get(tree, selection, CacheKey::SomeFixed).as_flag()
    }

    /// [`CacheKey::AllTransformable`].
    pub fn all_transformable(&mut self, tree: &Tree, selection: &Selection) -> bool {
        self.get(tree, selection, CacheKey::AllTransformable).as_flag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{ATOM, FOLDER, FRAME, PropertyId, PropertyValue, UNIVERSE};
    use crate::history::History;
    use crate::primitive::Primitive;
    use crate::types::NodeInit;
    use alloc::string::String;

    struct Scene {
        tree: Tree,
        root: NodeId,
        left: NodeId,
        right: NodeId,
        atoms: Vec<NodeId>,
    }

    fn scene() -> Scene {
        let mut tree = Tree::new();
        let root = tree.create(&UNIVERSE, NodeInit::named("root"));
        let left = tree.create(&FRAME, NodeInit::named("left"));
        let right = tree.create(&FOLDER, NodeInit::named("right"));
        tree.add(left, root, None).unwrap();
        tree.add(right, root, None).unwrap();
        let mut atoms = Vec::new();
        for parent in [left, left, left, right] {
            let a = tree.create(&ATOM, NodeInit::named("atom"));
            tree.add(a, parent, None).unwrap();
            atoms.push(a);
        }
        Scene { tree, root, left, right, atoms }
    }

    #[test]
    fn dependencies_come_first() {
        for (i, key) in CacheKey::ALL.iter().enumerate() {
            assert_eq!(key.slot(), i);
            for dep in key.dependencies() {
                assert!(dep.slot() < i, "{key:?} depends on later {dep:?}");
            }
        }
    }

    #[test]
    fn entries_are_computed_once_per_generation() {
        let Scene { tree, left, atoms, .. } = scene();
        let mut selection = Selection::new();
        selection.set([atoms[2], atoms[1]]);
        let mut cache = SelectionCache::new();

        assert_eq!(cache.lowest_index(&tree, &selection), Some(1));
        assert_eq!(cache.computations(), 3, "nodes, indices, lowest index");
        assert!(!cache.is_populated(CacheKey::Parents));
        assert_eq!(cache.highest_index(&tree, &selection), Some(2));
        assert_eq!(cache.computations(), 4);
        assert_eq!(cache.lowest_index(&tree, &selection), Some(1));
        assert_eq!(cache.computations(), 4);
        assert_eq!(cache.parent(&tree, &selection), Some(left));

        selection.select(atoms[0]);
        assert!(cache.is_populated(CacheKey::Indices), "cleared lazily on next access");
        assert_eq!(cache.lowest_index(&tree, &selection), Some(0));
        assert!(!cache.is_populated(CacheKey::Parents));
    }

    #[test]
    fn structural_epoch_clears_cache() {
        let Scene { mut tree, root, left, atoms, .. } = scene();
        let mut selection = Selection::new();
        selection.select(atoms[0]);
        let mut cache = SelectionCache::new();
        assert_eq!(cache.parent(&tree, &selection), Some(left));
        tree.move_node(atoms[0], root, None).unwrap();
        assert_eq!(cache.parent(&tree, &selection), Some(root));

        assert!(!cache.some_fixed(&tree, &selection));
        tree.set_property(atoms[0], PropertyId::Fixed, PropertyValue::Bool(true)).unwrap();
        assert!(cache.some_fixed(&tree, &selection));
    }

    #[test]
    fn derived_facts() {
        let Scene { tree, root, left, right, atoms } = scene();
        let mut selection = Selection::new();
        let mut cache = SelectionCache::new();
        selection.set([atoms[3], atoms[0], atoms[1]]);
        assert_eq!(cache.parents(&tree, &selection), &[right, left]);
        assert_eq!(cache.parent(&tree, &selection), None);
        assert_eq!(cache.common_parent(&tree, &selection), Some(root));
        assert!(cache.all_transformable(&tree, &selection));

        selection.set([left, right]);
        assert_eq!(cache.children_of_selection(&tree, &selection), atoms.as_slice());
        assert!(!cache.all_transformable(&tree, &selection), "folders are not transformable");
        assert_eq!(cache.parent(&tree, &selection), Some(root));

        selection.clear();
        assert!(!cache.all_transformable(&tree, &selection));
        assert_eq!(cache.lowest_index(&tree, &selection), None);
        assert_eq!(cache.common_parent(&tree, &selection), None);
    }

    #[test]
    fn generation_moves_only_on_change() {
        let Scene { atoms, .. } = scene();
        let mut selection = Selection::new();
        assert!(selection.select(atoms[0]));
        let g = selection.generation();
        assert!(!selection.select(atoms[0]));
        selection.set([atoms[0]]);
        assert!(!selection.deselect(atoms[1]));
        assert_eq!(selection.generation(), g);
        assert!(selection.deselect(atoms[0]));
        assert!(selection.generation() > g);
    }

    #[test]
    fn separate_selections_do_not_share_entries() {
        let Scene { tree, atoms, .. } = scene();
        let mut first = Selection::new();
        let mut second = Selection::new();
        first.select(atoms[0]);
        second.select(atoms[3]);
        let mut cache = SelectionCache::new();
        assert_eq!(cache.nodes(&tree, &first), &[atoms[0]]);
        assert_eq!(cache.nodes(&tree, &second), &[atoms[3]]);
        let copy = first.clone();
        assert_eq!(copy.generation(), first.generation());
        assert_eq!(cache.nodes(&tree, &copy), &[atoms[0]]);
    }

    #[test]
    fn nodes_freed_by_history_leave_the_cache() {
        let Scene { mut tree, root, .. } = scene();
        let mut history = History::new();
        let atom = tree.create(&ATOM, NodeInit::named("new"));
        history.record(&mut tree, Primitive::add(atom, root, None)).unwrap();
        let mut selection = Selection::new();
        selection.select(atom);
        history.undo_last_action(&mut tree).unwrap();

        let mut cache = SelectionCache::new();
        assert_eq!(cache.nodes(&tree, &selection), &[atom]);

        // A new action drops the redo stack, which frees the undone node.
        let rename = Primitive::set_property(root, PropertyId::Name, PropertyValue::Text(String::from("renamed")));
        history.record(&mut tree, rename).unwrap();
        assert!(!tree.is_alive(atom));
        assert!(cache.nodes(&tree, &selection).is_empty());
    }
}

use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::cell::Cell;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Arbitrary)]
enum Fate {
    Keep,
    Discard,
}

/// Shape of a node to build. The slot at `anchor` always holds a kept leaf,
/// so no branch is ever emptied by a pass.
#[derive(Clone, Debug)]
struct NodeShape {
    anchor: usize,
    slots: Vec<SlotShape>,
}

#[derive(Clone, Debug)]
enum SlotShape {
    Empty,
    Leaf(Fate),
    Node(NodeShape),
    /// Extra levels skipped beyond the slot's own, then the node below.
    Shortcut(u32, NodeShape),
}

fn leafish() -> impl Strategy<Value = SlotShape> + Clone {
    prop_oneof![
        1 => Just(SlotShape::Empty),
        3 => any::<Fate>().prop_map(SlotShape::Leaf),
    ]
}

fn node_shape(slot: impl Strategy<Value = SlotShape>) -> impl Strategy<Value = NodeShape> {
    (0..FAN_OUT, prop::collection::vec(slot, FAN_OUT))
        .prop_map(|(anchor, slots)| NodeShape { anchor, slots })
}

fn slot_strategy() -> impl Strategy<Value = SlotShape> {
    leafish().prop_recursive(3, 96, FAN_OUT as u32, |inner| {
        prop_oneof![
            8 => leafish(),
            1 => node_shape(inner.clone()).prop_map(SlotShape::Node),
            1 => (0u32..3, node_shape(inner)).prop_map(|(extra, n)| SlotShape::Shortcut(extra, n)),
        ]
    })
}

/// (root is a shortcut, root node)
fn tree_strategy() -> impl Strategy<Value = (bool, NodeShape)> {
    (prop::bool::weighted(0.2), node_shape(slot_strategy()))
}

/// Kept leaves are odd. Values are unique across the tree.
fn leaf(next: &mut u64, fate: Fate) -> u64 {
    *next += 1;
    *next << 1 | u64::from(fate == Fate::Keep)
}

fn keep(leaf: &u64) -> bool {
    leaf & 1 == 1
}

fn fill(b: &mut TreeBuilder<u64>, node: NodeId, level: u32, shape: &NodeShape, next: &mut u64) {
    for (slot, s) in shape.slots.iter().enumerate() {
        if slot == shape.anchor {
            b.set_leaf(node, slot, leaf(next, Fate::Keep));
            continue;
        }
        match s {
            SlotShape::Empty => {}
            SlotShape::Leaf(fate) => b.set_leaf(node, slot, leaf(next, *fate)),
            SlotShape::Node(child) => {
                let id = b.set_node(node, slot).unwrap();
                fill(b, id, level + LEVEL_STEP, child, next);
            }
            SlotShape::Shortcut(extra, child) => {
                let skip = level + LEVEL_STEP * (2 + extra);
                let key = vec![0; Shortcut::key_chunks(skip)];
                let (_, below) = b.set_shortcut(node, slot, skip, &key).unwrap();
                fill(b, below, skip, child, next);
            }
        }
    }
}

fn build((root_shortcut, shape): &(bool, NodeShape)) -> Tree<u64> {
    let mut b = TreeBuilder::new();
    let mut next = 0;
    if *root_shortcut {
        let (_, below) = b.root_shortcut(8, &[0]).unwrap();
        fill(&mut b, below, 8, shape, &mut next);
    } else {
        let root = b.root_node().unwrap();
        fill(&mut b, root, 0, shape, &mut next);
    }
    b.build()
}

/// `IdentityKeys` that counts released leaves.
#[derive(Default)]
struct Tally {
    freed: Cell<usize>,
}

impl KeyAccess<u64> for Tally {
    type IndexKey = u64;

    fn get_key_chunk(&self, index_key: &u64, level: u32) -> u64 {
        IdentityKeys.get_key_chunk(index_key, level)
    }

    fn get_object_key_chunk(&self, object: &u64, level: u32) -> u64 {
        IdentityKeys.get_object_key_chunk(object, level)
    }

    fn compare_object(&self, object: &u64, index_key: &u64) -> bool {
        IdentityKeys.compare_object(object, index_key)
    }

    fn diff_objects(&self, object: &u64, index_key: &u64) -> Option<u32> {
        IdentityKeys.diff_objects(object, index_key)
    }

    fn free_object(&self, _object: u64) {
        self.freed.set(self.freed.get() + 1);
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_gc_keeps_exactly_the_accepted_leaves(shape in tree_strategy()) {
        let mut array = AssocArray::from_tree(build(&shape));
        let old: Vec<u64> = array.snapshot().leaves().copied().collect();

        let mut asked = Vec::new();
        array.gc(&IdentityKeys, |l| {
            asked.push(*l);
            keep(l)
        }).unwrap();

        // Asked once per leaf, in traversal order.
        prop_assert_eq!(&asked, &old);

        let tree = array.snapshot();
        let mut expected: Vec<u64> = old.into_iter().filter(keep).collect();
        let mut got: Vec<u64> = tree.leaves().copied().collect();
        expected.sort_unstable();
        got.sort_unstable();
        prop_assert_eq!(got.len(), tree.len());
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_gc_result_is_consistent_and_compacted(shape in tree_strategy()) {
        let mut array = AssocArray::from_tree(build(&shape));
        array.gc(&IdentityKeys, keep).unwrap();

        let tree = array.snapshot();
        prop_assert_eq!(verify(&tree), Vec::new(), "\n{}", tree);
        prop_assert_eq!(check_compacted(&tree), Vec::new(), "\n{}", tree);
    }

    #[test]
    fn prop_failed_gc_changes_nothing(shape in tree_strategy(), limit in 0usize..12) {
        let mut array = AssocArray::from_tree(build(&shape));
        let before = array.snapshot();
        let dump = before.to_string();

        let ops = Tally::default();
        let accepted = Cell::new(0);
        let result = array.gc_with_options(
            &ops,
            |l| {
                let kept = keep(l);
                accepted.set(accepted.get() + usize::from(kept));
                kept
            },
            &GcOptions::new().allocation_limit(limit),
        );

        match result {
            Ok(()) => {
                prop_assert_eq!(ops.freed.get(), 0);
            }
            Err(Error::OutOfMemory(_)) => {
                prop_assert!(Arc::ptr_eq(&before, &array.snapshot()));
                prop_assert_eq!(array.snapshot().to_string(), dump);
                // Every leaf copied before the failure was handed back.
                prop_assert_eq!(ops.freed.get(), accepted.get());
            }
        }
    }
}

#[test]
fn gc_with_allocation_limit_matches_unlimited() {
    let shape = (
        false,
        NodeShape {
            anchor: 0,
            slots: (0..FAN_OUT)
                .map(|i| match i % 4 {
                    0 => SlotShape::Leaf(Fate::Discard),
                    1 => SlotShape::Node(NodeShape {
                        anchor: i,
                        slots: vec![SlotShape::Leaf(Fate::Keep); FAN_OUT],
                    }),
                    2 => SlotShape::Empty,
                    _ => SlotShape::Leaf(Fate::Keep),
                })
                .collect(),
        },
    );

    let mut unlimited = AssocArray::from_tree(build(&shape));
    unlimited.gc(&IdentityKeys, keep).unwrap();

    // Root plus four full children.
    let mut limited = AssocArray::from_tree(build(&shape));
    limited
        .gc_with_options(&IdentityKeys, keep, &GcOptions::new().allocation_limit(5))
        .unwrap();

    assert_eq!(limited.snapshot().to_string(), unlimited.snapshot().to_string());
    assert_eq!(limited.len(), 4 * FAN_OUT + 5);
}

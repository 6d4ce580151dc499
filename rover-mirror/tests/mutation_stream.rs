/// Integration tests driving the mirror with commit-shaped batches
/// and observing what each listener tier receives.

use rover_mirror::node::LayoutMetrics;
use rover_mirror::{
    ChildMutation, ChildMutationKind, MirrorEngine, Mutation, NodeSpec, NodeUpdate, Subscription,
    Tag,
};
use serde_json::{Map, Value, json};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn props(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn view(tag: u32) -> Mutation {
    Mutation::create(NodeSpec::new(Tag(tag), "View"))
}

fn mirror_with_root() -> MirrorEngine {
    let mirror = MirrorEngine::default();
    mirror.create_root(Tag(1), LayoutMetrics::default()).unwrap();
    mirror
}

/// 1 ─ 2 ─ 4
///   └ 3
fn small_tree(mirror: &MirrorEngine) {
    mirror.apply_mutations(&[
        view(2),
        view(3),
        view(4),
        Mutation::insert(Tag(1), Tag(2), 0),
        Mutation::insert(Tag(1), Tag(3), 1),
        Mutation::insert(Tag(2), Tag(4), 0),
    ]);
}

#[test]
fn test_create_insert_delete_root_scenario() {
    let mirror = mirror_with_root();
    let deltas = Rc::new(RefCell::new(Vec::new()));
    let sink = deltas.clone();
    let _sub = mirror.subscribe_to_child_mutations(Tag(1), move |delta| {
        sink.borrow_mut().push(*delta);
    });

    mirror.apply_mutations(&[
        Mutation::create(NodeSpec::new(Tag(2), "X")),
        Mutation::insert(Tag(1), Tag(2), 0),
    ]);

    assert_eq!(
        *deltas.borrow(),
        vec![ChildMutation {
            kind: ChildMutationKind::InsertChild,
            child_index: 0,
            child_tag: Tag(2),
        }]
    );
    assert!(mirror.delete_root(Tag(1)).is_err());

    let report = mirror.apply_mutations(&[
        Mutation::delete(Tag(2)),
        Mutation::remove(Tag(1), Tag(2), 0),
    ]);

    assert_eq!(report.skipped, 0);
    assert!(mirror.record(Tag(1)).unwrap().children_tags.is_empty());
    assert_eq!(deltas.borrow()[1].kind, ChildMutationKind::RemoveChild);
    mirror.delete_root(Tag(1)).unwrap();
    assert!(mirror.is_empty());
}

#[test]
fn test_subtree_listener_fires_once_per_batch() {
    let mirror = mirror_with_root();
    small_tree(&mirror);

    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let _sub = mirror.subscribe_to_subtree(Tag(1), move || counter.set(counter.get() + 1));

    mirror.apply_mutations(&[
        Mutation::update(NodeUpdate::new(Tag(3))),
        Mutation::update(NodeUpdate::new(Tag(4))),
    ]);

    assert_eq!(calls.get(), 1);
}

#[test]
fn test_subtree_listener_ignores_other_branches() {
    let mirror = mirror_with_root();
    small_tree(&mirror);

    let calls = Rc::new(Cell::new(0));
    let counter = calls.clone();
    let _sub = mirror.subscribe_to_subtree(Tag(2), move || counter.set(counter.get() + 1));

    mirror.apply_mutations(&[Mutation::update(NodeUpdate::new(Tag(3)))]);
    assert_eq!(calls.get(), 0);

    mirror.apply_mutations(&[Mutation::update(NodeUpdate::new(Tag(4)))]);
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_structural_closure_over_mixed_sequences() {
    let mirror = mirror_with_root();
    let tags: Vec<u32> = (2..10).collect();
    mirror.apply_mutations(&tags.iter().map(|&t| view(t)).collect::<Vec<_>>());

    // Linear congruential sequence; deterministic but irregular
    let mut seed: u32 = 7;
    let mut next = |bound: u32| {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        (seed >> 16) % bound
    };

    for _ in 0..40 {
        let mut batch = Vec::new();
        for _ in 0..5 {
            let child = Tag(2 + next(8));
            let parent = if next(3) == 0 { Tag(1) } else { Tag(2 + next(8)) };
            let index = next(4) as usize;
            if next(2) == 0 {
                batch.push(Mutation::insert(parent, child, index));
            } else if let Some(current) = mirror.record(child).and_then(|r| r.parent_tag) {
                batch.push(Mutation::remove(current, child, index));
            }
        }
        mirror.apply_mutations(&batch);

        assert_eq!(mirror.validate(), vec![]);
        for tag in mirror.tags() {
            let record = mirror.record(tag).unwrap();
            if let Some(parent) = record.parent_tag {
                assert!(mirror.record(parent).unwrap().children_tags.contains(&tag));
            }
        }
    }
}

#[test]
fn test_render_key_is_monotonic() {
    let mirror = mirror_with_root();
    mirror.apply_mutations(&[view(2), Mutation::insert(Tag(1), Tag(2), 0)]);
    assert_eq!(mirror.record(Tag(2)).unwrap().render_key, 0);

    let mut last = 0;
    for i in 0..5 {
        if i % 2 == 0 {
            mirror.apply_mutations(&[Mutation::update(
                NodeUpdate::new(Tag(2)).with_raw_props(props(json!({ "step": i }))),
            )]);
        } else {
            mirror.set_animated_props(Tag(2), props(json!({ "opacity": i })));
        }
        let key = mirror.record(Tag(2)).unwrap().render_key;
        assert!(key > last);
        last = key;
    }
}

#[test]
fn test_overlay_wins_until_cleared() {
    let mirror = mirror_with_root();
    mirror.apply_mutations(&[view(2), Mutation::insert(Tag(1), Tag(2), 0)]);

    mirror.set_animated_props(Tag(2), props(json!({ "x": 2 })));
    mirror.apply_mutations(&[Mutation::update(
        NodeUpdate::new(Tag(2)).with_raw_props(props(json!({ "x": 1 }))),
    )]);
    assert_eq!(mirror.record(Tag(2)).unwrap().raw_props["x"], json!(2));

    mirror.clear_animated_props(Tag(2));
    mirror.apply_mutations(&[Mutation::update(
        NodeUpdate::new(Tag(2)).with_raw_props(props(json!({ "x": 1 }))),
    )]);
    assert_eq!(mirror.record(Tag(2)).unwrap().raw_props["x"], json!(1));
}

#[test]
fn test_transform_overlay_lands_in_props() {
    let mirror = MirrorEngine::default();
    mirror.apply_mutations(&[view(2)]);

    mirror.set_animated_props(
        Tag(2),
        props(json!({ "transform": [{ "rotate": "45deg" }], "opacity": 0.2 })),
    );

    let record = mirror.record(Tag(2)).unwrap();
    assert!(record.props.contains_key("transform"));
    assert_eq!(record.raw_props["opacity"], json!(0.2));
}

#[test]
fn test_backgrounded_batches_deliver_once_with_final_state() {
    let mirror = mirror_with_root();
    small_tree(&mirror);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let _node = mirror.subscribe_to_node(Tag(4), move |record, _| {
        sink.borrow_mut().push(record.raw_props["step"].clone());
    });
    let subtree_calls = Rc::new(Cell::new(0));
    let counter = subtree_calls.clone();
    let _subtree = mirror.subscribe_to_subtree(Tag(1), move || counter.set(counter.get() + 1));

    mirror.set_foreground(false);
    for step in 0..3 {
        mirror.apply_mutations(&[Mutation::update(
            NodeUpdate::new(Tag(4)).with_raw_props(props(json!({ "step": step }))),
        )]);
    }
    assert!(seen.borrow().is_empty());
    assert_eq!(subtree_calls.get(), 0);
    // The store itself stays current while suspended.
    assert_eq!(mirror.record(Tag(4)).unwrap().raw_props["step"], json!(2));

    mirror.set_foreground(true);

    assert_eq!(*seen.borrow(), vec![json!(2)]);
    assert_eq!(subtree_calls.get(), 1);
}

#[test]
fn test_structural_deltas_replay_in_order_on_resume() {
    let mirror = mirror_with_root();
    let deltas = Rc::new(RefCell::new(Vec::new()));
    let sink = deltas.clone();
    let _sub = mirror.subscribe_to_child_mutations(Tag(1), move |delta| {
        sink.borrow_mut().push((delta.kind, delta.child_tag));
    });

    mirror.set_foreground(false);
    mirror.apply_mutations(&[view(2), Mutation::insert(Tag(1), Tag(2), 0)]);
    mirror.apply_mutations(&[Mutation::remove(Tag(1), Tag(2), 0)]);
    assert!(deltas.borrow().is_empty());

    mirror.set_foreground(true);

    assert_eq!(
        *deltas.borrow(),
        vec![
            (ChildMutationKind::InsertChild, Tag(2)),
            (ChildMutationKind::RemoveChild, Tag(2)),
        ]
    );
}

#[test]
fn test_tier_order_is_structural_node_subtree() {
    let mirror = mirror_with_root();
    let order = Rc::new(RefCell::new(Vec::new()));

    let log = order.clone();
    let _a = mirror.subscribe_to_subtree(Tag(1), move || log.borrow_mut().push("subtree"));
    let log = order.clone();
    let _b = mirror.subscribe_to_node(Tag(1), move |_, _| log.borrow_mut().push("node"));
    let log = order.clone();
    let _c = mirror.subscribe_to_child_mutations(Tag(1), move |_| {
        log.borrow_mut().push("structural");
    });

    mirror.apply_mutations(&[view(2), Mutation::insert(Tag(1), Tag(2), 0)]);

    assert_eq!(*order.borrow(), vec!["structural", "node", "subtree"]);
}

#[test]
fn test_listener_can_dispose_itself() {
    let mirror = mirror_with_root();
    let calls = Rc::new(Cell::new(0));
    let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

    let counter = calls.clone();
    let own = slot.clone();
    let sub = mirror.subscribe_to_node(Tag(1), move |_, _| {
        counter.set(counter.get() + 1);
        if let Some(sub) = own.borrow_mut().take() {
            sub.dispose();
        }
    });
    *slot.borrow_mut() = Some(sub);

    mirror.apply_mutations(&[view(2), Mutation::insert(Tag(1), Tag(2), 0)]);
    mirror.apply_mutations(&[Mutation::update(NodeUpdate::new(Tag(1)))]);

    assert_eq!(calls.get(), 1);
}

#[test]
fn test_listener_disposed_mid_fanout_is_skipped() {
    let mirror = mirror_with_root();
    let second_calls = Rc::new(Cell::new(0));
    let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

    let target = victim.clone();
    let _first = mirror.subscribe_to_node(Tag(1), move |_, _| {
        if let Some(sub) = target.borrow().as_ref() {
            sub.dispose();
        }
    });
    let counter = second_calls.clone();
    *victim.borrow_mut() = Some(
        mirror.subscribe_to_node(Tag(1), move |_, _| counter.set(counter.get() + 1)),
    );

    mirror.apply_mutations(&[view(2), Mutation::insert(Tag(1), Tag(2), 0)]);

    assert_eq!(second_calls.get(), 0);
}

#[test]
fn test_panicking_listener_does_not_stop_fanout() {
    let mirror = mirror_with_root();
    let reached = Rc::new(Cell::new(false));

    let _bad = mirror.subscribe_to_node(Tag(1), |_, _| panic!("consumer bug"));
    let flag = reached.clone();
    let _good = mirror.subscribe_to_node(Tag(1), move |_, _| flag.set(true));

    mirror.apply_mutations(&[view(2), Mutation::insert(Tag(1), Tag(2), 0)]);

    assert!(reached.get());
}

#[test]
fn test_listener_may_reenter_engine() {
    let mirror = Rc::new(mirror_with_root());
    let observed = Rc::new(RefCell::new(Vec::new()));

    let handle = Rc::downgrade(&mirror);
    let sink = observed.clone();
    let _sub = mirror.subscribe_to_node(Tag(2), move |record, view| {
        let Some(mirror) = handle.upgrade() else {
            return;
        };
        let parent = record.parent_tag.and_then(|p| mirror.record(p));
        sink.borrow_mut().push((
            parent.map(|p| p.children_tags.len()),
            view.map(|v| v.render_key()),
        ));
    });

    mirror.apply_mutations(&[view(2), Mutation::insert(Tag(1), Tag(2), 0)]);

    assert_eq!(*observed.borrow(), vec![(Some(1), Some(0))]);
}

#[test]
fn test_batch_replays_from_json() {
    let mirror = mirror_with_root();
    let batch: Vec<Mutation> = serde_json::from_value(json!([
        {
            "type": "CREATE",
            "descriptor": { "tag": 2, "type": "Text", "rawProps": { "nativeID": "title" } }
        },
        { "type": "INSERT", "parentTag": 1, "childTag": 2, "index": 0 },
        { "type": "UPDATE", "descriptor": { "tag": 2, "rawProps": { "text": "hello" } } }
    ]))
    .unwrap();

    let report = mirror.apply_mutations(&batch);

    assert_eq!(report.applied, 3);
    let record = mirror.record_by_string_id("title").unwrap();
    assert_eq!(record.raw_props["text"], json!("hello"));
    assert_eq!(mirror.view_by_string_id("title").unwrap().parent_tag(), Some(Tag(1)));
}

#[test]
fn test_animated_patch_reaches_parent_structural_listeners() {
    let mirror = mirror_with_root();
    mirror.apply_mutations(&[view(2), view(3)]);
    mirror.apply_mutations(&[
        Mutation::insert(Tag(1), Tag(2), 0),
        Mutation::insert(Tag(1), Tag(3), 1),
    ]);

    let deltas = Rc::new(RefCell::new(Vec::new()));
    let sink = deltas.clone();
    let _sub = mirror.subscribe_to_child_mutations(Tag(1), move |delta| {
        sink.borrow_mut().push(*delta);
    });

    mirror.apply_mutations(&[Mutation::update(NodeUpdate::new(Tag(3)))]);
    mirror.set_animated_props(Tag(3), props(json!({ "opacity": 0.5 })));

    let update = ChildMutation {
        kind: ChildMutationKind::UpdateChild,
        child_index: 1,
        child_tag: Tag(3),
    };
    assert_eq!(*deltas.borrow(), vec![update, update]);
}

#[test]
fn test_animated_patch_on_unlinked_node_sends_no_delta() {
    let mirror = mirror_with_root();
    mirror.apply_mutations(&[view(2)]);

    let deltas = Rc::new(Cell::new(0));
    let counter = deltas.clone();
    let _sub = mirror.subscribe_to_child_mutations(Tag(1), move |_| {
        counter.set(counter.get() + 1);
    });

    mirror.set_animated_props(Tag(2), props(json!({ "opacity": 0.5 })));

    assert_eq!(deltas.get(), 0);
}

#[test]
fn test_views_are_current_inside_structural_listeners() {
    let mirror = Rc::new(mirror_with_root());
    let observed = Rc::new(RefCell::new(Vec::new()));

    let handle = Rc::downgrade(&mirror);
    let sink = observed.clone();
    let _sub = mirror.subscribe_to_child_mutations(Tag(1), move |delta| {
        let Some(mirror) = handle.upgrade() else {
            return;
        };
        let tag = delta.child_tag;
        sink.borrow_mut().push((
            mirror.record(tag).map(|r| r.render_key),
            mirror.view(tag).map(|v| v.render_key()),
            mirror.view(tag).and_then(|v| v.parent_tag()),
        ));
    });

    mirror.apply_mutations(&[view(2), Mutation::insert(Tag(1), Tag(2), 0)]);
    mirror.apply_mutations(&[
        Mutation::update(NodeUpdate::new(Tag(2))),
        Mutation::update(NodeUpdate::new(Tag(2))),
    ]);
    mirror.set_animated_props(Tag(2), props(json!({ "opacity": 0.5 })));

    assert_eq!(
        *observed.borrow(),
        vec![
            (Some(0), Some(0), Some(Tag(1))),
            (Some(1), Some(1), Some(Tag(1))),
            (Some(2), Some(2), Some(Tag(1))),
            (Some(3), Some(3), Some(Tag(1))),
        ]
    );
}

#[test]
fn test_bad_mutations_are_skipped_and_batch_continues() {
    let mirror = mirror_with_root();

    let report = mirror.apply_mutations(&[
        Mutation::update(NodeUpdate::new(Tag(40))),
        Mutation::insert(Tag(1), Tag(41), 0),
        view(2),
        Mutation::insert(Tag(1), Tag(2), 0),
    ]);

    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(mirror.record(Tag(1)).unwrap().children_tags, vec![Tag(2)]);
    assert!(!mirror.contains(Tag(40)));
    assert!(!mirror.contains(Tag(41)));
    assert_eq!(mirror.validate(), vec![]);
}

#[test]
fn test_update_of_deleted_node_is_skipped() {
    let mirror = mirror_with_root();
    mirror.apply_mutations(&[view(2), view(3), Mutation::insert(Tag(1), Tag(3), 0)]);

    let report = mirror.apply_mutations(&[
        Mutation::delete(Tag(2)),
        Mutation::update(NodeUpdate::new(Tag(2))),
        Mutation::update(NodeUpdate::new(Tag(3))),
    ]);

    assert_eq!(report.applied, 2);
    assert_eq!(report.skipped, 1);
    assert!(mirror.record(Tag(2)).is_none());
    assert_eq!(mirror.record(Tag(3)).unwrap().render_key, 1);
    assert_eq!(mirror.validate(), vec![]);
}

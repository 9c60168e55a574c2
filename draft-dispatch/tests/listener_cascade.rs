//! Dispatch and listener cascade behavior

use draft_dispatch::prelude::*;
use draft_dispatch::testing::StoreHarness;
use draft_dispatch::{assert_fired, assert_not_fired, count_fired};
use serde_json::json;

fn push_to(key: &'static str, entry: &'static str) -> ActionDef {
    action(move |draft, _| {
        draft.field(key)?.push(entry)?;
        Ok(None)
    })
}

fn todo_model() -> Model {
    Model::new()
        .state("items", json!([]))
        .action(
            "addTodo",
            action(|draft, payload| {
                draft.field("items")?.push(payload.clone())?;
                Ok(None)
            }),
        )
        .state("logs", json!([]))
        .action(
            "onAdd",
            action(|draft, payload| {
                let title = payload.as_str().unwrap_or_default();
                draft.field("logs")?.push(format!("Added: {title}"))?;
                Ok(None)
            })
            .listen_to("addTodo"),
        )
}

#[test]
fn test_todo_scenario() {
    let mut harness = StoreHarness::new(todo_model());

    let outcome = harness.dispatch("addTodo", "buy milk").unwrap();

    assert!(outcome.is_clean());
    assert_eq!(
        harness.snapshot().to_json(),
        json!({ "items": ["buy milk"], "logs": ["Added: buy milk"] })
    );

    let published = harness.drain_published();
    assert_eq!(published.len(), 1, "one settled publish per dispatch");
    assert_eq!(published[0], harness.snapshot());

    let fired = harness.drain_fired();
    assert_fired!(fired, "addTodo", "buy milk");
    assert_fired!(fired, "onAdd", "buy milk");
}

#[test]
fn test_listeners_run_in_registration_order_and_see_prior_effects() {
    let model = Model::new()
        .state("log", json!([]))
        .action("t", push_to("log", "t"))
        .action(
            "l1",
            action(|draft, _| {
                draft.field("log")?.push("l1")?;
                Ok(None)
            })
            .listen_to("t"),
        )
        .action(
            "l2",
            action(|draft, _| {
                // l1 committed strictly before this listener started
                let seen = draft.get("log").cloned().unwrap_or_default();
                draft.field("log")?.push(format!("l2 saw {seen}"))?;
                Ok(None)
            })
            .listen_to("t"),
        );
    let store = Store::new(model).unwrap();

    store.dispatch("t", Value::Null).unwrap();

    assert_eq!(
        store.select(&["log"]).unwrap().to_json(),
        json!(["t", "l1", r#"l2 saw ["t","l1"]"#])
    );
}

#[test]
fn test_cascade_is_depth_first() {
    let model = Model::new()
        .state("log", json!([]))
        .action("t", push_to("log", "t"))
        .action("l1", push_to("log", "l1").listen_to("t"))
        .action("l2", push_to("log", "l2").listen_to("t"))
        .action("l1a", push_to("log", "l1a").listen_to("l1"));
    let store = Store::new(model).unwrap();

    let outcome = store.dispatch("t", Value::Null).unwrap();

    let fired: Vec<_> = outcome.fired().map(ActionId::as_str).collect();
    assert_eq!(fired, vec!["t", "l1", "l1a", "l2"]);
    let depths: Vec<_> = outcome.commits.iter().map(|c| c.depth).collect();
    assert_eq!(depths, vec![0, 1, 2, 1]);
    assert_eq!(
        store.select(&["log"]).unwrap().to_json(),
        json!(["t", "l1", "l1a", "l2"])
    );
}

#[test]
fn test_listeners_across_models() {
    let model = Model::new()
        .model(
            "audit",
            Model::new()
                .state("entries", json!([]))
                .action(
                    "record",
                    action(|draft, payload| {
                        // Scoped to the audit slice only
                        assert!(draft.get("items").is_none());
                        draft.field("entries")?.push(payload.clone())?;
                        Ok(None)
                    })
                    .listen_to_all(["todos.add", "todos.remove"]),
                ),
        )
        .model(
            "todos",
            Model::new()
                .state("items", json!([]))
                .action(
                    "add",
                    action(|draft, payload| {
                        draft.field("items")?.push(payload.clone())?;
                        Ok(None)
                    }),
                )
                .action(
                    "remove",
                    action(|draft, payload| {
                        let target = payload.clone();
                        draft.field("items")?.retain(|item| *item != target)?;
                        Ok(None)
                    }),
                ),
        );
    let mut harness = StoreHarness::new(model);

    harness.dispatch("todos.add", "a").unwrap();
    harness.dispatch("todos.remove", "a").unwrap();

    assert_eq!(
        harness.snapshot().to_json(),
        json!({ "audit": { "entries": ["a", "a"] }, "todos": { "items": [] } })
    );
    let fired = harness.drain_fired();
    assert_eq!(count_fired!(fired, "audit.record"), 2);
}

#[test]
fn test_failing_target_fires_no_listeners_and_keeps_snapshot() {
    let model = Model::new()
        .state("n", 0)
        .action(
            "t",
            action(|draft, _| {
                draft.set("n", 1)?;
                anyhow::bail!("validation failed")
            }),
        )
        .action("l", push_to("never", "x").listen_to("t"));
    let mut harness = StoreHarness::new(model);
    let before = harness.snapshot();

    let err = harness.dispatch("t", Value::Null).unwrap_err();

    assert!(matches!(err, DispatchError::HandlerFailed { .. }));
    assert_eq!(err.action(), "t");
    assert!(harness.snapshot().ptr_eq(&before));
    assert!(!harness.has_published());
    let fired = harness.drain_fired();
    assert_not_fired!(fired, "t");
    assert_not_fired!(fired, "l");
}

#[test]
fn test_failing_listener_skips_only_its_subtree() {
    let model = Model::new()
        .state("log", json!([]))
        .action("t", push_to("log", "t"))
        .action(
            "bad",
            action(|_, _| anyhow::bail!("listener refused")).listen_to("t"),
        )
        .action("bad_child", push_to("log", "bad_child").listen_to("bad"))
        .action("good", push_to("log", "good").listen_to("t"));
    let store = Store::new(model).unwrap();

    let outcome = store.dispatch("t", Value::Null).unwrap();

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].action, "bad");
    assert_eq!(outcome.failures[0].depth, 1);
    assert!(!outcome.did_fire("bad_child"));
    assert_eq!(store.select(&["log"]).unwrap().to_json(), json!(["t", "good"]));
}

#[test]
fn test_handler_panic_is_a_failure() {
    let model = Model::new()
        .state("n", 0)
        .action("boom", action(|_, _| panic!("exploded")));
    let store = Store::new(model).unwrap();

    let err = store.dispatch("boom", Value::Null).unwrap_err();
    assert!(
        matches!(err, DispatchError::HandlerPanicked { ref message, .. } if message == "exploded")
    );
    assert_eq!(store.select(&["n"]), Some(Value::from(0)));
}

#[test]
fn test_noop_handler_succeeds_with_equal_snapshot() {
    let model = Model::new()
        .state("items", json!(["a"]))
        .action("touch", action(|_, _| Ok(None)))
        .action(
            "same",
            action(|draft, _| Ok(Some(draft.original().clone()))),
        );
    let mut harness = StoreHarness::new(model);
    let before = harness.snapshot();

    let outcome = harness.dispatch("touch", Value::Null).unwrap();
    assert!(!outcome.changed());
    assert_eq!(harness.snapshot(), before);

    let outcome = harness.dispatch("same", Value::Null).unwrap();
    assert!(!outcome.changed());
    assert_eq!(harness.snapshot(), before);

    // A no-op dispatch still publishes
    assert_eq!(harness.drain_published().len(), 2);
}

#[test]
fn test_diamond_listener_fires_once_per_path() {
    let model = Model::new()
        .state("joins", 0)
        .action("root", action(|_, _| Ok(None)))
        .action("left", action(|_, _| Ok(None)).listen_to("root"))
        .action("right", action(|_, _| Ok(None)).listen_to("root"))
        .action(
            "join",
            action(|draft, _| {
                draft
                    .field("joins")?
                    .update(|v| Value::from(v.as_i64().unwrap_or(0) + 1))?;
                Ok(None)
            })
            .listen_to_all(["left", "right"]),
        );
    let mut harness = StoreHarness::new(model);

    harness.dispatch("root", Value::Null).unwrap();

    let fired = harness.drain_fired();
    assert_eq!(count_fired!(fired, "join"), 2);
    assert_eq!(harness.select(&["joins"]), Some(Value::from(2)));
}

#[test]
fn test_listener_receives_target_payload_as_is() {
    let model = Model::new()
        .state("seen", Value::Null)
        .action("t", action(|_, _| Ok(None)))
        .action(
            "l",
            action(|draft, payload| {
                draft.set("seen", payload.clone())?;
                Ok(None)
            })
            .listen_to("t"),
        );
    let store = Store::new(model).unwrap();
    let payload = json!({ "id": 7, "tags": ["x", "y"] });

    store.dispatch("t", payload.clone()).unwrap();

    assert_eq!(store.select(&["seen"]).unwrap().to_json(), payload);
}

#[test]
fn test_definition_errors() {
    let unresolved = Model::new().action("a", action(|_, _| Ok(None)).listen_to("nowhere"));
    assert!(matches!(
        Store::new(unresolved),
        Err(DefinitionError::UnresolvedTarget { .. })
    ));

    let cyclic = Model::new()
        .action("a", action(|_, _| Ok(None)).listen_to("b"))
        .action("b", action(|_, _| Ok(None)).listen_to("a"));
    let err = Store::new(cyclic).unwrap_err();
    assert!(err.to_string().starts_with("listener cycle:"));

    let duplicate = Model::new()
        .action("a", action(|_, _| Ok(None)))
        .action("a", action(|_, _| Ok(None)));
    assert!(matches!(
        Store::new(duplicate),
        Err(DefinitionError::DuplicateKey { .. })
    ));
}

#[test]
fn test_target_by_segments() {
    let model = Model::new()
        .model("todos", Model::new().action("add", action(|_, _| Ok(None))))
        .action(
            "on_add",
            action(|_, _| Ok(None)).listen_to(ActionId::from_segments(&["todos", "add"])),
        );
    let store = Store::new(model).unwrap();

    assert_eq!(store.listeners_of("todos.add"), vec![&ActionId::from("on_add")]);
}

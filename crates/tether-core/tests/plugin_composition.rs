//! Plugin composition through a manager: props, registration and teardown order.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use parking_lot::Mutex;
use std::sync::Arc;
use tether_core::{module_fn, plugin_fn, Cleanup, LoadRequest, PluginContext, PluginRecord, Props};
use tether_testkit::{Harness, MemoryDocument, MemoryElement, ModuleRecorder, StaticResolver};

fn logging_plugin(log: &Arc<Mutex<Vec<String>>>, label: &'static str) -> tether_core::PluginFactory {
    let log = Arc::clone(log);
    plugin_fn(move |ctx: PluginContext| {
        let log = Arc::clone(&log);
        ctx.register.register(
            PluginRecord::labelled(label).with_cleanup(Cleanup::new(move || {
                log.lock().push(format!("plugin {label}"));
            })),
        );
        Props::new().with(label, true)
    })
}

#[tokio::test]
async fn discovered_module_receives_plugin_props() {
    let recorder = ModuleRecorder::new();
    let harness = Harness::new(StaticResolver::new());
    let app = harness.manager().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    harness.resolver.insert(
        "menu",
        app.plugins()
            .with_plugins([logging_plugin(&log, "expander"), logging_plugin(&log, "modal")])
            .wrap(recorder.factory()),
    );
    app.hydrate(Arc::new(MemoryDocument::with_elements([
        MemoryElement::behaviour("nav", "menu"),
    ])));
    harness.settle(&app).await;

    assert_eq!(recorder.invocations(), 1);
    let mut keys = recorder.last_plugin_keys();
    keys.sort();
    assert_eq!(keys, vec!["expander", "modal"]);

    let entry = app.cache().get("nav").unwrap();
    let labels: Vec<_> = entry.plugins.iter().filter_map(PluginRecord::label).collect();
    assert_eq!(labels, vec!["expander", "modal"]);
}

#[test]
fn destroy_runs_module_cleanup_before_plugins_in_order() {
    let app = Harness::new(StaticResolver::new()).manager().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));

    let module_log = Arc::clone(&log);
    let module = module_fn(move |_| {
        let log = Arc::clone(&module_log);
        Some(Cleanup::new(move || log.lock().push("module".to_string())))
    });
    let composed = app
        .plugins()
        .with_plugins([
            logging_plugin(&log, "first"),
            logging_plugin(&log, "second"),
            logging_plugin(&log, "third"),
        ])
        .wrap(module);

    app.load_module(LoadRequest::new("widget", composed));
    app.destroy();

    assert_eq!(
        *log.lock(),
        vec!["module", "plugin first", "plugin second", "plugin third"]
    );
}

#[test]
fn unload_module_skips_plugin_cleanups() {
    let app = Harness::new(StaticResolver::new()).manager().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let recorder = ModuleRecorder::new();

    let composed = app
        .plugins()
        .with_plugins([logging_plugin(&log, "only")])
        .wrap(recorder.factory());
    app.load_module(LoadRequest::new("widget", composed));

    app.unload_module("widget").unwrap();
    assert_eq!(recorder.cleanups(), 1);
    assert!(log.lock().is_empty());
}

#[test]
fn caller_props_reach_plugins_and_module() {
    let app = Harness::new(StaticResolver::new()).manager().unwrap();
    let total = Arc::new(Mutex::new(0));
    let out = Arc::clone(&total);

    let composed = app
        .plugins()
        .with_plugins([
            plugin_fn(|ctx: PluginContext| {
                let base = ctx.props.get::<i32>("a").copied().unwrap_or_default();
                Props::new().with("b", base / 5)
            }),
            plugin_fn(|_| Props::new().with("c", 3_i32)),
        ])
        .wrap(module_fn(move |props| {
            let a = props.props.get::<i32>("a").copied().unwrap_or_default();
            let b = props.plugins.get::<i32>("b").copied().unwrap_or_default();
            let c = props.plugins.get::<i32>("c").copied().unwrap_or_default();
            *out.lock() = a + b + c;
            None
        }));

    app.load_module(
        LoadRequest::new("sum", composed).with_props(Props::new().with("a", 10_i32)),
    );
    assert_eq!(*total.lock(), 15);
}

#[test]
fn module_can_register_its_own_cleanup() {
    let app = Harness::new(StaticResolver::new()).manager().unwrap();
    let registry = app.plugin_registry().clone();
    let ran = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&ran);

    app.load_module(LoadRequest::new(
        "self",
        module_fn(move |props| {
            let flag = Arc::clone(&flag);
            registry
                .register_for(props.name)
                .register_cleanup(move || *flag.lock() = true);
            None
        }),
    ));

    assert_eq!(app.destroy().destroyed, vec!["self"]);
    assert!(*ran.lock());
}

use std::collections::HashSet;

use crate::dom::{Document, NodeId, NodeRef, PathEvaluator};
use crate::{Error, Mode, NodeKind, Options, Registry, Renderer, UnmatchedPolicy, render, render_verbose_with};

type Html<'d> = Registry<NodeRef<'d>, String>;

fn tag(r: &Renderer<'_, NodeRef<'_>, String>, name: &str, inner: &str) -> String {
    format!("<{name} key=\"{}\">{inner}</{name}>", r.key())
}

/// Registry with a document-node rule that renders all children.
fn registry<'d>() -> Html<'d> {
    let mut registry = Registry::new();
    registry.register("self::document-node()", |r| Ok(r.traverse()?.concat()));
    registry
}

fn run<'d>(registry: &Html<'d>, doc: &'d Document) -> String {
    render(registry, &PathEvaluator, &doc.root()).unwrap().unwrap_or_default()
}

fn traced_keys<'d>(registry: &Html<'d>, doc: &'d Document) -> Vec<String> {
    let options = Options { trace: true, ..Options::default() };
    let res = render_verbose_with(registry, &PathEvaluator, &doc.root(), &options).unwrap();
    res.details.trace.into_iter().map(|i| i.key).collect()
}

fn divs(doc: &mut Document, parent: NodeId, n: usize) -> Vec<NodeId> {
    (0..n).map(|_| doc.element(parent, "div")).collect()
}

// --- Node kinds -------------------------------------------------------------

#[test]
fn renders_elements() {
    let mut doc = Document::new();
    doc.element(doc.root_id(), "div");

    let mut registry = registry();
    registry.register("self::element()", |r| Ok(tag(r, "x-ok", "")));

    assert_eq!(run(&registry, &doc), r##"<x-ok key="#/0"></x-ok>"##);
}

#[test]
fn renders_text() {
    let mut doc = Document::new();
    doc.text(doc.root_id(), "OK");

    let mut registry = registry();
    registry.register("self::text()", |r| Ok(tag(r, "x", r.node().value().unwrap_or_default())));

    assert_eq!(run(&registry, &doc), r##"<x key="#/0">OK</x>"##);
}

#[test]
fn renders_processing_instructions() {
    let mut doc = Document::new();
    doc.processing_instruction(doc.root_id(), "OK", "");

    let mut registry = registry();
    registry.register("self::processing-instruction()", |r| Ok(tag(r, "x", r.node().name().unwrap_or_default())));

    assert_eq!(run(&registry, &doc), r##"<x key="#/0">OK</x>"##);
}

#[test]
fn renders_comments() {
    let mut doc = Document::new();
    doc.comment(doc.root_id(), " OK ");

    let mut registry = registry();
    registry.register("self::comment()", |r| Ok(tag(r, "x", r.node().value().unwrap_or_default())));

    assert_eq!(run(&registry, &doc), r##"<x key="#/0"> OK </x>"##);
}

#[test]
fn renders_nested_structures() {
    let mut doc = Document::new();
    let outer = doc.element(doc.root_id(), "div");
    doc.element(outer, "div");

    let mut registry = registry();
    registry.register("self::div", |r| Ok(tag(r, "x", &r.traverse()?.concat())));
    registry.register("self::div[parent::div]", |r| Ok(tag(r, "x-ok", "")));

    assert_eq!(run(&registry, &doc), r##"<x key="#/0"><x-ok key="#/0/0"></x-ok></x>"##);
}

// --- Resolution -------------------------------------------------------------

#[test]
fn most_specific_rule_wins_regardless_of_order() {
    let mut doc = Document::new();
    doc.element_with(doc.root_id(), "div", &[("some-attribute", "x")]);

    let mut registry = registry();
    registry.register("self::div", |r| Ok(tag(r, "x-notok", "")));
    registry.register("self::div[@some-attribute]", |r| Ok(tag(r, "x-ok", "")));
    registry.register("self::div", |r| Ok(tag(r, "x-notok", "")));

    assert_eq!(run(&registry, &doc), r##"<x-ok key="#/0"></x-ok>"##);
}

#[test]
fn latest_registration_breaks_ties() {
    let mut doc = Document::new();
    doc.element(doc.root_id(), "div");

    let mut registry = registry();
    registry.register("self::div", |_| Ok("first".into()));
    registry.register("self::div", |_| Ok("second".into()));

    assert_eq!(run(&registry, &doc), "second");
}

#[test]
fn named_mode_rules_never_fire_in_default_mode() {
    let mut doc = Document::new();
    doc.element(doc.root_id(), "div");

    let mut registry = registry();
    registry.mode("my-mode").register("self::div", |_| Ok("notok".into()));

    assert_eq!(run(&registry, &doc), "");
}

// --- Traversal --------------------------------------------------------------

#[test]
fn traverses_relative_query() {
    let mut doc = Document::new();
    let div = doc.element(doc.root_id(), "div");
    let ok = doc.element(div, "span");
    doc.text(ok, "OK");
    let notok = doc.element(div, "span");
    doc.text(notok, "NOTOK");

    let mut registry = registry();
    registry.register("self::text()", |r| Ok(r.node().value().unwrap_or_default().to_string()));
    registry.register("self::div", |r| Ok(tag(r, "x", &r.traverse_query("./*[1]")?.concat())));
    registry.register("self::span", |r| Ok(tag(r, "x-ok", &r.traverse()?.concat())));

    assert_eq!(run(&registry, &doc), r##"<x key="#/0"><x-ok key="#/0/0.0">OK</x-ok></x>"##);
}

#[test]
fn depth_counts_from_render_root() {
    let mut doc = Document::new();
    let div = doc.element(doc.root_id(), "div");
    doc.element(div, "span");

    let mut registry = registry();
    registry.register("self::element()", |r| Ok(format!("{}{}", r.depth(), r.traverse()?.concat())));

    assert_eq!(run(&registry, &doc), "12");
}

// --- Modes ------------------------------------------------------------------

#[test]
fn modes_render_out_of_order() {
    let mut doc = Document::new();
    let div = doc.element(doc.root_id(), "div");
    let func = doc.element(div, "fn");
    doc.element(func, "span");

    let mut registry = registry();
    registry.register("self::div", |r| {
        let inner = r.traverse()?.concat() + &r.traverse_mode("./fn", "my-mode")?.concat();
        Ok(tag(r, "x", &inner))
    });
    registry.register("self::fn", |r| Ok(tag(r, "x", "once")));
    registry.mode("my-mode").register("self::fn", |r| Ok(tag(r, "x", &r.traverse()?.concat())));
    registry.register("self::span", |r| Ok(tag(r, "x-ok", "")));

    assert_eq!(
        run(&registry, &doc),
        concat!(
            r##"<x key="#/0">"##,
            r##"<x key="#/0/0">once</x>"##,
            r##"<x key="#/0/1.0@my-mode"><x-ok key="#/0/1.0@my-mode/0.0@my-mode"></x-ok></x>"##,
            "</x>",
        )
    );
}

#[test]
fn traversal_stays_in_mode_by_default() {
    let mut doc = Document::new();
    let div = doc.element(doc.root_id(), "div");
    let func = doc.element(div, "fn");
    let p = doc.element(func, "p");
    doc.element(p, "span");

    let mut registry = registry();
    registry.register("self::div", |r| Ok(tag(r, "x", &r.traverse_mode("./fn", "my-mode")?.concat())));
    registry.register("self::p", |r| Ok(tag(r, "x", &r.traverse()?.concat())));
    registry.mode("my-mode").register("self::fn", |r| Ok(tag(r, "x", &r.traverse()?.concat())));
    registry.mode("my-mode").register("self::span", |r| Ok(tag(r, "x-ok", "")));
    registry.register("self::span", |r| Ok(tag(r, "x-notok", "")));

    let out = run(&registry, &doc);
    assert!(out.contains("<x-ok"), "{out}");
    assert!(!out.contains("x-notok"), "{out}");
}

#[test]
fn falls_back_to_default_mode() {
    let mut doc = Document::new();
    let div = doc.element(doc.root_id(), "div");
    doc.element(div, "fn");

    let mut registry = registry();
    registry.register("self::div", |r| Ok(tag(r, "x", &r.traverse_mode("./fn", "my-mode")?.concat())));
    registry.register("self::fn", |r| Ok(tag(r, "x-ok", &r.mode().to_string())));

    let options = Options { trace: true, ..Options::default() };
    let res = render_verbose_with(&registry, &PathEvaluator, &doc.root(), &options).unwrap();

    assert_eq!(
        res.output.as_deref(),
        Some(r##"<x key="#/0"><x-ok key="#/0/0.0@my-mode">my-mode</x-ok></x>"##)
    );
    assert_eq!(res.details.fallbacks, 1);
    let last = res.details.trace.last().unwrap();
    assert_eq!(last.mode, Mode::named("my-mode"));
    assert_eq!(last.rule_mode, Mode::Default);
}

#[test]
fn reset_returns_to_default_mode() {
    let mut doc = Document::new();
    let div = doc.element(doc.root_id(), "div");
    let func = doc.element(div, "fn");
    let span = doc.element(func, "span");
    doc.element(span, "span");

    let mut registry = registry();
    registry.register("self::div", |r| Ok(tag(r, "x", &r.traverse_mode("./fn", "my-mode")?.concat())));
    registry.mode("my-mode").register("self::fn", |r| Ok(tag(r, "x", &r.traverse_reset()?.concat())));
    registry.mode("my-mode").register("self::span", |r| Ok(tag(r, "x-notok", &r.traverse()?.concat())));
    registry.register("self::span", |r| Ok(tag(r, "x-ok", &r.traverse()?.concat())));

    assert_eq!(
        run(&registry, &doc),
        concat!(
            r##"<x key="#/0"><x key="#/0/0.0@my-mode">"##,
            r##"<x-ok key="#/0/0.0@my-mode/0"><x-ok key="#/0/0.0@my-mode/0/0"></x-ok></x-ok>"##,
            "</x></x>",
        )
    );
}

// --- Keys -------------------------------------------------------------------

#[test]
fn keys_are_unique() {
    let mut doc = Document::new();
    let outer = doc.element(doc.root_id(), "div");
    let inner = divs(&mut doc, outer, 4);
    doc.element(inner[2], "fn");
    doc.element(inner[3], "fn");

    let mut registry = registry();
    registry.register("self::div", |r| {
        let inner = r.traverse()?.concat() + &r.traverse_mode("./fn", "my-mode")?.concat();
        Ok(tag(r, "x", &inner))
    });
    registry.register("self::fn", |r| Ok(tag(r, "x", "")));

    let keys = traced_keys(&registry, &doc);
    let distinct: HashSet<&String> = keys.iter().collect();
    assert_eq!(keys.len(), 10);
    assert_eq!(distinct.len(), keys.len(), "{keys:?}");
}

#[test]
fn keys_are_stable() {
    let mut doc = Document::new();
    let div = doc.element(doc.root_id(), "div");
    doc.element(div, "div");

    let mut registry = registry();
    registry.register("self::div", |r| Ok(tag(r, "x", &r.traverse()?.concat())));

    assert_eq!(traced_keys(&registry, &doc), traced_keys(&registry, &doc));
    assert_eq!(run(&registry, &doc), run(&registry, &doc));
}

#[test]
fn keys_reuse_identifiers() {
    let mut doc = Document::new();
    let outer = doc.element(doc.root_id(), "div");
    let ok = doc.element_with(outer, "div", &[("id", "OK")]);
    let inner = divs(&mut doc, ok, 2);
    doc.element(inner[1], "div");

    let mut registry = registry();
    registry.register("self::div", |r| Ok(tag(r, "x", &r.traverse()?.concat())));

    let keys = traced_keys(&registry, &doc);
    assert_eq!(keys.iter().filter(|k| k.starts_with("OK")).count(), 4, "{keys:?}");
    assert!(keys.contains(&"OK[#/0/0/1/0]".to_string()), "{keys:?}");
}

#[test]
fn shared_identifiers_get_distinct_keys() {
    let mut doc = Document::new();
    let outer = doc.element(doc.root_id(), "div");
    doc.element_with(outer, "div", &[("id", "OK")]);
    doc.element_with(outer, "div", &[("id", "OK")]);

    let mut registry = registry();
    registry.register("self::div", |r| Ok(tag(r, "x", &r.traverse()?.concat())));

    let keys = traced_keys(&registry, &doc);
    assert_eq!(keys, vec!["#", "#/0", "OK[#/0/0]", "OK[#/0/1]"]);
}

#[test]
fn identifiers_shaped_like_paths_get_distinct_keys() {
    let mut doc = Document::new();
    let outer = doc.element(doc.root_id(), "div");
    let a = doc.element_with(outer, "div", &[("id", "a")]);
    doc.element(a, "div");
    doc.element_with(outer, "div", &[("id", "a/0")]);

    let mut registry = registry();
    registry.register("self::div", |r| Ok(tag(r, "x", &r.traverse()?.concat())));

    let keys = traced_keys(&registry, &doc);
    let distinct: HashSet<&String> = keys.iter().collect();
    assert_eq!(keys.len(), 5);
    assert_eq!(distinct.len(), keys.len(), "{keys:?}");
}

#[test]
fn identified_node_visited_twice_gets_distinct_keys() {
    let mut doc = Document::new();
    let div = doc.element(doc.root_id(), "div");
    doc.element_with(div, "p", &[("xml:id", "OK")]);

    let mut registry = registry();
    registry.register("self::div", |r| Ok(r.traverse()?.concat() + &r.traverse_query("./p")?.concat()));
    registry.register("self::p", |r| Ok(format!("[{}]", r.key())));

    assert_eq!(run(&registry, &doc), "[OK[#/0/0]][OK[#/0/1.0]]");
}

// --- Errors -----------------------------------------------------------------

#[test]
fn malformed_lower_ranked_pattern_is_an_error() {
    let mut doc = Document::new();
    let div = doc.element(doc.root_id(), "div");

    let mut registry: Html<'_> = Registry::new();
    registry.register("self::div[", |_| Ok("broken".to_string()));
    registry.register("self::div", |_| Ok("ok".to_string()));

    match render(&registry, &PathEvaluator, &doc.node(div)) {
        Err(Error::Evaluator(err)) => assert_eq!(err.expression, "self::div["),
        other => panic!("expected an evaluator error, got {other:?}"),
    }
}

#[test]
fn rule_errors_abort_the_traversal() {
    let mut doc = Document::new();
    let div = doc.element(doc.root_id(), "div");
    doc.element(div, "span");

    let mut registry = registry();
    registry.register("self::div", |r| Ok(tag(r, "x", &r.traverse()?.concat())));
    registry.register("self::span", |_| Err(Error::rule("boom")));

    let err = render(&registry, &PathEvaluator, &doc.root()).unwrap_err();
    assert!(matches!(err, Error::Rule(_)));
    assert_eq!(err.to_string(), "rule failed: boom");
}

#[test]
fn evaluator_errors_propagate() {
    let mut doc = Document::new();
    doc.element(doc.root_id(), "div");

    let mut registry = registry();
    registry.register("self::div", |r| Ok(r.traverse_query("./[")?.concat()));

    match render(&registry, &PathEvaluator, &doc.root()) {
        Err(Error::Evaluator(err)) => assert_eq!(err.expression, "./["),
        other => panic!("expected an evaluator error, got {other:?}"),
    }
}

#[test]
fn unmatched_policy_error_fails_with_key() {
    let mut doc = Document::new();
    doc.element(doc.root_id(), "div");

    let registry = registry();
    let options = Options { unmatched: UnmatchedPolicy::Error, ..Options::default() };

    match render_verbose_with(&registry, &PathEvaluator, &doc.root(), &options) {
        Err(Error::Unmatched { key, mode, kind }) => {
            assert_eq!(key, "#/0");
            assert_eq!(mode, Mode::Default);
            assert_eq!(kind, NodeKind::Element);
        }
        other => panic!("expected an unmatched error, got {:?}", other.map(|r| r.output)),
    }
}

#[test]
fn unmatched_policy_warn_omits_node() {
    let mut doc = Document::new();
    doc.element(doc.root_id(), "div");
    doc.comment(doc.root_id(), "kept");

    let mut registry = registry();
    registry.register("self::comment()", |r| Ok(r.node().value().unwrap_or_default().to_string()));
    let options = Options { unmatched: UnmatchedPolicy::Warn, ..Options::default() };

    let res = render_verbose_with(&registry, &PathEvaluator, &doc.root(), &options).unwrap();
    assert_eq!(res.output.as_deref(), Some("kept"));
    assert_eq!(res.details.unmatched, 1);
}

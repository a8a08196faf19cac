//! End-to-end: class images on disk, a JSON mixin config, and one transform.

mod common;

use common::*;
use graft_classfile::{ClassFile, Instruction};
use graft_mixin::{CatalogError, DirClassPool, MixinCatalog, MixinEngine, INJECT_PREFIX};
use std::path::Path;

fn write_image(root: &Path, class: &ClassFile) {
    let mut path = root.to_path_buf();
    for part in class.name.split('.') {
        path.push(part);
    }
    path.set_extension("gcls");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, class.encode().unwrap()).unwrap();
}

#[test]
fn config_driven_transform_from_a_directory_pool() {
    let dir = tempfile::tempdir().unwrap();

    let mut mixin = class(
        "game.mixins.PlayerMixin",
        vec![
            method(
                "boost",
                "()V",
                "game.mixins.PlayerMixin",
                vec![probe("boost"), Instruction::Return],
            ),
            tagged(
                method(
                    "onUpdate",
                    "()V",
                    "game.mixins.PlayerMixin",
                    vec![probe("helper"), Instruction::Return],
                ),
                inject_tag("update", "HEAD"),
            ),
        ],
    );
    mixin.annotations.push(mixin_tag("game.Player"));

    write_image(dir.path(), &mixin);
    write_image(dir.path(), &probe_class(&["orig", "helper", "boost"]));

    let pool = DirClassPool::new(dir.path());
    let mut builder = MixinCatalog::builder();
    let skipped = builder
        .add_config_json(
            r#"{ "package": "game.mixins", "mixins": ["PlayerMixin", "Missing"] }"#,
            &pool,
        )
        .unwrap();
    assert_eq!(skipped.len(), 1);
    assert!(matches!(
        &skipped[0],
        CatalogError::MixinNotFound { name } if name == "game.mixins.Missing"
    ));

    let engine = MixinEngine::new(builder.build(), pool);

    let target = class(
        "game.Player",
        vec![method(
            "update",
            "()V",
            "game.Player",
            vec![probe("orig"), Instruction::Return],
        )],
    );
    let original = target.encode().unwrap();
    let outcome = engine.transform("game.Player", &original);
    assert!(outcome.is_transformed());
    assert!(outcome.diagnostics.is_empty());

    let transformed = ClassFile::parse(&outcome.bytes).unwrap();
    assert!(transformed.has_method("boost"));
    assert!(transformed.has_method(&format!("{INJECT_PREFIX}onUpdate")));

    let mut machine = Machine::new();
    machine.load(transformed);
    machine.call("game.Player", "update", vec![]);
    let helper_at = machine.effect_index("test.Probe.helper").unwrap();
    let orig_at = machine.effect_index("test.Probe.orig").unwrap();
    assert!(helper_at < orig_at);
}

//! Layering guardrails for the shared vocabulary crate.
//!
//! `symproc_core` holds names, modifiers, variance and nullability. It must never depend on the engine
//! (`symproc`), and every dependency it has must be optional so the vocabulary builds on its own.
//! These tests scan `crates/symproc_core/Cargo.toml` and fail when either rule is broken.

/// Lines of the `[dependencies]` table, with comments stripped.
fn dependency_lines(manifest: &str) -> Vec<String> {
    let mut in_dependencies = false;
    let mut lines = Vec::new();

    for raw_line in manifest.lines() {
        let line = raw_line.trim();
        // Track when we enter/exit the `[dependencies]` table.
        if line.starts_with('[') {
            if line == "[dependencies]" {
                in_dependencies = true;
                continue;
            }
            // Any new section after `[dependencies]` ends the scan window.
            if in_dependencies {
                break;
            }
        }

        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line_no_comment = line.split('#').next().unwrap_or("").trim();
        if !line_no_comment.is_empty() {
            lines.push(line_no_comment.to_string());
        }
    }
    lines
}

#[test]
fn core_does_not_depend_on_engine() {
    let manifest = include_str!("../crates/symproc_core/Cargo.toml");
    for line in dependency_lines(manifest) {
        let name = line.split('=').next().unwrap_or("").trim();
        if name == "symproc" {
            panic!("`symproc` must not appear in symproc_core's [dependencies]");
        }
    }
}

#[test]
fn core_dependencies_are_optional() {
    let manifest = include_str!("../crates/symproc_core/Cargo.toml");
    for line in dependency_lines(manifest) {
        assert!(
            line.contains("optional = true"),
            "symproc_core dependency must be optional (behind a feature): {line}"
        );
    }
}

#[test]
fn engine_enables_core_serde() {
    let manifest = include_str!("../Cargo.toml");
    let core = dependency_lines(manifest)
        .into_iter()
        .find(|line| line.starts_with("symproc_core"))
        .unwrap_or_else(|| panic!("symproc must depend on symproc_core"));
    assert!(
        core.contains("\"serde\""),
        "snapshots and manifests serialize core types; enable symproc_core's `serde` feature: {core}"
    );
}

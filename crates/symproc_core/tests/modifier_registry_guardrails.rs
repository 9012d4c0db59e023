use std::collections::HashMap;
use std::path::{Path, PathBuf};

use symproc_core::modifiers::{self, ModifierCategory, ModifierId, Visibility};

#[test]
fn modifier_spellings_unique_and_resolvable() {
    let mut seen: HashMap<&'static str, ModifierId> = HashMap::new();

    for info in modifiers::MODIFIERS {
        let item = &info.item;
        assert_eq!(
            modifiers::from_str(item.canonical),
            Some(item.id),
            "modifier canonical spelling not resolvable: {}",
            item.canonical
        );
        assert_eq!(
            modifiers::as_str(item.id),
            item.canonical,
            "modifier as_str mismatch for {:?}",
            item.id
        );

        if let Some(prev) = seen.insert(item.canonical, item.id) {
            panic!(
                "duplicate modifier spelling {:?}: {:?} and {:?}",
                item.canonical, prev, item.id
            );
        }

        for &alias in item.aliases {
            assert_eq!(
                modifiers::from_str(alias),
                Some(item.id),
                "modifier alias not resolvable: {}",
                alias
            );
            if let Some(prev) = seen.insert(alias, item.id) {
                panic!("duplicate modifier alias spelling {:?}: {:?} and {:?}", alias, prev, item.id);
            }
        }
    }
}

#[test]
fn every_visibility_modifier_maps_to_a_visibility() {
    for info in modifiers::MODIFIERS {
        if info.category != ModifierCategory::Visibility {
            continue;
        }
        let vis = modifiers::visibility_of(&[info.item.id]);
        let expected = match info.item.id {
            ModifierId::Private => Visibility::Private,
            ModifierId::Protected => Visibility::Protected,
            ModifierId::Internal => Visibility::Internal,
            _ => Visibility::Public,
        };
        assert_eq!(vis, expected, "visibility mismatch for {:?}", info.item.id);
    }
}

// -------------------------------------------------------------------------------------------------
// Drift guardrails for closed-set vocabulary (string literals).
// -------------------------------------------------------------------------------------------------

fn repo_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .and_then(|p| p.parent())
        .expect("repo root missing")
        .to_path_buf()
}

fn collect_rs_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

fn find_string_literals(paths: &[PathBuf], literals: &[&str]) -> Vec<String> {
    let mut hits: Vec<String> = Vec::new();
    for path in paths {
        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };
        for (idx, line) in content.lines().enumerate() {
            if line.trim_start().starts_with("//") {
                continue;
            }
            for &literal in literals {
                let needle = format!("\"{literal}\"");
                if line.contains(&needle) {
                    hits.push(format!("{}:{}: {}", path.display(), idx + 1, line.trim()));
                }
            }
        }
    }
    hits
}

#[test]
fn no_modifier_string_literals_in_engine_layers() {
    let root = repo_root();
    let mut files = Vec::new();
    for dir in ["src/symbols", "src/types", "src/deps"] {
        files.extend(collect_rs_files(&root.join(dir)));
    }

    let literals = ["open", "sealed", "abstract", "override", "lateinit", "companion", "reified"];
    let hits = find_string_literals(&files, &literals);
    assert!(
        hits.is_empty(),
        "modifier spellings must come from symproc_core::modifiers; found:\n{}",
        hits.join("\n")
    );
}

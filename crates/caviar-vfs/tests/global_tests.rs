//! Process-wide runtime tests.
//!
//! Kept in their own binary: the global bootstrap can be initialized once.

use caviar_bundler::BundleBuilder;
use caviar_vfs::{ContainerSource, RuntimeConfig};
use std::fs;
use std::io::Read;

#[test]
fn test_global_runtime_serves_relative_paths() {
    let src = tempfile::tempdir().unwrap();
    fs::write(src.path().join("a.txt"), "hi").unwrap();
    fs::create_dir(src.path().join("sub")).unwrap();
    fs::write(src.path().join("sub/b.txt"), "bye").unwrap();

    let bytes = BundleBuilder::new()
        .add_source(src.path())
        .assemble()
        .unwrap()
        .encode()
        .unwrap();
    let cwd = std::env::current_dir().unwrap();
    let source = ContainerSource::Bytes {
        bytes,
        default_prefix: cwd,
    };
    let rt = caviar_vfs::init_with(source, &RuntimeConfig::default()).unwrap();
    assert!(caviar_vfs::runtime().is_ok());

    let mut file = caviar_vfs::fs::open("a.txt").unwrap();
    assert!(file.is_embedded());
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    assert_eq!(text, "hi");
    drop(file);

    assert_eq!(caviar_vfs::fs::read_to_string("sub/b.txt").unwrap(), "bye");
    assert_eq!(caviar_vfs::fs::metadata("sub").unwrap().size, 0);
    assert!(caviar_vfs::fs::metadata("sub").unwrap().is_dir());
    let names: Vec<String> = caviar_vfs::fs::read_dir("sub")
        .unwrap()
        .into_iter()
        .map(|info| info.name)
        .collect();
    assert_eq!(names, vec!["b.txt".to_string()]);
    assert_eq!(rt.open_count(), 0);

    // Not bundled: served from disk.
    let manifest = caviar_vfs::fs::read_to_string("Cargo.toml").unwrap();
    assert!(manifest.contains("caviar-vfs"));
    assert!(!caviar_vfs::fs::open("Cargo.toml").unwrap().is_embedded());

    let again = caviar_vfs::init_with(
        ContainerSource::Bytes {
            bytes: Vec::new(),
            default_prefix: "/".into(),
        },
        &RuntimeConfig::default(),
    )
    .unwrap_err();
    assert!(again.is_already_initialized());
    assert!(caviar_vfs::ensure_init().is_ok());
}

//! Integration tests against bundles produced by the builder.

use caviar_bundler::BundleBuilder;
use caviar_core::Container;
use caviar_vfs::{Bootstrap, ContainerSource, DirBatch, Runtime, RuntimeConfig};
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PREFIX: &str = "/srv/assets";

fn source_tree(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, content) in files {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
    dir
}

fn container(files: &[(&str, &str)]) -> Container {
    let src = source_tree(files);
    BundleBuilder::new().add_source(src.path()).assemble().unwrap()
}

fn load<'a>(boot: &'a Bootstrap, container: &Container) -> &'a Runtime {
    let source = ContainerSource::Bytes {
        bytes: container.encode().unwrap(),
        default_prefix: PathBuf::from(PREFIX),
    };
    boot.init_with(source, &RuntimeConfig::default()).unwrap()
}

fn at(path: &str) -> PathBuf {
    Path::new(PREFIX).join(path)
}

fn read_all(rt: &Runtime, path: &str) -> Vec<u8> {
    let mut file = rt.open_file(at(path)).unwrap();
    let mut out = Vec::new();
    file.read_to_end(&mut out).unwrap();
    out
}

#[test]
fn test_every_file_reads_back_exactly() {
    let large = "0123456789abcdef".repeat(25_000);
    let files = [
        ("a.txt", "hi"),
        ("empty", ""),
        ("sub/b.txt", "bye"),
        ("sub/deeper/c.txt", large.as_str()),
        ("z/last", "tail"),
    ];
    let container = container(&files);
    let boot = Bootstrap::new();
    let rt = load(&boot, &container);

    for (path, content) in &files {
        assert_eq!(read_all(rt, path), content.as_bytes(), "{path}");
        assert_eq!(rt.stat_path(at(path)).unwrap().size, content.len() as u64);
    }
    assert_eq!(rt.open_count(), 0);
}

#[test]
fn test_payload_equals_sum_of_file_sizes() {
    let container = container(&[("a", "123"), ("b/c", "45"), ("b/d", "")]);
    let report = container.verify().unwrap();
    assert_eq!(report.files, 3);
    assert_eq!(report.bytes, 5);
    assert_eq!(container.payload.len(), 5);
}

#[test]
fn test_seek_bounds() {
    let container = container(&[("f", "0123456789")]);
    let boot = Bootstrap::new();
    let rt = load(&boot, &container);
    let fd = rt.open(at("f")).unwrap();

    assert_eq!(rt.seek(fd, SeekFrom::End(0)).unwrap(), 10);
    assert_eq!(rt.seek(fd, SeekFrom::Start(4)).unwrap(), 4);
    assert_eq!(rt.seek(fd, SeekFrom::Current(-4)).unwrap(), 0);
    assert!(rt.seek(fd, SeekFrom::Current(-1)).unwrap_err().is_invalid_operation());
    assert!(rt.seek(fd, SeekFrom::Start(11)).unwrap_err().is_invalid_operation());
    assert_eq!(rt.seek(fd, SeekFrom::Current(0)).unwrap(), 0);

    let mut buf = [0u8; 4];
    assert_eq!(rt.read_at(fd, &mut buf, 6).unwrap(), 4);
    assert_eq!(&buf, b"6789");
    assert_eq!(rt.seek(fd, SeekFrom::Current(0)).unwrap(), 0);
    rt.close(fd).unwrap();
}

#[test]
fn test_handles_are_independent_across_threads() {
    let content = "abcdefghijklmnop".repeat(4096);
    let container = container(&[("data.bin", content.as_str())]);
    let boot = Bootstrap::new();
    let rt = load(&boot, &container);

    std::thread::scope(|s| {
        for start in [0u64, 1000, 30_000, 65_000] {
            let expected = content.as_bytes();
            s.spawn(move || {
                let mut file = rt.open_file(at("data.bin")).unwrap();
                file.seek(SeekFrom::Start(start)).unwrap();
                let mut out = Vec::new();
                file.read_to_end(&mut out).unwrap();
                assert_eq!(out, expected[usize::try_from(start).unwrap()..]);
            });
        }
    });
    assert_eq!(rt.open_count(), 0);
}

#[test]
fn test_directory_listing_and_walk() {
    let container = container(&[("a.txt", "hi"), ("sub/b.txt", "bye"), ("sub/c.txt", "!")]);
    let boot = Bootstrap::new();
    let rt = load(&boot, &container);

    let fd = rt.open(at("sub")).unwrap();
    let DirBatch::Entries(first) = rt.readdirnames(fd, 1).unwrap() else {
        panic!("expected one entry");
    };
    assert_eq!(first, vec!["b.txt".to_string()]);
    assert_eq!(rt.readdirnames(fd, 5).unwrap().into_vec(), vec!["c.txt".to_string()]);
    assert!(rt.readdirnames(fd, 5).unwrap().is_end());
    rt.close(fd).unwrap();

    let walked: Vec<PathBuf> = rt.walk(PREFIX).unwrap().into_iter().map(|e| e.path).collect();
    assert_eq!(
        walked,
        vec![
            PathBuf::from(PREFIX),
            at("a.txt"),
            at("sub"),
            at("sub/b.txt"),
            at("sub/c.txt"),
        ]
    );
}

#[test]
fn test_corrupted_bundle_never_becomes_ready() {
    let mut container = container(&[("a.txt", "hi"), ("b.txt", "bye")]);
    container.payload[3] ^= 0xff;

    let boot = Bootstrap::new();
    let source = ContainerSource::Bytes {
        bytes: container.encode().unwrap(),
        default_prefix: PathBuf::from(PREFIX),
    };
    let err = boot.init_with(source, &RuntimeConfig::default()).unwrap_err();
    assert!(err.is_integrity_error());
    assert!(boot.runtime().unwrap_err().is_not_ready());
    assert!(boot.ensure_init().unwrap_err().is_not_ready());
}

#[test]
fn test_truncated_payload_is_aggregate_failure() {
    let mut container = container(&[("a.txt", "hi")]);
    container.payload.push(0);

    let boot = Bootstrap::new();
    let source = ContainerSource::Bytes {
        bytes: container.encode().unwrap(),
        default_prefix: PathBuf::from(PREFIX),
    };
    let err = boot.init_with(source, &RuntimeConfig::default()).unwrap_err();
    assert!(err.is_aggregate_integrity_error());
}

#[test]
fn test_writes_rejected_on_bundled_files() {
    let container = container(&[("a.txt", "hi")]);
    let boot = Bootstrap::new();
    let rt = load(&boot, &container);
    let fd = rt.open(at("a.txt")).unwrap();

    assert!(rt.write(fd, b"x").unwrap_err().is_invalid_operation());
    assert!(rt.truncate(fd, 0).unwrap_err().is_invalid_operation());
    assert_eq!(read_all(rt, "a.txt"), b"hi");
    rt.close(fd).unwrap();
}

#[test]
fn test_paths_outside_prefix_not_found() {
    let container = container(&[("a.txt", "hi"), ("sub/b.txt", "bye")]);
    let boot = Bootstrap::new();
    let rt = load(&boot, &container);

    assert!(rt.open("/etc/passwd").unwrap_err().is_not_found());
    assert!(rt.open(at("../a.txt")).unwrap_err().is_not_found());
    assert!(rt.open(at("sub/../a.txt")).is_ok_and(|fd| rt.close(fd).is_ok()));
    assert!(rt.open(at("missing/../a.txt")).unwrap_err().is_not_found());
}

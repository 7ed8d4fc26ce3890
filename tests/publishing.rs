mod common;

use common::{hidden_entries, open_repository, write_package};
use modrepo_core::{RepoError, VersionIndex, repositories::archive::ArchiveWriter};
use std::fs;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(600);

#[tokio::test]
async fn test_reindexing_unchanged_tree_is_noop() {
    let base = tempfile::tempdir().unwrap();
    let repository = open_repository(&base.path().join("repo"), TTL).await;
    for (name, version) in [("demo", "1.0.0"), ("demo", "1.1.0"), ("util", "0.2.0")] {
        let dir = write_package(
            &base.path().join("src").join(name).join(version),
            name,
            version,
            &[("lib/a.txt", version), ("README.md", "notes")],
        );
        repository.install_from_directory(&dir).await.unwrap();
    }
    let dest = base.path().join("published");

    let first = repository.index_all(&dest, None).await.unwrap();
    let index_before = fs::read(dest.join("demo/versions.json")).unwrap();
    let archive_before = fs::read(dest.join("demo/1.0.0.tar.gz")).unwrap();

    let second = repository.index_all(&dest, None).await.unwrap();

    assert_eq!(first.rebuilt.len(), 3);
    assert!(second.is_noop());
    assert_eq!(second.unchanged, 3);
    assert_eq!(fs::read(dest.join("demo/versions.json")).unwrap(), index_before);
    assert_eq!(fs::read(dest.join("demo/1.0.0.tar.gz")).unwrap(), archive_before);

    let modules: Vec<String> = serde_json::from_slice(&fs::read(dest.join("modules.json")).unwrap()).unwrap();
    assert_eq!(modules, vec!["demo", "util"]);
    assert_eq!(fs::read_to_string(dest.join("demo/1.1.0.md")).unwrap(), "notes");
    assert!(fs::read_to_string(dest.join(".gitignore")).unwrap().contains("*.tar.gz"));
}

#[tokio::test]
async fn test_changed_version_is_rebuilt() {
    let base = tempfile::tempdir().unwrap();
    let repository = open_repository(&base.path().join("repo"), TTL).await;
    let src = base.path().join("src");
    let dest = base.path().join("published");

    repository
        .install_from_directory(&write_package(&src, "demo", "1.0.0", &[("a.txt", "one")]))
        .await
        .unwrap();
    repository.index_all(&dest, None).await.unwrap();
    let before: VersionIndex =
        serde_json::from_slice(&fs::read(dest.join("demo/versions.json")).unwrap()).unwrap();

    fs::write(src.join("a.txt"), "two").unwrap();
    repository.install_from_directory(&src).await.unwrap();
    let report = repository.index_all(&dest, None).await.unwrap();
    let after: VersionIndex =
        serde_json::from_slice(&fs::read(dest.join("demo/versions.json")).unwrap()).unwrap();

    assert_eq!(report.rebuilt, vec!["demo@1.0.0"]);
    assert_ne!(before["1.0.0"].sha256, after["1.0.0"].sha256);
    assert_eq!(before["1.0.0"].size, after["1.0.0"].size);
}

#[tokio::test]
async fn test_readme_change_does_not_rebuild() {
    let base = tempfile::tempdir().unwrap();
    let repository = open_repository(&base.path().join("repo"), TTL).await;
    let src = base.path().join("src");
    let dest = base.path().join("published");

    write_package(&src, "demo", "1.0.0", &[("a.txt", "one"), ("README.md", "v1")]);
    repository.install_from_directory(&src).await.unwrap();
    repository.index_all(&dest, None).await.unwrap();

    fs::write(src.join("README.md"), "v1, clarified").unwrap();
    repository.install_from_directory(&src).await.unwrap();
    let report = repository.index_all(&dest, None).await.unwrap();

    assert!(report.is_noop());
    assert_eq!(fs::read_to_string(dest.join("demo/1.0.0.md")).unwrap(), "v1, clarified");
}

#[tokio::test]
async fn test_only_modules_filter() {
    let base = tempfile::tempdir().unwrap();
    let repository = open_repository(&base.path().join("repo"), TTL).await;
    for name in ["demo", "util"] {
        let dir = write_package(&base.path().join("src").join(name), name, "1.0.0", &[]);
        repository.install_from_directory(&dir).await.unwrap();
    }
    let dest = base.path().join("published");

    let report = repository.index_all(&dest, Some(&["util"][..])).await.unwrap();

    assert_eq!(report.rebuilt, vec!["util@1.0.0"]);
    assert!(!dest.join("demo").exists());
    assert!(dest.join("util/1.0.0.tar.gz").is_file());
}

#[tokio::test]
async fn test_archives_are_deterministic() {
    let base = tempfile::tempdir().unwrap();
    let files_a = [("z.txt", "z"), ("a/b.txt", "b"), ("m.txt", "m")];
    let files_b = [("m.txt", "m"), ("a/b.txt", "b"), ("z.txt", "z")];

    let mut archives = Vec::new();
    for (label, files) in [("a", &files_a), ("b", &files_b)] {
        let repository = open_repository(&base.path().join(label).join("repo"), TTL).await;
        let dir = write_package(&base.path().join(label).join("src"), "demo", "1.0.0", files);
        let package = repository.install_from_directory(&dir).await.unwrap();
        let archive = repository.archive_package(&package).await.unwrap().unwrap();
        archives.push(fs::read(archive).unwrap());
    }

    assert_eq!(archives[0], archives[1]);
}

#[tokio::test]
async fn test_existing_archive_is_reused() {
    let base = tempfile::tempdir().unwrap();
    let repository = open_repository(&base.path().join("repo"), TTL).await;
    let dir = write_package(&base.path().join("src"), "demo", "1.0.0", &[("a.txt", "a")]);
    let package = repository.install_from_directory(&dir).await.unwrap();

    let archive = repository.archive_package(&package).await.unwrap().unwrap();
    fs::write(&archive, b"sentinel").unwrap();
    let again = repository.archive_package(&package).await.unwrap().unwrap();

    assert_eq!(archive, again);
    assert_eq!(fs::read(again).unwrap(), b"sentinel");
}

#[tokio::test]
async fn test_archive_round_trips_through_install() {
    let base = tempfile::tempdir().unwrap();
    let origin = open_repository(&base.path().join("origin"), TTL).await;
    let dir = write_package(
        &base.path().join("src"),
        "demo",
        "2.0.0",
        &[("lib/a.txt", "a"), ("README.md", "docs")],
    );
    let package = origin.install_from_directory(&dir).await.unwrap();
    let archive = origin.archive_package(&package).await.unwrap().unwrap();

    let target = open_repository(&base.path().join("target"), TTL).await;
    let installed = target.install_from_archive(&archive).await.unwrap();

    let version_dir = target.paths().version_dir("demo", "2.0.0");
    assert_eq!(installed, package);
    assert_eq!(fs::read_to_string(version_dir.join("lib/a.txt")).unwrap(), "a");
    assert!(!version_dir.join("README.md").exists());
}

#[tokio::test]
async fn test_archive_without_manifest_installs_nothing() {
    let base = tempfile::tempdir().unwrap();
    let content = base.path().join("a.txt");
    fs::write(&content, "a").unwrap();
    let archive = base.path().join("bad.tar.gz");
    let mut writer = ArchiveWriter::create(&archive, 6).unwrap();
    writer.add_file(&content, "lib/a.txt").unwrap();
    writer.finish().unwrap();

    let repository = open_repository(&base.path().join("repo"), TTL).await;
    let result = repository.install_from_archive(&archive).await;

    assert!(matches!(result, Err(RepoError::ManifestMissing(_))));
    assert!(repository.modules().await.unwrap().is_empty());
    assert!(hidden_entries(repository.root()).is_empty());
}

#[tokio::test]
async fn test_directory_without_manifest_is_rejected() {
    let base = tempfile::tempdir().unwrap();
    let repository = open_repository(&base.path().join("repo"), TTL).await;
    let src = base.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("a.txt"), "a").unwrap();

    assert!(matches!(
        repository.install_from_directory(&src).await,
        Err(RepoError::ManifestMissing(_))
    ));
}

#[tokio::test]
async fn test_reinstall_replaces_whole_tree() {
    let base = tempfile::tempdir().unwrap();
    let repository = open_repository(&base.path().join("repo"), TTL).await;
    let src = base.path().join("src");

    write_package(&src, "demo", "1.0.0", &[("old.txt", "old")]);
    repository.install_from_directory(&src).await.unwrap();
    fs::remove_file(src.join("old.txt")).unwrap();
    fs::write(src.join("new.txt"), "new").unwrap();
    repository.install_from_directory(&src).await.unwrap();

    let version_dir = repository.paths().version_dir("demo", "1.0.0");
    assert!(!version_dir.join("old.txt").exists());
    assert!(version_dir.join("new.txt").exists());
    assert!(hidden_entries(&repository.paths().module_dir("demo")).is_empty());
}

#[tokio::test]
async fn test_copy_to_replaces_vendor_copy() {
    let base = tempfile::tempdir().unwrap();
    let repository = open_repository(&base.path().join("repo"), TTL).await;
    let dir = write_package(&base.path().join("src"), "demo", "1.0.0", &[("a.txt", "a")]);
    let package = repository.install_from_directory(&dir).await.unwrap();

    let vendor = base.path().join("vendor");
    fs::create_dir_all(vendor.join("demo")).unwrap();
    fs::write(vendor.join("demo/stale.txt"), "stale").unwrap();

    let target = repository.copy_to(&package, &vendor).await.unwrap();

    assert_eq!(target, vendor.join("demo"));
    assert!(target.join("a.txt").is_file());
    assert!(target.join("package.toml").is_file());
    assert!(!target.join("stale.txt").exists());
    assert!(hidden_entries(&vendor).is_empty());
}

#[tokio::test]
async fn test_remove_package() {
    let base = tempfile::tempdir().unwrap();
    let repository = open_repository(&base.path().join("repo"), TTL).await;
    let dir = write_package(&base.path().join("src"), "demo", "1.0.0", &[]);
    repository.install_from_directory(&dir).await.unwrap();

    assert!(repository.remove_package("demo", "1.0.0").await.unwrap());
    assert!(!repository.remove_package("demo", "1.0.0").await.unwrap());
    assert!(repository.get_package("demo", "1.0.0").await.unwrap().is_none());

    let package = repository.find_package("demo", "*", None).await.unwrap();
    assert!(package.is_none());
}

use driftpatch::{
    apply_diffs_to_dir, apply_to_dir, parse_diff, ApplyOptions, FileDiff, HunkOutcome, PatchError,
    SkipReason,
};
use indoc::indoc;
use std::fs;
use tempfile::tempdir;

fn one_diff(text: &str) -> FileDiff {
    parse_diff(text).unwrap().remove(0)
}

const GREETING_DIFF: &str = indoc! {"
    ```diff
    --- a/hello.txt
    +++ b/hello.txt
    @@ -1,2 +1,2 @@
     // greeting
    -Hello, world!
    +Hello, driftpatch!
    ```
"};

#[test]
fn test_apply_to_dir_writes_file() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("hello.txt");
    fs::write(&file_path, "// greeting\nHello, world!\n").unwrap();

    let result = apply_to_dir(&one_diff(GREETING_DIFF), dir.path(), &ApplyOptions::default())
        .unwrap();
    assert!(result.report.all_applied());
    assert!(result.diff.is_none());
    assert_eq!(
        fs::read_to_string(&file_path).unwrap(),
        "// greeting\nHello, driftpatch!\n"
    );
}

#[test]
fn test_dry_run_leaves_file_untouched() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("hello.txt");
    let original = "// greeting\nHello, world!\n";
    fs::write(&file_path, original).unwrap();

    let options = ApplyOptions::builder().dry_run(true).build();
    let result = apply_to_dir(&one_diff(GREETING_DIFF), dir.path(), &options).unwrap();

    assert!(result.report.all_applied());
    assert_eq!(result.report.text, "// greeting\nHello, driftpatch!\n");
    let preview = result.diff.expect("dry run should produce a diff");
    assert!(preview.contains("-Hello, world!"));
    assert!(preview.contains("+Hello, driftpatch!"));
    assert_eq!(fs::read_to_string(&file_path).unwrap(), original);
}

#[test]
fn test_creation_in_new_subdirectory() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    let diff = one_diff(indoc! {"
        --- /dev/null
        +++ b/src/new/mod.rs
        @@ -0,0 +1,2 @@
        +pub fn hi() {}
        +pub fn bye() {}
    "});

    let result = apply_to_dir(&diff, dir.path(), &ApplyOptions::default()).unwrap();
    assert!(result.report.all_applied());
    assert_eq!(
        fs::read_to_string(dir.path().join("src/new/mod.rs")).unwrap(),
        "pub fn hi() {}\npub fn bye() {}\n"
    );
}

#[test]
fn test_missing_target_is_a_hard_error() {
    let dir = tempdir().unwrap();
    let err = apply_to_dir(&one_diff(GREETING_DIFF), dir.path(), &ApplyOptions::default())
        .unwrap_err();
    assert!(matches!(err, PatchError::TargetNotFound(_)));
}

#[test]
fn test_path_traversal_is_rejected() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("project");
    fs::create_dir(&base).unwrap();
    let diff = one_diff(indoc! {"
        --- /dev/null
        +++ b/../evil.txt
        @@ -0,0 +1 @@
        +gotcha
    "});

    let err = apply_to_dir(&diff, &base, &ApplyOptions::default()).unwrap_err();
    assert!(matches!(err, PatchError::PathTraversal(_)));
    assert!(!dir.path().join("evil.txt").exists());
}

#[test]
fn test_directory_target_is_rejected() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("subdir")).unwrap();
    let diff = one_diff("--- a/subdir\n+++ b/subdir\n@@ -1 +1 @@\n-a\n+b\n");

    let err = apply_to_dir(&diff, dir.path(), &ApplyOptions::default()).unwrap_err();
    assert!(matches!(err, PatchError::TargetIsDirectory { .. }));
}

#[test]
fn test_deletion_removes_file() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("old.txt");
    fs::write(&file_path, "a\nb\n").unwrap();
    let diff = one_diff("--- a/old.txt\n+++ /dev/null\n@@ -1,2 +0,0 @@\n-a\n-b\n");

    let result = apply_to_dir(&diff, dir.path(), &ApplyOptions::default()).unwrap();
    assert!(result.report.all_applied());
    assert!(!file_path.exists());
}

const TWO_HUNK_DIFF: &str = indoc! {"
    --- a/config.ini
    +++ b/config.ini
    @@ -1,3 +1,3 @@
     [server]
    -port = 80
    +port = 8080
     host = localhost
    @@ -10,3 +10,3 @@
     [cache]
    -ttl = 60
    +ttl = 600
     size = 128
"};

const CONFIG_WITHOUT_CACHE: &str = "[server]\nport = 80\nhost = localhost\n\n[logging]\nlevel = info\n";

#[test]
fn test_partial_application_is_written() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("config.ini");
    fs::write(&file_path, CONFIG_WITHOUT_CACHE).unwrap();

    let result = apply_to_dir(&one_diff(TWO_HUNK_DIFF), dir.path(), &ApplyOptions::default())
        .unwrap();
    assert!(!result.report.all_applied());
    assert_eq!(result.report.counts.applied, 1);
    assert_eq!(result.report.counts.failed, 1);
    assert_eq!(
        fs::read_to_string(&file_path).unwrap(),
        "[server]\nport = 8080\nhost = localhost\n\n[logging]\nlevel = info\n"
    );
}

#[test]
fn test_strict_failure_leaves_file_untouched() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("config.ini");
    fs::write(&file_path, CONFIG_WITHOUT_CACHE).unwrap();

    let options = ApplyOptions::builder().strict(true).build();
    let result = apply_to_dir(&one_diff(TWO_HUNK_DIFF), dir.path(), &options).unwrap();

    assert!(result.report.aborted);
    assert_eq!(
        result.report.outcomes[0],
        HunkOutcome::Skipped(SkipReason::RolledBack)
    );
    assert!(result.report.outcomes[1].is_failed());
    assert_eq!(fs::read_to_string(&file_path).unwrap(), CONFIG_WITHOUT_CACHE);
}

#[test]
fn test_apply_diffs_to_dir_keeps_going_after_hard_error() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("hello.txt"), "// greeting\nHello, world!\n").unwrap();
    fs::write(dir.path().join("b.txt"), "one\ntwo\n").unwrap();

    let diffs = parse_diff(indoc! {"
        --- a/missing.txt
        +++ b/missing.txt
        @@ -1 +1 @@
        -x
        +y
        --- a/hello.txt
        +++ b/hello.txt
        @@ -1,2 +1,2 @@
         // greeting
        -Hello, world!
        +Hello, driftpatch!
        --- a/b.txt
        +++ b/b.txt
        @@ -1,2 +1,2 @@
         one
        -two
        +TWO
    "})
    .unwrap();

    let batch = apply_diffs_to_dir(&diffs, dir.path(), &ApplyOptions::default(), 2);
    let paths: Vec<_> = batch
        .results
        .iter()
        .map(|(p, _)| p.to_str().unwrap().to_string())
        .collect();
    assert_eq!(paths, vec!["missing.txt", "hello.txt", "b.txt"]);

    assert!(!batch.all_succeeded());
    assert!(!batch.all_applied());
    let hard = batch.hard_failures();
    assert_eq!(hard.len(), 1);
    assert!(matches!(hard[0].1, PatchError::TargetNotFound(_)));

    assert_eq!(
        fs::read_to_string(dir.path().join("hello.txt")).unwrap(),
        "// greeting\nHello, driftpatch!\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("b.txt")).unwrap(),
        "one\nTWO\n"
    );
}

#[test]
fn test_dry_run_creation_does_not_create_directories() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempdir().unwrap();
    let diff = one_diff(indoc! {"
        --- /dev/null
        +++ b/src/new/mod.rs
        @@ -0,0 +1 @@
        +pub fn hi() {}
    "});

    let options = ApplyOptions::builder().dry_run(true).build();
    let result = apply_to_dir(&diff, dir.path(), &options).unwrap();

    assert!(result.report.all_applied());
    let preview = result.diff.expect("dry run should produce a diff");
    assert!(preview.contains("+pub fn hi() {}"));
    assert!(!dir.path().join("src").exists());
}

#[test]
fn test_dry_run_still_rejects_traversal_through_missing_directories() {
    let dir = tempdir().unwrap();
    let base = dir.path().join("project");
    fs::create_dir(&base).unwrap();
    let diff = one_diff(indoc! {"
        --- /dev/null
        +++ b/missing/../../evil.txt
        @@ -0,0 +1 @@
        +gotcha
    "});

    let options = ApplyOptions::builder().dry_run(true).build();
    let err = apply_to_dir(&diff, &base, &options).unwrap_err();
    assert!(matches!(err, PatchError::PathTraversal(_)));
    assert!(!base.join("missing").exists());
}

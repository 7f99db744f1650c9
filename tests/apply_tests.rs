use driftpatch::{
    apply_all, apply_candidates, apply_file_diff, apply_with_locator, parse_diff, ApplierState,
    ApplyOptions, FailureReason, FileDiff, Hunk, HunkApplier, HunkLocator, HunkOutcome,
    LineEnding, LocateError, Locator, MatchCandidate, MatchTier, SearchBudget, SkipReason,
    Strategy,
};
use indoc::indoc;

fn file_diff(text: &str) -> FileDiff {
    parse_diff(text).unwrap().remove(0)
}

fn numbered(count: usize) -> String {
    (0..count).map(|i| format!("line {}\n", i)).collect()
}

fn two_hunk_diff() -> FileDiff {
    file_diff(indoc! {"
        --- a/numbers.txt
        +++ b/numbers.txt
        @@ -2,2 +2,5 @@
         line 1
        +new a
        +new b
        +new c
         line 2
        @@ -11,3 +14,3 @@
         line 10
        -line 11
        +LINE 11
         line 12
    "})
}

#[test]
fn test_exact_replacement_scenario() {
    let _ = env_logger::builder().is_test(true).try_init();
    let original = "def f():\n    return 1\n\ndef g():\n    return 2\n";
    let diff = file_diff("--- a/m.py\n+++ b/m.py\n@@ -2 +2 @@\n-    return 1\n+    return 10\n");

    let result = apply_file_diff(&diff, original, &ApplyOptions::default());
    assert_eq!(result.text, "def f():\n    return 10\n\ndef g():\n    return 2\n");
    assert!(result.all_applied());
    let HunkOutcome::Applied(m) = &result.outcomes[0] else {
        panic!("expected the hunk to apply: {:?}", result.outcomes[0]);
    };
    assert_eq!(m.start_line, 1);
    assert_eq!(m.score, 1.0);
    assert_eq!(m.tier, MatchTier::FullBlock);
}

#[test]
fn test_wrong_line_number_scenario() {
    let _ = env_logger::builder().is_test(true).try_init();
    let original = "def f():\n    return 1\n\ndef g():\n    return 2\n";
    let diff = file_diff("--- a/m.py\n+++ b/m.py\n@@ -51 +51 @@\n-    return 2\n+    return 20\n");

    let result = apply_file_diff(&diff, original, &ApplyOptions::default());
    assert_eq!(result.text, "def f():\n    return 1\n\ndef g():\n    return 20\n");
    let HunkOutcome::Applied(m) = &result.outcomes[0] else {
        panic!("expected the hunk to apply: {:?}", result.outcomes[0]);
    };
    assert_eq!(m.start_line, 4);
    assert!(!m.degraded);
}

#[test]
fn test_offset_from_earlier_hunk_shifts_later_hint() {
    let _ = env_logger::builder().is_test(true).try_init();
    let diff = two_hunk_diff();
    let original = numbered(20);
    let options = ApplyOptions::default();
    let locator = Locator::for_options(&options);

    let mut applier = HunkApplier::new(&diff, &original, &locator, &options);
    assert_eq!(applier.state(), ApplierState::Pending);

    assert!(matches!(applier.next(), Some(HunkOutcome::Applied(_))));
    assert_eq!(applier.offset(), 3);
    assert_eq!(applier.state(), ApplierState::Applying(0));

    // Header says old line 11 (index 10); three lines were inserted above it.
    let Some(HunkOutcome::Applied(m)) = applier.next() else {
        panic!("second hunk should apply");
    };
    assert_eq!(m.start_line, diff.hunks[1].origin_old_start + 3);
    assert!(!m.widened);

    assert!(applier.next().is_none());
    assert_eq!(applier.state(), ApplierState::Done);
    assert_eq!(applier.applied_spans().len(), 2);
    assert_eq!(applier.current_lines()[14], "LINE 11");
}

#[test]
fn test_reapplying_a_diff_never_double_applies() {
    let _ = env_logger::builder().is_test(true).try_init();
    let diff = two_hunk_diff();
    let options = ApplyOptions::default();

    let first = apply_file_diff(&diff, &numbered(20), &options);
    assert!(first.all_applied());
    assert_eq!(first.counts.applied, 2);

    let second = apply_file_diff(&diff, &first.text, &options);
    assert_eq!(second.counts.failed, 2);
    assert!(second.outcomes.iter().all(HunkOutcome::is_failed));
    assert_eq!(second.text, first.text);
}

#[test]
fn test_reapplying_single_line_edit_reports_no_match() {
    let diff = file_diff("--- a/m.py\n+++ b/m.py\n@@ -2 +2 @@\n-    return 1\n+    return 10\n");
    let patched = "def f():\n    return 10\n\ndef g():\n    return 2\n";

    let result = apply_file_diff(&diff, patched, &ApplyOptions::default());
    assert!(matches!(
        result.outcomes[0],
        HunkOutcome::Failed(FailureReason::NoConfidentMatch { .. })
    ));
    assert_eq!(result.text, patched);
}

#[test]
fn test_drifted_multi_hunk_diff_applies() {
    let _ = env_logger::builder().is_test(true).try_init();
    // Ten lines were added to the top of the file after the diff was written.
    let mut original = String::from("// license\n// header\n");
    for i in 0..8 {
        original.push_str(&format!("use crate::m{};\n", i));
    }
    original.push_str(&numbered(20));

    let result = apply_file_diff(&two_hunk_diff(), &original, &ApplyOptions::default());
    assert!(result.all_applied());
    assert!(result.text.contains("line 1\nnew a\nnew b\nnew c\nline 2\n"));
    assert!(result.text.contains("line 10\nLINE 11\nline 12\n"));
}

#[test]
fn test_partial_application_keeps_going() {
    let _ = env_logger::builder().is_test(true).try_init();
    let diff = file_diff(indoc! {"
        --- a/f.txt
        +++ b/f.txt
        @@ -1,3 +1,3 @@
         line 0
        -line 1
        +line one
         line 2
        @@ -5,3 +5,3 @@
         alpha
        -beta
        +gamma
         delta
        @@ -8,3 +8,3 @@
         line 7
        -line 8
        +line eight
         line 9
    "});

    let result = apply_file_diff(&diff, &numbered(10), &ApplyOptions::default());
    assert!(!result.all_applied());
    assert_eq!(result.counts.applied, 2);
    assert_eq!(result.counts.failed, 1);

    let failures = result.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].hunk_index, 2);
    assert!(result.text.contains("line one\n"));
    assert!(result.text.contains("line eight\n"));
}

#[test]
fn test_strict_mode_rolls_back_the_file() {
    let _ = env_logger::builder().is_test(true).try_init();
    let diff = file_diff(indoc! {"
        --- a/f.txt
        +++ b/f.txt
        @@ -1,3 +1,3 @@
         line 0
        -line 1
        +line one
         line 2
        @@ -5,3 +5,3 @@
         alpha
        -beta
        +gamma
         delta
        @@ -8,3 +8,3 @@
         line 7
        -line 8
        +line eight
         line 9
    "});
    let original = numbered(10);
    let options = ApplyOptions::builder().strict(true).build();

    let result = apply_file_diff(&diff, &original, &options);
    assert!(result.aborted);
    assert!(!result.all_applied());
    assert_eq!(result.text, original);
    assert!(!result.is_changed());
    assert_eq!(result.outcomes.len(), 3);
    assert_eq!(result.outcomes[0], HunkOutcome::Skipped(SkipReason::RolledBack));
    assert!(matches!(
        result.outcomes[1],
        HunkOutcome::Failed(FailureReason::NoConfidentMatch { .. })
    ));
    assert_eq!(result.outcomes[2], HunkOutcome::Skipped(SkipReason::StrictAbort));
}

#[test]
fn test_overlapping_hunk_is_rejected() {
    let _ = env_logger::builder().is_test(true).try_init();
    let diff = file_diff(indoc! {"
        --- a/f.txt
        +++ b/f.txt
        @@ -1,3 +1,3 @@
         a
        -b
        +B
         c
        @@ -2 +2 @@
        -B
        +X
    "});

    let result = apply_file_diff(&diff, "a\nb\nc\nd\ne\n", &ApplyOptions::default());
    assert!(matches!(result.outcomes[0], HunkOutcome::Applied(_)));
    assert_eq!(
        result.outcomes[1],
        HunkOutcome::Failed(FailureReason::Overlap {
            start_line: 1,
            end_line: 2
        })
    );
    assert_eq!(result.text, "a\nB\nc\nd\ne\n");
    assert_eq!(
        result.failures()[0].reason.to_string(),
        "overlaps prior edit at lines 2-2"
    );
}

#[test]
fn test_exhausted_budget_fails_remaining_hunks() {
    let diff = two_hunk_diff();
    let options = ApplyOptions::builder().max_comparisons(0).build();

    let result = apply_file_diff(&diff, &numbered(20), &options);
    assert_eq!(
        result.outcomes,
        vec![
            HunkOutcome::Failed(FailureReason::BudgetExceeded),
            HunkOutcome::Failed(FailureReason::BudgetExceeded),
        ]
    );
    assert_eq!(result.text, numbered(20));
}

#[test]
fn test_context_only_hunk_is_skipped() {
    let diff = file_diff("--- a/f\n+++ b/f\n@@ -1,2 +1,2 @@\n a\n b\n@@ -3 +3 @@\n-c\n+C\n");

    let result = apply_file_diff(&diff, "a\nb\nc\n", &ApplyOptions::default());
    assert_eq!(result.outcomes[0], HunkOutcome::Skipped(SkipReason::NoChanges));
    assert_eq!(result.counts.skipped, 1);
    assert_eq!(result.counts.applied, 1);
    assert!(result.all_applied());
    assert_eq!(result.text, "a\nb\nC\n");
}

#[test]
fn test_strict_strategy_uses_line_numbers_only() {
    let options = ApplyOptions::builder().strategy(Strategy::Strict).build();
    let original = "a\nb\nc\n";

    let right = file_diff("--- a/f\n+++ b/f\n@@ -2 +2 @@\n-b\n+B\n");
    let result = apply_file_diff(&right, original, &options);
    assert_eq!(result.text, "a\nB\nc\n");
    let HunkOutcome::Applied(m) = &result.outcomes[0] else {
        panic!("expected the hunk to apply");
    };
    assert_eq!(m.tier, MatchTier::LineNumber);

    let wrong = file_diff("--- a/f\n+++ b/f\n@@ -3 +3 @@\n-b\n+B\n");
    let result = apply_file_diff(&wrong, original, &options);
    assert!(result.outcomes[0].is_failed());
    assert_eq!(result.text, original);
}

#[test]
fn test_crlf_line_endings_are_preserved() {
    let diff = file_diff("--- a/f\n+++ b/f\n@@ -2 +2 @@\n-b\n+B\n");

    let result = apply_file_diff(&diff, "a\r\nb\r\nc\r\n", &ApplyOptions::default());
    assert_eq!(result.text, "a\r\nB\r\nc\r\n");
    assert_eq!(result.line_ending, LineEnding::CrLf);
}

#[test]
fn test_missing_trailing_newline_is_tracked() {
    let options = ApplyOptions::default();

    let keep_missing = file_diff("--- a/f\n+++ b/f\n@@ -2 +2 @@\n-b\n+B\n");
    assert_eq!(apply_file_diff(&keep_missing, "a\nb", &options).text, "a\nB");

    let add_newline = file_diff(indoc! {"
        --- a/f
        +++ b/f
        @@ -2 +2 @@
        -b
        \\ No newline at end of file
        +B
    "});
    assert_eq!(apply_file_diff(&add_newline, "a\nb", &options).text, "a\nB\n");

    let drop_newline = file_diff(indoc! {"
        --- a/f
        +++ b/f
        @@ -2 +2 @@
        -b
        +B
        \\ No newline at end of file
    "});
    assert_eq!(apply_file_diff(&drop_newline, "a\nb\n", &options).text, "a\nB");
}

#[test]
fn test_creation_and_deletion_in_memory() {
    let options = ApplyOptions::default();

    let creation = file_diff("--- /dev/null\n+++ b/new.txt\n@@ -0,0 +1,2 @@\n+a\n+b\n");
    let result = apply_file_diff(&creation, "", &options);
    assert!(result.all_applied());
    assert_eq!(result.text, "a\nb\n");

    let deletion = file_diff("--- a/old.txt\n+++ /dev/null\n@@ -1,2 +0,0 @@\n-a\n-b\n");
    let result = apply_file_diff(&deletion, "a\nb\n", &options);
    assert!(result.all_applied());
    assert_eq!(result.text, "");
}

#[test]
fn test_from_texts_diff_applies_back() {
    let old = numbered(30);
    let new = old
        .replace("line 3\n", "line three\n")
        .replace("line 20\n", "line 20\ninserted\n");
    let diff = FileDiff::from_texts("numbers.txt", &old, &new, 3).unwrap();
    assert_eq!(diff.hunks.len(), 2);

    let result = apply_file_diff(&diff, &old, &ApplyOptions::default());
    assert!(result.all_applied());
    assert_eq!(result.text, new);

    let unchanged = FileDiff::from_texts("numbers.txt", &old, &old, 3).unwrap();
    assert!(unchanged.hunks.is_empty());
}

#[test]
fn test_result_renders_unified_diff() {
    let diff = file_diff("--- a/f\n+++ b/f\n@@ -2 +2 @@\n-b\n+B\n");
    let options = ApplyOptions::default();

    let result = apply_file_diff(&diff, "a\nb\nc\n", &options);
    let rendered = result.unified_diff().unwrap();
    assert!(rendered.contains("-b\n"));
    assert!(rendered.contains("+B\n"));

    let untouched = apply_file_diff(&diff, "x\ny\n", &options);
    assert_eq!(untouched.unified_diff(), None);
}

#[test]
fn test_result_serializes_to_json() {
    let diff = file_diff("--- a/f\n+++ b/f\n@@ -2 +2 @@\n-b\n+B\n@@ -9 +9 @@\n-zzz\n+ZZZ\n");
    let result = apply_file_diff(&diff, "a\nb\nc\n", &ApplyOptions::default());

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["path"], "f");
    assert_eq!(value["counts"]["applied"], 1);
    assert_eq!(value["counts"]["failed"], 1);
    assert_eq!(value["outcomes"][0]["status"], "applied");
    assert_eq!(value["outcomes"][0]["detail"]["tier"], "full_block");
    assert_eq!(value["outcomes"][1]["status"], "failed");
    assert_eq!(value["outcomes"][1]["detail"]["kind"], "no_confident_match");
    assert_eq!(value["line_ending"], "lf");
    assert!(value.get("text").is_none());
}

/// Places every hunk at the start of the buffer, whatever it contains.
struct AlwaysTop;

impl HunkLocator for AlwaysTop {
    fn locate(
        &self,
        hunk: &Hunk,
        buffer: &[String],
        _hint_line: usize,
        _budget: &mut SearchBudget,
    ) -> Result<MatchCandidate, LocateError> {
        let length = hunk.before_block().len();
        if length > buffer.len() {
            return Err(LocateError::NoConfidentMatch { best: None });
        }
        Ok(MatchCandidate {
            start_line: 0,
            length,
            score: 0.0,
            matched_lines: 0,
            degraded: true,
            tier: MatchTier::LineNumber,
            widened: false,
        })
    }
}

#[test]
fn test_custom_locator_plugs_into_applier() {
    let diff = file_diff("--- a/f\n+++ b/f\n@@ -3 +3 @@\n-c\n+C\n");

    let result = apply_with_locator(&AlwaysTop, &diff, "a\nb\nc\n", &ApplyOptions::default());
    assert_eq!(result.text, "C\nb\nc\n");
}

#[test]
fn test_batch_results_keep_job_order() {
    let first = file_diff("--- a/one\n+++ b/one\n@@ -1 +1 @@\n-1\n+one\n");
    let second = file_diff("--- a/two\n+++ b/two\n@@ -1 +1 @@\n-2\n+two\n");
    let jobs = [(&first, "1\n"), (&second, "2\n")];

    let results = apply_all(&jobs, &ApplyOptions::default(), 2);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].text, "one\n");
    assert_eq!(results[1].text, "two\n");
    assert_eq!(results[1].path.to_str(), Some("two"));
}

#[test]
fn test_candidates_are_independent() {
    let base = "a\nb\nc\n";
    let candidates = [
        file_diff("--- a/f\n+++ b/f\n@@ -1 +1 @@\n-a\n+A\n"),
        file_diff("--- a/f\n+++ b/f\n@@ -3 +3 @@\n-c\n+C\n"),
    ];

    let results = apply_candidates(base, &candidates, &ApplyOptions::default(), 0);
    assert_eq!(results[0].text, "A\nb\nc\n");
    assert_eq!(results[1].text, "a\nb\nC\n");
}

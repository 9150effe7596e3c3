use core_test_support::RecordingContinuation;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;
use wangr_core::LocalToolExecutor;
use wangr_core::PendingResolver;
use wangr_core::error::SandboxErr;
use wangr_core::error::WangrErr;
use wangr_core::operation::PendingBatch;
use wangr_core::operation::PendingEntry;
use wangr_core::protocol::ToolOutput;
use wangr_core::protocol::ToolStatus;
use wangr_core::resolver::ContinueOutcome;
use wangr_core::resolver::DENIED_REASON;

fn batch(id: Option<&str>, entries: Vec<Value>) -> PendingBatch {
    PendingBatch {
        id: id.map(str::to_string),
        entries: entries.into_iter().map(PendingEntry::from_value).collect(),
    }
}

fn create_entry(call_id: &str, path: &str, diff: &str) -> Value {
    json!({
        "type": "apply_patch",
        "call_id": call_id,
        "operation": {"type": "create_file", "path": path, "diff": diff}
    })
}

fn update_entry(call_id: &str, path: &str, diff: &str) -> Value {
    json!({
        "type": "apply_patch",
        "call_id": call_id,
        "operation": {"type": "update_file", "path": path, "diff": diff}
    })
}

fn resolver(workspace: &TempDir) -> PendingResolver {
    PendingResolver::new(LocalToolExecutor::new(workspace.path()))
}

#[tokio::test]
async fn approved_create_reports_completion_and_writes_file() {
    let workspace = TempDir::new().unwrap();
    let continuation = RecordingContinuation::with_outcomes(vec![ContinueOutcome {
        response_text: "Saved your notes.".to_string(),
        next_pending: None,
    }]);
    let pending = batch(Some("p1"), vec![create_entry("c1", "notes.txt", "+hi")]);

    let resolution = resolver(&workspace)
        .resolve(&pending, true, false, &continuation)
        .await
        .unwrap();

    assert_eq!(
        continuation.calls(),
        vec![(
            "p1".to_string(),
            vec![ToolOutput::completed(
                Some("c1".to_string()),
                "Created notes.txt"
            )]
        )]
    );
    assert_eq!(
        std::fs::read_to_string(workspace.path().join("notes.txt")).unwrap(),
        "hi"
    );
    assert_eq!(resolution.response_text, "Saved your notes.");
    assert_eq!(resolution.next_pending, None);
    assert!(resolution.auto_approve_chain);
}

#[tokio::test]
async fn denial_arms_nothing_and_mutates_nothing() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("keep.txt"), "original\n").unwrap();
    let continuation = RecordingContinuation::new();
    let pending = batch(
        Some("p1"),
        vec![
            create_entry("c1", "new.txt", "+data"),
            update_entry("c2", "keep.txt", "-original\n+changed"),
            json!({"type": "apply_patch", "call_id": "c3",
                   "operation": {"type": "delete_file", "path": "keep.txt"}}),
        ],
    );

    let resolution = resolver(&workspace)
        .resolve(&pending, false, false, &continuation)
        .await
        .unwrap();

    let (_, outputs) = &continuation.calls()[0];
    assert_eq!(
        outputs,
        &vec![
            ToolOutput::failed(Some("c1".to_string()), DENIED_REASON),
            ToolOutput::failed(Some("c2".to_string()), DENIED_REASON),
            ToolOutput::failed(Some("c3".to_string()), DENIED_REASON),
        ]
    );
    assert!(!workspace.path().join("new.txt").exists());
    assert_eq!(
        std::fs::read_to_string(workspace.path().join("keep.txt")).unwrap(),
        "original\n"
    );
    assert!(!resolution.auto_approve_chain);
}

#[tokio::test]
async fn one_failing_call_does_not_block_its_siblings() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("one.txt"), "1\n").unwrap();
    std::fs::write(workspace.path().join("three.txt"), "3\n").unwrap();
    let continuation = RecordingContinuation::new();
    let pending = batch(
        Some("p1"),
        vec![
            update_entry("c1", "one.txt", "-1\n+one"),
            update_entry("c2", "two.txt", "-2\n+two"),
            update_entry("c3", "three.txt", "-3\n+three"),
        ],
    );

    let resolution = resolver(&workspace)
        .resolve(&pending, true, false, &continuation)
        .await
        .unwrap();

    let (_, outputs) = &continuation.calls()[0];
    assert_eq!(outputs.len(), 3);
    let failed: Vec<_> = outputs.iter().filter(|o| o.is_failed()).collect();
    assert_eq!(
        failed,
        vec![&ToolOutput::failed(
            Some("c2".to_string()),
            "Preview error for two.txt: File not found: two.txt"
        )]
    );
    assert_eq!(
        outputs
            .iter()
            .filter(|o| o.status == ToolStatus::Completed)
            .count(),
        2
    );
    assert_eq!(
        std::fs::read_to_string(workspace.path().join("one.txt")).unwrap(),
        "one\n"
    );
    assert_eq!(
        std::fs::read_to_string(workspace.path().join("three.txt")).unwrap(),
        "three\n"
    );
    // A preview failure keeps the chain disarmed even though the user approved.
    assert!(!resolution.auto_approve_chain);
}

#[tokio::test]
async fn reads_run_regardless_of_the_decision() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("context.md"), "# Notes\n").unwrap();
    let continuation = RecordingContinuation::new();
    let pending = batch(
        Some("p1"),
        vec![
            json!({"type": "read_file", "call_id": "r1", "path": "context.md"}),
            json!({"type": "read_file", "call_id": "r2", "path": "absent.md"}),
            json!({"type": "run_shell", "call_id": "s1"}),
        ],
    );

    let resolution = resolver(&workspace)
        .resolve(&pending, false, false, &continuation)
        .await
        .unwrap();

    let (_, outputs) = &continuation.calls()[0];
    assert_eq!(
        outputs,
        &vec![
            ToolOutput::completed(Some("r1".to_string()), "# Notes\n"),
            ToolOutput::failed(
                Some("r2".to_string()),
                "Error reading file: File not found: absent.md"
            ),
            ToolOutput::failed(
                Some("s1".to_string()),
                "Unsupported pending operation type: run_shell"
            ),
        ]
    );
    assert!(!resolution.auto_approve_chain);
}

#[tokio::test]
async fn armed_chain_applies_the_next_batch_without_approval() {
    let workspace = TempDir::new().unwrap();
    let continuation = RecordingContinuation::new();
    let pending = batch(Some("p2"), vec![create_entry("c1", "b.txt", "+b")]);

    let resolution = resolver(&workspace)
        .resolve(&pending, false, true, &continuation)
        .await
        .unwrap();

    assert_eq!(
        continuation.calls()[0].1,
        vec![ToolOutput::completed(Some("c1".to_string()), "Created b.txt")]
    );
    assert!(resolution.auto_approve_chain);
}

#[tokio::test]
async fn missing_pending_id_is_fatal() {
    let workspace = TempDir::new().unwrap();
    let continuation = RecordingContinuation::new();
    let pending = batch(None, vec![create_entry("c1", "a.txt", "+a")]);

    let err = resolver(&workspace)
        .resolve(&pending, true, false, &continuation)
        .await
        .unwrap_err();

    assert!(matches!(err, WangrErr::MissingPendingId));
    assert!(continuation.calls().is_empty());
    assert!(!workspace.path().join("a.txt").exists());
}

#[tokio::test]
async fn sandbox_violation_aborts_before_any_side_effect() {
    let workspace = TempDir::new().unwrap();
    let continuation = RecordingContinuation::new();
    let pending = batch(
        Some("p1"),
        vec![
            create_entry("c1", "inside.txt", "+ok"),
            create_entry("c2", "../outside.txt", "+nope"),
        ],
    );

    let err = resolver(&workspace)
        .resolve(&pending, true, false, &continuation)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WangrErr::Sandbox(SandboxErr::EscapesRoot(ref path)) if path == "../outside.txt"
    ));
    assert!(continuation.calls().is_empty());
    assert!(!workspace.path().join("inside.txt").exists());
}

#[tokio::test]
async fn absolute_read_path_is_fatal() {
    let workspace = TempDir::new().unwrap();
    let continuation = RecordingContinuation::new();
    let pending = batch(
        Some("p1"),
        vec![json!({"type": "read_file", "call_id": "r1", "path": "/etc/passwd"})],
    );

    let err = resolver(&workspace)
        .resolve(&pending, false, false, &continuation)
        .await
        .unwrap_err();

    assert!(matches!(err, WangrErr::Sandbox(SandboxErr::AbsolutePath(_))));
    assert!(continuation.calls().is_empty());
}

#[tokio::test]
async fn patch_blob_entry_reports_one_output_per_call() {
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("app.py"), "def main():\n    print(1)\n").unwrap();
    let continuation = RecordingContinuation::new();
    let pending = batch(
        Some("p1"),
        vec![json!({
            "type": "apply_patch",
            "call_id": "c1",
            "patch": "*** Begin Patch\n\
                      *** Add File: README.md\n\
                      +# App\n\
                      *** Update File: app.py\n\
                      @@ def main():\n\
                      -    print(1)\n\
                      +    print(2)\n\
                      *** End Patch"
        })],
    );

    resolver(&workspace)
        .resolve(&pending, true, false, &continuation)
        .await
        .unwrap();

    assert_eq!(
        continuation.calls()[0].1,
        vec![ToolOutput::completed(
            Some("c1".to_string()),
            "Created README.md\nUpdated app.py"
        )]
    );
    assert_eq!(
        std::fs::read_to_string(workspace.path().join("app.py")).unwrap(),
        "def main():\n    print(2)\n"
    );
}

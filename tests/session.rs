use patchset::{
    AddRoDataPatch, Error, InsertCodePatch, PatchSession, PatchTypeRegistry, PatchUpdate,
    PatcherRunner,
};
use serde_json::json;
use std::fs;
use std::sync::{mpsc, Arc};
use tempfile::tempdir;

fn session(input: &str) -> PatchSession {
    PatchSession::new(Arc::new(PatchTypeRegistry::with_builtin()), input)
}

#[test]
fn save_and_load_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("patches.json");

    let mut original = session("target");
    original
        .insert(InsertCodePatch::ID, 0x8048100, "hook", json!("push eax\npop eax"))
        .unwrap();
    original
        .insert(AddRoDataPatch::ID, 0x8049000, "hook", json!([0x41, 0x42, 0]))
        .unwrap();
    original
        .edit(0, PatchUpdate::default().address(0x8048104))
        .unwrap();
    original.save(&path).unwrap();

    let mut loaded = session("target");
    assert_eq!(loaded.load(&path).unwrap(), 2);
    assert_eq!(loaded.store().records(), original.store().records());
    assert_eq!(loaded.store().get(1).unwrap().name, "hook_1");
    assert_eq!(loaded.rows().unwrap(), original.rows().unwrap());
}

#[test]
fn corrupt_file_leaves_session_unchanged() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("patches.json");
    fs::write(
        &path,
        r#"[{"patch_type":"InsertCodePatch","address":16,"name":"ok","data":"nop"},
            {"patch_type":"InsertCodePatch","address":32,"name":"broken"}]"#,
    )
    .unwrap();

    let mut session = session("target");
    session
        .insert(InsertCodePatch::ID, 0, "existing", json!("ret"))
        .unwrap();

    assert!(matches!(
        session.load(&path),
        Err(Error::MalformedSerialization { .. })
    ));
    assert_eq!(session.len(), 1);
}

#[test]
fn write_error_mentions_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("patches.json");

    let err = session("target").save(&path).unwrap_err();
    assert!(matches!(err, Error::WritePatchSet { .. }));
    assert!(err.to_string().contains("patches.json"));
}

#[cfg(unix)]
#[test]
fn patcher_receives_snapshot_and_reports_exit_code() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let script = |name: &str, code: i32| {
        let path = dir.path().join(name);
        let body = format!(
            "#!/bin/sh\n\
             printf '%s\\n' \"$@\" > \"{dir}/args\"\n\
             cp \"$(sed -n 's/^ *patch_file: //p' \"$2\")\" \"{dir}/snapshot\"\n\
             exit {code}\n",
            dir = dir.path().display(),
            code = code
        );
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    };
    let ok_tool = script("patcher-ok", 0);
    let failing_tool = script("patcher-fail", 3);

    let mut session = session("/bin/true")
        .with_runner(PatcherRunner::default().with_tool(&ok_tool));
    session
        .insert(InsertCodePatch::ID, 0x1000, "entry", json!("nop"))
        .unwrap();
    let expected = session.store().serialize().unwrap();

    let (tx, rx) = mpsc::channel();
    let handle = session
        .run_patcher(dir.path().join("out"), move |result| tx.send(result).unwrap())
        .unwrap();
    // edits after launch must not reach the running patcher
    session.remove(0).unwrap();

    rx.recv().unwrap().unwrap();
    handle.join().unwrap();

    let args = fs::read_to_string(dir.path().join("args")).unwrap();
    let args: Vec<_> = args.lines().collect();
    assert_eq!(args.len(), 5);
    assert_eq!(args[0], "-c");
    assert_eq!(args[2], "single");
    assert_eq!(args[3], "/bin/true");
    assert_eq!(args[4], dir.path().join("out").to_str().unwrap());
    assert_eq!(fs::read(dir.path().join("snapshot")).unwrap(), expected);

    let session = session.with_runner(PatcherRunner::default().with_tool(&failing_tool));
    let (tx, rx) = mpsc::channel();
    session
        .run_patcher(dir.path().join("out"), move |result| tx.send(result).unwrap())
        .unwrap();

    match rx.recv().unwrap() {
        Err(Error::ExternalToolFailure { status }) => assert_eq!(status.code(), Some(3)),
        other => panic!("unexpected {:?}", other),
    }
}

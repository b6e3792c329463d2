use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use smac_lib::{
    pipeline::{discover_sources, Pipeline, PipelineError, SOURCE_EXTENSION},
    settings::Settings,
    CompileRequest, CompileResult, Compiler, Diagnostic, DiagnosticKind, Error,
};

include! {concat!(env!("OUT_DIR"), "/tests.rs")}

const FAKE_AMXXPC: &str = env!("CARGO_BIN_EXE_fake_amxxpc");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expect {
    /// Accepted without warnings.
    Ok,
    /// Accepted with at least one warning.
    Warn,
    /// Rejected because of an error.
    Fail,
    /// Rejected because the compiler gave up.
    Abort,
}

fn request(source: &Path, dest: &Path) -> CompileRequest {
    CompileRequest::builder()
        .compiler(FAKE_AMXXPC)
        .source(source)
        .dest_dir(dest)
        .build()
        .unwrap()
}

/// Lines the fake compiler records in the artifact, e.g. `cwd=...` and `arg=...`.
fn artifact_lines(res: &CompileResult) -> Vec<String> {
    fs::read_to_string(res.artifact_path())
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

async fn transcript_test(file: &str, expected_codes: &[u32], expect: Expect) {
    let dest = tempfile::tempdir().unwrap();
    let outcome = smac_lib::compile::compile(&request(Path::new(file), dest.path())).await;

    let res = match (outcome, expect) {
        (Ok(res), Expect::Ok | Expect::Warn) => res,
        (Err(Error::Compile(res)), Expect::Fail | Expect::Abort) => *res,
        (outcome, expect) => {
            let res = match &outcome {
                Ok(res) => Some(res),
                Err(err) => err.result(),
            };
            for d in res.into_iter().flat_map(CompileResult::diagnostics) {
                println!("{:?}: {d}", d.kind());
            }
            panic!("Expected {expect:?} for `{file}`, got {outcome:?}");
        }
    };

    match expect {
        Expect::Ok => assert_eq!(res.warnings().count(), 0, "expected no warnings"),
        Expect::Warn => assert_ne!(res.warnings().count(), 0, "expected warnings"),
        Expect::Fail => assert!(res.had_error(), "expected an error"),
        Expect::Abort => assert!(res.aborted(), "expected the compile to abort"),
    }

    let found_codes: Vec<u32> = res.diagnostics().iter().filter_map(Diagnostic::code).collect();
    if expected_codes != found_codes {
        println!(
            "Expected to find these diagnostic codes: {:?}
                              But found: {:?}",
            expected_codes, found_codes
        );
        panic!("Not the same diagnostics");
    }
}

#[tokio::test]
async fn rejects_error_with_nonzero_exit() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("foo.sma");
    fs::write(
        &source,
        "foo.sma(10) : error 123: undefined symbol\n\n1 Error.\n#fake exit 1\n",
    )
    .unwrap();

    let res = match smac_lib::compile::compile(&request(&source, &dir.path().join("out"))).await {
        Err(Error::Compile(res)) => res,
        other => panic!("expected a compile error, got {other:?}"),
    };

    assert_eq!(res.artifact_name(), "foo.amxx");
    assert!(res.had_error());
    assert!(!res.aborted());
    assert_eq!(res.exit_code(), Some(1));
    assert_eq!(res.diagnostics().len(), 3);

    let d = &res.diagnostics()[0];
    assert_eq!(d.kind(), DiagnosticKind::Error);
    assert_eq!(d.filename(), Some(Path::new("foo.sma")));
    assert_eq!(d.lines().map(|l| l.start()), Some(10));
    assert_eq!(d.code(), Some(123));
    assert_eq!(d.message(), "undefined symbol");
}

#[tokio::test]
async fn silent_compile_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("foo.sma");
    fs::write(&source, "").unwrap();
    let dest = dir.path().join("plugins");

    let res = smac_lib::compile::compile(&request(&source, &dest)).await.unwrap();
    assert_eq!(res.artifact_name(), "foo.amxx");
    assert_eq!(res.artifact_path(), dest.join("foo.amxx"));
    assert!(res.diagnostics().is_empty());
    assert_eq!(res.exit_code(), Some(0));
    assert!(dest.join("foo.amxx").is_file());
}

#[tokio::test]
async fn passes_one_argument_per_include_dir() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("my plugin.sma");
    fs::write(&source, "Done.\n").unwrap();
    let dest = dir.path().join("out dir");

    let req = CompileRequest::builder()
        .compiler(FAKE_AMXXPC)
        .source(&source)
        .include_dir(dir.path().join("a"))
        .include_dir(dir.path().join("b"))
        .dest_dir(&dest)
        .build()
        .unwrap();
    let res = smac_lib::compile::compile(&req).await.unwrap();

    let args: Vec<_> = artifact_lines(&res).into_iter().skip(1).collect();
    assert_eq!(
        args,
        vec![
            format!("arg={}", source.display()),
            format!("arg=-o{}", dest.join("my plugin.amxx").display()),
            format!("arg=-i{}", dir.path().join("a").display()),
            format!("arg=-i{}", dir.path().join("b").display()),
        ]
    );
}

#[tokio::test]
async fn runs_in_the_compiler_directory() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("foo.sma");
    fs::write(&source, "").unwrap();

    let res = smac_lib::compile::compile(&request(&source, dir.path())).await.unwrap();
    let cwd = artifact_lines(&res)[0].strip_prefix("cwd=").unwrap().to_owned();

    let expected = Path::new(FAKE_AMXXPC).parent().unwrap();
    assert_eq!(
        fs::canonicalize(cwd).unwrap(),
        fs::canonicalize(expected).unwrap()
    );
}

#[tokio::test]
async fn relative_paths_survive_the_directory_change() {
    // Relative to the tests crate, which is where cargo runs the tests.
    let source = Path::new("test_files/clean.sma");
    let dest = tempfile::tempdir().unwrap();

    let res = smac_lib::compile::compile(&request(source, dest.path())).await.unwrap();
    let lines = artifact_lines(&res);
    let expected = std::env::current_dir().unwrap().join(source);
    assert_eq!(lines[1], format!("arg={}", expected.display()));
}

#[tokio::test]
async fn same_dest_dir_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("deep").join("plugins");
    let sources: Vec<PathBuf> = (0..4).map(|i| dir.path().join(format!("p{i}.sma"))).collect();
    for source in &sources {
        fs::write(source, "Done.\n").unwrap();
    }

    let compiler = Compiler::new();
    let requests: Vec<_> = sources.iter().map(|s| request(s, &dest)).collect();
    let (a, b, c, d) = tokio::join!(
        compiler.compile(&requests[0]),
        compiler.compile(&requests[1]),
        compiler.compile(&requests[2]),
        compiler.compile(&requests[3]),
    );

    for res in [a, b, c, d] {
        assert!(res.unwrap().artifact_path().is_file());
    }
}

#[tokio::test]
async fn stderr_is_not_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("foo.sma");
    fs::write(
        &source,
        "Done.\n#fake stderr foo.sma(1) : error 1: only on stderr\n",
    )
    .unwrap();

    let res = smac_lib::compile::compile(&request(&source, dir.path())).await.unwrap();
    assert!(!res.had_error());
    assert_eq!(res.stderr(), ["foo.sma(1) : error 1: only on stderr".to_owned()]);
    assert_eq!(res.diagnostics(), [Diagnostic::echo("Done.")]);
}

#[tokio::test]
async fn stderr_that_is_not_utf8_is_drained() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("foo.sma");
    fs::write(
        &source,
        "#fake stderr-bytes bad \\xff\\xfe path\n\
         #fake stderr warning text\n\
         foo.sma(1) : error 17: undefined symbol\n",
    )
    .unwrap();

    let res = match smac_lib::compile::compile(&request(&source, dir.path())).await {
        Err(Error::Compile(res)) => res,
        other => panic!("expected a compile error, got {other:?}"),
    };
    assert_eq!(res.exit_code(), Some(0));
    assert_eq!(res.errors().count(), 1);
    assert_eq!(
        res.stderr(),
        ["bad \u{fffd}\u{fffd} path".to_owned(), "warning text".to_owned()]
    );
}

#[tokio::test]
async fn observer_sees_diagnostics_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("foo.sma");
    fs::write(
        &source,
        "Header\nfoo.sma(2) : warning 217: loose indentation\nfoo.sma(3) : error 17: undefined symbol \"x\"\n#fake chunk 5\n",
    )
    .unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let compiler = Compiler::new().with_observer(move |d: &Diagnostic| {
        sink.lock().unwrap().push(d.kind());
    });

    let err = compiler.compile(&request(&source, dir.path())).await.unwrap_err();
    assert!(matches!(err, Error::Compile(_)));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![DiagnosticKind::Info, DiagnosticKind::Warning, DiagnosticKind::Error]
    );
}

#[tokio::test]
async fn missing_compiler_is_a_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let req = CompileRequest::builder()
        .compiler(dir.path().join("amxxpc"))
        .source(dir.path().join("foo.sma"))
        .dest_dir(dir.path())
        .build()
        .unwrap();

    match smac_lib::compile::compile(&req).await {
        Err(Error::Spawn { partial, .. }) => assert!(partial.diagnostics().is_empty()),
        other => panic!("expected a spawn error, got {other:?}"),
    }
}

fn pipeline_tree(root: &Path, failing: &str) {
    fs::create_dir_all(root.join("src/admin")).unwrap();
    for (file, body) in [
        ("src/a.sma", "Done.\n"),
        ("src/admin/ban.sma", "Done.\n"),
        ("src/b.sma", failing),
    ] {
        fs::write(root.join(file), body).unwrap();
    }
}

#[tokio::test]
async fn pipeline_mirrors_sub_dirs() {
    let dir = tempfile::tempdir().unwrap();
    pipeline_tree(dir.path(), "Done.\n");

    let mut settings = Settings::new(FAKE_AMXXPC, dir.path().join("plugins"));
    settings.ignore_sub_dirs = false;
    let files = discover_sources(&dir.path().join("src"), SOURCE_EXTENSION).unwrap();
    let passed = Pipeline::new(settings).run(files.clone()).await.unwrap();

    assert_eq!(passed, files);
    for artifact in ["a.amxx", "b.amxx", "admin/ban.amxx"] {
        assert!(dir.path().join("plugins").join(artifact).is_file(), "{artifact}");
    }
}

#[tokio::test]
async fn pipeline_flattens_by_default() {
    let dir = tempfile::tempdir().unwrap();
    pipeline_tree(dir.path(), "Done.\n");

    let settings = Settings::new(FAKE_AMXXPC, dir.path().join("plugins"));
    let files = discover_sources(&dir.path().join("src"), SOURCE_EXTENSION).unwrap();
    Pipeline::new(settings).run(files).await.unwrap();

    assert!(dir.path().join("plugins/ban.amxx").is_file());
    assert!(!dir.path().join("plugins/admin").exists());
}

#[tokio::test]
async fn pipeline_stops_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    pipeline_tree(dir.path(), "b.sma(1) : error 10: invalid function or declaration\n");

    let settings = Settings::new(FAKE_AMXXPC, dir.path().join("plugins"));
    let files = discover_sources(&dir.path().join("src"), SOURCE_EXTENSION).unwrap();
    let err = Pipeline::new(settings.clone()).run(files.clone()).await.unwrap_err();
    match err {
        PipelineError::Compile {
            path,
            source: Error::Compile(res),
        } => {
            assert_eq!(path, dir.path().join("src/b.sma"));
            assert_eq!(res.artifact_name(), "b.amxx");
        }
        err => panic!("expected a compile error, got {err:?}"),
    }

    let mut settings = settings;
    settings.ignore_errors = true;
    let passed = Pipeline::new(settings).run(files.clone()).await.unwrap();
    assert_eq!(passed, files);
}

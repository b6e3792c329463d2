//! Stands in for the real compiler in tests.
//!
//! The source file is a transcript: its lines are printed to stdout as they are, except for
//! `//` lines, which are skipped, and `#fake` directives:
//!
//! - `#fake exit N` exits with code `N` (default 0)
//! - `#fake stderr TEXT` prints `TEXT` to stderr
//! - `#fake stderr-bytes TEXT` does the same after turning `\xNN` escapes into raw bytes
//! - `#fake chunk N` writes stdout `N` bytes at a time
//!
//! The artifact named by `-o` is written with the working directory and arguments, one per line.

use std::{
    env, fs,
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
    thread,
    time::Duration,
};

#[derive(Default)]
struct Script {
    stdout: Vec<u8>,
    stderr: Vec<Vec<u8>>,
    exit: u8,
    chunk: Option<usize>,
}

fn parse(source: &str) -> Script {
    let mut script = Script::default();
    for line in source.split_inclusive('\n') {
        let content = line.trim_end_matches(['\r', '\n']);
        if content.starts_with("//") {
            continue;
        }
        let Some(directive) = content.strip_prefix("#fake ") else {
            script.stdout.extend_from_slice(line.as_bytes());
            continue;
        };

        let (name, arg) = directive.split_once(' ').unwrap_or((directive, ""));
        match name {
            "exit" => script.exit = arg.parse().expect("bad exit code"),
            "stderr" => script.stderr.push(arg.as_bytes().to_vec()),
            "stderr-bytes" => script.stderr.push(unescape(arg)),
            "chunk" => script.chunk = Some(arg.parse().expect("bad chunk size")),
            _ => panic!("unknown directive `{name}`"),
        }
    }
    script
}

fn unescape(text: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut rest = text;
    while let Some(at) = rest.find("\\x") {
        out.extend_from_slice(rest[..at].as_bytes());
        let hex = rest.get(at + 2..at + 4).expect("truncated escape");
        out.push(u8::from_str_radix(hex, 16).expect("bad escape"));
        rest = &rest[at + 4..];
    }
    out.extend_from_slice(rest.as_bytes());
    out
}

fn main() -> io::Result<ExitCode> {
    let args: Vec<String> = env::args().skip(1).collect();
    let source = args.first().expect("no source file given");
    let source = fs::read_to_string(source)?;
    let script = parse(&source);

    if let Some(out) = args.iter().find_map(|a| a.strip_prefix("-o")) {
        let mut artifact = format!("cwd={}\n", env::current_dir()?.display());
        for arg in &args {
            artifact.push_str(&format!("arg={arg}\n"));
        }
        fs::write(PathBuf::from(out), artifact)?;
    }

    let mut stderr = io::stderr().lock();
    for line in &script.stderr {
        stderr.write_all(line)?;
        stderr.write_all(b"\n")?;
        stderr.flush()?;
    }

    let mut stdout = io::stdout().lock();
    match script.chunk {
        Some(size) => {
            for chunk in script.stdout.chunks(size.max(1)) {
                stdout.write_all(chunk)?;
                stdout.flush()?;
                thread::sleep(Duration::from_millis(1));
            }
        }
        None => stdout.write_all(&script.stdout)?,
    }
    stdout.flush()?;

    Ok(ExitCode::from(script.exit))
}

//! Blocking subprocess execution for a single build node (spec §4.G, §5).
//!
//! Spawns a child process and matches on `.status().code()`, capturing
//! stdout/stderr for failure reporting and supporting a wall-clock timeout
//! for test nodes.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

pub struct Finished {
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Spawns `argv` with the given working directory, waiting up to `timeout`
/// if given. Cancellation is checked by the scheduler between subprocess
/// invocations, not here: an in-flight child always runs to completion
/// (spec §5 "Cancellation semantics").
pub fn run(argv: &[String], cwd: &Path, timeout: Option<Duration>) -> std::io::Result<Finished> {
    let (program, args) = argv.split_first().expect("empty command");
    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drained on their own threads so a chatty child never blocks on a full
    // pipe buffer while the loop below is busy polling `try_wait`.
    let mut stdout_pipe = child.stdout.take().expect("piped stdout");
    let mut stderr_pipe = child.stderr.take().expect("piped stderr");
    let stdout_reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf);
        buf
    });
    let stderr_reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf);
        buf
    });

    let start = Instant::now();
    let mut timed_out = false;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if let Some(budget) = timeout {
            if start.elapsed() > budget {
                timed_out = true;
                let _ = child.kill();
                break child.wait()?;
            }
        }
        std::thread::sleep(Duration::from_millis(15));
    };

    let stdout = String::from_utf8_lossy(&stdout_reader.join().unwrap_or_default()).into_owned();
    let stderr = String::from_utf8_lossy(&stderr_reader.join().unwrap_or_default()).into_owned();

    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    Ok(Finished {
        exit_code: status.code(),
        signal,
        timed_out,
        stdout,
        stderr,
    })
}

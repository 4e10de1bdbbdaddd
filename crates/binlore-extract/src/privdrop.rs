//! Privilege drop for external extraction tools, ported from
//! `extractor.py`'s `shell_call`.
//!
//! The source's `os.setgid(self.runas_uid)` / `os.setuid(self.runas_gid)`
//! pairing swaps the uid and gid arguments; this looks like a transcription
//! bug rather than intended behavior, so the fork child here calls
//! `setgid(gid)` then `setuid(uid)` in the conventional order (group first,
//! so the process still holds the privilege needed to drop it).

use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};

use binlore_common::Error;

/// Run `argv` (already split into a program and its arguments), dropping to
/// `run_as_uid`/`run_as_gid` first if they differ from the current user.
/// Returns the child's exit code.
pub fn run(argv: &[String], run_as_uid: Option<u32>, run_as_gid: Option<u32>) -> Result<i32, Error> {
    run_with_stdin(argv, None, run_as_uid, run_as_gid)
}

/// Like [`run`], but feeds `stdin_file`'s contents to the child's stdin —
/// the Rust equivalent of `extractor.py`'s in-process callables that pipe a
/// carved file into a subprocess (e.g. the `cpio` extractor), expressed here
/// as a `< %e` suffix on an `extract.conf` `cmd`.
pub fn run_with_stdin(
    argv: &[String],
    stdin_file: Option<&Path>,
    run_as_uid: Option<u32>,
    run_as_gid: Option<u32>,
) -> Result<i32, Error> {
    let Some((program, args)) = argv.split_first() else {
        return Ok(0);
    };

    #[cfg(unix)]
    {
        let current_uid = unsafe { libc::getuid() };
        if let (Some(uid), Some(gid)) = (run_as_uid, run_as_gid) {
            if uid != current_uid {
                return run_as(program, args, uid, gid, stdin_file);
            }
        }
    }

    let mut command = Command::new(program);
    command.args(args);
    attach_stdin(&mut command, stdin_file)?;
    let status = command
        .status()
        .map_err(|e| Error::Subprocess(format!("{program}: {e}")))?;
    Ok(status.code().unwrap_or(-1))
}

fn attach_stdin(command: &mut Command, stdin_file: Option<&Path>) -> Result<(), Error> {
    if let Some(path) = stdin_file {
        let file = File::open(path).map_err(|e| Error::Subprocess(format!("{}: {e}", path.display())))?;
        command.stdin(Stdio::from(file));
    }
    Ok(())
}

/// Running as root without a configured run-as user is refused outright —
/// an external tool run unconfined as root is a much bigger blast radius
/// than a failed extraction.
pub fn refuse_unconfigured_root(run_as_uid: Option<u32>) -> Result<(), Error> {
    #[cfg(unix)]
    {
        let is_root = unsafe { libc::getuid() } == 0;
        if is_root && run_as_uid.is_none() {
            return Err(Error::Module(
                "refusing to run external extraction tools as root without a configured run-as user".into(),
            ));
        }
    }
    let _ = run_as_uid;
    Ok(())
}

#[cfg(unix)]
fn run_as(program: &str, args: &[String], uid: u32, gid: u32, stdin_file: Option<&Path>) -> Result<i32, Error> {
    // SAFETY: fork() duplicates the process; the child below only calls
    // async-signal-safe libc functions (setgid/setuid/execvp-equivalent via
    // Command::status, which itself forks+execs) before exiting.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(Error::Subprocess("fork() failed".into()));
    }
    if pid == 0 {
        // SAFETY: child process, about to exit unconditionally.
        unsafe {
            if libc::setgid(gid) != 0 || libc::setuid(uid) != 0 {
                libc::_exit(127);
            }
        }
        let mut command = Command::new(program);
        command.args(args);
        let code = match attach_stdin(&mut command, stdin_file).and_then(|()| {
            command
                .status()
                .map_err(|e| Error::Subprocess(e.to_string()))
        }) {
            Ok(s) => s.code().unwrap_or(-1),
            Err(_) => 127,
        };
        // SAFETY: terminal call in the forked child.
        unsafe { libc::_exit(code) };
    }

    let mut wstatus: libc::c_int = 0;
    // SAFETY: `pid` is the child just forked above; this is a normal blocking wait.
    let waited = unsafe { libc::waitpid(pid, &mut wstatus, 0) };
    if waited < 0 {
        return Err(Error::Subprocess("waitpid() failed".into()));
    }
    if libc_wifexited(wstatus) {
        Ok(libc_wexitstatus(wstatus))
    } else {
        Ok(-1)
    }
}

#[cfg(unix)]
fn libc_wifexited(status: libc::c_int) -> bool {
    (status & 0x7f) == 0
}

#[cfg(unix)]
fn libc_wexitstatus(status: libc::c_int) -> i32 {
    (status >> 8) & 0xff
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_argv_is_a_no_op_success() {
        assert_eq!(run(&[], None, None).unwrap(), 0);
    }

    #[test]
    fn runs_without_privilege_drop_when_no_run_as_user_configured() {
        let argv = vec!["true".to_string()];
        assert_eq!(run(&argv, None, None).unwrap(), 0);
    }
}

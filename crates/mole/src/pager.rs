//! External pager plumbing.
//!
//! Long query results are piped to the program named by `$PAGER`, run
//! through the shell so a value like `less -R` works. The user closing the
//! pager early is normal and ends the output quietly.

use std::env;
use std::io::{ErrorKind, Write};
use std::process::{Child, Command, Stdio};

/// The configured pager command, if any.
pub fn configured() -> Option<String> {
    env::var("PAGER").ok().filter(|pager| !pager.trim().is_empty())
}

/// Spawns the pager with a piped stdin.
pub fn spawn(pager: &str) -> std::io::Result<Child> {
    Command::new("/bin/sh")
        .arg("-c")
        .arg(pager)
        .stdin(Stdio::piped())
        .spawn()
}

/// Feeds `lines` to the pager and waits for it to finish.
pub fn page(mut child: Child, lines: impl Iterator<Item = String>) {
    if let Some(mut stdin) = child.stdin.take() {
        for line in lines {
            match writeln!(stdin, "{line}") {
                Ok(()) => {}
                Err(error) if error.kind() == ErrorKind::BrokenPipe => break,
                Err(error) => {
                    log::warn!("pager write failed: {error}");
                    break;
                }
            }
        }
    }
    if let Err(error) = child.wait() {
        log::warn!("pager did not exit cleanly: {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_through_cat() {
        let child = spawn("cat > /dev/null").unwrap();
        page(child, (0..10).map(|n| format!("line {n}")));
    }

    #[test]
    fn early_exit_is_tolerated() {
        // `true` exits without reading; writes hit a broken pipe.
        let child = spawn("true").unwrap();
        page(child, (0..100_000).map(|n| format!("line {n}")));
    }
}

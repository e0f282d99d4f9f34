//! User-facing messages: warnings, errors, per-file verbose lines, and the
//! end-of-run summary. Warnings and errors carry the stable `fgi:` prefix
//! and are suppressed by `--no-messages`; progress and the summary are
//! suppressed by `--quiet`.

use crate::index::types::Config;
use std::io::Write;
use std::path::Path;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Print `fgi: warning: <message> <path>` to stderr unless suppressed.
pub fn warning(config: &Config, message: &str, path: Option<&Path>) {
    if config.no_messages {
        return;
    }
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let _ = write!(stderr, "fgi: ");
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)));
    let _ = write!(stderr, "warning:");
    let _ = stderr.reset();
    match path {
        Some(p) => {
            let _ = writeln!(stderr, " {} {}", message, p.display());
        }
        None => {
            let _ = writeln!(stderr, " {}", message);
        }
    }
}

/// Print `fgi: error: <message> <path>: <cause>` to stderr unless suppressed.
pub fn error(config: &Config, message: &str, path: &Path, cause: &std::io::Error) {
    if config.no_messages {
        return;
    }
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let _ = write!(stderr, "fgi: ");
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true));
    let _ = write!(stderr, "error:");
    let _ = stderr.reset();
    let _ = writeln!(stderr, " {} {}: {}", message, path.display(), cause);
}

/// One line per indexed file in verbose mode: a marker column (`A` for
/// archived/compressed content, `B` for binary, blank otherwise), the byte
/// size, the rounded noise percentage, and the path.
pub fn verbose_file(config: &Config, marker: char, size: u64, noise: f32, path: &Path) {
    if !config.verbose {
        return;
    }
    println!(
        "{}{:12}{:3}% {}",
        marker,
        size,
        (100.0 * noise + 0.5) as u32,
        path.display()
    );
}

//! Server log line grammar.
//!
//! Lines are free text; only four shapes carry presence information:
//!
//! ```text
//! [12:00:01] [Server thread/INFO]: Steve joined the game
//! [12:03:40] [Server thread/INFO]: Steve left the game
//! [12:00:00] [Server thread/INFO]: Done (3.2s)!
//! [12:09:12] [Server thread/INFO]: Stopping server
//! ```

use craftwatch_core::PresenceKind;
use regex::Regex;
use std::sync::LazyLock;

const JOINED: &str = "joined the game";
const LEFT: &str = "left the game";
const STARTED: &str = "Done (";
const STARTED_EXCLUDE: &str = "For help";
const STOPPING: &str = "Stopping server";

const JOIN_PATTERN: &str = r": ([^ ]+) joined the game";
const LEAVE_PATTERN: &str = r": ([^ ]+) left the game";

static JOIN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(JOIN_PATTERN).unwrap());
static LEAVE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(LEAVE_PATTERN).unwrap());

/// Parse one log line. Lines matching no known shape yield `None`.
pub fn parse_line(line: &str) -> Option<PresenceKind> {
    let line = line.trim_end_matches(['\r', '\n']);

    if line.contains(JOINED) {
        if let Some(name) = capture_name(&JOIN_RE, line) {
            return Some(PresenceKind::Joined(name));
        }
    } else if line.contains(LEFT) {
        if let Some(name) = capture_name(&LEAVE_RE, line) {
            return Some(PresenceKind::Left(name));
        }
    }

    if line.contains(STARTED) && !line.contains(STARTED_EXCLUDE) {
        return Some(PresenceKind::ServerStarted);
    }
    if line.contains(STOPPING) {
        return Some(PresenceKind::ServerStopping);
    }
    None
}

fn capture_name(re: &Regex, line: &str) -> Option<String> {
    re.captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

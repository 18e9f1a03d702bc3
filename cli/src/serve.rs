//! JSON-lines message loop.
//!
//! Reads one [`Request`] per input line and writes each reply as one JSON
//! line. Malformed lines are answered with an error notice; the loop only
//! ends at end of input.

use std::io::{BufRead, Write};

use localdb_core::{Request, Response};
use localdb_sqlite::{PanelRouter, Session};
use tracing::debug;

/// Serves requests from `input` until it is exhausted.
pub fn serve<R: BufRead, W: Write>(
    session: &mut Session,
    input: R,
    mut output: W,
) -> std::io::Result<usize> {
    let mut router = PanelRouter::new();
    let mut handled = 0usize;

    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let replies = match serde_json::from_str::<Request>(line) {
            Ok(request) => {
                debug!(?request, "request");
                router.dispatch(session, request)
            }
            Err(e) => vec![Response::error(format!("Invalid request: {e}"))],
        };
        for reply in &replies {
            let encoded = serde_json::to_string(reply).map_err(std::io::Error::other)?;
            writeln!(output, "{encoded}")?;
        }
        output.flush()?;
        handled += 1;
    }
    Ok(handled)
}

//! Terminal echo of accumulated generation text.

use std::io::Write;

/// Writes only the part of the accumulated text not yet printed.
///
/// The first write or flush failure (a closed pipe, say) is logged once and
/// turns the echo off for the rest of the run.
#[derive(Debug)]
pub struct FragmentEcho<W> {
    out: W,
    printed: usize,
    enabled: bool,
}

impl<W: Write> FragmentEcho<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            printed: 0,
            enabled: true,
        }
    }

    /// Prints the suffix of `accumulated` past what was already echoed.
    pub fn show(&mut self, accumulated: &str) {
        if !self.enabled {
            return;
        }
        let fresh = accumulated.get(self.printed..).unwrap_or(accumulated);
        if self.write(fresh) {
            self.printed = accumulated.len();
        }
    }

    /// Ends the echoed block with a newline if anything was printed.
    pub fn finish(&mut self) {
        if self.enabled && self.printed > 0 {
            self.write("\n");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn write(&mut self, text: &str) -> bool {
        let written = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(error) = written {
            tracing::warn!(%error, "output closed; no longer echoing fragments");
            self.enabled = false;
        }
        self.enabled
    }
}

//! Line-oriented driver for the factorial grain
//!
//! TigerStyle: One integer per line, one answer per line, errors never end the loop.

use anyhow::{Context, Result};
use colored::Colorize;
use silo_grains::{calculate, Factorial, Recurrence};
use silo_runtime::ActorHandleBuilder;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Counts of what a session did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplSummary {
    /// Lines answered with a value
    pub computed: u64,
    /// Lines that could not be parsed or whose call failed
    pub failed: u64,
}

/// REPL state
pub struct Repl {
    handles: ActorHandleBuilder,
}

impl Repl {
    pub fn new(handles: ActorHandleBuilder) -> Self {
        Self { handles }
    }

    /// Run until the input ends
    ///
    /// Answers go to `output` as `N! = RESULT`, with `N` the parsed key
    /// rather than the line as typed. Unparsable lines and failed
    /// calls are reported on `errors` and the loop moves on.
    pub async fn run<R, W, E>(&self, input: R, output: &mut W, errors: &mut E) -> Result<ReplSummary>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        E: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut summary = ReplSummary::default();

        while let Some(line) = lines.next_line().await.context("Failed to read input")? {
            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            match self.answer(input).await {
                Ok((key, value)) => {
                    summary.computed += 1;
                    let reply = format!("{}! = {}\n", key, value);
                    output
                        .write_all(reply.as_bytes())
                        .await
                        .context("Failed to write answer")?;
                    output.flush().await.context("Failed to flush output")?;
                }
                Err(message) => {
                    summary.failed += 1;
                    let reply = format!("{} {}\n", "error:".red().bold(), message);
                    errors
                        .write_all(reply.as_bytes())
                        .await
                        .context("Failed to write error")?;
                    errors.flush().await.context("Failed to flush errors")?;
                }
            }
        }

        debug!(computed = summary.computed, failed = summary.failed, "Input ended");
        Ok(summary)
    }

    async fn answer(&self, input: &str) -> std::result::Result<(i64, i64), String> {
        let key: i64 = input
            .parse()
            .map_err(|e| format!("'{}' is not an integer: {}", input, e))?;

        let handle = self
            .handles
            .for_parts(Factorial::TYPE_TAG, key)
            .map_err(|e| e.to_string())?;

        let value = calculate(&handle).await.map_err(|e| e.to_string())?;
        Ok((key, value))
    }
}

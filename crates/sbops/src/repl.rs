use anyhow::{Context, Result};
use chrono::{TimeDelta, Utc};
use sbops_agents::Agent;
use sbops_models::Message;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const PROMPT: &str = ">>> ";
pub const QUIT: &str = "/quit";

/// Only the exact line `/quit` ends the session.
pub fn is_quit(line: &str) -> bool {
    line == QUIT
}

/// Read prompts from `input` and answer each with the manager until `/quit`,
/// end of input, or `cancel` fires.
///
/// Successful turns append their messages to the conversation history; a
/// failed turn is reported and leaves the history as it was. Blank or
/// whitespace-only lines are not sent to the manager and leave the history
/// unchanged. Returns the final history.
pub async fn run_repl<R, W>(
    manager: &Agent,
    input: R,
    mut output: W,
    cancel: CancellationToken,
) -> Result<Vec<Message>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut history: Vec<Message> = Vec::new();

    loop {
        write_out(&mut output, PROMPT).await?;

        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read input")?,
            _ = cancel.cancelled() => {
                info!("REPL cancelled");
                break;
            }
        };

        let Some(line) = line else {
            info!("End of input");
            break;
        };
        if is_quit(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let started = Utc::now();
        let run = tokio::select! {
            run = manager.run(&line, &history, None) => run,
            _ = cancel.cancelled() => {
                info!("REPL cancelled during run");
                break;
            }
        };
        let elapsed = Utc::now() - started;

        match run {
            Ok(result) => {
                let report = format!(
                    "{}\n{} | Execution Time: {}\n",
                    result.output,
                    result.usage,
                    format_elapsed(elapsed)
                );
                write_out(&mut output, &report).await?;
                history.extend(result.new_messages);
            }
            Err(e) => {
                error!(error = %e, "Manager run failed");
                write_out(&mut output, &format!("error: {e}\n")).await?;
            }
        }
    }

    Ok(history)
}

async fn write_out<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> Result<()> {
    output
        .write_all(text.as_bytes())
        .await
        .context("Failed to write output")?;
    output.flush().await.context("Failed to flush output")
}

/// `H:MM:SS[.ffffff]`, dropping the fraction when it is zero.
pub fn format_elapsed(elapsed: TimeDelta) -> String {
    let micros = elapsed.num_microseconds().unwrap_or(i64::MAX).max(0);
    let secs = micros / 1_000_000;
    let frac = micros % 1_000_000;
    let (h, m, s) = (secs / 3600, secs % 3600 / 60, secs % 60);
    if frac == 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{h}:{m:02}:{s:02}.{frac:06}")
    }
}

//! Change-set confirmation
//!
//! Before a zone's change set is applied, the engine asks the configured
//! [`ConfirmPolicy`]:
//!
//! - `AutoApprove` (`--yes`): always proceed
//! - `DryRun` (`--dry-run`): never proceed
//! - `Interactive`: ask a [`Prompt`]; the whole loop waits for the answer

use async_trait::async_trait;
use std::fmt;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::Mutex;

use crate::error::Result;

/// Why a change set was not applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    DryRun,
    Declined,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::DryRun => f.write_str("dry run"),
            SkipReason::Declined => f.write_str("declined"),
        }
    }
}

/// Outcome of a confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Skip(SkipReason),
}

/// Asks a human whether to apply a change set
#[async_trait]
pub trait Prompt: Send + Sync {
    /// Show `summary` and return whether to proceed
    async fn confirm(&self, summary: &str) -> Result<bool>;
}

/// Prompt that writes questions to `W` and reads answers line by line from `R`
///
/// One buffered reader is kept for the prompt's lifetime so answers piped in
/// ahead of time are not lost between zones.
pub struct LinePrompt<R, W> {
    io: Mutex<(BufReader<R>, W)>,
}

/// Prompt on the controlling terminal
pub type StdinPrompt = LinePrompt<Stdin, Stdout>;

impl StdinPrompt {
    pub fn new() -> Self {
        LinePrompt::with_io(tokio::io::stdin(), tokio::io::stdout())
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, W> LinePrompt<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn with_io(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((BufReader::new(reader), writer)),
        }
    }
}

impl<R, W> fmt::Debug for LinePrompt<R, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinePrompt").finish_non_exhaustive()
    }
}

#[async_trait]
impl<R, W> Prompt for LinePrompt<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn confirm(&self, summary: &str) -> Result<bool> {
        let mut io = self.io.lock().await;
        let (reader, writer) = &mut *io;
        writer
            .write_all(format!("{}\nApply these changes? [y/N] ", summary).as_bytes())
            .await?;
        writer.flush().await?;

        let mut answer = String::new();
        reader.read_line(&mut answer).await?;
        Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

/// How change sets are confirmed
pub enum ConfirmPolicy {
    AutoApprove,
    DryRun,
    Interactive(Box<dyn Prompt>),
}

impl ConfirmPolicy {
    /// Policy for the `--dry-run` / `--yes` flags; dry run wins
    pub fn from_flags(dry_run: bool, yes: bool) -> Self {
        if dry_run {
            ConfirmPolicy::DryRun
        } else if yes {
            ConfirmPolicy::AutoApprove
        } else {
            ConfirmPolicy::Interactive(Box::new(StdinPrompt::new()))
        }
    }

    /// Decide whether the change set described by `summary` is applied
    pub async fn decide(&self, summary: &str) -> Result<Decision> {
        match self {
            ConfirmPolicy::AutoApprove => Ok(Decision::Proceed),
            ConfirmPolicy::DryRun => Ok(Decision::Skip(SkipReason::DryRun)),
            ConfirmPolicy::Interactive(prompt) => Ok(if prompt.confirm(summary).await? {
                Decision::Proceed
            } else {
                Decision::Skip(SkipReason::Declined)
            }),
        }
    }
}

impl fmt::Debug for ConfirmPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmPolicy::AutoApprove => f.write_str("AutoApprove"),
            ConfirmPolicy::DryRun => f.write_str("DryRun"),
            ConfirmPolicy::Interactive(_) => f.write_str("Interactive"),
        }
    }
}

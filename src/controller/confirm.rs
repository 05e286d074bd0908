//! # Operator Confirmation
//!
//! Every mutating run asks the operator first. Anything other than an explicit
//! "yes" (empty input, invalid input, end of input, Ctrl+C, or the timeout)
//! cancels the operation before any remote write happens.

use async_trait::async_trait;
use std::io::Write;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Accepted,
    Declined,
    TimedOut,
    Interrupted,
}

impl Confirmation {
    #[must_use]
    pub fn is_accepted(self) -> bool {
        self == Confirmation::Accepted
    }

    /// Interpret a typed answer; only `y`/`yes` (any case) accept
    #[must_use]
    pub fn from_answer(answer: &str) -> Self {
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Confirmation::Accepted,
            _ => Confirmation::Declined,
        }
    }
}

#[async_trait]
pub trait ConfirmationProvider: Send + Sync {
    /// Ask the operator to confirm `prompt`
    ///
    /// # Errors
    ///
    /// Fails only when the prompt cannot be written or input cannot be read.
    async fn confirm(&self, prompt: &str) -> std::io::Result<Confirmation>;
}

/// Interactive prompt on stdin with a timeout
#[derive(Debug, Clone)]
pub struct StdinConfirmation {
    timeout: Duration,
}

impl StdinConfirmation {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ConfirmationProvider for StdinConfirmation {
    async fn confirm(&self, prompt: &str) -> std::io::Result<Confirmation> {
        {
            let mut stdout = std::io::stdout();
            write!(stdout, "{prompt} [y/N]: ")?;
            stdout.flush()?;
        }

        let answer = read_line_in_background(|line| std::io::stdin().read_line(line))?;
        wait_for_answer(answer, self.timeout).await
    }
}

type PendingAnswer = oneshot::Receiver<std::io::Result<Option<String>>>;

/// Read one line on a detached thread
///
/// A blocked read on a runtime thread would hold up shutdown after a timeout
/// or Ctrl+C; a detached thread is simply abandoned when the process exits.
fn read_line_in_background<F>(read: F) -> std::io::Result<PendingAnswer>
where
    F: FnOnce(&mut String) -> std::io::Result<usize> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("confirm-stdin".to_string())
        .spawn(move || {
            let mut line = String::new();
            let answer = read(&mut line).map(|bytes| (bytes > 0).then_some(line));
            // The prompt may have given up already
            let _ = tx.send(answer);
        })?;
    Ok(rx)
}

async fn wait_for_answer(
    answer: PendingAnswer,
    timeout: Duration,
) -> std::io::Result<Confirmation> {
    let outcome = tokio::select! {
        line = answer => match line {
            Ok(Ok(Some(answer))) => Confirmation::from_answer(&answer),
            Ok(Ok(None)) | Err(_) => Confirmation::Declined,
            Ok(Err(e)) => return Err(e),
        },
        () = tokio::time::sleep(timeout) => {
            println!();
            info!("No answer within {:?}, cancelling", timeout);
            Confirmation::TimedOut
        }
        _ = tokio::signal::ctrl_c() => {
            println!();
            Confirmation::Interrupted
        }
    };

    Ok(outcome)
}

/// Non-interactive mode: every prompt is accepted
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

#[async_trait]
impl ConfirmationProvider for AssumeYes {
    async fn confirm(&self, prompt: &str) -> std::io::Result<Confirmation> {
        info!("{} (confirmed non-interactively)", prompt);
        Ok(Confirmation::Accepted)
    }
}

//! Anti-bot challenge detection and the manual resume signal.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::error::RenderError;

/// Phrases that only appear on challenge interstitials.
pub const CHALLENGE_PHRASES: &[&str] = &["unusual traffic from your computer network", "not a robot"];

/// Returns true when `text` contains any challenge phrase.
#[must_use]
pub fn is_challenge(text: &str) -> bool {
    CHALLENGE_PHRASES.iter().any(|phrase| text.contains(phrase))
}

/// Blocks until a human reports the challenge in the browser as solved.
///
/// Called while the rendered page still shows a challenge; the fetcher
/// re-checks the page after every return.
///
/// # Object Safety
///
/// Uses `async_trait` so sessions can hold a `Box<dyn ChallengeResolver>`.
#[async_trait]
pub trait ChallengeResolver: Send + Sync {
    /// Waits, without timeout, for the resolution signal for `url`.
    async fn wait_for_resolution(&self, url: &str) -> Result<(), RenderError>;
}

/// Prompts on stderr and waits for Enter on stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

#[async_trait]
impl ChallengeResolver for TerminalPrompt {
    async fn wait_for_resolution(&self, url: &str) -> Result<(), RenderError> {
        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(
                format!(
                    "Challenge page at {url}\nSolve captcha manually and press enter here to continue...\n"
                )
                .as_bytes(),
            )
            .await
            .map_err(RenderError::Resolver)?;
        stderr.flush().await.map_err(RenderError::Resolver)?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(RenderError::Resolver)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_challenge_matches_known_phrases() {
        assert!(is_challenge(
            "Our systems have detected unusual traffic from your computer network."
        ));
        assert!(is_challenge("Please show you're not a robot"));
        assert!(!is_challenge("<div class=\"gs_or\">Deep learning</div>"));
    }

    #[test]
    fn test_is_challenge_is_case_sensitive() {
        assert!(!is_challenge("NOT A ROBOT"));
    }
}

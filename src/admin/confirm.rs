//! Operator confirmation for destructive operations

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin, Stdout};

use crate::error::Result;

/// The only answer that lets a deletion proceed
pub const CONFIRMATION_TOKEN: &str = "yes";

/// Source of operator answers
#[async_trait]
pub trait Confirmer: Send {
    /// Ask whether `topic` may be deleted and return the raw answer
    async fn answer(&mut self, topic: &str) -> Result<String>;
}

/// Check an answer against [`CONFIRMATION_TOKEN`]
///
/// Surrounding whitespace (the trailing newline) is ignored; anything else,
/// including different case, is a refusal.
pub fn is_confirmed(answer: &str) -> bool {
    answer.trim() == CONFIRMATION_TOKEN
}

/// Prompts on stdout and reads one line from stdin per topic
pub struct StdinConfirmer {
    reader: BufReader<Stdin>,
    writer: Stdout,
}

impl StdinConfirmer {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            writer: tokio::io::stdout(),
        }
    }
}

impl Default for StdinConfirmer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Confirmer for StdinConfirmer {
    async fn answer(&mut self, topic: &str) -> Result<String> {
        let prompt = format!(
            "Are you sure you want to permanently delete topic '{}'?\nType '{}' to confirm: ",
            topic, CONFIRMATION_TOKEN
        );
        self.writer.write_all(prompt.as_bytes()).await?;
        self.writer.flush().await?;

        // EOF reads as an empty answer, which is a refusal
        let mut line = String::new();
        self.reader.read_line(&mut line).await?;
        Ok(line)
    }
}

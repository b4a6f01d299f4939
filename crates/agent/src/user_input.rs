//! Yes/no answers to clarification questions.
//!
//! `ConsoleInput` reads a terminal (or any async reader); `ChannelInput` hands
//! each question to an async front-end over a channel and waits for the reply.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tokio::sync::{mpsc, oneshot, Mutex};

use parkwise_core::domain::question::UserQuestion;

/// Raw text recorded when the console reaches end of input.
pub const INTERRUPTED: &str = "interrupted";

#[derive(Debug, Error)]
pub enum UserInputError {
    #[error("user input i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("user input channel closed")]
    Closed,
    #[error("unrecognized answer `{0}` (expected yes or no)")]
    Unrecognized(String),
}

#[async_trait]
pub trait UserInputChannel: Send + Sync {
    /// Returns the raw answer text and its yes/no reading.
    async fn ask(&self, question: &UserQuestion) -> Result<(String, bool), UserInputError>;
}

pub fn parse_answer(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "1" | "true" => Some(true),
        "n" | "no" | "0" | "false" => Some(false),
        _ => None,
    }
}

struct ConsoleIo<R, W> {
    reader: R,
    writer: W,
}

pub struct ConsoleInput<R = BufReader<Stdin>, W = Stdout> {
    io: Mutex<ConsoleIo<R, W>>,
}

impl ConsoleInput {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleInput<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { io: Mutex::new(ConsoleIo { reader, writer }) }
    }

    pub fn into_writer(self) -> W {
        self.io.into_inner().writer
    }
}

#[async_trait]
impl<R, W> UserInputChannel for ConsoleInput<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn ask(&self, question: &UserQuestion) -> Result<(String, bool), UserInputError> {
        let mut io = self.io.lock().await;
        let ConsoleIo { reader, writer } = &mut *io;

        writer.write_all(format!("\n[{}] {}\n", question.id, question.question).as_bytes()).await?;
        if !question.impact.is_empty() {
            writer.write_all(format!("  ({})\n", question.impact).as_bytes()).await?;
        }

        loop {
            writer.write_all(b"answer (y/n): ").await?;
            writer.flush().await?;

            let mut line = String::new();
            if reader.read_line(&mut line).await? == 0 {
                return Ok((INTERRUPTED.to_owned(), false));
            }

            let raw = line.trim().to_owned();
            if let Some(answer) = parse_answer(&raw) {
                return Ok((raw, answer));
            }
        }
    }
}

/// A question waiting for its answer from a front-end.
pub struct PendingQuestion {
    pub question: UserQuestion,
    reply: oneshot::Sender<String>,
}

impl PendingQuestion {
    /// Sends the raw answer text back. Returns `false` if the asker went away.
    pub fn answer(self, raw: impl Into<String>) -> bool {
        self.reply.send(raw.into()).is_ok()
    }
}

pub struct ChannelInput {
    questions: mpsc::Sender<PendingQuestion>,
}

impl ChannelInput {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<PendingQuestion>) {
        let (questions, receiver) = mpsc::channel(buffer.max(1));
        (Self { questions }, receiver)
    }
}

#[async_trait]
impl UserInputChannel for ChannelInput {
    async fn ask(&self, question: &UserQuestion) -> Result<(String, bool), UserInputError> {
        let (reply, answer) = oneshot::channel();
        self.questions
            .send(PendingQuestion { question: question.clone(), reply })
            .await
            .map_err(|_| UserInputError::Closed)?;

        let raw = answer.await.map_err(|_| UserInputError::Closed)?;
        match parse_answer(&raw) {
            Some(value) => Ok((raw.trim().to_owned(), value)),
            None => Err(UserInputError::Unrecognized(raw)),
        }
    }
}

/// Console input when `interactive`, otherwise a channel whose receiving end
/// is returned for the front-end.
pub fn input_for_mode(
    interactive: bool,
) -> (Arc<dyn UserInputChannel>, Option<mpsc::Receiver<PendingQuestion>>) {
    if interactive {
        (Arc::new(ConsoleInput::stdio()), None)
    } else {
        let (input, receiver) = ChannelInput::new(8);
        (Arc::new(input), Some(receiver))
    }
}

#[cfg(test)]
mod tests {
    use parkwise_core::domain::conditions::SpecialCondition;
    use parkwise_core::domain::question::UserQuestion;

    use super::{parse_answer, ChannelInput, ConsoleInput, UserInputChannel, UserInputError};

    fn question() -> UserQuestion {
        UserQuestion {
            id: "q1".to_owned(),
            category: SpecialCondition::BankApp,
            question: "Can you use the bank's mobile app monthly?".to_owned(),
            impact: "Adds 0.5%p".to_owned(),
        }
    }

    #[test]
    fn answers_accept_common_yes_no_spellings() {
        for raw in ["y", "YES", " 1 ", "true"] {
            assert_eq!(parse_answer(raw), Some(true), "{raw}");
        }
        for raw in ["n", "No", "0", "false"] {
            assert_eq!(parse_answer(raw), Some(false), "{raw}");
        }
        assert_eq!(parse_answer("maybe"), None);
    }

    #[tokio::test]
    async fn console_reprompts_until_a_valid_answer() {
        let input = ConsoleInput::new(&b"maybe\n\nyes\n"[..], Vec::new());

        let answer = input.ask(&question()).await.expect("answer");
        assert_eq!(answer, ("yes".to_owned(), true));

        let transcript = String::from_utf8(input.into_writer()).expect("utf8");
        assert_eq!(transcript.matches("answer (y/n): ").count(), 3);
        assert!(transcript.contains("[q1] Can you use the bank's mobile app monthly?"));
    }

    #[tokio::test]
    async fn console_end_of_input_reads_as_interrupted_no() {
        let input = ConsoleInput::new(&b""[..], Vec::new());
        let answer = input.ask(&question()).await.expect("answer");
        assert_eq!(answer, ("interrupted".to_owned(), false));
    }

    #[tokio::test]
    async fn channel_round_trips_through_the_front_end() {
        let (input, mut receiver) = ChannelInput::new(1);
        let front_end = tokio::spawn(async move {
            let pending = receiver.recv().await.expect("question");
            assert_eq!(pending.question.id, "q1");
            pending.answer("n");
        });

        let answer = input.ask(&question()).await.expect("answer");
        front_end.await.expect("front end");
        assert_eq!(answer, ("n".to_owned(), false));
    }

    #[tokio::test]
    async fn channel_reports_closed_and_unrecognized_answers() {
        let (input, receiver) = ChannelInput::new(1);
        drop(receiver);
        let error = input.ask(&question()).await.expect_err("closed");
        assert!(matches!(error, UserInputError::Closed));

        let (input, mut receiver) = ChannelInput::new(1);
        let front_end = tokio::spawn(async move {
            if let Some(pending) = receiver.recv().await {
                pending.answer("perhaps");
            }
        });
        let error = input.ask(&question()).await.expect_err("unrecognized");
        front_end.await.expect("front end");
        assert!(matches!(error, UserInputError::Unrecognized(ref raw) if raw == "perhaps"));
    }
}

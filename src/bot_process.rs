//! One external bot program behind a lockstep actor.
//!
//! [`BotProcess::start`] launches the program with piped stdio and writes its init message.
//! A dedicated thread then owns the pipes: it reads the bot's name, and afterwards answers every
//! turn input with exactly one line of output. Replies of every bot go to a single inbound
//! channel shared with the scheduler, tagged with the player id.
//!
//! The per-bot outbound channel has room for a single message and [`BotProcess::send`] refuses a
//! new input until the previous reply was [accepted](BotProcess::accept), so a bot never has two
//! requests in flight.
//!
//! Faults never block: a program that cannot be started, or that closes its output, answers
//! every request with [`Reply::Closed`]. The bot's stderr is drained by another thread.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::thread;

use anyhow::{bail, Context};
use thiserror::Error;
use tracing::{debug, info, instrument, trace, warn};

use crate::game::PlayerId;

/// Longest line read from a bot, terminator included.
pub const MAX_LINE_BYTES: u64 = 64 * 1024;

/// Program and arguments used to launch a bot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotCommand {
    /// Executable, looked up in `PATH` if it has no path separator.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
}

impl BotCommand {
    /// Command with explicit arguments.
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a command line on whitespace. No quoting is supported.
    ///
    /// # Errors
    /// Returned for a blank line.
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        let mut words = line.split_whitespace();
        let Some(program) = words.next() else {
            bail!("empty bot command");
        };
        Ok(Self::new(program, words))
    }
}

impl std::fmt::Display for BotCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Why a bot stopped answering.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BotFault {
    /// The program could not be launched.
    #[error("could not start bot: {0}")]
    SpawnFailed(String),
    /// The program closed its output (usually because it exited).
    #[error("bot closed its output")]
    EndOfStream,
    /// The program wrote a line longer than [`MAX_LINE_BYTES`].
    #[error("bot wrote a line longer than {MAX_LINE_BYTES} bytes")]
    LineTooLong,
}

/// Answer of a bot to its init message or to a turn input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// One line of output, without its line terminator.
    Line(String),
    /// The bot is gone and will never answer again.
    Closed(BotFault),
}

/// Message sent on the shared inbound channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotMessage {
    /// Player whose bot answered.
    pub player: PlayerId,
    /// The answer.
    pub reply: Reply,
}

/// Scheduler-side handle of a bot actor. Dropping it kills the program.
#[derive(Debug)]
pub struct BotProcess {
    player: PlayerId,
    child: Option<Child>,
    input: Option<SyncSender<String>>,
    inbound: Sender<BotMessage>,
    awaiting_reply: bool,
}

impl BotProcess {
    /// Launch `command` for `player` and write `init` to it.
    ///
    /// The bot's name (or a [`Reply::Closed`]) is later delivered on `inbound`. Launch failures
    /// are reported there too, so this never fails.
    #[instrument(skip_all, fields(player = player))]
    pub fn start(
        player: PlayerId,
        command: &BotCommand,
        init: &str,
        inbound: Sender<BotMessage>,
        debug_stderr: bool,
    ) -> Self {
        let mut handle = Self {
            player,
            child: None,
            input: None,
            inbound,
            awaiting_reply: true,
        };

        let pipes = spawn_piped(command).and_then(|(child, stdin, stdout, stderr)| {
            handle.child = Some(child);
            let (tx, rx) = mpsc::sync_channel(1);
            let actor = Actor {
                player,
                stdin,
                stdout: BufReader::new(stdout),
                inbound: handle.inbound.clone(),
            };
            let init = init.to_string();
            thread::Builder::new()
                .name(format!("bot-{player}"))
                .spawn(move || actor.run(init, rx))
                .context("could not spawn bot thread")?;
            thread::Builder::new()
                .name(format!("bot-{player}-stderr"))
                .spawn(move || drain_stderr(player, stderr, debug_stderr))
                .context("could not spawn stderr thread")?;
            Ok(tx)
        });

        match pipes {
            Ok(tx) => {
                debug!(player, "started {command}");
                handle.input = Some(tx);
            }
            Err(e) => {
                warn!(player, "{e:#}");
                handle.reply_closed(BotFault::SpawnFailed(format!("{e:#}")));
            }
        }
        handle
    }

    /// Player this bot plays for.
    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// True while a request was sent and its reply not [accepted](Self::accept).
    pub fn awaiting_reply(&self) -> bool {
        self.awaiting_reply
    }

    /// Send one turn input to the bot.
    ///
    /// # Errors
    /// Returned when the reply to the previous request was not accepted yet.
    pub fn send(&mut self, text: &str) -> anyhow::Result<()> {
        if self.awaiting_reply {
            bail!(
                "player {}: previous reply was not consumed before sending a new input",
                self.player
            );
        }
        self.awaiting_reply = true;

        let Some(input) = &self.input else {
            self.reply_closed(BotFault::EndOfStream);
            return Ok(());
        };
        match input.try_send(text.to_string()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Disconnected(_)) => {
                // The actor thread is gone.
                self.input = None;
                self.reply_closed(BotFault::EndOfStream);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                bail!("player {}: bot input channel is full", self.player)
            }
        }
    }

    /// Mark the pending reply as consumed, allowing the next [`send`](Self::send).
    pub fn accept(&mut self) {
        self.awaiting_reply = false;
    }

    fn reply_closed(&self, fault: BotFault) {
        // The scheduler may already be gone.
        let _ = self.inbound.send(BotMessage {
            player: self.player,
            reply: Reply::Closed(fault),
        });
    }

    fn kill_child_process(&mut self) -> anyhow::Result<()> {
        if let Some(mut child) = self.child.take() {
            if child.try_wait().context("could not poll bot process")?.is_none() {
                child.kill().context("could not kill bot process")?;
            }
            child.wait().context("could not reap bot process")?;
        }
        Ok(())
    }
}

impl Drop for BotProcess {
    fn drop(&mut self) {
        self.input = None;
        if let Err(e) = self.kill_child_process() {
            warn!(player = self.player, "{e:#}");
        }
    }
}

fn spawn_piped(
    command: &BotCommand,
) -> anyhow::Result<(Child, ChildStdin, ChildStdout, ChildStderr)> {
    let mut child = Command::new(&command.program)
        .args(&command.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("command '{command}' could not be launched"))?;

    match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
        (Some(stdin), Some(stdout), Some(stderr)) => Ok((child, stdin, stdout, stderr)),
        _ => {
            let _ = child.kill();
            let _ = child.wait();
            bail!("command '{command}' has no piped stdio")
        }
    }
}

struct Actor {
    player: PlayerId,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    inbound: Sender<BotMessage>,
}

impl Actor {
    fn run(mut self, init: String, input: Receiver<String>) {
        let reply = self.exchange(&init);
        let mut open = match self.forward(reply) {
            Some(open) => open,
            None => return,
        };
        // A closed bot keeps answering so that the scheduler never waits on it.
        while let Ok(text) = input.recv() {
            let reply = if open {
                self.exchange(&text)
            } else {
                Reply::Closed(BotFault::EndOfStream)
            };
            open = match self.forward(reply) {
                Some(open) => open,
                None => return,
            };
        }
        trace!(player = self.player, "bot handle dropped");
    }

    /// Send a reply to the scheduler. Returns whether the bot is still open, `None` once the
    /// scheduler is gone.
    fn forward(&self, reply: Reply) -> Option<bool> {
        let open = matches!(reply, Reply::Line(_));
        self.inbound
            .send(BotMessage {
                player: self.player,
                reply,
            })
            .ok()
            .map(|()| open)
    }

    /// Write one message and read the answer.
    ///
    /// A bot may answer and close its input before the write, so the answer is read anyway.
    fn exchange(&mut self, text: &str) -> Reply {
        if let Err(e) = self.write_line(text) {
            debug!(player = self.player, "write failed: {e}");
        }
        self.read_line()
    }

    fn write_line(&mut self, text: &str) -> std::io::Result<()> {
        self.stdin.write_all(text.as_bytes())?;
        self.stdin.write_all(b"\n")?;
        self.stdin.flush()
    }

    fn read_line(&mut self) -> Reply {
        let mut buf = Vec::new();
        match (&mut self.stdout)
            .take(MAX_LINE_BYTES)
            .read_until(b'\n', &mut buf)
        {
            Ok(0) => Reply::Closed(BotFault::EndOfStream),
            Ok(n) if n as u64 == MAX_LINE_BYTES && buf.last() != Some(&b'\n') => {
                warn!(player = self.player, "line too long, closing");
                Reply::Closed(BotFault::LineTooLong)
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                Reply::Line(line.trim_end_matches(['\n', '\r']).to_string())
            }
            Err(e) => {
                debug!(player = self.player, "read failed: {e}");
                Reply::Closed(BotFault::EndOfStream)
            }
        }
    }
}

/// Read stderr to the end. Lines are cut at [`MAX_LINE_BYTES`], the rest is dropped.
fn drain_stderr(player: PlayerId, stderr: ChildStderr, forward: bool) {
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    let mut in_overlong_line = false;
    loop {
        buf.clear();
        match (&mut reader).take(MAX_LINE_BYTES).read_until(b'\n', &mut buf) {
            Ok(0) | Err(_) => return,
            Ok(_) => {
                if forward && !in_overlong_line {
                    let line = String::from_utf8_lossy(&buf);
                    info!(player, "{}", line.trim_end());
                }
                in_overlong_line = buf.last() != Some(&b'\n');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_lines_split_on_whitespace() {
        let command = BotCommand::parse("  python3  bot.py --fast ").unwrap();
        assert_eq!(command, BotCommand::new("python3", ["bot.py", "--fast"]));
        assert_eq!(command.to_string(), "python3 bot.py --fast");
        assert!(BotCommand::parse(" \t").is_err());
    }

    #[test]
    fn missing_program_reports_spawn_failure() {
        let (tx, rx) = mpsc::channel();
        let command = BotCommand::new("/nonexistent/dubnium-bot", Vec::<String>::new());
        let mut bot = BotProcess::start(3, &command, "hello", tx, false);
        let message = rx.recv().unwrap();
        assert_eq!(message.player, 3);
        assert!(matches!(message.reply, Reply::Closed(BotFault::SpawnFailed(_))));

        assert!(bot.send("turn").is_err());
        bot.accept();
        bot.send("turn").unwrap();
        assert_eq!(
            rx.recv().unwrap().reply,
            Reply::Closed(BotFault::EndOfStream)
        );
    }

    #[cfg(unix)]
    #[test]
    fn echo_bot_answers_in_lockstep() {
        let (tx, rx) = mpsc::channel();
        let command = BotCommand::new("sh", ["-c", "read a; echo \"name $a\"; while read l; do echo \"got $l\"; done"]);
        let mut bot = BotProcess::start(0, &command, "init", tx, false);
        assert_eq!(rx.recv().unwrap().reply, Reply::Line("name init".into()));
        bot.accept();
        for i in 0..3 {
            bot.send(&format!("turn {i}")).unwrap();
            assert!(bot.awaiting_reply());
            assert_eq!(rx.recv().unwrap().reply, Reply::Line(format!("got turn {i}")));
            bot.accept();
        }
    }

    #[cfg(unix)]
    #[test]
    fn overlong_line_closes_the_bot() {
        let (tx, rx) = mpsc::channel();
        let script = "head -c 200000 /dev/zero | tr '\\0' x; echo; exec sleep 30";
        let mut bot = BotProcess::start(2, &BotCommand::new("sh", ["-c", script]), "init", tx, false);
        assert_eq!(rx.recv().unwrap().reply, Reply::Closed(BotFault::LineTooLong));
        bot.accept();
        bot.send("turn").unwrap();
        assert_eq!(rx.recv().unwrap().reply, Reply::Closed(BotFault::EndOfStream));
    }

    #[cfg(unix)]
    #[test]
    fn flooding_stderr_does_not_block_the_bot() {
        let (tx, rx) = mpsc::channel();
        let script = "head -c 500000 /dev/zero | tr '\\0' x >&2; echo flooder";
        let _bot = BotProcess::start(0, &BotCommand::new("sh", ["-c", script]), "init", tx, true);
        assert_eq!(rx.recv().unwrap().reply, Reply::Line("flooder".into()));
    }

    #[cfg(unix)]
    #[test]
    fn name_is_read_even_if_the_bot_closed_its_input() {
        let (tx, rx) = mpsc::channel();
        let command = BotCommand::new("sh", ["-c", "exec 0<&-; echo early; exec sleep 30"]);
        let _bot = BotProcess::start(0, &command, &"x".repeat(200_000), tx, false);
        assert_eq!(rx.recv().unwrap().reply, Reply::Line("early".into()));
    }

    #[cfg(unix)]
    #[test]
    fn exiting_bot_reports_end_of_stream() {
        let (tx, rx) = mpsc::channel();
        let command = BotCommand::new("true", Vec::<String>::new());
        let mut bot = BotProcess::start(1, &command, "init", tx, false);
        assert_eq!(rx.recv().unwrap().reply, Reply::Closed(BotFault::EndOfStream));
        bot.accept();
        bot.send("turn").unwrap();
        assert_eq!(rx.recv().unwrap().reply, Reply::Closed(BotFault::EndOfStream));
    }
}

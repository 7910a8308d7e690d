use crate::collectors::{CollectError, Collector, MetricsSource};
use crate::present::{render_live, Styling};
use crate::snapshot::LiveReading;
use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use std::future::Future;
use std::io::{self, IsTerminal, Write};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const STOPPED_NOTICE: &str = "Live monitoring stopped by user.";

#[derive(Debug, Error)]
pub enum LiveError {
    #[error(transparent)]
    Collect(#[from] CollectError),
    #[error("failed to draw live view: {0}")]
    Screen(#[from] io::Error),
}

pub trait LiveSampler {
    fn sample(&mut self) -> Result<LiveReading, CollectError>;
}

impl<S: MetricsSource> LiveSampler for Collector<S> {
    fn sample(&mut self) -> Result<LiveReading, CollectError> {
        self.sample_live()
    }
}

/// Surface the live view is drawn on.
pub trait Screen {
    fn clear(&mut self) -> io::Result<()>;
    fn render(&mut self, reading: &LiveReading) -> io::Result<()>;
    fn notice(&mut self, text: &str) -> io::Result<()>;
}

pub struct TerminalScreen<W: Write> {
    out: W,
    styling: Styling,
    is_tty: bool,
}

impl TerminalScreen<io::Stdout> {
    pub fn stdout(styling: Styling) -> Self {
        let out = io::stdout();
        let is_tty = out.is_terminal();
        Self::new(out, styling, is_tty)
    }
}

impl<W: Write> TerminalScreen<W> {
    /// Wraps any writer; escape sequences are only emitted when `is_tty` is set.
    pub fn new(out: W, styling: Styling, is_tty: bool) -> Self {
        Self {
            out,
            styling,
            is_tty,
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Screen for TerminalScreen<W> {
    fn clear(&mut self) -> io::Result<()> {
        if self.is_tty {
            execute!(self.out, Clear(ClearType::All), MoveTo(0, 0))
        } else {
            // No terminal control: scroll instead.
            writeln!(self.out)
        }
    }

    fn render(&mut self, reading: &LiveReading) -> io::Result<()> {
        render_live(&mut self.out, reading, self.styling)?;
        self.out.flush()
    }

    fn notice(&mut self, text: &str) -> io::Result<()> {
        match self.styling {
            Styling::Color => writeln!(self.out, "\n{}", text.to_string().red())?,
            Styling::Plain => writeln!(self.out, "\n{text}")?,
        }
        self.out.flush()
    }
}

/// Redraws CPU and memory usage every `interval` until `cancel` resolves.
///
/// Cancellation is observed between ticks. Returns the number of completed
/// renders; a sampling or drawing failure ends the loop with an error.
pub async fn run<L, D, C>(
    sampler: &mut L,
    screen: &mut D,
    interval: Duration,
    cancel: C,
) -> Result<u64, LiveError>
where
    L: LiveSampler,
    D: Screen,
    C: Future<Output = ()>,
{
    tokio::pin!(cancel);
    let mut ticks = 0_u64;

    loop {
        screen.clear()?;
        let reading = sampler.sample()?;
        screen.render(&reading)?;
        ticks += 1;
        debug!(
            tick = ticks,
            cpu = reading.cpu_usage_percent,
            memory = reading.memory_usage_percent,
            "live tick"
        );

        tokio::select! {
            biased;
            _ = &mut cancel => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }

    info!(ticks, "live monitoring stopped");
    screen.notice(STOPPED_NOTICE)?;
    Ok(ticks)
}

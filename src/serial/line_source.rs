//! Trait abstraction for line-oriented stream reads to enable testing

use async_trait::async_trait;
use std::io;

/// Outcome of one blocking read against the line source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// One complete line, trailing newline stripped
    Line(String),
    /// Idle timeout elapsed with no data; gives the reader loop a chance to
    /// observe a disconnect request even when the device is silent
    Idle,
    /// Stream closed by the other side
    Eof,
}

/// Trait for newline-delimited stream sources
#[async_trait]
pub trait LineSource: Send {
    /// Block until a full line arrives, the idle timeout fires, or the
    /// stream ends
    async fn read_line(&mut self) -> io::Result<LineEvent>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;

    /// Scripted line source for testing the reader loop
    ///
    /// Yields the queued events in order, then `Eof` forever.
    pub struct ScriptedLineSource {
        events: VecDeque<io::Result<LineEvent>>,
    }

    impl ScriptedLineSource {
        pub fn new(events: Vec<io::Result<LineEvent>>) -> Self {
            Self { events: events.into() }
        }

        /// Convenience: a source that yields these lines then Eof
        pub fn from_lines(lines: &[&str]) -> Self {
            Self::new(
                lines
                    .iter()
                    .map(|line| Ok(LineEvent::Line(line.to_string())))
                    .collect(),
            )
        }
    }

    #[async_trait]
    impl LineSource for ScriptedLineSource {
        async fn read_line(&mut self) -> io::Result<LineEvent> {
            match self.events.pop_front() {
                Some(event) => event,
                None => Ok(LineEvent::Eof),
            }
        }
    }
}

//! Structured logging for the modem pipelines.
//!
//! Hosts that embed the decoder (audio callbacks, WASM) often cannot
//! read stderr, so messages are retained in a bounded ring and drained
//! through the owning pipeline. Every entry is tagged with the pipeline
//! stage its subsystem belongs to, and each stage carries its own level
//! floor: one predicate decides both questions at once.

use std::collections::VecDeque;
use std::fmt;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        })
    }
}

/// Pipeline stage a subsystem tag belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Signal gating, preamble search, mode locking.
    Sync,
    /// Header and data frame handling.
    Framing,
    /// Inner and outer error correction.
    Fec,
    /// Anything else, including finalize-time crypto.
    General,
}

impl Stage {
    pub fn of(subsystem: &str) -> Stage {
        match subsystem {
            "SYNC" | "MODE" | "CHIRP" => Stage::Sync,
            "HEADER" | "FRAME" | "SESSION" => Stage::Framing,
            "FEC" | "RS" | "VITERBI" => Stage::Fec,
            _ => Stage::General,
        }
    }
}

/// Logging configuration: one level floor per stage plus retention.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub sync_floor: LogLevel,
    pub framing_floor: LogLevel,
    pub fec_floor: LogLevel,
    pub general_floor: LogLevel,

    /// Entries retained; the oldest fall off first. Zero disables the
    /// logger entirely.
    pub capacity: usize,

    /// Mirror retained entries to stderr as they arrive.
    pub echo_stderr: bool,
}

impl LogConfig {
    /// The same floor for every stage.
    pub fn uniform(floor: LogLevel, capacity: usize) -> Self {
        Self {
            sync_floor: floor,
            framing_floor: floor,
            fec_floor: floor,
            general_floor: floor,
            capacity,
            echo_stderr: false,
        }
    }

    /// Verbose logging for debugging, echoed to stderr.
    pub fn verbose() -> Self {
        Self {
            echo_stderr: true,
            ..Self::uniform(LogLevel::Debug, 5000)
        }
    }

    /// Quiet logging for production.
    pub fn quiet() -> Self {
        Self::uniform(LogLevel::Warn, 100)
    }

    fn floor(&self, stage: Stage) -> LogLevel {
        match stage {
            Stage::Sync => self.sync_floor,
            Stage::Framing => self.framing_floor,
            Stage::Fec => self.fec_floor,
            Stage::General => self.general_floor,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::uniform(LogLevel::Info, 1000)
    }
}

/// A single retained entry.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub level: LogLevel,
    pub stage: Stage,
    pub subsystem: &'static str,
    pub message: String,
}

/// Bounded, stage-filtered log ring.
#[derive(Debug, Clone, Default)]
pub struct SignalLogger {
    config: LogConfig,
    ring: VecDeque<LogEntry>,
}

impl SignalLogger {
    pub fn new(config: LogConfig) -> Self {
        let ring = VecDeque::with_capacity(config.capacity.min(1024));
        Self { config, ring }
    }

    /// Record one message. Entries below their stage's floor are
    /// dropped; a full ring evicts from the oldest end.
    pub fn log(&mut self, level: LogLevel, subsystem: &'static str, message: impl fmt::Display) {
        let stage = Stage::of(subsystem);
        if self.config.capacity == 0 || level < self.config.floor(stage) {
            return;
        }

        if self.config.echo_stderr {
            eprintln!("[{level}] {subsystem}: {message}");
        }

        while self.ring.len() >= self.config.capacity {
            self.ring.pop_front();
        }
        self.ring.push_back(LogEntry {
            level,
            stage,
            subsystem,
            message: message.to_string(),
        });
    }

    pub fn debug(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Debug, subsystem, message);
    }

    pub fn info(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Info, subsystem, message);
    }

    pub fn warn(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Warn, subsystem, message);
    }

    pub fn error(&mut self, subsystem: &'static str, message: impl fmt::Display) {
        self.log(LogLevel::Error, subsystem, message);
    }

    /// Retained entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.ring.iter()
    }

    /// Retained entries of one pipeline stage, oldest first.
    pub fn stage_entries(&self, stage: Stage) -> impl Iterator<Item = &LogEntry> {
        self.ring.iter().filter(move |entry| entry.stage == stage)
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl fmt::Display for SignalLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.ring {
            writeln!(f, "[{}] {}: {}", entry.level, entry.subsystem, entry.message)?;
        }
        Ok(())
    }
}

//! Non-blocking log capture for `no_std` environments.
//!
//! Components log through the `log` facade. [`QueueLogger`] formats each
//! record into a fixed-size line and pushes it into a bounded [`LogQueue`]
//! built on `critical-section` and `heapless::Deque`. The supervisor drains
//! the queue into a [`LogSink`] once per tick, after the frame is flushed,
//! so writing the two text logs never delays rendering.

use core::{
    cell::{Cell, RefCell},
    fmt::Write,
};

use critical_section::Mutex;
use embassy_time::Instant;
use heapless::Deque;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Longest stored line; longer messages are cut
pub const LINE_CAPACITY: usize = 128;

/// Default queue depth used by [`init`]
pub const QUEUE_SIZE: usize = 32;

pub type LineText = heapless::String<LINE_CAPACITY>;

/// One formatted log record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub text: LineText,
}

impl LogLine {
    /// Lines at `Warn` and above also go to the error log
    pub fn is_error(&self) -> bool {
        self.level <= Level::Warn
    }
}

/// Destination for drained lines: the error log and the trace log
pub trait LogSink {
    fn append_error(&mut self, line: &str);

    fn append_trace(&mut self, line: &str);

    /// Truncate both logs
    fn clear(&mut self);
}

/// Bounded log queue that never blocks the producer.
///
/// When full, the oldest line is discarded to make room and the drop is
/// counted.
pub struct LogQueue<const SIZE: usize> {
    inner: Mutex<RefCell<Deque<LogLine, SIZE>>>,
    dropped: Mutex<Cell<u32>>,
    now_ms: Mutex<Cell<u64>>,
}

impl<const SIZE: usize> LogQueue<SIZE> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Deque::new())),
            dropped: Mutex::new(Cell::new(0)),
            now_ms: Mutex::new(Cell::new(0)),
        }
    }

    /// Timestamp stamped on subsequent lines
    pub fn set_timestamp(&self, now: Instant) {
        critical_section::with(|cs| self.now_ms.borrow(cs).set(now.as_millis()));
    }

    pub fn timestamp_ms(&self) -> u64 {
        critical_section::with(|cs| self.now_ms.borrow(cs).get())
    }

    pub fn push(&self, line: LogLine) {
        critical_section::with(|cs| {
            let mut queue = self.inner.borrow(cs).borrow_mut();
            if queue.is_full() {
                queue.pop_front();
                let dropped = self.dropped.borrow(cs);
                dropped.set(dropped.get().saturating_add(1));
            }
            // Cannot fail: a slot was freed above when full
            let _ = queue.push_back(line);
        });
    }

    pub fn pop(&self) -> Option<LogLine> {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().pop_front())
    }

    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lines discarded because the queue was full
    pub fn dropped(&self) -> u32 {
        critical_section::with(|cs| self.dropped.borrow(cs).get())
    }

    /// Move every queued line into `sink`, returning how many were moved
    pub fn drain_into(&self, sink: &mut impl LogSink) -> usize {
        let mut count = 0;
        while let Some(line) = self.pop() {
            if line.is_error() {
                sink.append_error(&line.text);
            }
            sink.append_trace(&line.text);
            count += 1;
        }
        count
    }
}

impl<const SIZE: usize> Default for LogQueue<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

/// `log` backend writing into a [`LogQueue`]
pub struct QueueLogger<'a, const SIZE: usize> {
    queue: &'a LogQueue<SIZE>,
    max_level: LevelFilter,
}

impl<'a, const SIZE: usize> QueueLogger<'a, SIZE> {
    pub const fn new(queue: &'a LogQueue<SIZE>, max_level: LevelFilter) -> Self {
        Self { queue, max_level }
    }

    pub const fn queue(&self) -> &'a LogQueue<SIZE> {
        self.queue
    }

    /// Format a record as `<ms>: LEVEL target: message`
    pub fn format(&self, record: &Record<'_>) -> LogLine {
        let mut text = LineText::new();
        let mut writer = Truncating(&mut text);
        let _ = write!(
            writer,
            "{}: {} {}: {}",
            self.queue.timestamp_ms(),
            record.level(),
            record.target(),
            record.args()
        );
        LogLine {
            level: record.level(),
            text,
        }
    }
}

impl<const SIZE: usize> Log for QueueLogger<'_, SIZE> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = self.format(record);
        #[cfg(feature = "esp32-log")]
        esp_println::println!("{}", line.text);
        self.queue.push(line);
    }

    fn flush(&self) {}
}

/// Writer that keeps as many whole characters as fit and drops the rest
struct Truncating<'a>(&'a mut LineText);

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for ch in s.chars() {
            if self.0.push(ch).is_err() {
                break;
            }
        }
        Ok(())
    }
}

static QUEUE: LogQueue<QUEUE_SIZE> = LogQueue::new();
static LOGGER: QueueLogger<'static, QUEUE_SIZE> = QueueLogger::new(&QUEUE, LevelFilter::Info);

/// Install the global queue logger
///
/// Returns the queue to drain. Calling it again keeps the first logger.
pub fn init() -> &'static LogQueue<QUEUE_SIZE> {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Info);
    }
    &QUEUE
}

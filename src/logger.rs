use core::fmt::Write;
use core::sync::atomic::{AtomicUsize, Ordering};

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

/// `Log` implementation over any text sink.
///
/// A record that arrives while the sink is locked is dropped.
pub struct KernelLogger<W: Write + Send> {
    sink: Mutex<Option<W>>,
    max_level: AtomicUsize,
}

impl<W: Write + Send> KernelLogger<W> {
    pub const fn new() -> Self {
        Self {
            sink: Mutex::new(None),
            max_level: AtomicUsize::new(LevelFilter::Off as usize),
        }
    }

    /// Hands `sink` to the logger without registering it with `log`.
    pub fn attach(&self, sink: W, level: LevelFilter) {
        *self.sink.lock() = Some(sink);
        self.max_level.store(level as usize, Ordering::Relaxed);
    }

    /// Installs the logger as the global `log` backend.
    pub fn init(&'static self, sink: W, level: LevelFilter) -> Result<(), SetLoggerError> {
        self.attach(sink, level);
        log::set_logger(self)?;
        log::set_max_level(level);
        Ok(())
    }

    /// Runs `f` on the sink, if one is attached and not busy.
    pub fn with_sink<R>(&self, f: impl FnOnce(&mut W) -> R) -> Option<R> {
        let mut guard = self.sink.try_lock()?;
        guard.as_mut().map(f)
    }
}

impl<W: Write + Send> Default for KernelLogger<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Log for KernelLogger<W> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() as usize <= self.max_level.load(Ordering::Relaxed)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.with_sink(|sink| {
            let _ = writeln!(
                sink,
                "[{:5}] {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        });
    }

    fn flush(&self) {}
}

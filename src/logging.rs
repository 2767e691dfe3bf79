use flexi_logger::{DeferredNow, Logger, LoggerHandle};
use log::Record;
use std::io::Write;

pub fn init(default_spec: &str) -> Result<LoggerHandle, flexi_logger::FlexiLoggerError> {
    Logger::try_with_env_or_str(default_spec)?
        .format(cli_format)
        .log_to_stderr()
        .start()
}

fn cli_format(
    w: &mut dyn Write,
    now: &mut DeferredNow,
    record: &Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {:<5} [{}] {}",
        now.format("%H:%M:%S%.3f"),
        record.level(),
        record.module_path().unwrap_or("<unnamed>"),
        record.args()
    )
}

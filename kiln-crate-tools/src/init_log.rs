use std::io::Write;

/// Environment variable holding an env_logger filter, e.g. `KILN_LOG=kiln_renderer=debug,info`
pub const LOG_ENV: &str = "KILN_LOG";

fn level_color(level: log::Level) -> Option<anstyle::AnsiColor> {
    match level {
        log::Level::Error => Some(anstyle::AnsiColor::Red),
        log::Level::Warn => Some(anstyle::AnsiColor::Yellow),
        log::Level::Info => Some(anstyle::AnsiColor::Green),
        _ => None,
    }
}

/// Short file name from a record path, for both `/` and `\` separators
fn short_file(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Install the global logger.
///
/// Output line: `[time] LEVEL [file:line] (thread) message`. The thread name matters once the
/// recording lanes start logging from the worker pool.
///
/// Calling it twice is harmless; the second call is ignored.
pub fn init_log() {
    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            let level_style = match level_color(record.level()) {
                Some(color) => buf.default_level_style(record.level()).fg_color(Some(anstyle::Color::Ansi(color))),
                None => buf.default_level_style(record.level()),
            };
            let grey_style = anstyle::Style::new().fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(110, 110, 110))));
            let text_style = anstyle::Style::new().fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(75, 75, 75))));

            let line = record.line().unwrap_or(!0);
            let file = short_file(record.file().unwrap_or(""));
            let time = chrono::Local::now().format("%H:%M:%S%.3f");
            let level = record.level();
            let thread = std::thread::current();
            let thread_name = thread.name().unwrap_or("unnamed");

            writeln!(
                buf,
                "{level_style}[{time}] {level}{level_style:#} {grey_style}[{file}:{line}] ({thread_name}){grey_style:#} \
                 {text_style}{}{text_style:#}",
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info);

    if let Ok(filters) = std::env::var(LOG_ENV) {
        builder.parse_filters(&filters);
    }

    // tests install it more than once
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_file() {
        assert_eq!(short_file("engine/crates/kiln-gfx/src/gfx.rs"), "gfx.rs");
        assert_eq!(short_file("engine\\crates\\kiln-gfx\\src\\gfx.rs"), "gfx.rs");
        assert_eq!(short_file("main.rs"), "main.rs");
    }

    #[test]
    fn test_init_twice() {
        init_log();
        init_log();
        log::info!("logger installed");
    }
}

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use chrono::Local;
use env_logger::Env;

/// Initialises the global logger. `RUST_LOG` overrides the default `info` filter.
pub fn init_logger(file_path: Option<&Path>) -> io::Result<()> {
    let env = Env::default().filter_or("RUST_LOG", "info");
    let mut logger = env_logger::Builder::from_env(env);
    logger.format(|buf, record| {
        writeln!(
            buf,
            "{} {:>7} {}",
            Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
            format!("[{}]", record.level()),
            record.args()
        )
    });

    if let Some(path) = file_path {
        let target = Box::new(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?,
        );
        logger.target(env_logger::Target::Pipe(target));
    }

    // A second init (e.g. from tests) is harmless.
    let _ = logger.try_init();
    Ok(())
}

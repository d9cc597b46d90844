mod session;

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use dhc_core::config::{user_config_path, Config};
use dhc_core::{DhcEngine, Keymap, Preset};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

/// `dhc.log` next to the user config file, or in the working directory when
/// there is no config dir.
fn log_path() -> PathBuf {
    user_config_path()
        .and_then(|config| config.parent().map(|dir| dir.join("dhc.log")))
        .unwrap_or_else(|| PathBuf::from("dhc.log"))
}

fn log_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

fn init_logging(verbose: bool) {
    let path = log_path();
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }

    let file = match File::create(&path).or_else(|_| File::create("/tmp/dhc.log")) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("dhc-play: no log file ({}), logging disabled", e);
            return;
        }
    };

    // engine/piper/keymap targets are what tell the modules apart
    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Error)
        .set_thread_level(LevelFilter::Off)
        .build();
    let level = log_level(verbose);
    if let Err(e) = WriteLogger::init(level, config, file) {
        eprintln!("dhc-play: logging disabled: {}", e);
        return;
    }
    log::info!("dhc-play {} logging to {} at {:?}", env!("CARGO_PKG_VERSION"), path.display(), level);
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1).cloned())
}

fn build_engine(args: &[String]) -> dhc_core::Result<DhcEngine> {
    let config = Config::load();
    let mut engine = DhcEngine::try_from(&config)?;

    if let Some(path) = arg_value(args, "--preset") {
        let preset = Preset::load(&PathBuf::from(&path))?;
        preset.apply(&mut engine)?;
    }
    if let Some(path) = arg_value(args, "--keymap") {
        engine.set_keymap(Keymap::load(&PathBuf::from(&path))?);
    }
    Ok(engine)
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose);

    let mut engine = match build_engine(&args) {
        Ok(engine) => engine,
        Err(e) => {
            log::error!("startup failed: {}", e);
            eprintln!("dhc-play: {}", e);
            std::process::exit(1);
        }
    };

    // Events come from the first positional argument, or stdin
    let input_path = args
        .iter()
        .skip(1)
        .enumerate()
        .find(|(i, a)| {
            !a.starts_with('-')
                && !matches!(args.get(*i).map(String::as_str), Some("--keymap" | "--preset"))
        })
        .map(|(_, a)| a.clone());
    let reader: Box<dyn BufRead> = match input_path {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(std::io::stdin())),
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let parsed = match session::parse_line(&line) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("line {}: {}", n + 1, e);
                eprintln!("line {}: {}", n + 1, e);
                continue;
            }
        };

        match session::apply(&mut engine, parsed) {
            Ok(result) => {
                for notice in &result.notices {
                    eprintln!("line {}: {}", n + 1, notice);
                }
                for directive in &result.directives {
                    writeln!(out, "{}", session::describe(directive, engine.settings()))?;
                }
            }
            Err(e) => {
                log::warn!("line {}: {}", n + 1, e);
                eprintln!("line {}: {}", n + 1, e);
            }
        }
    }

    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_sits_beside_user_config() {
        let path = log_path();
        assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("dhc.log"));
        if let Some(config) = user_config_path() {
            assert_eq!(path.parent(), config.parent());
        }
    }

    #[test]
    fn verbose_selects_debug() {
        assert_eq!(log_level(true), LevelFilter::Debug);
        assert_eq!(log_level(false), LevelFilter::Warn);
    }

    #[test]
    fn flag_values_follow_their_flag() {
        let args: Vec<String> = ["dhc-play", "--keymap", "k.txt", "-v"].iter().map(|s| s.to_string()).collect();
        assert_eq!(arg_value(&args, "--keymap"), Some("k.txt".to_string()));
        assert_eq!(arg_value(&args, "--preset"), None);
    }
}

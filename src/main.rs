use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::{Parser, Subcommand};

use touch_regions::config::{self, Config};
use touch_regions::dump::run_dump;
use touch_regions::input::check_record_size;
use touch_regions::{LogSink, SuChmod, TouchService};

#[derive(Debug, Parser)]
#[command(name = "touch-regions", about = "Classify touchscreen contacts against screen regions")]
struct Cli {
    /// Touch input device node
    #[arg(long, short, default_value = config::TOUCH_DEVICE)]
    device: PathBuf,

    #[arg(long, default_value_t = 1)]
    poll_timeout_ms: u64,

    /// Size of one input_event record (16 on 32-bit kernels, 24 on 64-bit)
    #[arg(long, default_value_t = config::NATIVE_RECORD_SIZE, value_parser = parse_record_size)]
    record_size: usize,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Read touches and log tap, long-press and raw events
    Run {
        /// JSON file with the region list
        #[arg(long)]
        regions: Option<PathBuf>,

        /// Screen size as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_pair::<'x'>, default_value = "1080x2400")]
        screen: (i32, i32),

        /// Drawable area offset as TOP,LEFT
        #[arg(long, value_parser = parse_pair::<','>, default_value = "0,0")]
        offsets: (i32, i32),

        #[arg(long, default_value_t = 150)]
        long_press_ms: u64,
    },
    /// Print raw device records
    Dump,
}

fn parse_pair<const SEP: char>(s: &str) -> Result<(i32, i32), String> {
    let (a, b) = s
        .split_once(SEP)
        .ok_or_else(|| format!("expected two numbers separated by '{}'", SEP))?;
    let a = a.trim().parse().map_err(|e| format!("{}: {}", a, e))?;
    let b = b.trim().parse().map_err(|e| format!("{}: {}", b, e))?;
    Ok((a, b))
}

fn parse_record_size(s: &str) -> Result<usize, String> {
    let size = s.trim().parse().map_err(|e| format!("{}: {}", s, e))?;
    check_record_size(size).map_err(|e| e.to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::default().with_device(&cli.device);
    config.poll_timeout = Duration::from_millis(cli.poll_timeout_ms);
    config.record_size = cli.record_size;

    match cli.command.unwrap_or(Command::Run {
        regions: None,
        screen: (1080, 2400),
        offsets: (0, 0),
        long_press_ms: 150,
    }) {
        Command::Dump => {
            let stop = AtomicBool::new(false);
            let count = run_dump(&config, &SuChmod::default(), &stop, &mut std::io::stdout())?;
            log::info!("dumped {} events", count);
        }
        Command::Run {
            regions,
            screen,
            offsets,
            long_press_ms,
        } => {
            config.long_press_delay = Duration::from_millis(long_press_ms);
            let service = TouchService::new(config);
            service.set_screen_dimensions(screen.0, screen.1);
            service.set_screen_offsets(offsets.0, offsets.1);

            if let Some(path) = regions {
                let json = std::fs::read_to_string(&path)?;
                let count = service.update_regions(&json)?;
                log::info!("loaded {} regions from {}", count, path.display());
            }

            service.start(LogSink)?;
            log::info!(
                "waiting for touches on {} (Ctrl+C to quit)",
                service.config().device_path.display()
            );
            service.join()?;
        }
    }

    Ok(())
}

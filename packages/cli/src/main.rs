#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use std::{
    io::{BufRead as _, Write as _},
    process::ExitCode,
    sync::LazyLock,
};

use clap::{Parser, Subcommand};
use classic_sync_config::{
    ConfigError, DiningConfig, ProducerConsumerConfig, ReadersWritersConfig, RuntimeConfig,
    SleepingBarberConfig,
};
use classic_sync_problems::{CancellationToken, Completion};
use thiserror::Error;

mod report;

use report::{Format, reporter};

static TOKEN: LazyLock<CancellationToken> = LazyLock::new(CancellationToken::new);

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Classical synchronization problems on counting semaphores and mutexes",
    long_about = None
)]
struct Args {
    /// Seed for the per-actor delay generators
    #[arg(long, global = true, env = "CLASSIC_SYNC_SEED")]
    seed: Option<u64>,

    /// Run without sleeping between steps
    #[arg(long, global = true)]
    no_delay: bool,

    #[arg(long, global = true, value_enum, default_value_t = Format::Text)]
    format: Format,

    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Bounded buffer shared by a producer and a consumer
    ProducerConsumer {
        #[arg(long)]
        items: Option<u64>,

        #[arg(long)]
        capacity: Option<usize>,
    },
    /// Philosophers sharing forks around a table
    DiningPhilosophers {
        #[arg(long)]
        seats: Option<usize>,

        #[arg(long)]
        rounds: Option<usize>,
    },
    /// Shared readers and exclusive writers, readers first
    ReadersWriters {
        #[arg(long)]
        readers: Option<usize>,

        #[arg(long)]
        writers: Option<usize>,

        #[arg(long)]
        rounds: Option<usize>,
    },
    /// A barber, a waiting room, and customers
    SleepingBarber {
        #[arg(long)]
        customers: Option<usize>,

        #[arg(long)]
        chairs: Option<usize>,
    },
}

impl Commands {
    const fn title(self) -> &'static str {
        match self {
            Self::ProducerConsumer { .. } => "Producer-Consumer",
            Self::DiningPhilosophers { .. } => "Dining Philosophers",
            Self::ReadersWriters { .. } => "Readers-Writers",
            Self::SleepingBarber { .. } => "Sleeping Barber",
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error("Cancelled")]
    Cancelled,
    #[error("Invalid choice {0:?}")]
    InvalidChoice(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Problem(#[from] classic_sync_problems::Error),
    #[error(transparent)]
    CtrlC(#[from] ctrlc::Error),
}

fn ctrl_c() {
    println!("ctrl+c received. stopping...");
    TOKEN.cancel();
}

/// Parses a menu answer into a demo with default settings.
fn parse_choice(input: &str) -> Result<Commands, CliError> {
    Ok(match input.trim() {
        "1" => Commands::ProducerConsumer {
            items: None,
            capacity: None,
        },
        "2" => Commands::ReadersWriters {
            readers: None,
            writers: None,
            rounds: None,
        },
        "3" => Commands::DiningPhilosophers {
            seats: None,
            rounds: None,
        },
        "4" => Commands::SleepingBarber {
            customers: None,
            chairs: None,
        },
        other => return Err(CliError::InvalidChoice(other.to_string())),
    })
}

fn prompt() -> Result<Commands, CliError> {
    println!("=== Classical Synchronization Problems (Mutex + Semaphore) ===");
    println!("Select a problem to run (each runs a finite demo and exits):");
    println!("1. Producer-Consumer (bounded buffer)");
    println!("2. Readers-Writers (readers-preference)");
    println!("3. Dining Philosophers");
    println!("4. Sleeping Barber");
    print!("Enter choice [1-4]: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().lock().read_line(&mut input)?;

    parse_choice(&input)
}

fn finish<T: std::fmt::Debug>(completion: Completion<T>) -> Result<(), CliError> {
    match completion {
        Completion::Finished(summary) => {
            log::info!("summary: {summary:?}");
            Ok(())
        }
        Completion::Cancelled => Err(CliError::Cancelled),
    }
}

fn producer_consumer_config(
    args: &Args,
    mut config: ProducerConsumerConfig,
    items: Option<u64>,
    capacity: Option<usize>,
) -> ProducerConsumerConfig {
    config.item_count = items.unwrap_or(config.item_count);
    config.capacity = capacity.unwrap_or(config.capacity);
    if args.no_delay {
        config = config.without_delays();
    }
    let seed = args.seed.or(config.seed);
    config.with_seed(seed)
}

fn dining_config(
    args: &Args,
    mut config: DiningConfig,
    seats: Option<usize>,
    rounds: Option<usize>,
) -> DiningConfig {
    config.seats = seats.unwrap_or(config.seats);
    config.rounds = rounds.unwrap_or(config.rounds);
    if args.no_delay {
        config = config.without_delays();
    }
    let seed = args.seed.or(config.seed);
    config.with_seed(seed)
}

fn readers_writers_config(
    args: &Args,
    mut config: ReadersWritersConfig,
    readers: Option<usize>,
    writers: Option<usize>,
    rounds: Option<usize>,
) -> ReadersWritersConfig {
    config.readers = readers.unwrap_or(config.readers);
    config.writers = writers.unwrap_or(config.writers);
    config.rounds = rounds.unwrap_or(config.rounds);
    if args.no_delay {
        config = config.without_delays();
    }
    let seed = args.seed.or(config.seed);
    config.with_seed(seed)
}

fn sleeping_barber_config(
    args: &Args,
    mut config: SleepingBarberConfig,
    customers: Option<usize>,
    chairs: Option<usize>,
) -> SleepingBarberConfig {
    config.customers = customers.unwrap_or(config.customers);
    config.chairs = chairs.unwrap_or(config.chairs);
    if args.no_delay {
        config = config.without_delays();
    }
    let seed = args.seed.or(config.seed);
    config.with_seed(seed)
}

async fn run_command(args: &Args, cmd: Commands) -> Result<(), CliError> {
    let sink = reporter(args.format);
    let token = &*TOKEN;

    match cmd {
        Commands::ProducerConsumer { items, capacity } => {
            let config =
                producer_consumer_config(args, ProducerConsumerConfig::from_env()?, items, capacity);

            finish(classic_sync_problems::run_producer_consumer_demo(&config, sink, token).await?)
        }
        Commands::DiningPhilosophers { seats, rounds } => {
            let config = dining_config(args, DiningConfig::from_env()?, seats, rounds);

            finish(classic_sync_problems::run_dining_philosophers_demo(&config, sink, token).await?)
        }
        Commands::ReadersWriters {
            readers,
            writers,
            rounds,
        } => {
            let config = readers_writers_config(
                args,
                ReadersWritersConfig::from_env()?,
                readers,
                writers,
                rounds,
            );

            finish(classic_sync_problems::run_readers_writers_demo(&config, sink, token).await?)
        }
        Commands::SleepingBarber { customers, chairs } => {
            let config =
                sleeping_barber_config(args, SleepingBarberConfig::from_env()?, customers, chairs);

            finish(classic_sync_problems::run_sleeping_barber_demo(&config, sink, token).await?)
        }
    }
}

fn run(args: &Args) -> Result<(), CliError> {
    let cmd = match args.cmd {
        Some(cmd) => cmd,
        None => prompt()?,
    };

    ctrlc::set_handler(ctrl_c)?;

    let runtime_config = RuntimeConfig::from_env()?;
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(threads) = runtime_config.worker_threads {
        builder.worker_threads(threads);
    }
    let runtime = builder.build()?;

    let text = args.format == Format::Text;
    if text {
        println!("\nRunning {} demo...\n", cmd.title());
    }

    runtime.block_on(run_command(args, cmd))?;

    if text {
        println!("\n{} demo finished.\n", cmd.title());
        println!("Program finished.");
    }

    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = classic_sync_logging::init() {
        eprintln!("Failed to initialize logging: {e:?}");
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Cancelled) => {
            log::info!("main: demo cancelled");
            ExitCode::from(130)
        }
        Err(e) => {
            log::error!("main: {e:?}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test_log::test]
    fn args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test_log::test]
    fn menu_choices_map_to_demos() {
        assert_eq!(parse_choice("3\n").unwrap().title(), "Dining Philosophers");
        assert_eq!(parse_choice(" 1 ").unwrap().title(), "Producer-Consumer");
        assert!(matches!(parse_choice("5"), Err(CliError::InvalidChoice(x)) if x == "5"));
    }

    #[test_log::test]
    fn global_flags_come_before_or_after_the_subcommand() {
        let args = Args::try_parse_from([
            "classic_sync",
            "--seed",
            "9",
            "dining-philosophers",
            "--seats",
            "8",
            "--no-delay",
        ])
        .unwrap();

        assert_eq!(args.seed, Some(9));
        assert!(args.no_delay);
        assert_eq!(
            args.cmd,
            Some(Commands::DiningPhilosophers {
                seats: Some(8),
                rounds: None
            })
        );
    }

    #[test_log::test]
    fn flags_override_the_configured_demo() {
        let args = Args::try_parse_from(["classic_sync", "--seed", "9", "--no-delay"]).unwrap();
        let configured = DiningConfig {
            seed: Some(3),
            ..DiningConfig::default()
        };

        let config = dining_config(&args, configured, Some(8), None);

        assert_eq!(config.seats, 8);
        assert_eq!(config.rounds, DiningConfig::default().rounds);
        assert_eq!(config.seed, Some(9));
        assert!(config.think_delay.is_zero());
        assert!(config.eat_delay.is_zero());
        assert!(config.rest_delay.is_zero());
    }

    #[test_log::test]
    fn configured_seed_is_kept_without_a_seed_flag() {
        let args = Args {
            seed: None,
            no_delay: false,
            format: Format::Text,
            cmd: None,
        };
        let configured = SleepingBarberConfig {
            seed: Some(3),
            ..SleepingBarberConfig::default()
        };

        let config = sleeping_barber_config(&args, configured, None, Some(1));

        assert_eq!(config.seed, Some(3));
        assert_eq!(config.chairs, 1);
        assert_eq!(config.haircut_delay, SleepingBarberConfig::default().haircut_delay);

        let config = producer_consumer_config(
            &args,
            ProducerConsumerConfig::default(),
            Some(50),
            Some(1),
        );
        assert_eq!((config.item_count, config.capacity, config.seed), (50, 1, None));

        let config =
            readers_writers_config(&args, ReadersWritersConfig::default(), Some(1), Some(0), None);
        assert_eq!((config.readers, config.writers), (1, 0));
    }

    #[test_log::test]
    fn no_subcommand_means_menu() {
        let args = Args::try_parse_from(["classic_sync", "--format", "json"]).unwrap();

        assert_eq!(args.cmd, None);
        assert_eq!(args.format, Format::Json);
    }
}

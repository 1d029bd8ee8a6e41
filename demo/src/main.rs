//! Protect a secret across local storage partitions and recover it later.
//!
//! Each backend is a separate partition under `--storage-dir`. Protecting a secret prints a
//! hex-encoded recovery descriptor, which is all that is needed to recover (or forget) it:
//!
//! ```sh
//! scatter-demo --threshold 3 --shares 5 --backends 3 protect "correct horse"
//! scatter-demo --threshold 3 --shares 5 --backends 3 recover <INFO>
//! scatter-demo --threshold 3 --shares 5 --backends 3 forget <INFO>
//! ```
//!
//! Delete one of the partitions between `protect` and `recover` to watch recovery succeed
//! with the remaining shares.

use clap::{value_parser, Arg, ArgMatches, Command};
use commonware_codec::{DecodeExt, Encode};
use commonware_runtime::{tokio, Metrics, Runner};
use commonware_utils::{from_hex, hex};
use rand::rngs::OsRng;
use scatter_vault::{
    backend::{durable, Backend, Durable},
    engine::{Config, Engine},
    placement::Placement,
    RecoveryInfo,
};
use std::{process::ExitCode, str::FromStr, sync::Arc};
use tracing::{error, info, Level};

/// Maximum length of a secret accepted by the demo.
const MAX_SECRET: usize = 64 * 1024;

const PROTECT_CMD: &str = "protect";
const RECOVER_CMD: &str = "recover";
const FORGET_CMD: &str = "forget";

fn main() -> ExitCode {
    // Parse arguments
    let matches = Command::new("scatter-demo")
        .about("Split a secret across storage partitions and recover it")
        .arg(
            Arg::new("storage-dir")
                .long("storage-dir")
                .value_name("PATH")
                .help("Directory holding every partition")
                .default_value("/tmp/scatter-demo"),
        )
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .value_name("K")
                .help("Number of shares required to recover a secret")
                .default_value("2")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("shares")
                .long("shares")
                .value_name("N")
                .help("Number of shares each secret is split into")
                .default_value("3")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("backends")
                .long("backends")
                .value_name("COUNT")
                .help("Number of partitions to spread shares across")
                .default_value("3")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Maximum level of logs to print")
                .default_value("info"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new(PROTECT_CMD)
                .about("Protect a secret and print its recovery info")
                .arg(Arg::new("secret").required(true).help("The secret to protect")),
        )
        .subcommand(
            Command::new(RECOVER_CMD)
                .about("Recover a secret from its recovery info")
                .arg(Arg::new("info").required(true).help("Hex-encoded recovery info")),
        )
        .subcommand(
            Command::new(FORGET_CMD)
                .about("Delete every share of a secret")
                .arg(Arg::new("info").required(true).help("Hex-encoded recovery info")),
        )
        .get_matches();

    // Create logger
    let level = matches.get_one::<String>("log-level").unwrap();
    let level = match Level::from_str(level) {
        Ok(level) => level,
        Err(err) => {
            eprintln!("invalid log level: {err}");
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let storage_dir = matches.get_one::<String>("storage-dir").unwrap().clone();
    let threshold = *matches.get_one::<usize>("threshold").unwrap();
    let shares = *matches.get_one::<usize>("shares").unwrap();
    let backends = *matches.get_one::<usize>("backends").unwrap();
    let Some((command, args)) = matches.subcommand() else {
        return ExitCode::FAILURE;
    };
    let command = command.to_string();
    let args = args.clone();
    info!(
        storage_dir = %storage_dir,
        threshold,
        shares,
        backends,
        command = %command,
        "starting scatter-demo"
    );

    // Run the command
    let cfg = tokio::Config::default().with_storage_directory(storage_dir);
    let executor = tokio::Runner::new(cfg);
    executor.start(|context| async move {
        // Open partitions
        let mut partitions = Vec::with_capacity(backends);
        for i in 0..backends {
            let partition = format!("scatter-{i}");
            let durable = match Durable::init(
                context.with_label(&format!("partition_{i}")),
                durable::Config {
                    partition: partition.clone(),
                    max_payload: MAX_SECRET,
                },
            )
            .await
            {
                Ok(durable) => durable,
                Err(err) => {
                    error!(partition = %partition, ?err, "failed to open partition");
                    return ExitCode::FAILURE;
                }
            };
            partitions.push(Arc::new(durable) as Arc<dyn Backend>);
        }

        // Create engine
        let mut cfg = Config::new(threshold, shares);
        cfg.placement = Placement::DurableFirst;
        let mut engine = match Engine::new(context.with_label("engine"), OsRng, partitions, cfg) {
            Ok(engine) => engine,
            Err(err) => {
                error!(?err, "failed to create engine");
                return ExitCode::FAILURE;
            }
        };

        match run(&mut engine, &command, &args).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => {
                error!(command = %command, err = %err, "command failed");
                ExitCode::FAILURE
            }
        }
    })
}

async fn run<E: commonware_runtime::Clock + Metrics>(
    engine: &mut Engine<E, OsRng>,
    command: &str,
    args: &ArgMatches,
) -> Result<(), String> {
    match command {
        PROTECT_CMD => {
            let secret = args.get_one::<String>("secret").unwrap();
            let info = engine
                .protect_str(secret)
                .await
                .map_err(|err| err.to_string())?;
            info!(
                secret = %info.secret,
                stored = info.assignments.len(),
                total = info.total,
                "protected secret"
            );
            for assignment in &info.assignments {
                info!(
                    index = assignment.index,
                    share = %assignment.share,
                    partition = %assignment.location.identifier,
                    "placed share"
                );
            }
            println!("{}", hex(&info.encode()));
        }
        RECOVER_CMD => {
            let info = parse_info(args)?;
            let secret = engine
                .recover_string(&info)
                .await
                .map_err(|err| err.to_string())?;
            println!("{secret}");
        }
        FORGET_CMD => {
            let info = parse_info(args)?;
            let deleted = engine.forget(&info).await.map_err(|err| err.to_string())?;
            info!(secret = %info.secret, deleted, "forgot secret");
        }
        _ => return Err(format!("unknown command: {command}")),
    }
    Ok(())
}

fn parse_info(args: &ArgMatches) -> Result<RecoveryInfo, String> {
    let encoded = args.get_one::<String>("info").unwrap();
    let raw = from_hex(encoded).ok_or("recovery info is not hex")?;
    RecoveryInfo::decode(raw.as_slice()).map_err(|err| format!("invalid recovery info: {err}"))
}

use std::{env, net::Ipv4Addr, path, str::FromStr, sync::Arc};

use dotenv::dotenv;
use eyre::eyre;
use mcrangescan::{
    config::Config,
    database::{Database, MemoryStore, ServerRecord, ServerStore},
    exclude,
    scanner::{HostOutcome, Scanner, targets::parse_addr},
    terminal_colors::*,
    tracing::init_tracing,
};
use tracing::info;

const USAGE: &str = "usage:
    mcrangescan scan <startIp> <endIp> [batchSize]
    mcrangescan ping <ip> [port]
    mcrangescan list [limit]
    mcrangescan show <ip>
    mcrangescan                 (scans the [scan] section of the config)";

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenv().ok();

    let args = env::args().collect::<Box<[String]>>();

    let config_file = env::var("MCRANGESCAN_CONFIG").unwrap_or("config.toml".to_string());
    let config = if path::Path::new(&config_file).exists() {
        println!("parsing config at {config_file}");
        Config::from_file(&config_file)?
    } else {
        println!("no config at {config_file}, using defaults");
        Config::default()
    };

    init_tracing(&config);
    info!("Logging initialized");

    let store = connect_store(&config).await?;

    let mut scanner = Scanner::new(config.scanner.clone(), store.clone());
    if let Some(exclude_file) = &config.exclude_file {
        let exclude_ranges = exclude::parse_file(exclude_file)?;
        println!(
            "excluding {} ips ({} ranges)",
            exclude_ranges.count(),
            exclude_ranges.ranges().len()
        );
        scanner = scanner.with_exclude(exclude_ranges);
    }

    match args.get(1).map(String::as_str) {
        Some("scan") => {
            let (Some(start_ip), Some(end_ip)) = (args.get(2), args.get(3)) else {
                return Err(eyre!("{USAGE}"));
            };
            let batch_size = args.get(4).map(|b| b.parse::<usize>()).transpose()?;
            run_range_scan(&scanner, start_ip, end_ip, batch_size).await?;
        }
        Some("ping") => {
            let ip = parse_addr(args.get(2).ok_or_else(|| eyre!("{USAGE}"))?)?;
            let port = match args.get(3) {
                Some(port) => port.parse::<u16>()?,
                None => config.scanner.port,
            };
            scanner.log().reset(&format!("--- PING {ip}:{port} ---"));
            match scanner.scan_and_save(ip, port).await {
                HostOutcome::Online(_) => {}
                HostOutcome::SaveFailed(_) => return Err(eyre!("failed to save {ip}:{port}")),
                HostOutcome::NoProtocol | HostOutcome::ClosedOrTimeout => {
                    println!("{ip}:{port} is not a reachable minecraft server")
                }
            }
        }
        Some("list") => {
            let limit = args.get(2).map(|l| l.parse::<usize>()).transpose()?;
            for record in store.list_online(limit.unwrap_or(100)).await? {
                print_record(&record);
            }
        }
        Some("show") => {
            let ip = Ipv4Addr::from_str(args.get(2).ok_or_else(|| eyre!("{USAGE}"))?)?;
            let records = store.find_by_ip(ip).await?;
            if records.is_empty() {
                println!("{ip} not found");
            }
            for record in records {
                print_record(&record);
            }
        }
        None => {
            let Some(scan) = &config.scan else {
                return Err(eyre!("no [scan] section in the config\n{USAGE}"));
            };
            run_range_scan(&scanner, &scan.start_ip, &scan.end_ip, scan.batch_size).await?;
        }
        Some(_) => return Err(eyre!("{USAGE}")),
    }

    Ok(())
}

async fn connect_store(config: &Config) -> eyre::Result<Arc<dyn ServerStore>> {
    let mongodb_uri = config
        .mongodb_uri
        .clone()
        .or_else(|| env::var("MONGO_URI").ok());

    match mongodb_uri {
        Some(uri) => {
            let database = Database::connect(&uri, config.database_name()).await?;
            println!("connected to mongodb");
            Ok(Arc::new(database))
        }
        None => {
            println!(
                "{YELLOW}no mongodb_uri or MONGO_URI set, results are only kept in memory{RESET}"
            );
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Run a scan in the background and wait for it, cancelling on ctrl-c.
async fn run_range_scan(
    scanner: &Scanner,
    start_ip: &str,
    end_ip: &str,
    batch_size: Option<usize>,
) -> eyre::Result<()> {
    let mut job = scanner.start_range_scan(start_ip, end_ip, batch_size)?;

    loop {
        tokio::select! {
            status = job.next_status() => {
                match status {
                    Some(status) if !status.is_finished() => continue,
                    _ => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("{YELLOW}cancelling, waiting for the current batch to finish...{RESET}");
                job.cancel();
                break;
            }
        }
    }

    // a panicked scan comes back as an error here
    let summary = job.wait().await?;
    if summary.cancelled {
        println!("{YELLOW}scan cancelled after {} batches{RESET}", summary.batches);
    }
    Ok(())
}

fn print_record(record: &ServerRecord) {
    let state = if record.online {
        format!("{GREEN}online{RESET}")
    } else {
        format!("{GRAY}offline{RESET}")
    };
    println!(
        "{BOLD}{}{RESET} {state} {}/{} {BLUE}{}{RESET} {ITALIC}{}{RESET} {GRAY}(last scanned {}){RESET}",
        record.key,
        record.players.online,
        record.players.max,
        record.version,
        record.motd.replace('\n', " "),
        record.last_scanned.format("%Y-%m-%d %H:%M:%S")
    );
}

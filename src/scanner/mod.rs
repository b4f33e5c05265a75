pub mod handshake;
pub mod job;
pub mod probe;
pub mod progress;
pub mod protocols;
pub mod targets;
pub mod transport;

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    sync::Arc,
    time::Duration,
};

use chrono::Utc;
use tokio::{task::JoinSet, time::Instant};
use tracing::{debug, error, info, trace, warn};

use crate::{
    config::ScannerConfig,
    database::{Players, ServerFields, ServerKey, ServerStore},
    error::ScanError,
    processing::ServerStatus,
    terminal_colors::*,
};

use self::{
    handshake::HandshakeResult,
    job::{JobControl, ScanJob, ScanStatus},
    probe::ProbeResult,
    progress::ScanLog,
    protocols::Minecraft,
    targets::{Ipv4Range, Ipv4Ranges, is_private_or_reserved, parse_addr},
    transport::{ScanTransport, TcpTransport},
};

/// What happened to a single host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOutcome {
    ClosedOrTimeout,
    /// The port was open but the handshake didn't get a status back.
    NoProtocol,
    Online(ServerStatus),
    /// Online, but the store returned an error when saving it.
    SaveFailed(ServerStatus),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanSummary {
    /// Every address the cursor passed, filtered or not.
    pub addresses: u64,
    pub filtered: u64,
    pub probed: u64,
    pub open: u64,
    pub online: u64,
    pub no_protocol: u64,
    pub closed: u64,
    pub save_failures: u64,
    /// Tasks that panicked instead of returning an outcome.
    pub task_failures: u64,
    pub batches: u64,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl ScanSummary {
    fn record(&mut self, outcome: &HostOutcome) {
        self.probed += 1;
        match outcome {
            HostOutcome::ClosedOrTimeout => self.closed += 1,
            HostOutcome::NoProtocol => {
                self.open += 1;
                self.no_protocol += 1;
            }
            HostOutcome::Online(_) => {
                self.open += 1;
                self.online += 1;
            }
            HostOutcome::SaveFailed(_) => {
                self.open += 1;
                self.online += 1;
                self.save_failures += 1;
            }
        }
    }
}

/// A validated range scan, ready to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPlan {
    pub range: Ipv4Range,
    pub batch_size: usize,
    pub port: u16,
}

/// Scans ranges in fixed-size batches. Every address in a batch is probed
/// concurrently, and the next batch doesn't start until every task in the
/// current one has finished.
#[derive(Clone)]
pub struct Scanner {
    config: Arc<ScannerConfig>,
    store: Arc<dyn ServerStore>,
    transport: Arc<dyn ScanTransport>,
    log: Arc<ScanLog>,
    exclude: Arc<Ipv4Ranges>,
}

impl Scanner {
    pub fn new(config: ScannerConfig, store: Arc<dyn ServerStore>) -> Self {
        let transport = TcpTransport::new(Minecraft::new(config.protocol_version));
        let log = match &config.log_file {
            Some(path) => ScanLog::new(path),
            None => ScanLog::console_only(),
        };

        Self {
            config: Arc::new(config),
            store,
            transport: Arc::new(transport),
            log: Arc::new(log),
            exclude: Arc::new(Ipv4Ranges::default()),
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn ScanTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_log(mut self, log: ScanLog) -> Self {
        self.log = Arc::new(log);
        self
    }

    /// Addresses in these ranges are skipped the same way private ones are.
    pub fn with_exclude(mut self, exclude: Ipv4Ranges) -> Self {
        self.exclude = Arc::new(exclude);
        self
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn log(&self) -> &ScanLog {
        &self.log
    }

    pub fn is_filtered(&self, addr: Ipv4Addr) -> bool {
        is_private_or_reserved(addr) || self.exclude.contains(addr)
    }

    /// Probe a single host, ask it for its status if the port is open, and
    /// save it if it answered. Never fails, every kind of failure is an
    /// outcome.
    pub async fn scan_and_save(&self, addr: Ipv4Addr, port: u16) -> HostOutcome {
        let target = SocketAddrV4::new(addr, port);

        if self
            .transport
            .probe(target, self.config.connect_timeout())
            .await
            == ProbeResult::ClosedOrTimeout
        {
            trace!(ip = %addr, port, "closed");
            self.log
                .log_file_only(&format!("{target} - Port closed or timeout."));
            return HostOutcome::ClosedOrTimeout;
        }

        let status = match self
            .transport
            .query_status(target, self.config.status_timeout())
            .await
        {
            HandshakeResult::Success(status) => status,
            HandshakeResult::NoResponse => {
                debug!(ip = %addr, port, "open, no minecraft response");
                self.log.log_colored(
                    YELLOW,
                    &format!("{target} - Port open, but no Minecraft response. (Ignored)"),
                    false,
                );
                return HostOutcome::NoProtocol;
            }
        };

        let fields = ServerFields {
            online: true,
            motd: status.motd.clone(),
            players: Players {
                online: status.players_online,
                max: status.players_max,
            },
            version: status.version.clone(),
            last_scanned: Utc::now(),
        };

        match self.store.upsert(ServerKey::new(addr, port), fields).await {
            Ok(_) => {
                info!(
                    ip = %addr,
                    port,
                    players_online = status.players_online,
                    players_max = status.players_max,
                    version = %status.version,
                    "server online"
                );
                self.log.log_colored(
                    GREEN,
                    &format!(
                        "{target} - ONLINE! Players: {}/{} | {} | {}",
                        status.players_online,
                        status.players_max,
                        status.version,
                        one_line(&status.motd)
                    ),
                    false,
                );
                HostOutcome::Online(status)
            }
            Err(err) => {
                error!(ip = %addr, port, "failed to save server: {err}");
                self.log.log_colored(
                    RED,
                    &format!("{target} - ONLINE, but saving failed: {err}"),
                    false,
                );
                HostOutcome::SaveFailed(status)
            }
        }
    }

    /// Reset the scan log and check the parameters of a range scan. Invalid
    /// parameters are logged as an aborted scan.
    pub fn plan(
        &self,
        start_ip: &str,
        end_ip: &str,
        batch_size: Option<usize>,
    ) -> Result<ScanPlan, ScanError> {
        self.log.reset(&format!(
            "--- NEW SCAN STARTED {} ---",
            chrono::Local::now().format("%m/%d/%Y, %I:%M:%S %p")
        ));

        self.validate(start_ip, end_ip, batch_size)
            .inspect_err(|err| {
                warn!(start_ip, end_ip, "scan aborted: {err}");
                self.log
                    .log_colored(RED, &format!("Scan aborted: {err}."), false);
            })
    }

    fn validate(
        &self,
        start_ip: &str,
        end_ip: &str,
        batch_size: Option<usize>,
    ) -> Result<ScanPlan, ScanError> {
        if start_ip.trim().is_empty() || end_ip.trim().is_empty() {
            return Err(ScanError::MissingBounds);
        }
        let range = Ipv4Range::new(parse_addr(start_ip)?, parse_addr(end_ip)?)?;

        let batch_size = batch_size.unwrap_or(self.config.default_batch_size);
        if batch_size < 1 {
            return Err(ScanError::BatchSizeTooSmall);
        }
        if batch_size > self.config.max_batch_size {
            return Err(ScanError::BatchSizeTooLarge {
                size: batch_size,
                max: self.config.max_batch_size,
            });
        }

        Ok(ScanPlan {
            range,
            batch_size,
            port: self.config.port,
        })
    }

    /// Validate and then scan the whole range, returning when it's done.
    pub async fn scan_range(
        &self,
        start_ip: &str,
        end_ip: &str,
        batch_size: Option<usize>,
    ) -> Result<ScanSummary, ScanError> {
        let plan = self.plan(start_ip, end_ip, batch_size)?;
        let control = JobControl::new(plan.range.count());
        Ok(self.run(plan, &control).await)
    }

    /// Validate and then scan the range in the background. Only validation
    /// errors are returned here, everything else is reported through the
    /// job.
    pub fn start_range_scan(
        &self,
        start_ip: &str,
        end_ip: &str,
        batch_size: Option<usize>,
    ) -> Result<ScanJob, ScanError> {
        let plan = self.plan(start_ip, end_ip, batch_size)?;
        let control = JobControl::new(plan.range.count());

        let scanner = self.clone();
        let job_control = control.clone();
        Ok(ScanJob::spawn(control, async move {
            scanner.run(plan, &job_control).await
        }))
    }

    pub async fn run(&self, plan: ScanPlan, control: &JobControl) -> ScanSummary {
        let started = Instant::now();
        let total = plan.range.count();
        let mut summary = ScanSummary::default();

        let rule = "=".repeat(64);
        self.log.log(&rule, true);
        self.log.log_colored(
            BOLD,
            &format!(
                "SCAN START: {} to {} | {total} IPs",
                plan.range.start, plan.range.end
            ),
            true,
        );
        self.log.log(
            &format!(
                "Mode: CONTROLLED BATCH | Batch Size: {} | Pause: {}ms | Port: {}",
                plan.batch_size, self.config.batch_pause_ms, plan.port
            ),
            true,
        );
        self.log.log(&rule, true);
        info!(
            start = %plan.range.start,
            end = %plan.range.end,
            total,
            batch_size = plan.batch_size,
            "range scan started"
        );

        let mut windows = plan.range.windows(plan.batch_size).peekable();
        while let Some(window) = windows.next() {
            if control.is_cancelled() {
                summary.cancelled = true;
                self.log.log_colored(
                    YELLOW,
                    &format!("Scan cancelled before {}.", window.start),
                    false,
                );
                break;
            }

            let mut tasks = JoinSet::new();
            for addr in window.addresses() {
                summary.addresses += 1;
                if self.is_filtered(addr) {
                    summary.filtered += 1;
                    continue;
                }

                let scanner = self.clone();
                let port = plan.port;
                tasks.spawn(async move { scanner.scan_and_save(addr, port).await });
            }

            // wait for every task in the batch before moving on
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(outcome) => summary.record(&outcome),
                    Err(err) => {
                        summary.task_failures += 1;
                        error!("scan task failed: {err}");
                        self.log
                            .log_colored(RED, &format!("Scan task failed: {err}"), false);
                    }
                }
            }

            summary.batches += 1;
            debug!(
                start = %window.start,
                end = %window.end,
                batches = summary.batches,
                "batch complete"
            );
            self.log.log_colored(
                GREEN,
                &format!("Batch complete: {} - {}.", window.start, window.end),
                true,
            );
            control.set_status(ScanStatus::Running {
                batches_completed: summary.batches,
                addresses_done: summary.addresses,
                total,
            });

            if windows.peek().is_some() {
                tokio::time::sleep(self.config.batch_pause()).await;
            }
        }

        summary.elapsed = started.elapsed();

        let ScanSummary {
            addresses,
            filtered,
            probed,
            online,
            no_protocol,
            closed,
            save_failures,
            task_failures,
            batches,
            ..
        } = summary;
        self.log.log(&rule, true);
        self.log.log_colored(
            BOLD,
            &format!(
                "SCAN END: {addresses} addresses in {batches} batches after {:.1}s",
                summary.elapsed.as_secs_f64()
            ),
            false,
        );
        self.log.log(
            &format!(
                "{online} online, {no_protocol} open without minecraft, {closed} closed, {filtered} skipped ({probed} probed, {save_failures} save failures, {task_failures} task failures)"
            ),
            false,
        );
        self.log.log(&rule, true);
        info!(
            addresses,
            probed,
            online,
            batches,
            cancelled = summary.cancelled,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "range scan finished"
        );

        summary
    }
}

/// Multi-line motds would break the one-line-per-event log.
fn one_line(motd: &str) -> String {
    motd.split_whitespace().collect::<Vec<_>>().join(" ")
}

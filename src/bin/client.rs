//! keyshard Client Binary
//!
//! Runs population, steady-state load or the shard scenario against the
//! servers named in a service description.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use crossbeam::channel;
use keyshard::buffer::BufferPool;
use keyshard::metrics::{Instrumentation, LatencySample};
use keyshard::service::{self, IdentityFile, Server, ServiceDescription};
use keyshard::transport::UdpTransport;
use keyshard::workload::{self, RequestKind, ShardScenario, SteadyWorkload};
use keyshard::{ClientConfig, ClientIdentity, ClientSession, KeyshardError, Result, Sha256Hasher};
use tracing_subscriber::{fmt, EnvFilter};

type UdpSession = ClientSession<UdpTransport, Sha256Hasher>;

/// What the client threads do
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Workload {
    /// Set every key once
    Setup,
    /// Endless gets
    Get,
    /// Endless sets
    Set,
    /// Delegate a key range and follow the redirect
    Shard,
}

/// keyshard Client
#[derive(Parser, Debug)]
#[command(name = "keyshard-client")]
#[command(about = "Load and scenario client for a sharded key-value service")]
#[command(version)]
struct Args {
    /// Service description file
    #[arg(short, long)]
    service: PathBuf,

    /// Client identity file with one key per worker thread
    #[arg(short, long)]
    identity: PathBuf,

    /// Workload to run
    #[arg(short, long, value_enum, default_value = "setup")]
    workload: Workload,

    /// Worker threads for the get/set workloads
    #[arg(short, long, default_value = "1")]
    threads: usize,

    /// Threads populating the key space before a get/set run (setup uses at least one)
    #[arg(long, default_value = "0")]
    setup_threads: usize,

    /// Size of the key space
    #[arg(short = 'k', long, default_value = "1000")]
    num_keys: u64,

    /// Bytes per set value
    #[arg(long, default_value = "1024")]
    value_size: usize,

    /// Receive timeout in milliseconds
    #[arg(long, default_value = "1000")]
    timeout_ms: u64,

    /// Pause between shard scenario steps in milliseconds
    #[arg(long, default_value = "5000")]
    settle_ms: u64,

    /// Local bind address
    #[arg(short, long, default_value = "0.0.0.0:0")]
    bind: String,

    /// Seed for reproducible payloads
    #[arg(long)]
    seed: Option<u64>,

    /// Log every message
    #[arg(short, long)]
    verbose: bool,

    /// Print counters and timings at exit
    #[arg(short, long)]
    profile: bool,
}

fn main() {
    let args = Args::parse();
    let config = client_config(&args);

    // Initialize tracing/logging
    let default_filter = if config.verbose {
        "info,keyshard=trace"
    } else {
        "info,keyshard=debug"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    tracing::info!("keyshard client v{}", keyshard::VERSION);

    if let Err(e) = run(args, config) {
        tracing::error!("Client failed: {}", e);
        std::process::exit(1);
    }
}

fn client_config(args: &Args) -> ClientConfig {
    let mut builder = ClientConfig::builder()
        .receive_timeout_ms(args.timeout_ms)
        .num_keys(args.num_keys)
        .value_size(args.value_size)
        .bind_addr(&args.bind)
        .verbose(args.verbose);
    if let Some(seed) = args.seed {
        builder = builder.rng_seed(seed);
    }
    builder.build()
}

fn run(args: Args, config: ClientConfig) -> Result<()> {
    config.validate()?;

    let description = ServiceDescription::load(&args.service)?;
    let servers = description.resolve(&Sha256Hasher)?;
    tracing::info!("Service lists {} server(s)", servers.len());

    // Setup workers take the first keys and experiment workers the rest,
    // so no two sessions ever share a requester
    let (setup_threads, threads) = match args.workload {
        Workload::Setup => (args.setup_threads.max(1), 0),
        Workload::Get | Workload::Set => (args.setup_threads, args.threads),
        Workload::Shard => (0, 1),
    };
    let mut identities = IdentityFile::load(&args.identity)?
        .identities(&Sha256Hasher, setup_threads + threads)?;
    let experiment = identities.split_off(setup_threads);
    let setup = identities;
    let metrics = Instrumentation::new();

    match args.workload {
        Workload::Setup => {
            run_setup(&config, &setup, &servers, &metrics)?;
        }
        Workload::Get | Workload::Set => {
            if !setup.is_empty() {
                run_setup(&config, &setup, &servers, &metrics)?;
            }
            let kind = if args.workload == Workload::Get {
                RequestKind::Get
            } else {
                RequestKind::Set
            };
            run_steady(&config, &experiment, &servers, &metrics, kind)?;
        }
        Workload::Shard => {
            if servers.len() < 2 {
                return Err(KeyshardError::Config(
                    "the shard scenario needs at least two servers".to_string(),
                ));
            }
            let mut session = open_session(0, &config, &experiment[0], &servers, &metrics)?;
            let scenario =
                ShardScenario::default().with_settle(Duration::from_millis(args.settle_ms));
            scenario
                .run(&mut session, &servers[0].public_key, &servers[1].public_key)
                .ok_or_else(|| {
                    KeyshardError::Worker("shard scenario stopped before finishing".to_string())
                })?;
        }
    }

    if args.profile {
        println!("{}", metrics.report());
    }
    Ok(())
}

fn open_session(
    worker: usize,
    config: &ClientConfig,
    identity: &ClientIdentity,
    servers: &[Server],
    metrics: &Instrumentation,
) -> Result<UdpSession> {
    let transport = UdpTransport::bind(
        &config.bind_addr,
        service::directory(servers),
        BufferPool::default(),
    )?;
    let session = ClientSession::new(
        worker,
        identity.clone(),
        transport,
        Sha256Hasher,
        metrics.clone(),
    )
    .with_receive_timeout(config.receive_timeout());
    Ok(match config.worker_seed(worker) {
        Some(seed) => session.with_seed(seed),
        None => session,
    })
}

fn run_setup(
    config: &ClientConfig,
    identities: &[ClientIdentity],
    servers: &[Server],
    metrics: &Instrumentation,
) -> Result<()> {
    let mut handles = Vec::with_capacity(identities.len());
    for (worker, identity) in identities.iter().enumerate() {
        let mut session = open_session(worker, config, identity, servers, metrics)?;
        let server = servers[0].public_key.clone();
        let (num_keys, value_size) = (config.num_keys, config.value_size);
        handles.push(spawn_worker(worker, move || {
            workload::populate(&mut session, &server, num_keys, value_size);
        })?);
    }
    join_all(handles)
}

fn run_steady(
    config: &ClientConfig,
    identities: &[ClientIdentity],
    servers: &[Server],
    metrics: &Instrumentation,
    kind: RequestKind,
) -> Result<()> {
    let (tx, rx) = channel::unbounded::<LatencySample>();
    let mut handles = Vec::with_capacity(identities.len());

    for (worker, identity) in identities.iter().enumerate() {
        let mut session = open_session(worker, config, identity, servers, metrics)?;
        let server = servers[0].public_key.clone();
        let steady = SteadyWorkload::from_config(kind, config);
        let tx = tx.clone();
        handles.push(spawn_worker(worker, move || {
            steady.run(&mut session, &server, |sample| {
                let _ = tx.send(sample);
            });
        })?);
    }
    drop(tx);

    // Ends once every worker has dropped its sender
    for sample in rx {
        println!(
            "#req {} {} {:.3}",
            sample.worker,
            sample.seqno,
            sample.latency.as_secs_f64() * 1000.0
        );
    }

    join_all(handles)
}

fn spawn_worker<F>(worker: usize, body: F) -> Result<thread::JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    Ok(thread::Builder::new()
        .name(format!("worker-{}", worker))
        .spawn(body)?)
}

fn join_all(handles: Vec<thread::JoinHandle<()>>) -> Result<()> {
    for handle in handles {
        if handle.join().is_err() {
            return Err(KeyshardError::Worker("worker thread panicked".to_string()));
        }
    }
    Ok(())
}

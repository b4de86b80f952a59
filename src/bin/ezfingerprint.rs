use clap::{Arg, ArgAction, ArgMatches, Command};
use ezfingerprint_lib::fingerprint::Fingerprinter;
use ezfingerprint_lib::persist::{Persistence, StoreOptions};
use ezfingerprint_lib::probe::{HostPlatform, Platform, SnapshotPlatform};
use ezfingerprint_lib::server::{start_server, ServerState};
use ezfingerprint_lib::settings_manager::{Settings, SettingsManager};
use ezfingerprint_lib::storage::{Transport, TransportRegistry, TransportSelector, DEFAULT_RECORD_NAME};
use ezfingerprint_lib::{hash_fingerprint, FingerprintOptions, ProbeGroup};
use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

type CliResult<T> = Result<T, Box<dyn Error>>;

fn probe_args(command: Command) -> Command {
  command
    .arg(
      Arg::new("skip")
        .long("skip")
        .action(ArgAction::Append)
        .value_parser(|s: &str| s.parse::<ProbeGroup>())
        .help("Probe group to leave out (webgl, webgl-unmasked, media-devices, video-codecs, audio-codecs, fonts, plugins)"),
    )
    .arg(
      Arg::new("network-url")
        .long("network-url")
        .help("Endpoint whose JSON response is merged into the network facet"),
    )
    .arg(
      Arg::new("include-ip")
        .long("include-ip")
        .action(ArgAction::SetTrue)
        .help("Keep the ip returned by the network endpoint"),
    )
    .arg(
      Arg::new("snapshot")
        .long("snapshot")
        .value_parser(clap::value_parser!(PathBuf))
        .help("Answer probes from a captured capability report instead of this machine"),
    )
}

fn record_args(command: Command) -> Command {
  command
    .arg(
      Arg::new("name")
        .short('n')
        .long("name")
        .default_value(DEFAULT_RECORD_NAME)
        .help("Record name"),
    )
    .arg(
      Arg::new("transport")
        .short('t')
        .long("transport")
        .help("Transport name (cookie, local, database); unknown names use cookie"),
    )
}

fn build_cli() -> Command {
  Command::new("ezfingerprint")
    .about("Collect, hash and persist device fingerprints")
    .version(env!("CARGO_PKG_VERSION"))
    .subcommand_required(true)
    .arg_required_else_help(true)
    .subcommand(probe_args(
      Command::new("collect").about("Print the assembled fingerprint as JSON"),
    ))
    .subcommand(probe_args(
      Command::new("hash").about("Print the digest of the assembled fingerprint"),
    ))
    .subcommand(record_args(probe_args(
      Command::new("store")
        .about("Assemble a fingerprint and persist its digest")
        .arg(
          Arg::new("raw")
            .long("raw")
            .action(ArgAction::SetTrue)
            .help("Persist the full fingerprint JSON instead of the digest"),
        ),
    )))
    .subcommand(record_args(
      Command::new("show").about("Print a stored record"),
    ))
    .subcommand(
      Command::new("set-default")
        .about("Save the transport used when --transport is not given")
        .arg(
          Arg::new("transport")
            .required(true)
            .help("Transport name (cookie, local, database)"),
        ),
    )
    .subcommand(
      Command::new("serve")
        .about("Serve the header normalizer on /fingerprint")
        .arg(
          Arg::new("port")
            .short('p')
            .long("port")
            .value_parser(clap::value_parser!(u16))
            .help("Port to listen on (settings value if not specified)"),
        )
        .arg(
          Arg::new("bind")
            .long("bind")
            .value_parser(clap::value_parser!(IpAddr))
            .default_value("127.0.0.1")
            .help("Address to listen on"),
        )
        .arg(
          Arg::new("trust-proxy")
            .long("trust-proxy")
            .action(ArgAction::SetTrue)
            .help("Take the client IP from X-Forwarded-For"),
        ),
    )
}

fn fingerprint_options(settings: &Settings, matches: &ArgMatches) -> FingerprintOptions {
  let mut options = settings.fingerprint_options();
  if let Some(groups) = matches.get_many::<ProbeGroup>("skip") {
    for group in groups {
      options = options.skip(*group);
    }
  }
  if let Some(url) = matches.get_one::<String>("network-url") {
    options = options.with_network_url(url.clone());
  }
  if matches.get_flag("include-ip") {
    options = options.with_include_ip(true);
  }
  options
}

fn platform(matches: &ArgMatches) -> CliResult<Arc<dyn Platform>> {
  match matches.get_one::<PathBuf>("snapshot") {
    Some(path) => {
      let json = std::fs::read_to_string(path)?;
      log::info!("Answering probes from {}", path.display());
      Ok(Arc::new(SnapshotPlatform::from_json(&json)?))
    }
    None => Ok(Arc::new(HostPlatform::new())),
  }
}

fn selector(matches: &ArgMatches) -> TransportSelector {
  matches.get_one::<String>("transport").cloned().into()
}

fn record_name(matches: &ArgMatches) -> String {
  matches
    .get_one::<String>("name")
    .cloned()
    .unwrap_or_else(|| DEFAULT_RECORD_NAME.to_string())
}

async fn run(matches: ArgMatches) -> CliResult<()> {
  let settings = SettingsManager::new().load_settings()?;

  match matches.subcommand() {
    Some(("collect", sub)) => {
      let fingerprinter = Fingerprinter::new(platform(sub)?);
      let fingerprint = fingerprinter
        .assemble(&fingerprint_options(&settings, sub))
        .await?;
      println!("{}", serde_json::to_string_pretty(&fingerprint)?);
    }
    Some(("hash", sub)) => {
      let fingerprinter = Fingerprinter::new(platform(sub)?);
      let fingerprint = fingerprinter
        .assemble(&fingerprint_options(&settings, sub))
        .await?;
      println!("{}", hash_fingerprint(&fingerprint)?);
    }
    Some(("store", sub)) => {
      let fingerprinter = Fingerprinter::new(platform(sub)?);
      let fingerprint = fingerprinter
        .assemble(&fingerprint_options(&settings, sub))
        .await?;
      let persistence = Persistence::new(fingerprinter, TransportRegistry::from_settings(&settings));

      let options = StoreOptions::new()
        .name(record_name(sub))
        .fingerprint(fingerprint)
        .transport(selector(sub));
      let record = if sub.get_flag("raw") {
        persistence.store_raw(options).await?
      } else {
        persistence.store(options).await?
      };
      println!("{}", record.payload);
    }
    Some(("show", sub)) => {
      let registry = TransportRegistry::from_settings(&settings);
      let transport = registry.resolve(&selector(sub));
      let name = record_name(sub);
      match transport.load(&name).await? {
        Some(payload) => println!("{payload}"),
        None => {
          log::error!("No record named {name} in {}", transport.label());
          process::exit(1);
        }
      }
    }
    Some(("set-default", sub)) => {
      let name = sub
        .get_one::<String>("transport")
        .map(String::as_str)
        .unwrap_or_default();
      let settings = SettingsManager::new().set_default_transport(name)?;
      let registry = TransportRegistry::from_settings(&settings);
      let saved = settings.default_transport.unwrap_or_default();
      if !registry.names().contains(&saved) {
        log::warn!("{saved} is not a known transport, records will go to cookie");
      }
      println!("{}", registry.resolve(&TransportSelector::Default).label());
    }
    Some(("serve", sub)) => {
      let port = sub
        .get_one::<u16>("port")
        .copied()
        .unwrap_or(settings.server_port);
      let bind = sub
        .get_one::<IpAddr>("bind")
        .copied()
        .unwrap_or(IpAddr::from([127, 0, 0, 1]));
      let state = ServerState {
        trust_proxy: sub.get_flag("trust-proxy") || settings.trust_proxy,
      };

      let server = start_server(SocketAddr::new(bind, port), state).await?;
      tokio::signal::ctrl_c().await?;
      log::info!("Shutting down fingerprint server");
      server.stop().await;
    }
    _ => unreachable!("subcommand_required is set"),
  }

  Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
  env_logger::Builder::from_default_env()
    .filter_level(log::LevelFilter::Info)
    .format_timestamp_millis()
    .init();

  let matches = build_cli().get_matches();
  if let Err(e) = run(matches).await {
    log::error!("{e}");
    process::exit(1);
  }
}

//! The ftpgate server binary: local storage behind the gateway, accounts from a JSON file.

use clap::{Arg, ArgAction, Command};
use ftpgate::options::{self, Options};
use ftpgate::{GatewayFs, JsonFileAuthenticator, JsonUserStore, ServerExt};
use ftpgate_core::bootstrap::grant_admin_permissions;
use ftpgate_core::meta::MetaList;
use ftpgate_sbe_local::LocalStorage;
use libunftp::ServerBuilder;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const BIND_ADDRESS: &str = "bind-address";
const GREETING: &str = "greeting";
const PASSIVE_PORTS: &str = "passive-ports";
const IDLE_TIMEOUT: &str = "idle-timeout";
const STORAGE_ROOT: &str = "storage-root";
const TEMP_DIR: &str = "temp-dir";
const USERS_FILE: &str = "users-file";
const METAS_FILE: &str = "metas-file";
const PROXY_HEADER: &str = "proxy-header";

fn command() -> Command {
    Command::new("ftpgate")
        .about("An FTP server in front of the file gateway")
        .arg(
            Arg::new(BIND_ADDRESS)
                .short('b')
                .long(BIND_ADDRESS)
                .value_name("HOST:PORT")
                .env("FTPGATE_BIND_ADDRESS")
                .help("The address the control channel listens on")
                .default_value(options::DEFAULT_BIND_ADDRESS),
        )
        .arg(
            Arg::new(GREETING)
                .long(GREETING)
                .value_name("TEXT")
                .env("FTPGATE_GREETING")
                .help("The greeting sent to connecting clients")
                .default_value(options::DEFAULT_GREETING),
        )
        .arg(
            Arg::new(PASSIVE_PORTS)
                .long(PASSIVE_PORTS)
                .value_name("LOW-HIGH")
                .env("FTPGATE_PASSIVE_PORTS")
                .help("The port range handed out for passive data connections"),
        )
        .arg(
            Arg::new(IDLE_TIMEOUT)
                .long(IDLE_TIMEOUT)
                .value_name("SECONDS")
                .env("FTPGATE_IDLE_TIMEOUT")
                .help("Seconds of inactivity after which a session is closed")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(STORAGE_ROOT)
                .short('r')
                .long(STORAGE_ROOT)
                .value_name("DIR")
                .env("FTPGATE_STORAGE_ROOT")
                .help("The directory served by the local storage back-end")
                .required(true),
        )
        .arg(
            Arg::new(TEMP_DIR)
                .long(TEMP_DIR)
                .value_name("DIR")
                .env("FTPGATE_TEMP_DIR")
                .help("Where uploads are buffered before they are stored"),
        )
        .arg(
            Arg::new(USERS_FILE)
                .short('u')
                .long(USERS_FILE)
                .value_name("FILE")
                .env("FTPGATE_USERS_FILE")
                .help("JSON file with the accounts and their credentials")
                .required(true),
        )
        .arg(
            Arg::new(METAS_FILE)
                .short('m')
                .long(METAS_FILE)
                .value_name("FILE")
                .env("FTPGATE_METAS_FILE")
                .help("JSON file with the folder metas"),
        )
        .arg(
            Arg::new(PROXY_HEADER)
                .long(PROXY_HEADER)
                .value_name("NAME:VALUE")
                .env("FTPGATE_PROXY_HEADER")
                .help("A header sent to origins when file links are fetched; may be repeated")
                .action(ArgAction::Append),
        )
}

fn options_from_args(matches: &clap::ArgMatches) -> Result<Options, Box<dyn Error>> {
    let mut opts = Options::default();
    if let Some(addr) = matches.get_one::<String>(BIND_ADDRESS) {
        opts.bind_address = addr.clone();
    }
    if let Some(greeting) = matches.get_one::<String>(GREETING) {
        // parsed once at startup; the server holds on to it until the process exits
        opts.greeting = Box::leak(greeting.clone().into_boxed_str());
    }
    if let Some(ports) = matches.get_one::<String>(PASSIVE_PORTS) {
        opts.passive_ports = options::parse_port_range(ports).ok_or_else(|| format!("invalid passive port range {ports:?}"))?;
    }
    if let Some(secs) = matches.get_one::<u64>(IDLE_TIMEOUT) {
        opts.idle_session_timeout = *secs;
    }
    if let Some(root) = matches.get_one::<String>(STORAGE_ROOT) {
        opts.storage_root = PathBuf::from(root);
    }
    if let Some(dir) = matches.get_one::<String>(TEMP_DIR) {
        opts.temp_dir = PathBuf::from(dir);
    }
    opts.users_file = matches.get_one::<String>(USERS_FILE).map(PathBuf::from);
    opts.metas_file = matches.get_one::<String>(METAS_FILE).map(PathBuf::from);
    for header in matches.get_many::<String>(PROXY_HEADER).into_iter().flatten() {
        let (name, value) = options::parse_header(header)?;
        opts.proxy_header.append(name, value);
    }
    Ok(opts)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opts = options_from_args(&command().get_matches())?;
    let users_file = opts.users_file.clone().ok_or("a users file is required")?;

    let users = Arc::new(JsonUserStore::from_file(&users_file)?);
    grant_admin_permissions(users.as_ref()).await;
    // read after the admin patch so both views of the file agree
    let auth = Arc::new(JsonFileAuthenticator::from_file(&users_file)?);

    let metas = match &opts.metas_file {
        Some(file) => MetaList::from_file(file)?,
        None => MetaList::default(),
    };
    let storage = LocalStorage::new(&opts.storage_root)?;

    let gateway = GatewayFs::new(Arc::new(storage), Arc::new(metas))
        .with_temp_dir(opts.temp_dir.clone())
        .with_proxy_header(opts.proxy_header.clone());

    tracing::info!(addr = %opts.bind_address, root = %opts.storage_root.display(), "starting ftpgate");
    let server = ServerBuilder::with_gateway(gateway, auth, users).options(&opts).build()?;
    server.listen(opts.bind_address.clone()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_arguments() {
        let matches = command()
            .try_get_matches_from([
                "ftpgate",
                "--storage-root",
                "/srv/ftp",
                "--users-file",
                "users.json",
                "--passive-ports",
                "5000-5010",
                "--idle-timeout",
                "30",
                "--proxy-header",
                "User-Agent: ftpgate",
                "--proxy-header",
                "Referer: https://example.com/",
            ])
            .unwrap();
        let opts = options_from_args(&matches).unwrap();
        assert_eq!(opts.bind_address, options::DEFAULT_BIND_ADDRESS);
        assert_eq!(opts.greeting, options::DEFAULT_GREETING);
        assert_eq!(opts.storage_root, PathBuf::from("/srv/ftp"));
        assert_eq!(opts.users_file, Some(PathBuf::from("users.json")));
        assert_eq!(opts.metas_file, None);
        assert_eq!(opts.passive_ports, 5000..=5010);
        assert_eq!(opts.idle_session_timeout, 30);
        assert_eq!(opts.proxy_header.len(), 2);
    }

    #[test]
    fn rejects_bad_port_range() {
        let matches = command()
            .try_get_matches_from([
                "ftpgate",
                "--storage-root",
                "/srv/ftp",
                "--users-file",
                "users.json",
                "--passive-ports",
                "9-1",
            ])
            .unwrap();
        assert!(options_from_args(&matches).is_err());
    }
}

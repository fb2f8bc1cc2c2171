// Entry point for the APDU host CLI
// Every device command goes through AppClient so the send mode is picked in one place
use apdu_block_host::{
    AppClient, ChunkManifest, Command, DerivationPath, HostError, Opt, Settings, TcpTransport,
    GLOBAL_CONFIG,
};
use clap::Parser;
use log::{error, info, LevelFilter};
use std::fs;
use std::process;

fn main() {
    let opt = Opt::parse();

    // Info is enough for one line per operation; --verbose shows every round
    let level = if opt.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::builder()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = load_settings(&opt).and_then(|_| run_command(opt.command)) {
        error!("Error: {e}");
        process::exit(1);
    }
}

// File settings first, then environment, then command-line flags
fn load_settings(opt: &Opt) -> Result<(), HostError> {
    if let Some(path) = &opt.config {
        let mut settings = Settings::load(path)?;
        settings.apply_env()?;
        GLOBAL_CONFIG.replace(settings);
    }
    if let Some(addr) = &opt.addr {
        GLOBAL_CONFIG.set_emulator_addr(addr.clone());
    }
    if opt.blocks {
        GLOBAL_CONFIG.set_use_block_protocol(true);
    }
    Ok(())
}

fn connect() -> Result<AppClient<TcpTransport>, HostError> {
    let settings = GLOBAL_CONFIG.settings();
    info!("Connecting to {}", settings.emulator_addr);
    let transport = TcpTransport::connect(&settings.emulator_addr, settings.exchange_timeout())?;
    Ok(AppClient::new(transport, settings))
}

fn run_command(command: Command) -> Result<(), HostError> {
    match command {
        Command::Version => {
            let version = connect()?.get_app_and_version()?;
            println!("{version}");
        }
        Command::Pubkey { path, confirm } => {
            let path = DerivationPath::parse(&path)?;
            let mut client = connect()?;
            let response = if confirm {
                client.get_public_key_with_confirmation(&path)?
            } else {
                client.get_public_key(&path)?
            };
            println!("Public key: {}", hex::encode(&response.public_key));
            println!("Chain code: {}", hex::encode(&response.chain_code));
        }
        Command::Sign {
            path,
            tx_hex,
            tx_file,
        } => {
            let path = DerivationPath::parse(&path)?;
            let tx = match (tx_hex, tx_file) {
                (Some(hex), _) => hex.0,
                (None, Some(file)) => fs::read(&file)?,
                (None, None) => {
                    return Err(HostError::Config(
                        "one of --tx-hex or --tx-file is required".to_string(),
                    ))
                }
            };
            let signature = connect()?.sign_tx(&path, &tx)?;
            println!("Signature: {}", hex::encode(signature));
        }
        Command::Chunks {
            chunk_size,
            hex,
            file,
        } => {
            let payload = match (hex, file) {
                (Some(hex), _) => hex.0,
                (None, Some(file)) => fs::read(&file)?,
                (None, None) => {
                    return Err(HostError::Config(
                        "one of --hex or --file is required".to_string(),
                    ))
                }
            };
            let mut settings = GLOBAL_CONFIG.settings();
            if let Some(size) = chunk_size {
                settings.chunk_size = size;
            }
            settings.validate()?;

            let manifest = ChunkManifest::build(&payload, settings.chunk_size)?;
            let json = serde_json::to_string_pretty(&manifest)
                .map_err(|e| HostError::Encoding(e.to_string()))?;
            println!("{json}");
        }
    }
    Ok(())
}

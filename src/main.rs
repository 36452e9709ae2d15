//! CLI entry point for the mesh chat core.
//!
//! This binary manages the persistent identity key and configuration, decodes
//! captured datagrams, and runs an in-process demonstration of the
//! send/receive pipeline.

use anyhow::Result;
use base64::{engine::general_purpose, Engine};
use clap::{Parser, Subcommand};
use log::{info, warn};
use meshchat_core::{
    crypto::{self, FileKeyStore, IdentityKeyStore, LocalIdentity, MemoryKeyStore},
    protocol::{codec, PacketType},
    session::parse_combined_blob,
    utils::{MeshConfig, DEFAULT_CONFIG_FILE},
    Inbound, MeshNode,
};
use std::path::PathBuf;

/// Mesh chat core - packet codec and end-to-end encryption for mesh peers
#[derive(Parser)]
#[command(name = "meshchat")]
#[command(about = "Wire codec and per-peer encryption core for a mesh chat client")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,

    /// Data directory for storing keys
    #[arg(short, long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and manage the persistent identity key
    Keys {
        #[command(subcommand)]
        action: KeyCommands,
    },
    /// Generate and validate configuration files
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
    /// Inspect wire packets
    Packet {
        #[command(subcommand)]
        action: PacketCommands,
    },
    /// Run two in-process nodes through a key exchange and a private message
    Demo {
        /// Message Alice sends to Bob
        #[arg(short, long, default_value = "hello from the mesh")]
        message: String,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generate a new identity key pair
    Generate {
        /// Force overwrite existing keys
        #[arg(short, long)]
        force: bool,
    },
    /// Display the identity public key
    Show {
        /// Output format (hex, base64)
        #[arg(short, long, default_value = "hex")]
        format: String,
    },
    /// Erase the persistent identity key
    Wipe,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Generate a default configuration file
    Generate {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        file: Option<PathBuf>,
    },
    /// Show current configuration
    Show {
        /// Output format (toml, json)
        #[arg(short, long, default_value = "toml")]
        format: String,
    },
}

#[derive(Subcommand)]
enum PacketCommands {
    /// Decode a hex-encoded datagram and print its fields
    Decode {
        /// Datagram as hex; whitespace is ignored
        hex: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = MeshConfig::load(cli.config.as_deref())?;

    // Initialize logging
    setup_logging(cli.verbose, cli.quiet, &config.logging.level);

    // Override data directory if provided
    if let Some(data_dir) = cli.data_dir {
        config.storage.rebase(data_dir);
    }

    match cli.command {
        Commands::Keys { action } => handle_key_commands(action, &config),
        Commands::Config { action } => handle_config_commands(action, &config),
        Commands::Packet { action } => handle_packet_commands(action),
        Commands::Demo { message } => handle_demo_command(&message, &config),
    }
}

fn setup_logging(verbose: u8, quiet: bool, configured: &str) {
    let log_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => configured,
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();
}

fn handle_key_commands(action: KeyCommands, config: &MeshConfig) -> Result<()> {
    let store = FileKeyStore::new(config.storage.identity_path());

    match action {
        KeyCommands::Generate { force } => {
            if store.path().exists() {
                if !force {
                    return Err(anyhow::anyhow!(
                        "Identity already exists. Use --force to overwrite."
                    ));
                }
                warn!("Replacing existing identity at {}", store.path().display());
                store.clear()?;
            }

            config.ensure_directories()?;
            let path = store.path().to_path_buf();
            let identity = LocalIdentity::load_or_create(Box::new(store))?;

            println!("✓ Identity generated successfully");
            println!("  Public key: {}", hex::encode(identity.identity_public_key()));
            println!("  Saved to: {}", path.display());
        }
        KeyCommands::Show { format } => {
            let keypair = store.load()?.ok_or_else(|| {
                anyhow::anyhow!("No identity found. Run `meshchat keys generate` first.")
            })?;
            let public_key = keypair.public_key_bytes();

            match format.as_str() {
                "hex" => println!("{}", hex::encode(public_key)),
                "base64" => println!("{}", general_purpose::STANDARD.encode(public_key)),
                _ => return Err(anyhow::anyhow!("Unsupported format: {}", format)),
            }
        }
        KeyCommands::Wipe => {
            if store.path().exists() {
                store.clear()?;
                println!("✓ Identity erased: {}", store.path().display());
            } else {
                println!("No identity stored at {}", store.path().display());
            }
        }
    }
    Ok(())
}

fn handle_config_commands(action: ConfigCommands, config: &MeshConfig) -> Result<()> {
    match action {
        ConfigCommands::Generate { output } => {
            let default_config = MeshConfig::default();
            let output_path = output.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

            default_config.save(&output_path)?;
            println!("✓ Configuration generated: {}", output_path.display());
        }
        ConfigCommands::Validate { file } => {
            let config_to_validate = if let Some(path) = file {
                MeshConfig::from_file(path)?
            } else {
                config.clone()
            };

            config_to_validate.validate()?;
            println!("✓ Configuration is valid");
        }
        ConfigCommands::Show { format } => match format.as_str() {
            "toml" => println!("{}", config.to_toml_string()?),
            "json" => println!("{}", serde_json::to_string_pretty(config)?),
            _ => return Err(anyhow::anyhow!("Unsupported format: {}", format)),
        },
    }
    Ok(())
}

fn handle_packet_commands(action: PacketCommands) -> Result<()> {
    match action {
        PacketCommands::Decode { hex: input } => {
            let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
            let bytes = hex::decode(digits)?;
            let packet = codec::decode_packet(&bytes)?;

            let sent_at = i64::try_from(packet.timestamp)
                .ok()
                .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
                .map_or_else(|| "invalid".to_string(), |t| t.to_rfc3339());

            println!("Packet ({} bytes)", bytes.len());
            println!("==================");
            println!("Version:    {}", packet.version);
            println!("Type:       {} ({})", packet.packet_type, packet.packet_type.code());
            println!("TTL:        {}", packet.ttl);
            println!("Timestamp:  {} ({sent_at})", packet.timestamp);
            println!("Sender:     {}", packet.sender_id);
            match packet.recipient_id {
                Some(recipient) => println!("Recipient:  {recipient}"),
                None => println!("Recipient:  broadcast"),
            }
            println!("Payload:    {} bytes", packet.payload.len());
            println!("            {}", hex::encode(&packet.payload));
            if let Some(signature) = &packet.signature {
                println!("Signature:  {}", hex::encode(signature));
            }
            println!("Message ID: {}", packet.message_id());

            if packet.packet_type == PacketType::KeyExchange {
                let keys = parse_combined_blob(&packet.payload)?;
                println!("Agreement:  {}", hex::encode(keys.agreement));
                println!("Signing:    {}", hex::encode(keys.signing));
                println!("Identity:   {}", hex::encode(keys.identity));
                if let Some(signature) = &packet.signature {
                    let valid = crypto::verify(signature, &packet.payload, &keys.signing);
                    println!("Self-signed: {}", if valid { "valid" } else { "INVALID" });
                }
            }
        }
    }
    Ok(())
}

fn handle_demo_command(message: &str, config: &MeshConfig) -> Result<()> {
    let alice = MeshNode::from_config(config, Box::new(MemoryKeyStore::new()))?;
    let bob = MeshNode::from_config(config, Box::new(MemoryKeyStore::new()))?;
    let carol = MeshNode::from_config(config, Box::new(MemoryKeyStore::new()))?;

    println!("Alice: {}", alice.peer_id());
    println!("Bob:   {}", bob.peer_id());
    println!("Carol: {}", carol.peer_id());
    println!();

    info!("Exchanging announcements");
    for (from, to) in [(&alice, &bob), (&bob, &alice)] {
        let wire = from.announce()?;
        println!("{} announces ({} bytes)", from.peer_id(), wire.len());
        println!("  {}", hex::encode(&wire));
        to.open(&wire)?;
    }
    println!();

    let wire = alice.seal_private(bob.peer_id(), message.as_bytes())?;
    println!("Alice -> Bob private message ({} bytes)", wire.len());
    println!("  {}", hex::encode(&wire));

    // Carol cannot read it, only pass it on.
    if let Inbound::NotForUs(packet) = carol.open(&wire)? {
        match carol.relay(&packet) {
            Some(relayed) => println!(
                "Carol relays it ({} bytes, TTL {})",
                relayed.len(),
                packet.ttl - 1
            ),
            None => println!("Carol drops it: TTL exhausted"),
        }
    }

    match bob.open(&wire)? {
        Inbound::Private { from, plaintext } => {
            println!("Bob decrypts from {from}: {}", String::from_utf8_lossy(&plaintext));
        }
        other => return Err(anyhow::anyhow!("Unexpected inbound packet: {other:?}")),
    }

    Ok(())
}

use std::net::SocketAddr;

use clap::{Args, Subcommand};

use crate::exit::CliResult;

pub mod emit;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the ingest server and forward decoded readings to a sink.
    Serve(ServeArgs),
    /// Act as a simulated sensor, sealing and sending readings.
    Emit(EmitArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args),
        Command::Emit(args) => emit::run(args),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    /// Hex-encoded AES-128 encryption key (16 bytes).
    #[arg(long, env = "TELWIRE_AES_KEY", value_name = "HEX", hide_env_values = true)]
    pub aes_key: String,

    /// Hex-encoded HMAC-SHA256 integrity key.
    #[arg(long, env = "TELWIRE_HMAC_KEY", value_name = "HEX", hide_env_values = true)]
    pub hmac_key: String,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(default_value = "127.0.0.1:9000")]
    pub addr: SocketAddr,

    #[command(flatten)]
    pub keys: KeyArgs,

    /// Forward records to this collector URL instead of stdout JSON lines.
    #[arg(long, value_name = "URL")]
    pub sink: Option<String>,

    /// Per-connection read deadline (e.g. 30s, 500ms).
    #[arg(long, default_value = "30s")]
    pub read_timeout: String,
}

#[derive(Args, Debug)]
pub struct EmitArgs {
    /// Address of the ingest server.
    #[arg(default_value = "127.0.0.1:9000")]
    pub addr: SocketAddr,

    #[command(flatten)]
    pub keys: KeyArgs,

    /// Sensor identifier carried in each reading.
    #[arg(long, default_value = "1")]
    pub sensor_id: u16,

    /// Stop after sending N readings. Default: run until interrupted.
    #[arg(long)]
    pub count: Option<u64>,

    /// Delay between readings (e.g. 5s, 250ms).
    #[arg(long, default_value = "5s")]
    pub interval: String,

    /// Socket write deadline (e.g. 30s, 500ms; 0 disables it).
    #[arg(long, default_value = "30s")]
    pub write_timeout: String,
}

#[derive(Args, Debug, Default)]
pub struct VersionArgs {}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use telwire_codec::KeyMaterial;
use telwire_ingest::{
    HttpSink, IngestConfig, IngestServer, JsonLinesSink, ReadingSink, SinkError,
};

use crate::cmd::ServeArgs;
use crate::exit::{ingest_error, key_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};

/// Sink selected from the command line; each connection gets its own value.
enum CliSink {
    Stdout(JsonLinesSink<std::io::Stdout>),
    Http(HttpSink),
}

impl ReadingSink for CliSink {
    fn deliver(
        &mut self,
        reading: &telwire_codec::SensorReading,
    ) -> Result<(), SinkError> {
        match self {
            CliSink::Stdout(sink) => sink.deliver(reading),
            CliSink::Http(sink) => sink.deliver(reading),
        }
    }
}

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let keys = KeyMaterial::from_hex(&args.keys.aes_key, &args.keys.hmac_key)
        .map_err(|err| key_error("invalid key material", err))?;
    let read_timeout = parse_timeout(&args.read_timeout)?;

    let config = IngestConfig::new(args.addr, keys).with_read_timeout(Some(read_timeout));
    let server = IngestServer::bind(config).map_err(|err| ingest_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let sink_url = args.sink.clone();
    server
        .serve(&running, move || match &sink_url {
            Some(url) => CliSink::Http(HttpSink::new(url.clone())),
            None => CliSink::Stdout(JsonLinesSink::new(std::io::stdout())),
        })
        .map_err(|err| ingest_error("serve failed", err))?;

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported timeout unit: {unit}"),
        )),
    }
}

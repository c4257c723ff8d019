use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use telwire_codec::{FrameConfig, FrameWriter, KeyMaterial, SensorReading};
use tracing::info;

use crate::cmd::EmitArgs;
use crate::exit::{frame_error, io_error, key_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};

pub fn run(args: EmitArgs) -> CliResult<i32> {
    let keys = KeyMaterial::from_hex(&args.keys.aes_key, &args.keys.hmac_key)
        .map_err(|err| key_error("invalid key material", err))?;
    let interval = parse_interval(&args.interval)?;
    // Zero disables the deadline; a stalled server then blocks sends forever.
    let write_timeout = match parse_interval(&args.write_timeout)? {
        d if d.is_zero() => None,
        d => Some(d),
    };

    let stream = TcpStream::connect(args.addr).map_err(|err| io_error("connect failed", err))?;
    let config = FrameConfig {
        write_timeout,
        ..FrameConfig::default()
    };
    let mut writer = FrameWriter::with_config_tcp(stream, keys, config)
        .map_err(|err| frame_error("socket setup failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut sent = 0u64;
    while running.load(Ordering::SeqCst) {
        let reading = simulate_reading(args.sensor_id);
        writer
            .send(&reading)
            .map_err(|err| frame_error("send failed", err))?;
        sent += 1;
        info!(
            sensor_id = reading.sensor_id,
            timestamp = reading.timestamp,
            temperature = reading.temperature,
            pressure = reading.pressure,
            humidity = reading.humidity,
            sent,
            "reading sent"
        );

        if let Some(count) = args.count {
            if sent >= count {
                break;
            }
        }
        std::thread::sleep(interval);
    }

    Ok(SUCCESS)
}

/// Simulated sensor values in the same ranges as the hardware it stands in
/// for: 20–30 °C, 1000–1050 hPa, 30–50 %.
fn simulate_reading(sensor_id: u16) -> SensorReading {
    let mut rng = rand::thread_rng();
    SensorReading {
        sensor_id,
        timestamp: unix_now(),
        temperature: rng.gen_range(20.0..30.0),
        pressure: rng.gen_range(1000.0..1050.0),
        humidity: rng.gen_range(30.0..50.0),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

fn parse_interval(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "interval must not be empty"));
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
        .map_err(|_| CliError::new(USAGE, format!("invalid interval value: {input}")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported interval unit: {unit}"),
        )),
    }
}

use std::io::Write;

use serde_json::json;
use telwire_codec::SensorReading;

use crate::error::SinkError;

/// Downstream collaborator that receives decoded readings.
///
/// Contract: one decoded reading in, one forwarded record out, order
/// preserved within a session. Implementations must not reorder or drop.
pub trait ReadingSink {
    fn deliver(&mut self, reading: &SensorReading) -> Result<(), SinkError>;
}

/// The structured record forwarded for one reading.
pub fn record(reading: &SensorReading) -> serde_json::Value {
    json!({
        "id": reading.sensor_id,
        "timestamp": reading.timestamp,
        "temperature": reading.temperature,
        "pressure": reading.pressure,
        "humidity": reading.humidity,
    })
}

/// Writes one JSON record per line to any `Write` destination.
pub struct JsonLinesSink<W> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReadingSink for JsonLinesSink<W> {
    fn deliver(&mut self, reading: &SensorReading) -> Result<(), SinkError> {
        // One buffered write per record: sessions run on separate threads
        // and may share a destination (stdout), so a record must never be
        // emitted as a sequence of small writes another line can interleave.
        let mut line = serde_json::to_vec(&record(reading))?;
        line.push(b'\n');
        self.out.write_all(&line)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Forwards each record to a collector endpoint as a JSON POST.
pub struct HttpSink {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            url: url.into(),
        }
    }
}

impl ReadingSink for HttpSink {
    fn deliver(&mut self, reading: &SensorReading) -> Result<(), SinkError> {
        self.client
            .post(&self.url)
            .json(&record(reading))
            .send()?
            .error_for_status()?;
        Ok(())
    }
}

impl<S: ReadingSink + ?Sized> ReadingSink for Box<S> {
    fn deliver(&mut self, reading: &SensorReading) -> Result<(), SinkError> {
        (**self).deliver(reading)
    }
}

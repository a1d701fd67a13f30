//! Append-only log of captured handshake messages and its file export.
//!
//! Record format, one per message, kept byte-compatible with existing
//! capture-analysis tooling:
//!
//! ```text
//! SSID:<name> BSSID:<12 upper-case hex digits> M<n>\n
//! <raw EAPOL bytes>\n
//! ```

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::eapol::{HandshakeMessage, MessageNumber};
use crate::error::Result;
use crate::parser::MacAddr;

pub struct CaptureStore {
    records: Vec<HandshakeMessage>,
    capacity: usize,
    dropped: u64,
    /// Records before this index have already been written out.
    exported: usize,
}

impl CaptureStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
            exported: 0,
        }
    }

    /// Append a record. Returns `false` (and counts a drop) once the store
    /// is full; existing records are never displaced.
    pub fn push(&mut self, msg: HandshakeMessage) -> bool {
        if self.records.len() >= self.capacity {
            if self.dropped == 0 {
                log::warn!("Capture store full ({} records); dropping new messages", self.capacity);
            }
            self.dropped += 1;
            return false;
        }
        self.records.push(msg);
        true
    }

    pub fn records(&self) -> &[HandshakeMessage] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn pending(&self) -> usize {
        self.records.len() - self.exported
    }

    pub fn count_of(&self, message: MessageNumber) -> usize {
        self.records.iter().filter(|r| r.message == message).count()
    }

    /// Distinct AP/station pairs with at least one captured message.
    pub fn pairs(&self) -> usize {
        self.records
            .iter()
            .map(|r| (r.bssid, r.station))
            .collect::<HashSet<(MacAddr, MacAddr)>>()
            .len()
    }

    /// Write every record.
    pub fn write_all_to<W: Write>(&self, out: &mut W) -> std::io::Result<usize> {
        for record in &self.records {
            write_record(out, record)?;
        }
        Ok(self.records.len())
    }

    /// Write only the records not yet exported. Each record is marked
    /// exported as soon as it is written, so a failure part way through
    /// never causes a record to be written twice.
    pub fn write_pending_to<W: Write>(&mut self, out: &mut W) -> std::io::Result<usize> {
        let start = self.exported;
        while self.exported < self.records.len() {
            write_record(out, &self.records[self.exported])?;
            self.exported += 1;
        }
        Ok(self.exported - start)
    }

    /// Append pending records to the file at `path`, creating it if needed.
    pub fn save(&mut self, path: &Path) -> Result<usize> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut out = BufWriter::new(file);
        let n = self.write_pending_to(&mut out)?;
        out.flush()?;
        Ok(n)
    }
}

/// The SSID is written as raw bytes; names in legacy encodings survive.
pub fn write_record<W: Write>(out: &mut W, record: &HandshakeMessage) -> std::io::Result<()> {
    out.write_all(b"SSID:")?;
    out.write_all(record.ssid.as_bytes())?;
    writeln!(
        out,
        " BSSID:{} M{}",
        record.bssid.to_compact_hex(),
        record.message.as_u8()
    )?;
    out.write_all(record.payload.as_bytes())?;
    out.write_all(b"\n")
}

//! # Ledger File Format
//!
//! Version 1 is line oriented:
//!
//! ```text
//! # airdrop-ledger v1
//! 0x52908400098527886e0f7030069857d2e4169ee7,0x88df0164...944b
//! 0xab5801a7d398351b8be11c439e05c5b3259aec9b,0x88df0164...944b,0x1c2f...07aa
//! ```
//!
//! Each record is a canonical address followed by zero or more proof
//! references, comma separated. Lines starting with `#` are comments.
//!
//! ## Legacy content
//!
//! Ledgers written before the versioned format are free-form: a list of
//! `address,` lines, a JSON array, or anything else containing addresses. Any
//! line that is not a well-formed v1 record is scanned with
//! [`extract_addresses`]; the addresses found there are recorded without
//! proofs. A line whose trailing fields themselves look like addresses is
//! treated as legacy too, so `0xA,0xB` yields two paid addresses rather than
//! one address with a bogus proof.
//!
//! Lines yielding no address at all are reported as corrupt. The file is
//! never rewritten, so corrupt content survives every later append.

use airdrop_core::{extract_addresses, Address, Ledger, LedgerEntry, ProofRef};

/// First line of every ledger file created by this crate.
pub const LEDGER_HEADER: &str = "# airdrop-ledger v1";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Result of parsing ledger text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedLedger {
    pub entries: Vec<LedgerEntry>,
    /// Version declared by a header line, if any.
    pub version: Option<u32>,
    /// Number of lines parsed through legacy address extraction.
    pub legacy_lines: usize,
    /// One-based numbers of lines that yielded no address.
    pub corrupt_lines: Vec<usize>,
}

impl ParsedLedger {
    /// Whether the header declares a version this crate does not know.
    ///
    /// Records are still read as v1; a later version is expected to stay
    /// address-first.
    pub fn is_newer_format(&self) -> bool {
        self.version.is_some_and(|v| v > FORMAT_VERSION)
    }
}

/// Parse the full text of a ledger file.
pub fn parse_ledger_text(text: &str) -> ParsedLedger {
    let mut parsed = ParsedLedger::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            if parsed.version.is_none() {
                parsed.version = parse_header(comment);
            }
            continue;
        }
        if let Some(entry) = parse_v1_record(line) {
            parsed.entries.push(entry);
            continue;
        }
        let found = extract_addresses(line);
        if found.is_empty() {
            parsed.corrupt_lines.push(idx + 1);
        } else {
            parsed.legacy_lines += 1;
            parsed.entries.extend(found.into_iter().map(LedgerEntry::bare));
        }
    }

    if parsed.is_newer_format() {
        tracing::warn!(
            declared = parsed.version,
            supported = FORMAT_VERSION,
            "ledger declares a newer format version; reading records as v{FORMAT_VERSION}"
        );
    }
    parsed
}

fn parse_header(comment: &str) -> Option<u32> {
    comment
        .trim()
        .strip_prefix("airdrop-ledger v")
        .and_then(|v| v.trim().parse().ok())
}

/// Parse one v1 record; `None` sends the line to legacy extraction.
fn parse_v1_record(line: &str) -> Option<LedgerEntry> {
    let mut fields = line.split(',').map(str::trim);
    let address = Address::parse(fields.next()?).ok()?;
    let mut proofs = Vec::new();
    for field in fields.filter(|f| !f.is_empty()) {
        if Address::parse(field).is_ok() {
            return None;
        }
        proofs.push(ProofRef::new(field).ok()?);
    }
    Some(LedgerEntry::with_proofs(address, proofs))
}

/// Encode one entry as a v1 record, without the trailing newline.
pub fn render_record(entry: &LedgerEntry) -> String {
    let mut line = entry.address.to_string();
    for proof in &entry.proofs {
        line.push(',');
        line.push_str(proof.as_str());
    }
    line
}

/// Encode a whole ledger as a normalized v1 file.
pub fn render_v1(ledger: &Ledger) -> String {
    let mut out = String::with_capacity(LEDGER_HEADER.len() + 1 + ledger.len() * 112);
    out.push_str(LEDGER_HEADER);
    out.push('\n');
    for entry in ledger.entries() {
        out.push_str(&render_record(entry));
        out.push('\n');
    }
    out
}

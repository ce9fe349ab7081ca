//! Parses the four line shapes the capture engine cares about out of the
//! source server's log stream. Everything else is silently `None` — the
//! log is mostly noise to this consumer.

use chrono::NaiveDateTime;
use marty_catalog::TupleId;
use once_cell::sync::Lazy;
use regex::Regex;

/// One relation identifier as carried by a redo record: `<tablespace>/<database>/<relation>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationId {
    pub tablespace: u32,
    pub database: u32,
    pub relation: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Insert { rel: RelationId, tid: TupleId },
    Update { rel: RelationId, old_tid: TupleId, new_tid: TupleId },
    Delete { rel: RelationId, tid: TupleId },
    Commit { at: NaiveDateTime },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    InterruptedLastKnownUpAt(NaiveDateTime),
    ReadyToAcceptReadOnly,
    RecoveryPaused,
    Redo(Payload),
}

static INTERRUPTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"database system was interrupted; last known up at (?P<ts>.+)$").unwrap());
static READY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"database system is ready to accept read only connections").unwrap());
static PAUSED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"recovery has paused").unwrap());
static COMMIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Transaction\s*-\s*commit:\s*(?P<ts>[0-9: .-]+)").unwrap());
static HEAP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"Heap\d?\s*-\s*(?P<op>insert(?:\(init\))?|hot_update|update|delete):\s*rel (?P<ts>\d+)/(?P<db>\d+)/(?P<rel>\d+);\s*tid (?P<block>\d+)/(?P<offset>\d+)(?:;\s*new tid (?P<nblock>\d+)/(?P<noffset>\d+))?",
    )
    .unwrap()
});

/// Parses one log line. Returns `None` for anything not among the four
/// recognised shapes — this is the expected, common case.
pub fn parse_line(line: &str) -> Option<Line> {
    let line = line.trim_end();
    if let Some(caps) = INTERRUPTED_RE.captures(line) {
        return parse_timestamp(&caps["ts"]).map(Line::InterruptedLastKnownUpAt);
    }
    if READY_RE.is_match(line) {
        return Some(Line::ReadyToAcceptReadOnly);
    }
    if PAUSED_RE.is_match(line) {
        return Some(Line::RecoveryPaused);
    }
    if line.contains("REDO @") {
        return parse_payload(line).map(Line::Redo);
    }
    None
}

fn parse_payload(line: &str) -> Option<Payload> {
    if let Some(caps) = COMMIT_RE.captures(line) {
        return parse_timestamp(caps["ts"].trim()).map(|at| Payload::Commit { at });
    }
    let caps = HEAP_RE.captures(line)?;
    let rel = RelationId {
        tablespace: caps["ts"].parse().ok()?,
        database: caps["db"].parse().ok()?,
        relation: caps["rel"].parse().ok()?,
    };
    let tid = TupleId::new(caps["block"].parse().ok()?, caps["offset"].parse().ok()?);
    match &caps["op"] {
        "insert" | "insert(init)" => Some(Payload::Insert { rel, tid }),
        "delete" => Some(Payload::Delete { rel, tid }),
        "update" | "hot_update" => {
            let new_block: u32 = caps.name("nblock")?.as_str().parse().ok()?;
            let new_offset: u16 = caps.name("noffset")?.as_str().parse().ok()?;
            Some(Payload::Update {
                rel,
                old_tid: tid,
                new_tid: TupleId::new(new_block, new_offset),
            })
        }
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

//! Registers the SPARQL builtin functions the expression compiler can't express with native
//! SQLite functions, as scalar functions via `Connection::create_scalar_function` (spec.md
//! §4.6.5). Installed once per connection by [`crate::translate::Translator::new`].

use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, Error as SqliteError};
use sha1::{Digest as Sha1Digest, Sha1};
use sha2::{Digest as Sha2Digest, Sha256, Sha384, Sha512};
use std::sync::atomic::{AtomicI64, Ordering};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

const FLAGS: FunctionFlags = FunctionFlags::SQLITE_UTF8.union(FunctionFlags::SQLITE_DETERMINISTIC);
/// `NOW`/`BNODE` must be re-evaluated on every row: marking them deterministic would let SQLite's
/// query planner constant-fold the (argument-less) call to a single evaluation for the whole
/// query.
const VOLATILE: FunctionFlags = FunctionFlags::SQLITE_UTF8;

pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function("qs_regex", 2, FLAGS, |ctx| {
        let text: String = ctx.get(0)?;
        let pattern: String = ctx.get(1)?;
        let re = Regex::new(&pattern).map_err(user_err)?;
        Ok(re.is_match(&text))
    })?;

    conn.create_scalar_function("qs_contains", 2, FLAGS, |ctx| {
        let haystack: String = ctx.get(0)?;
        let needle: String = ctx.get(1)?;
        Ok(haystack.contains(&needle))
    })?;

    conn.create_scalar_function("qs_strstarts", 2, FLAGS, |ctx| {
        let s: String = ctx.get(0)?;
        let prefix: String = ctx.get(1)?;
        Ok(s.starts_with(&prefix))
    })?;

    conn.create_scalar_function("qs_strends", 2, FLAGS, |ctx| {
        let s: String = ctx.get(0)?;
        let suffix: String = ctx.get(1)?;
        Ok(s.ends_with(&suffix))
    })?;

    conn.create_scalar_function("qs_strbefore", 2, FLAGS, |ctx| {
        let s: String = ctx.get(0)?;
        let needle: String = ctx.get(1)?;
        Ok(s.split_once(&needle).map(|(before, _)| before.to_string()).unwrap_or_default())
    })?;

    conn.create_scalar_function("qs_strafter", 2, FLAGS, |ctx| {
        let s: String = ctx.get(0)?;
        let needle: String = ctx.get(1)?;
        Ok(s.split_once(&needle).map(|(_, after)| after.to_string()).unwrap_or_default())
    })?;

    conn.create_scalar_function("qs_concat", -1, FLAGS, |ctx| {
        let mut out = String::new();
        for i in 0..ctx.len() {
            let part: String = ctx.get(i)?;
            out.push_str(&part);
        }
        Ok(out)
    })?;

    conn.create_scalar_function("qs_sha1", 1, FLAGS, |ctx| {
        let s: String = ctx.get(0)?;
        let mut hasher = Sha1::new();
        hasher.update(s.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    })?;

    conn.create_scalar_function("qs_sha256", 1, FLAGS, |ctx| {
        let s: String = ctx.get(0)?;
        let mut hasher = Sha256::new();
        Sha2Digest::update(&mut hasher, s.as_bytes());
        Ok(hex::encode(Sha2Digest::finalize(hasher)))
    })?;

    conn.create_scalar_function("qs_md5", 1, FLAGS, |ctx| {
        let s: String = ctx.get(0)?;
        Ok(format!("{:x}", md5::compute(s.as_bytes())))
    })?;

    conn.create_scalar_function("qs_ceil", 1, FLAGS, |ctx| {
        let v: f64 = ctx.get(0)?;
        Ok(v.ceil())
    })?;

    conn.create_scalar_function("qs_floor", 1, FLAGS, |ctx| {
        let v: f64 = ctx.get(0)?;
        Ok(v.floor())
    })?;

    conn.create_scalar_function("qs_encode_for_uri", 1, FLAGS, |ctx| {
        let s: String = ctx.get(0)?;
        let mut out = String::with_capacity(s.len());
        for byte in s.as_bytes() {
            match *byte {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(*byte as char),
                other => out.push_str(&format!("%{other:02X}")),
            }
        }
        Ok(out)
    })?;

    conn.create_scalar_function("qs_replace", -1, FLAGS, |ctx| {
        let s: String = ctx.get(0)?;
        let pattern: String = ctx.get(1)?;
        let replacement: String = ctx.get(2)?;
        let case_insensitive = ctx.len() > 3 && ctx.get::<String>(3)?.contains('i');
        let pattern = if case_insensitive { format!("(?i){pattern}") } else { pattern };
        let re = Regex::new(&pattern).map_err(user_err)?;
        // SPARQL REPLACE uses `$N` backreferences; regex's `replace_all` already accepts that syntax.
        Ok(re.replace_all(&s, replacement.as_str()).into_owned())
    })?;

    conn.create_scalar_function("qs_sha384", 1, FLAGS, |ctx| {
        let s: String = ctx.get(0)?;
        let mut hasher = Sha384::new();
        Sha2Digest::update(&mut hasher, s.as_bytes());
        Ok(hex::encode(Sha2Digest::finalize(hasher)))
    })?;

    conn.create_scalar_function("qs_sha512", 1, FLAGS, |ctx| {
        let s: String = ctx.get(0)?;
        let mut hasher = Sha512::new();
        Sha2Digest::update(&mut hasher, s.as_bytes());
        Ok(hex::encode(Sha2Digest::finalize(hasher)))
    })?;

    conn.create_scalar_function("qs_like", 2, FLAGS, |ctx| {
        let s: String = ctx.get(0)?;
        let pattern: String = ctx.get(1)?;
        Ok(sql_like(&s, &pattern))
    })?;

    register_datetime_functions(conn)?;
    register_term_constructor_functions(conn)?;

    Ok(())
}

/// `%`/`_` wildcard matching, the same semantics as SQLite's native `LIKE` operator — used
/// instead of emitting `LIKE` directly so `qs_like` stays usable as an ordinary function call in
/// contexts (e.g. nested inside `IF`) where an infix operator wouldn't parenthesize cleanly.
fn sql_like(s: &str, pattern: &str) -> bool {
    fn matches(s: &[char], p: &[char]) -> bool {
        match p.first() {
            None => s.is_empty(),
            Some('%') => matches(s, &p[1..]) || (!s.is_empty() && matches(&s[1..], p)),
            Some('_') => !s.is_empty() && matches(&s[1..], &p[1..]),
            Some(c) => s.first().is_some_and(|sc| sc.eq_ignore_ascii_case(c)) && matches(&s[1..], &p[1..]),
        }
    }
    let s: Vec<char> = s.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    matches(&s, &p)
}

fn register_datetime_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function("qs_now", 0, VOLATILE, |_ctx| {
        OffsetDateTime::now_utc().format(&Rfc3339).map_err(user_err)
    })?;

    conn.create_scalar_function("qs_year", 1, FLAGS, |ctx| Ok(i64::from(parse_dt(ctx)?.year())))?;
    conn.create_scalar_function("qs_month", 1, FLAGS, |ctx| Ok(i64::from(u8::from(parse_dt(ctx)?.month()))))?;
    conn.create_scalar_function("qs_day", 1, FLAGS, |ctx| Ok(i64::from(parse_dt(ctx)?.day())))?;
    conn.create_scalar_function("qs_hours", 1, FLAGS, |ctx| Ok(i64::from(parse_dt(ctx)?.hour())))?;
    conn.create_scalar_function("qs_minutes", 1, FLAGS, |ctx| Ok(i64::from(parse_dt(ctx)?.minute())))?;
    conn.create_scalar_function("qs_seconds", 1, FLAGS, |ctx| {
        let dt = parse_dt(ctx)?;
        Ok(f64::from(dt.second()) + f64::from(dt.nanosecond()) / 1_000_000_000.0)
    })?;

    conn.create_scalar_function("qs_tz", 1, FLAGS, |ctx| {
        let s: String = ctx.get(0)?;
        Ok(tz_offset_suffix(&s).unwrap_or_default())
    })?;

    conn.create_scalar_function("qs_timezone", 1, FLAGS, |ctx| {
        let dt = parse_dt(ctx)?;
        let offset = dt.offset();
        let total_seconds = i64::from(offset.whole_seconds());
        Ok(format_day_time_duration(total_seconds))
    })?;

    conn.create_scalar_function("qs_datetime_add", 2, FLAGS, |ctx| {
        let dt = parse_dt(ctx)?;
        let seconds: f64 = ctx.get(1)?;
        (dt + Duration::seconds_f64(seconds)).format(&Rfc3339).map_err(user_err)
    })?;

    conn.create_scalar_function("qs_datetime_sub", 2, FLAGS, |ctx| {
        let dt = parse_dt(ctx)?;
        let seconds: f64 = ctx.get(1)?;
        (dt - Duration::seconds_f64(seconds)).format(&Rfc3339).map_err(user_err)
    })?;

    conn.create_scalar_function("qs_datetime_diff", 2, FLAGS, |ctx| {
        let a = parse_dt_arg(ctx, 0)?;
        let b = parse_dt_arg(ctx, 1)?;
        Ok((a - b).as_seconds_f64())
    })?;

    Ok(())
}

fn register_term_constructor_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function("qs_fresh_bnode_storid", 0, VOLATILE, |_ctx| Ok(fresh_bnode_storid()))?;
    conn.create_scalar_function("qs_bnode_labeled", 1, FLAGS, |ctx| {
        let label: String = ctx.get(0)?;
        Ok(labeled_bnode_storid(&label))
    })?;
    Ok(())
}

/// Deterministic negative storid for `BNODE(label)`: the same label always maps to the same
/// blank node. SPARQL only requires this coreference within a single solution mapping; hashing
/// the label is a stricter, simpler guarantee (same label corefers everywhere) since the
/// function has no way to observe query or row boundaries.
fn labeled_bnode_storid(label: &str) -> i64 {
    let mut hasher = Sha256::new();
    Sha2Digest::update(&mut hasher, label.as_bytes());
    let digest = Sha2Digest::finalize(hasher);
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[..8]);
    let magnitude = (u64::from_le_bytes(buf) % (i64::MAX as u64 - 1)) + 1;
    -(magnitude as i64)
}

/// Ephemeral, process-scoped negative storid allocator for `BNODE()`. Deliberately disjoint from
/// the durable, DB-backed `next_blank` counter ([`quadstore_store::Abbreviator::new_blank_node`]):
/// a SQLite scalar function has no reentrant access to the connection it's evaluated under, so it
/// can't take that counter's lock. Starting deep in the negative range and only ever incrementing
/// makes collision with `next_blank` (which starts at -1 and counts down one at a time)
/// astronomically unlikely for any store's realistic lifetime.
fn fresh_bnode_storid() -> i64 {
    static NEXT: AtomicI64 = AtomicI64::new(i64::MIN / 2);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

fn parse_dt(ctx: &rusqlite::functions::Context<'_>) -> rusqlite::Result<OffsetDateTime> {
    parse_dt_arg(ctx, 0)
}

fn parse_dt_arg(ctx: &rusqlite::functions::Context<'_>, i: usize) -> rusqlite::Result<OffsetDateTime> {
    let s: String = ctx.get(i)?;
    parse_datetime(&s).map_err(user_err)
}

/// Parses an `xsd:dateTime`/`xsd:date` lexical form. `xsd:date` (no time-of-day) is widened to
/// midnight UTC so the same field-extraction functions serve both datatypes.
fn parse_datetime(s: &str) -> Result<OffsetDateTime, time::error::Parse> {
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(dt);
    }
    OffsetDateTime::parse(&format!("{s}T00:00:00Z"), &Rfc3339)
}

/// The lexical suffix denoting a dateTime's timezone (`Z`, `+01:00`, `-05:00`), or `None` if the
/// lexical form carries no timezone at all.
fn tz_offset_suffix(s: &str) -> Option<String> {
    if s.ends_with('Z') {
        return Some("Z".to_string());
    }
    let body = s.rsplit('T').next().unwrap_or(s);
    let offset_at = body.rfind(['+', '-'])?;
    Some(body[offset_at..].to_string())
}

/// Formats a whole number of seconds as an `xsd:dayTimeDuration` lexical form (`PT1H`, `-PT30M`).
fn format_day_time_duration(total_seconds: i64) -> String {
    let sign = if total_seconds < 0 { "-" } else { "" };
    let mut rest = total_seconds.unsigned_abs();
    let hours = rest / 3600;
    rest %= 3600;
    let minutes = rest / 60;
    let seconds = rest % 60;
    let mut out = format!("{sign}PT");
    if hours > 0 {
        out.push_str(&format!("{hours}H"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}M"));
    }
    if seconds > 0 || (hours == 0 && minutes == 0) {
        out.push_str(&format!("{seconds}S"));
    }
    out
}

fn user_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> SqliteError {
    SqliteError::UserFunctionError(Box::new(e))
}

/// Minimal hex encoding, avoiding a dependency the teacher's stack doesn't otherwise pull in for
/// a single call site.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        let mut out = String::with_capacity(bytes.as_ref().len() * 2);
        for b in bytes.as_ref() {
            out.push_str(&format!("{b:02x}"));
        }
        out
    }
}

mod md5 {
    use md_5::{Digest, Md5};

    pub fn compute(bytes: &[u8]) -> impl std::fmt::LowerHex {
        let out: [u8; 16] = Md5::digest(bytes).into();
        Md5Digest(out)
    }

    pub struct Md5Digest([u8; 16]);

    impl std::fmt::LowerHex for Md5Digest {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            for b in self.0 {
                write!(f, "{b:02x}")?;
            }
            Ok(())
        }
    }
}

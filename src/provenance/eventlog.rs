//! SW-015: Append-only JSONL log of synth runs.

use crate::core::types::{ProvenanceEvent, TimestampedEvent};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current UTC time as ISO 8601, second precision.
pub fn now_iso8601() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format_iso8601(secs)
}

/// Format seconds since the Unix epoch as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_iso8601(epoch_secs: u64) -> String {
    let days = (epoch_secs / 86_400) as i64;
    let rem = epoch_secs % 86_400;
    let (y, m, d) = civil_from_days(days);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        y,
        m,
        d,
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian date (era-based).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}

/// Generate a synth run ID.
pub fn generate_run_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("s-{:012x}", nanos & 0xFFFF_FFFF_FFFF)
}

/// Event log path inside an output directory.
pub fn event_log_path(out_dir: &Path) -> PathBuf {
    out_dir.join("events.jsonl")
}

/// Append an event to the output directory's event log.
pub fn append_event(out_dir: &Path, event: ProvenanceEvent) -> Result<(), String> {
    let path = event_log_path(out_dir);
    std::fs::create_dir_all(out_dir)
        .map_err(|e| format!("cannot create output dir {}: {}", out_dir.display(), e))?;

    let te = TimestampedEvent {
        ts: now_iso8601(),
        event,
    };
    let json = serde_json::to_string(&te).map_err(|e| format!("JSON serialize error: {}", e))?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| format!("cannot open event log {}: {}", path.display(), e))?;

    writeln!(file, "{}", json).map_err(|e| format!("write error: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sw015_format_known_instants() {
        assert_eq!(format_iso8601(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_iso8601(951_782_400), "2000-02-29T00:00:00Z");
        assert_eq!(format_iso8601(1_771_250_400), "2026-02-16T14:00:00Z");
        assert_eq!(format_iso8601(4_107_542_399), "2100-02-28T23:59:59Z");
    }

    #[test]
    fn test_sw015_now_iso8601_shape() {
        let ts = now_iso8601();
        assert!(ts.starts_with("20"));
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), 20);
    }

    #[test]
    fn test_sw015_generate_run_id() {
        let id = generate_run_id();
        assert!(id.starts_with("s-"));
        assert_eq!(id.len(), 14);
    }

    #[test]
    fn test_sw015_append_multiple() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        append_event(
            &out,
            ProvenanceEvent::SynthStarted {
                stack: "bitbucket".to_string(),
                run_id: "s-abc".to_string(),
                generator: "stackwright".to_string(),
            },
        )
        .unwrap();
        append_event(
            &out,
            ProvenanceEvent::SynthFailed {
                stack: "bitbucket".to_string(),
                run_id: "s-abc".to_string(),
                error: "boom".to_string(),
            },
        )
        .unwrap();

        let content = std::fs::read_to_string(event_log_path(&out)).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"event\":\"synth_started\""));
        assert!(lines[1].contains("\"error\":\"boom\""));
        let parsed: TimestampedEvent = serde_json::from_str(lines[0]).unwrap();
        assert!(parsed.ts.ends_with('Z'));
    }
}

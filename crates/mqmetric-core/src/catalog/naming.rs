//! Derivation of metric names from the server's element descriptions.
//!
//! Descriptions such as "Queue Depth - High Water Mark" become
//! `queue_depth_high_water_mark`, with units moved to a single suffix.

use super::datatype::Datatype;

/// Unit tokens removed before the datatype's suffix is appended.
/// `_bytes` must precede `_byte`, and `_seconds` precede `_second`.
const UNIT_TOKENS: &[&str] = &[
    "_count",
    "_bytes",
    "_byte",
    "_seconds",
    "_second",
    "_percentage",
];

/// Builds the metric name for an element description.
pub fn metric_name(description: &str, datatype: Datatype) -> String {
    let mut s: String = description
        .chars()
        .map(|c| match c {
            ' ' | '/' | '-' => '_',
            c => c,
        })
        .collect();

    s = collapse_underscores(&s).to_lowercase();

    for token in UNIT_TOKENS {
        s = s.replace(token, "");
    }

    s = s.replace("messages_expired", "expired_messages");

    match datatype {
        Datatype::Percent | Datatype::Hundredths => s.push_str("_percentage"),
        Datatype::Mb | Datatype::Gb => s.push_str("_bytes"),
        Datatype::Microsec => s.push_str("_seconds"),
        _ => {
            if s.contains("_total") {
                s = s.replace("_total", "");
                s.push_str("_total");
            } else if s.contains("log_") {
                // Log volumes are reported as plain units but are byte counts.
                s.push_str("_bytes");
            }

            // Some descriptions exist both as "X count" and "X byte count".
            if description.contains("byte count") {
                s.push_str("_bytes");
            } else if description.ends_with(" count") && !s.contains("_count") {
                s.push_str("_count");
            }
        }
    }

    s
}

fn collapse_underscores(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut previous_underscore = false;
    for c in s.chars() {
        if c == '_' {
            if !previous_underscore {
                out.push(c);
            }
            previous_underscore = true;
        } else {
            out.push(c);
            previous_underscore = false;
        }
    }
    out
}

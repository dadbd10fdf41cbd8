// src/specialist/report.rs
// Pipe-table payload carried by specialist replies:
//
// | Key | Value |
// | --- | --- |
// | Status | SUCCESS |
// | Agent | coder |
// | Data | first line<br/>second line |

use serde::Serialize;
use std::fmt::Write as _;

pub const STATUS_SUCCESS: &str = "SUCCESS";
pub const STATUS_ERROR: &str = "ERROR";

const LINE_BREAK: &str = "<br/>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecialistReport {
    pub status: String,
    pub agent: String,
    pub data: String,
}

impl SpecialistReport {
    pub fn success(agent: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            status: STATUS_SUCCESS.to_string(),
            agent: agent.into(),
            data: data.into(),
        }
    }

    pub fn failure(agent: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            agent: agent.into(),
            data: data.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.eq_ignore_ascii_case(STATUS_SUCCESS)
    }

    pub fn to_table(&self) -> String {
        let mut table = String::new();
        let _ = writeln!(table, "| Key | Value |");
        let _ = writeln!(table, "| --- | --- |");
        let _ = writeln!(table, "| Status | {} |", escape(&self.status));
        let _ = writeln!(table, "| Agent | {} |", escape(&self.agent));
        let _ = writeln!(table, "| Data | {} |", escape(&self.data));
        table
    }

    /// Decode a table produced by [`to_table`](Self::to_table).
    /// Returns `None` when no `Data` row is present.
    pub fn parse(table: &str) -> Option<Self> {
        let mut status = None;
        let mut agent = None;
        let mut data = None;

        // Header and separator rows fall through to the catch-all arm.
        for line in table.lines().map(str::trim) {
            let Some(inner) = line.strip_prefix('|') else {
                continue;
            };
            let inner = inner.strip_suffix('|').unwrap_or(inner);
            let Some((key, value)) = inner.split_once('|') else {
                continue;
            };
            let value = unescape(value.trim());
            match key.trim().to_lowercase().as_str() {
                "status" => status = Some(value),
                "agent" => agent = Some(value),
                "data" => data = Some(value),
                _ => {}
            }
        }

        Some(Self {
            status: status.unwrap_or_else(|| STATUS_SUCCESS.to_string()),
            agent: agent.unwrap_or_default(),
            data: data?,
        })
    }
}

// Newlines would end the row and a bare pipe would split the cell.
// `&` and `<` are escaped too so that literal entities and `<br/>` in the
// data survive decoding.
const ESCAPES: [(&str, char); 4] = [
    (LINE_BREAK, '\n'),
    ("&#124;", '|'),
    ("&lt;", '<'),
    ("&amp;", '&'),
];

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.replace("\r\n", "\n").chars() {
        match ESCAPES.iter().find(|(_, raw)| *raw == c) {
            Some((entity, _)) => escaped.push_str(entity),
            None => escaped.push(c),
        }
    }
    escaped
}

fn unescape(value: &str) -> String {
    let mut decoded = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(c) = rest.chars().next() {
        match ESCAPES.iter().find(|(entity, _)| rest.starts_with(*entity)) {
            Some((entity, raw)) => {
                decoded.push(*raw);
                rest = &rest[entity.len()..];
            }
            None => {
                decoded.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    decoded
}

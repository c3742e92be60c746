use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use stsbus_frame::Status;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Outcome of one bus verb.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub id: u8,
    pub verb: &'static str,
    /// Value written (move, set-*) or commanded goal (sweep).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u16>,
    /// Value read back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub faults: Vec<&'static str>,
}

impl Record {
    pub fn new(id: u8, verb: &'static str) -> Self {
        Self {
            id,
            verb,
            target: None,
            value: None,
            status: None,
            faults: Vec::new(),
        }
    }

    pub fn target(mut self, target: u16) -> Self {
        self.target = Some(target);
        self
    }

    pub fn value(mut self, value: Option<u16>) -> Self {
        self.value = value;
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status.to_string());
        self.faults = status.faults();
        self
    }
}

/// One line of `decode` output: a frame or a rejected frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedEntry {
    /// Byte offset of the frame header, or of the byte that failed it.
    pub offset: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<u8>,
    /// Instruction name when the code is a known instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instruction: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn print_record(record: &Record, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(record),
        OutputFormat::Table => print_record_table(std::slice::from_ref(record)),
        OutputFormat::Pretty => println!("{}", pretty_record(record)),
    }
}

pub fn print_record_table(records: &[Record]) {
    let mut table = new_table(vec!["ID", "VERB", "TARGET", "VALUE", "STATUS"]);
    for record in records {
        table.add_row(vec![
            record.id.to_string(),
            record.verb.to_string(),
            optional(record.target),
            optional(record.value),
            record.status.clone().unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{table}");
}

pub fn print_decoded(entries: &[DecodedEntry], format: OutputFormat) {
    match format {
        OutputFormat::Json => entries.iter().for_each(print_json),
        OutputFormat::Table => {
            let mut table = new_table(vec!["OFFSET", "ID", "CODE", "INSTRUCTION", "PARAMS", "ERROR"]);
            for entry in entries {
                table.add_row(vec![
                    entry.offset.to_string(),
                    optional(entry.id),
                    entry
                        .code
                        .map(|code| format!("0x{code:02X}"))
                        .unwrap_or_else(|| "-".to_string()),
                    entry.instruction.unwrap_or("-").to_string(),
                    entry.params.clone().unwrap_or_default(),
                    entry.error.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for entry in entries {
                match (&entry.error, entry.id, entry.code) {
                    (Some(error), _, _) => println!("@{:<6} error: {error}", entry.offset),
                    (None, Some(id), Some(code)) => println!(
                        "@{:<6} id={id} code=0x{code:02X} ({}) params=[{}]",
                        entry.offset,
                        entry.instruction.unwrap_or("reply"),
                        entry.params.as_deref().unwrap_or_default()
                    ),
                    _ => println!("@{}", entry.offset),
                }
            }
        }
    }
}

fn pretty_record(record: &Record) -> String {
    let mut line = format!("servo {} {}", record.id, record.verb);
    if let Some(target) = record.target {
        line.push_str(&format!(" target={target}"));
    }
    if let Some(value) = record.value {
        line.push_str(&format!(" value={value}"));
    }
    if let Some(status) = &record.status {
        line.push_str(&format!(" status={status}"));
    }
    line
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_json_omits_empty_fields() {
        let record = Record::new(2, "read-pos").value(Some(1306));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"id": 2, "verb": "read-pos", "value": 1306}));
    }

    #[test]
    fn record_status_lists_faults() {
        let record = Record::new(1, "ping").status(Status::new(Status::OVERHEAT | Status::VOLTAGE));
        assert_eq!(record.faults, vec!["voltage", "overheat"]);
        assert_eq!(pretty_record(&record), "servo 1 ping status=voltage|overheat");
    }

    #[test]
    fn pretty_record_with_target() {
        let record = Record::new(3, "move").target(2048);
        assert_eq!(pretty_record(&record), "servo 3 move target=2048");
    }
}

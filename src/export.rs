//! Delimited-text export of ping records.

use std::io::{self, Write};

use crate::db::PingRecord;

const HEADER: [&str; 3] = ["Result", "Timestamp", "IP Address"];

/// Write records as CSV: classification, timestamp, target.
///
/// Row identifiers are never exported.
pub fn write_csv<'a, W, I>(records: I, mut out: W) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a PingRecord>,
{
    write_row(&mut out, &HEADER)?;
    for record in records {
        write_row(
            &mut out,
            &[
                record.classification().as_str(),
                record.timestamp(),
                record.target(),
            ],
        )?;
    }
    out.flush()
}

fn write_row<W: Write>(out: &mut W, fields: &[&str]) -> io::Result<()> {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        write_field(out, field)?;
    }
    out.write_all(b"\r\n")
}

fn write_field<W: Write>(out: &mut W, field: &str) -> io::Result<()> {
    if field.contains([',', '"', '\r', '\n']) {
        write!(out, "\"{}\"", field.replace('"', "\"\""))
    } else {
        out.write_all(field.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Classification;
    use chrono::NaiveDateTime;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, crate::db::TIMESTAMP_FORMAT).unwrap()
    }

    #[test]
    fn test_csv_columns_and_header() {
        let records = vec![
            PingRecord::at(Classification::Success, "10.0.0.1", at("2024-05-01 12:00:01")),
            PingRecord::at(Classification::Failure, "10.0.0.2", at("2024-05-01 12:00:00")),
        ];
        let mut out = Vec::new();
        write_csv(&records, &mut out).unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Result,Timestamp,IP Address\r\n\
             Success,2024-05-01 12:00:01,10.0.0.1\r\n\
             Failure,2024-05-01 12:00:00,10.0.0.2\r\n"
        );
    }

    #[test]
    fn test_csv_quotes_special_fields() {
        let records = [PingRecord::at(
            Classification::Failure,
            "odd,\"host\"",
            at("2024-05-01 12:00:00"),
        )];
        let mut out = Vec::new();
        write_csv(&records, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("Failure,2024-05-01 12:00:00,\"odd,\"\"host\"\"\"\r\n"));
    }

    #[test]
    fn test_csv_empty_has_header_only() {
        let mut out = Vec::new();
        write_csv(std::iter::empty(), &mut out).unwrap();
        assert_eq!(out, b"Result,Timestamp,IP Address\r\n");
    }
}

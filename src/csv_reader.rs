use anyhow::{Context, Result};
use std::io::{self, Read};

/// Raw CSV contents: headers in file order (duplicates kept) and string rows.
#[derive(Debug, Clone)]
pub struct CsvData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Read CSV data from stdin
pub fn read_csv_from_stdin() -> Result<CsvData> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read from stdin")?;
    parse_csv(&input)
}

/// Parse CSV text. Short rows are padded with empty cells.
pub fn parse_csv(input: &str) -> Result<CsvData> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    if headers.is_empty() {
        anyhow::bail!("CSV input has no header row");
    }

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to parse CSV record {}", line + 1))?;
        let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Ok(CsvData { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv() {
        let csv = parse_csv("group,0 - 10,10 - 20\nA,3,4\nB,5\n").unwrap();
        assert_eq!(csv.headers, vec!["group", "0 - 10", "10 - 20"]);
        assert_eq!(csv.rows.len(), 2);
        assert_eq!(csv.rows[1], vec!["B", "5", ""]);
    }

    #[test]
    fn test_parse_csv_keeps_duplicate_headers() {
        let csv = parse_csv("0 - 1,0 - 1\n1,2\n").unwrap();
        assert_eq!(csv.headers, vec!["0 - 1", "0 - 1"]);
        assert_eq!(csv.rows[0], vec!["1", "2"]);
    }

    #[test]
    fn test_parse_csv_headers_only() {
        let csv = parse_csv("a,b\n").unwrap();
        assert!(csv.rows.is_empty());
    }
}

//! Reader for the whitespace-separated game export.
//!
//! Columns: `GAME_DATE_EST TEAM_ID_home PTS_home FG_PCT_home FT_PCT_home
//! FG3_PCT_home AST_home REB_home HOME_TEAM_WINS`, preceded by one header line.

use crate::record::GameRecord;
use crate::types::RecordId;
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Parsed records plus the number of data lines that were rejected.
#[derive(Debug, Default)]
pub struct LoadedRecords {
    pub records: Vec<GameRecord>,
    pub skipped: usize,
}

pub fn load_records(path: impl AsRef<Path>) -> Result<LoadedRecords> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let loaded = parse_records(BufReader::new(file))?;
    info!(path = %path.display(), records = loaded.records.len(), skipped = loaded.skipped, "loaded records");
    Ok(loaded)
}

/// Every data line consumes a record id, starting at 1, even when it is skipped.
pub fn parse_records<R: BufRead>(reader: R) -> Result<LoadedRecords> {
    let mut loaded = LoadedRecords::default();
    let mut lines = reader.lines();

    if lines.next().transpose()?.is_none() {
        return Ok(loaded);
    }

    let mut next_id: RecordId = 1;
    for (i, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let record_id = next_id;
        next_id += 1;

        match parse_line(record_id, &line, i + 2) {
            Ok(record) => loaded.records.push(record),
            Err(err) => {
                warn!(%err, "skipping line");
                loaded.skipped += 1;
            }
        }
    }

    Ok(loaded)
}

pub fn parse_line(record_id: RecordId, line: &str, line_no: usize) -> Result<GameRecord> {
    let mut fields = line.split_whitespace();
    let mut record = GameRecord {
        record_id,
        ..GameRecord::default()
    };

    let date = fields.next().ok_or_else(|| parse_error(line_no, "missing GAME_DATE_EST"))?;
    record
        .set_game_date(date)
        .map_err(|err| parse_error(line_no, &err.to_string()))?;
    record.team_id_home = field(&mut fields, line_no, "TEAM_ID_home")?;
    record.pts_home = field(&mut fields, line_no, "PTS_home")?;
    record.fg_pct_home = field(&mut fields, line_no, "FG_PCT_home")?;
    record.ft_pct_home = field(&mut fields, line_no, "FT_PCT_home")?;
    record.fg3_pct_home = field(&mut fields, line_no, "FG3_PCT_home")?;
    record.ast_home = field(&mut fields, line_no, "AST_home")?;
    record.reb_home = field(&mut fields, line_no, "REB_home")?;
    record.home_team_wins = field::<u8>(&mut fields, line_no, "HOME_TEAM_WINS")? != 0;

    if record.fg_pct_home.is_nan() || record.ft_pct_home.is_nan() || record.fg3_pct_home.is_nan() {
        return Err(parse_error(line_no, "percentage is NaN"));
    }

    Ok(record)
}

fn field<'a, T: FromStr>(
    fields: &mut impl Iterator<Item = &'a str>,
    line_no: usize,
    name: &str,
) -> Result<T> {
    let raw = fields
        .next()
        .ok_or_else(|| parse_error(line_no, &format!("missing {}", name)))?;
    raw.parse()
        .map_err(|_| parse_error(line_no, &format!("invalid {} {:?}", name, raw)))
}

fn parse_error(line: usize, message: &str) -> Error {
    Error::Parse {
        line,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "GAME_DATE_EST\tTEAM_ID_home\tPTS_home\tFG_PCT_home\tFT_PCT_home\tFG3_PCT_home\tAST_home\tREB_home\tHOME_TEAM_WINS\n";

    #[test]
    fn test_parse_records() {
        let input = format!(
            "{}22/12/2022\t1610612740\t126\t0.484\t0.926\t0.382\t25\t46\t1\n22/12/2022\t1610612762\t120\t0.488\t0.952\t0.457\t16\t40\t1\n",
            HEADER
        );
        let loaded = parse_records(Cursor::new(input)).unwrap();
        assert_eq!(loaded.skipped, 0);
        assert_eq!(loaded.records.len(), 2);

        let first = &loaded.records[0];
        assert_eq!(first.record_id, 1);
        assert_eq!(first.game_date(), "22/12/2022");
        assert_eq!(first.team_id_home, 1610612740);
        assert_eq!(first.pts_home, 126);
        assert_eq!(first.fg_pct_home, 0.484);
        assert!(first.home_team_wins);
        assert_eq!(loaded.records[1].record_id, 2);
    }

    #[test]
    fn test_malformed_lines_skipped_but_numbered() {
        let input = format!(
            "{}1/1/2020 1 100 0.5 0.5 0.5 20 40 1\n2/1/2020 1 100\n3/1/2020 1 90 abc 0.5 0.5 20 40 0\n4/1/2020 1 95 0.4 0.5 0.5 20 40 0\n",
            HEADER
        );
        let loaded = parse_records(Cursor::new(input)).unwrap();
        assert_eq!(loaded.skipped, 2);
        let ids: Vec<_> = loaded.records.iter().map(|r| r.record_id).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn test_header_only() {
        let loaded = parse_records(Cursor::new(HEADER)).unwrap();
        assert!(loaded.records.is_empty());
        assert!(parse_records(Cursor::new("")).unwrap().records.is_empty());
    }

    #[test]
    fn test_parse_line_error() {
        let err = parse_line(1, "1/1/2020 1 100 0.5", 7).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 7, .. }));
    }
}

//! Replays a recorded table-editing session against a [`RowRegistry`].
//!
//! Scripts are CSV files with an `Op,Parent,Address,Score` header:
//!
//! ```text
//! Op,Parent,Address,Score
//! insert,3,sec3.row{id}.score,
//! add,3,sec3.extra.score,
//! score,,sec3.row1000.score,4.5
//! remove,3,sec3.extra.score,
//! ```

use crate::error::{RegistryError, Result};
use crate::registry::{ParentRowIndex, RowId, RowRegistry, ScoreAddress};
use crate::totals::SectionTotals;
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info};
use std::{collections::BTreeMap, io::Read, path::Path};

const EXPECTED_HEADERS: [&str; 4] = ["Op", "Parent", "Address", "Score"];
const ID_PLACEHOLDER: &str = "{id}";

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOp {
    Alloc,
    /// Allocate an id and register `template` (with `{id}` substituted).
    Insert {
        parent: ParentRowIndex,
        template: String,
    },
    Add {
        parent: ParentRowIndex,
        address: String,
    },
    Remove {
        parent: ParentRowIndex,
        address: String,
    },
    Score {
        address: String,
        value: f64,
    },
    Reset,
}

/// One editing session: the registry plus the latest score entered per row.
#[derive(Debug, Clone, Default)]
pub struct Session {
    registry: RowRegistry,
    scores: BTreeMap<ScoreAddress, f64>,
    last_allocated: Option<RowId>,
}

impl Session {
    pub fn new(reserved_threshold: u64) -> Result<Self> {
        Ok(Self {
            registry: RowRegistry::with_threshold(reserved_threshold)?,
            ..Self::default()
        })
    }

    pub fn registry(&self) -> &RowRegistry {
        &self.registry
    }

    pub fn last_allocated(&self) -> Option<RowId> {
        self.last_allocated
    }

    pub fn score_of(&self, address: &str) -> Option<f64> {
        self.scores.get(address).copied()
    }

    pub fn totals(&self) -> SectionTotals {
        SectionTotals::from_scores(
            &self.registry,
            self.scores.iter().map(|(a, &v)| (a.as_str(), v)),
        )
    }

    pub fn apply(&mut self, op: ScriptOp) -> Result<()> {
        match op {
            ScriptOp::Alloc => {
                let id = self.registry.allocate_row_id()?;
                debug!("Allocated row id {id}");
                self.last_allocated = Some(id);
            }
            ScriptOp::Insert { parent, template } => {
                let id = self.registry.insert_row(parent, |id| {
                    ScoreAddress::new(template.replace(ID_PLACEHOLDER, &id.to_string()))
                })?;
                self.last_allocated = Some(id);
            }
            ScriptOp::Add { parent, address } => self.registry.add_child(parent, address)?,
            ScriptOp::Remove { parent, address } => self.registry.remove_child(parent, &address),
            ScriptOp::Score { address, value } => {
                self.scores.insert(ScoreAddress::new(address), value);
            }
            ScriptOp::Reset => {
                self.registry.reset();
                self.scores.clear();
                self.last_allocated = None;
            }
        }
        Ok(())
    }

    pub fn replay_csv<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let file = std::fs::File::open(path)?;
        self.replay_from_reader(file)
    }

    /// Applies every operation in the script, stopping at the first error.
    /// Returns the number of operations applied.
    pub fn replay_from_reader<R: Read>(&mut self, reader: R) -> Result<usize> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        validate_headers(&mut rdr)?;

        let mut applied = 0;
        for (i, result) in rdr.records().enumerate() {
            let rec = result?;
            let row = i + 2; // 1-indexed, plus header

            if let Some(op) = parse_record(&rec, row)? {
                self.apply(op)?;
                applied += 1;
            }
        }

        info!(
            "Replayed {applied} operations: {} rows under {} parents",
            self.registry.len(),
            self.registry.parents().count()
        );
        Ok(applied)
    }
}

fn validate_headers<R: Read>(rdr: &mut csv::Reader<R>) -> Result<()> {
    let headers = rdr
        .headers()
        .map_err(|e| RegistryError::ScriptHeader(format!("Failed to read headers: {e}")))?;

    for (index, expected) in EXPECTED_HEADERS.iter().enumerate() {
        match headers.get(index) {
            Some(found) if found.eq_ignore_ascii_case(expected) => {}
            Some(found) => {
                return Err(RegistryError::ScriptHeader(format!(
                    "Expected '{expected}' in column {index}, found '{found}'"
                )));
            }
            None => {
                return Err(RegistryError::ScriptHeader(format!(
                    "Missing '{expected}' column at index {index}"
                )));
            }
        }
    }
    Ok(())
}

fn parse_record(rec: &StringRecord, row: usize) -> Result<Option<ScriptOp>> {
    if rec.iter().all(|f| f.is_empty()) {
        return Ok(None);
    }

    let op = column(rec, 0);
    let parsed = match op.to_ascii_lowercase().as_str() {
        "alloc" => ScriptOp::Alloc,
        "reset" => ScriptOp::Reset,
        "insert" => {
            let template = required(rec, 2, "Address", row)?;
            if !template.contains(ID_PLACEHOLDER) {
                return Err(script_error(
                    row,
                    format!("insert template {template:?} has no {ID_PLACEHOLDER} placeholder"),
                ));
            }
            ScriptOp::Insert {
                parent: parse_parent(rec, row)?,
                template: template.to_string(),
            }
        }
        "add" => ScriptOp::Add {
            parent: parse_parent(rec, row)?,
            address: required(rec, 2, "Address", row)?.to_string(),
        },
        "remove" => ScriptOp::Remove {
            parent: parse_parent(rec, row)?,
            address: required(rec, 2, "Address", row)?.to_string(),
        },
        "score" => {
            let raw = required(rec, 3, "Score", row)?;
            let value = raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| script_error(row, format!("invalid score {raw:?}")))?;
            ScriptOp::Score {
                address: required(rec, 2, "Address", row)?.to_string(),
                value,
            }
        }
        _ => return Err(script_error(row, format!("unknown operation {op:?}"))),
    };
    Ok(Some(parsed))
}

fn column(rec: &StringRecord, index: usize) -> &str {
    rec.get(index).unwrap_or("")
}

fn required<'r>(rec: &'r StringRecord, index: usize, name: &str, row: usize) -> Result<&'r str> {
    match column(rec, index) {
        "" => Err(script_error(row, format!("missing {name}"))),
        value => Ok(value),
    }
}

fn parse_parent(rec: &StringRecord, row: usize) -> Result<ParentRowIndex> {
    let raw = required(rec, 1, "Parent", row)?;
    raw.parse()
        .map_err(|_| script_error(row, format!("invalid parent index {raw:?}")))
}

fn script_error(row: usize, message: String) -> RegistryError {
    RegistryError::ScriptRow { row, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Op,Parent,Address,Score\n";

    fn replay(body: &str) -> (Session, Result<usize>) {
        let mut session = Session::new(1000).unwrap();
        let script = format!("{HEADER}{body}");
        let result = session.replay_from_reader(script.as_bytes());
        (session, result)
    }

    #[test]
    fn test_replay_example_session() {
        let (session, result) = replay(
            "insert,3,sec3.row{id}.score,\n\
             insert,3,sec3.row{id}.score,\n\
             remove,3,sec3.row1000.score,\n",
        );

        assert_eq!(result.unwrap(), 3);
        let registry = session.registry();
        assert_eq!(
            registry.children_of(3),
            &[ScoreAddress::from("sec3.row1001.score")]
        );
        assert_eq!(registry.parent_of("sec3.row1000.score"), None);
        assert_eq!(session.last_allocated(), Some(RowId::new(1001)));
    }

    #[test]
    fn test_scores_feed_totals() {
        let (session, result) = replay(
            "add,1,a,\n\
             add,1,b,\n\
             add,2,c,\n\
             score,,a,1.5\n\
             score,,b,2\n\
             score,,c,4\n\
             score,,a,3\n",
        );

        result.unwrap();
        assert_eq!(session.score_of("a"), Some(3.0));
        let totals = session.totals();
        assert_eq!(totals.total_for(1), 5.0);
        assert_eq!(totals.total_for(2), 4.0);
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let (_, result) = replay("alloc,,,\n,,,\nalloc\n");
        assert_eq!(result.unwrap(), 2);
    }

    #[test]
    fn test_reset_restarts_ids() {
        let (session, result) = replay("alloc\nalloc\nadd,1,a,\nscore,,a,2\nreset\nalloc\n");
        result.unwrap();
        assert_eq!(session.last_allocated(), Some(RowId::new(1000)));
        assert!(session.registry().is_empty());
        assert_eq!(session.score_of("a"), None);
    }

    #[test]
    fn test_duplicate_registration_aborts_replay() {
        let (session, result) = replay("add,1,a,\nadd,2,a,\nadd,2,b,\n");
        assert!(matches!(
            result,
            Err(RegistryError::InvariantViolation { .. })
        ));
        assert_eq!(session.registry().parent_of("a"), Some(1));
        assert_eq!(session.registry().parent_of("b"), None);
    }

    #[test]
    fn test_malformed_rows_report_line_number() {
        let (_, result) = replay("alloc\nadd,x,a,\n");
        match result {
            Err(RegistryError::ScriptRow { row, .. }) => assert_eq!(row, 3),
            other => panic!("unexpected result: {other:?}"),
        }

        let (_, result) = replay("frobnicate,1,a,\n");
        assert!(matches!(result, Err(RegistryError::ScriptRow { row: 2, .. })));

        let (_, result) = replay("insert,1,no_placeholder,\n");
        assert!(matches!(result, Err(RegistryError::ScriptRow { .. })));

        let (_, result) = replay("score,,a,NaN\n");
        assert!(matches!(result, Err(RegistryError::ScriptRow { .. })));
    }

    #[test]
    fn test_invalid_header() {
        let mut session = Session::new(1000).unwrap();
        let result = session.replay_from_reader("Key,Count\nA,1\n".as_bytes());
        assert!(matches!(result, Err(RegistryError::ScriptHeader(_))));
    }

    #[test]
    fn test_replay_csv_missing_file() {
        let mut session = Session::new(1000).unwrap();
        let result = session.replay_csv("does/not/exist.csv");
        assert!(matches!(result, Err(RegistryError::Io(_))));
    }
}

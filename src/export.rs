use crate::error::{RegistryError, Result};
use crate::registry::RowRegistry;
use crate::totals::SectionTotals;
use chrono::Local;
use csv::{Terminator, Writer, WriterBuilder};
use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

/// Writes the rows registered under each parent, in on-screen order.
pub fn export_layout_to_csv_with_path(
    registry: &RowRegistry,
    output_dir: Option<&Path>,
) -> Result<PathBuf> {
    let (file_path, mut wtr) = create_writer("rows", output_dir)?;

    wtr.write_record(["Parent", "Position", "Address"])?;
    for parent in registry.parents() {
        let parent_s = parent.to_string();
        for (position, address) in registry.children_of(parent).iter().enumerate() {
            let position_s = position.to_string();
            wtr.write_record([parent_s.as_str(), position_s.as_str(), address.as_str()])?;
        }
    }

    wtr.flush()?;
    Ok(file_path)
}

pub fn export_totals_to_csv_with_path(
    totals: &SectionTotals,
    output_dir: Option<&Path>,
) -> Result<PathBuf> {
    let (file_path, mut wtr) = create_writer("totals", output_dir)?;

    wtr.write_record(["Parent", "Total"])?;
    for (parent, total) in totals.iter() {
        wtr.write_record([parent.to_string(), total.to_string()])?;
    }
    if totals.unassigned() != 0.0 {
        wtr.write_record(["unassigned".to_string(), totals.unassigned().to_string()])?;
    }

    wtr.flush()?;
    Ok(file_path)
}

fn create_writer(
    prefix: &str,
    output_dir: Option<&Path>,
) -> Result<(PathBuf, Writer<BufWriter<File>>)> {
    let file_path = export_path(prefix, output_dir)?;
    let file = File::create(&file_path).map_err(|e| RegistryError::CreateFile {
        path: file_path.clone(),
        source: e,
    })?;

    let wtr = WriterBuilder::new()
        .terminator(line_terminator())
        .from_writer(BufWriter::new(file));
    Ok((file_path, wtr))
}

/// `<prefix>_<local timestamp>.csv`, inside `output_dir` (created if missing)
/// or the working directory.
fn export_path(prefix: &str, output_dir: Option<&Path>) -> Result<PathBuf> {
    let filename = format!("{prefix}_{}.csv", Local::now().format("%Y-%m-%d_%H-%M-%S"));
    let Some(dir) = output_dir else {
        return Ok(filename.into());
    };

    std::fs::create_dir_all(dir).map_err(|e| RegistryError::CreateDir {
        path: dir.to_path_buf(),
        source: e,
    })?;
    Ok(dir.join(filename))
}

#[cfg(windows)]
fn line_terminator() -> Terminator {
    Terminator::CRLF
}

#[cfg(not(windows))]
fn line_terminator() -> Terminator {
    Terminator::Any(b'\n')
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_export_layout_basic() {
        let temp_dir = TempDir::new().unwrap();
        let mut registry = RowRegistry::new();
        registry.add_child(3, "sec3.row1001.score").unwrap();
        registry.add_child(3, "sec3.row1000.score").unwrap();
        registry.add_child(1, "sec1.row1002.score").unwrap();

        let path = export_layout_to_csv_with_path(&registry, Some(temp_dir.path())).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("rows_"));
        assert!(name.ends_with(".csv"));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            [
                "Parent,Position,Address",
                "1,0,sec1.row1002.score",
                "3,0,sec3.row1001.score",
                "3,1,sec3.row1000.score",
            ]
        );
    }

    #[test]
    fn test_export_empty_layout() {
        let temp_dir = TempDir::new().unwrap();
        let registry = RowRegistry::new();

        let path = export_layout_to_csv_with_path(&registry, Some(temp_dir.path())).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().collect::<Vec<_>>(), ["Parent,Position,Address"]);
    }

    #[test]
    fn test_export_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("exports").join("today");

        let path = export_layout_to_csv_with_path(&RowRegistry::new(), Some(&nested)).unwrap();
        assert!(path.starts_with(&nested));
        assert!(path.exists());
    }

    #[test]
    fn test_export_totals() {
        let temp_dir = TempDir::new().unwrap();
        let mut registry = RowRegistry::new();
        registry.add_child(2, "a").unwrap();
        registry.add_child(5, "b").unwrap();
        let totals = SectionTotals::from_scores(&registry, [("a", 1.5), ("b", 2.0), ("c", 0.25)]);

        let path = export_totals_to_csv_with_path(&totals, Some(temp_dir.path())).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, ["Parent,Total", "2,1.5", "5,2", "unassigned,0.25"]);
    }

    #[test]
    fn test_output_dir_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let result = export_layout_to_csv_with_path(&RowRegistry::new(), Some(&blocker));
        assert!(matches!(result, Err(RegistryError::CreateDir { .. })));
    }
}

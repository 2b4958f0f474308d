//! Parquet and CSV helpers shared by the pipeline stages and the Model Store.

use crate::error::{Result, WarehouseError};
use encoding_rs::Encoding;
use polars::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Read a whole Parquet file into memory.
///
/// # Errors
///
/// Returns [`WarehouseError::InvalidPath`] if the file does not exist.
pub fn read_parquet(path: &Path) -> Result<DataFrame> {
    let file = std::fs::File::open(path).map_err(|e| {
        WarehouseError::InvalidPath(format!("Cannot open {}: {e}", path.display()))
    })?;
    ParquetReader::new(file).finish().map_err(|e| {
        WarehouseError::DataProcessing(format!("Failed to read Parquet {}: {e}", path.display()))
    })
}

/// Write `df` to `path`, replacing any existing file.
///
/// The data goes to `<path>.tmp` first, is synced to disk, and is renamed over
/// the target.
///
/// # Errors
///
/// Fails if the parent directory cannot be created or the write fails.
pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = tmp_sibling(path);
    let written = write_synced(df, &tmp_path)
        .and_then(|()| std::fs::rename(&tmp_path, path).map_err(WarehouseError::from));
    if let Err(e) = written {
        if tmp_path.exists()
            && let Err(cleanup) = std::fs::remove_file(&tmp_path)
        {
            tracing::warn!("Could not remove {}: {cleanup}", tmp_path.display());
        }
        return Err(match e {
            WarehouseError::DataProcessing(msg) => WarehouseError::DataProcessing(format!(
                "Failed to write Parquet {}: {msg}",
                path.display()
            )),
            other => other,
        });
    }
    Ok(())
}

/// Read a CSV with every column kept as a string.
///
/// The file is decoded from `encoding` to UTF-8 before parsing. A leading byte
/// order mark overrides `encoding`.
///
/// # Errors
///
/// Returns [`WarehouseError::InvalidPath`] if the file is missing, or a data
/// processing error if it is not valid in `encoding` or cannot be parsed.
pub fn read_csv_as_strings(
    path: &Path,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<DataFrame> {
    if !path.is_file() {
        return Err(WarehouseError::InvalidPath(format!(
            "Cannot find file {}",
            path.display()
        )));
    }

    let bytes = std::fs::read(path)?;
    let (text, used, had_errors) = encoding.decode(&bytes);
    if had_errors {
        return Err(WarehouseError::DataProcessing(format!(
            "{} is not valid {}",
            path.display(),
            used.name()
        )));
    }

    CsvReadOptions::default()
        .with_has_header(true)
        // Schema length 0 reads every column as String.
        .with_infer_schema_length(Some(0))
        .with_parse_options(CsvParseOptions::default().with_separator(delimiter))
        .into_reader_with_file_handle(Cursor::new(text.into_owned().into_bytes()))
        .finish()
        .map_err(|e| {
            WarehouseError::DataProcessing(format!("Failed to read CSV {}: {e}", path.display()))
        })
}

fn write_synced(df: &mut DataFrame, tmp_path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(tmp_path)?;
    ParquetWriter::new(&mut file)
        .with_compression(ParquetCompression::Snappy)
        .finish(df)?;
    file.sync_all()?;
    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_leaves_no_tmp_file() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("nested/t.parquet");
        let mut df = DataFrame::new(vec![Column::new("a".into(), [1i32, 2])])?;

        write_parquet(&mut df, &path)?;

        assert!(path.is_file());
        assert!(!temp.path().join("nested/t.parquet.tmp").exists());
        assert_eq!(read_parquet(&path)?.height(), 2);
        Ok(())
    }

    #[test]
    fn test_failed_write_cleans_up_tmp_file() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        // A directory in the way makes the final rename fail.
        let path = temp.path().join("t.parquet");
        std::fs::create_dir(&path)?;
        let mut df = DataFrame::new(vec![Column::new("a".into(), [1i32])])?;

        assert!(write_parquet(&mut df, &path).is_err());
        assert!(!temp.path().join("t.parquet.tmp").exists());
        assert!(path.is_dir());
        Ok(())
    }

    #[test]
    fn test_csv_columns_are_strings() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("raw.csv");
        std::fs::write(&path, "Invoice,Quantity,Price\n489434,12,6.95\n489435,-1,abc\n")?;

        let df = read_csv_as_strings(&path, b',', encoding_rs::UTF_8)?;
        assert_eq!(df.height(), 2);
        for column in df.get_columns() {
            assert_eq!(column.dtype(), &DataType::String);
        }
        Ok(())
    }

    #[test]
    fn test_latin1_csv_is_transcoded() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("latin1.csv");
        std::fs::write(&path, b"Country,Description\nC\xF4te d'Ivoire,Cr\xE8me jar\n")?;

        let df = read_csv_as_strings(&path, b',', encoding_rs::WINDOWS_1252)?;
        assert_eq!(
            df.column("Country")?.as_materialized_series().str()?.get(0),
            Some("C\u{f4}te d'Ivoire")
        );
        assert_eq!(
            df.column("Description")?.as_materialized_series().str()?.get(0),
            Some("Cr\u{e8}me jar")
        );
        Ok(())
    }

    #[test]
    fn test_invalid_utf8_is_rejected() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("latin1.csv");
        std::fs::write(&path, b"Country\nC\xF4te d'Ivoire\n")?;

        let err = read_csv_as_strings(&path, b',', encoding_rs::UTF_8)
            .expect_err("0xF4 alone is not UTF-8");
        assert!(matches!(err, WarehouseError::DataProcessing(_)));
        Ok(())
    }

    #[test]
    fn test_missing_csv_is_invalid_path() {
        let err = read_csv_as_strings(Path::new("/no/such.csv"), b',', encoding_rs::UTF_8)
            .expect_err("file does not exist");
        assert!(matches!(err, WarehouseError::InvalidPath(_)));
    }
}

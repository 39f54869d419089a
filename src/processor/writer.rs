//! Stage export for station tables.
//!
//! Every stage is written as CSV, an xlsx workbook and Parquet; Parquet is
//! the format later stages read back. All three files are rendered to
//! temporary files in the output directory before any is renamed into
//! place, so a failed export never leaves a stage with mixed generations.

use crate::constants::SUMMARY_SUFFIX;
use crate::error::{HistoryError, Result};
use crate::models::{RunSummary, Stage, StageOutput, StationCode};

use polars::prelude::{
    Column, CsvWriter, DataFrame, DataType, ParquetReader, ParquetWriter, SerReader, SerWriter,
};
use rust_xlsxwriter::{ColNum, RowNum, Workbook, Worksheet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Existing directory that receives stage files
#[derive(Debug, Clone)]
pub struct OutputDir {
    path: PathBuf,
}

impl OutputDir {
    /// Create the directory if needed
    pub fn prepare(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        fs::create_dir_all(&path).map_err(|e| HistoryError::export(&path, e))?;

        if !path.is_dir() {
            return Err(HistoryError::export(&path, "not a directory"));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file(&self, stem: &str, extension: &str) -> PathBuf {
        self.path.join(format!("{}.{}", stem, extension))
    }
}

/// Files that make up one exported stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePaths {
    pub csv: PathBuf,
    pub xlsx: PathBuf,
    pub parquet: PathBuf,
}

/// Writes and reads back stage tables and the run summary
#[derive(Debug, Clone)]
pub struct Exporter {
    dir: OutputDir,
}

impl Exporter {
    pub fn new(dir: OutputDir) -> Self {
        Self { dir }
    }

    pub fn output_dir(&self) -> &OutputDir {
        &self.dir
    }

    pub fn stage_paths(&self, station: &StationCode, stage: Stage) -> StagePaths {
        let stem = stage.file_stem(station);
        StagePaths {
            csv: self.dir.file(&stem, "csv"),
            xlsx: self.dir.file(&stem, "xlsx"),
            parquet: self.dir.file(&stem, "parquet"),
        }
    }

    /// Write a stage table in every format, replacing earlier files
    ///
    /// Nothing is replaced unless all formats render successfully.
    pub fn write_stage(
        &self,
        station: &StationCode,
        stage: Stage,
        frame: &mut DataFrame,
    ) -> Result<StageOutput> {
        let paths = self.stage_paths(station, stage);

        let csv = self.render(&paths.csv, |file| {
            CsvWriter::new(file)
                .include_header(true)
                .finish(frame)
                .map_err(|e| e.to_string())
        })?;

        let xlsx = self.render(&paths.xlsx, |file| {
            let workbook = workbook_bytes(frame)?;
            file.write_all(&workbook).map_err(|e| e.to_string())
        })?;

        let parquet = self.render(&paths.parquet, |file| {
            ParquetWriter::new(file)
                .finish(frame)
                .map(|_| ())
                .map_err(|e| e.to_string())
        })?;

        let rendered = [(csv, &paths.csv), (xlsx, &paths.xlsx), (parquet, &paths.parquet)];
        for (temp, destination) in rendered {
            persist(temp, destination)?;
            debug!("Wrote {}", destination.display());
        }

        info!(
            "Exported {:?} stage for {}: {} rows",
            stage,
            station,
            frame.height()
        );

        Ok(StageOutput {
            stage,
            rows: frame.height(),
            csv_path: paths.csv,
            xlsx_path: paths.xlsx,
            parquet_path: paths.parquet,
        })
    }

    /// Read a stage table back from its Parquet file
    pub fn read_stage(&self, station: &StationCode, stage: Stage) -> Result<DataFrame> {
        let parquet_path = self.stage_paths(station, stage).parquet;
        let file = File::open(&parquet_path).map_err(|e| HistoryError::export(&parquet_path, e))?;

        ParquetReader::new(file)
            .finish()
            .map_err(|e| HistoryError::export(&parquet_path, e))
    }

    /// Write the run summary as pretty JSON
    pub fn write_summary(&self, station: &StationCode, summary: &RunSummary) -> Result<PathBuf> {
        let path = self
            .dir
            .file(&format!("{}_{}", station, SUMMARY_SUFFIX), "json");

        let temp = self.render(&path, |file| {
            serde_json::to_writer_pretty(&mut *file, summary).map_err(|e| e.to_string())?;
            file.write_all(b"\n").map_err(|e| e.to_string())
        })?;
        persist(temp, &path)?;

        debug!("Wrote run summary to {}", path.display());
        Ok(path)
    }

    /// Write a temporary file next to `destination` and flush it to disk
    fn render<W>(&self, destination: &Path, write: W) -> Result<NamedTempFile>
    where
        W: FnOnce(&mut File) -> std::result::Result<(), String>,
    {
        let mut temp =
            NamedTempFile::new_in(self.dir.path()).map_err(|e| HistoryError::export(destination, e))?;

        write(temp.as_file_mut()).map_err(|reason| HistoryError::export(destination, reason))?;
        temp.as_file()
            .sync_all()
            .map_err(|e| HistoryError::export(destination, e))?;
        Ok(temp)
    }
}

fn persist(temp: NamedTempFile, destination: &Path) -> Result<()> {
    temp.persist(destination)
        .map_err(|e| HistoryError::export(destination, e.error))?;
    Ok(())
}

/// Render a frame as a single-sheet workbook with a header row
///
/// Numeric and boolean columns keep their cell types; everything else is
/// written as text. Missing values are left as blank cells.
fn workbook_bytes(frame: &DataFrame) -> std::result::Result<Vec<u8>, String> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (index, column) in frame.get_columns().iter().enumerate() {
        let col = ColNum::try_from(index).map_err(|_| "too many columns for a worksheet")?;
        sheet
            .write_string(0, col, column.name().as_str())
            .map_err(|e| e.to_string())?;
        write_column(sheet, col, column)?;
    }

    workbook.save_to_buffer().map_err(|e| e.to_string())
}

fn write_column(
    sheet: &mut Worksheet,
    col: ColNum,
    column: &Column,
) -> std::result::Result<(), String> {
    // Row 0 holds the header
    let row = |index: usize| {
        RowNum::try_from(index + 1).map_err(|_| "too many rows for a worksheet".to_string())
    };

    match column.dtype() {
        DataType::Boolean => {
            let values = column.bool().map_err(|e| e.to_string())?;
            for (index, value) in values.into_iter().enumerate() {
                if let Some(value) = value {
                    sheet
                        .write_boolean(row(index)?, col, value)
                        .map_err(|e| e.to_string())?;
                }
            }
        }
        dtype if dtype.is_primitive_numeric() => {
            let numbers = column.cast(&DataType::Float64).map_err(|e| e.to_string())?;
            let values = numbers.f64().map_err(|e| e.to_string())?;
            for (index, value) in values.into_iter().enumerate() {
                if let Some(value) = value {
                    sheet
                        .write_number(row(index)?, col, value)
                        .map_err(|e| e.to_string())?;
                }
            }
        }
        _ => {
            let strings = column.cast(&DataType::String).map_err(|e| e.to_string())?;
            let values = strings.str().map_err(|e| e.to_string())?;
            for (index, value) in values.into_iter().enumerate() {
                if let Some(value) = value {
                    sheet
                        .write_string(row(index)?, col, value)
                        .map_err(|e| e.to_string())?;
                }
            }
        }
    }
    Ok(())
}

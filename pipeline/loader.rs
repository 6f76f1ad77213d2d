//! # Chunked Interaction Loader
//!
//! Reads the delimited interaction file in bounded pieces of `chunk_size` rows
//! and reassembles them into a single [`InteractionTable`].
//!
//! - Strict schema: the four required columns are located by header name and
//!   coerced to their declared types. Any value that fails coercion aborts the
//!   whole load; there is no partial table.
//! - Bounded parsing: each chunk is parsed completely before the next one is
//!   read, and only one raw record buffer is live at a time.
//! - Compressed input: a source whose name ends in `.gz` is decompressed on the
//!   fly.

use crate::progress::create_progress_bar;
use crate::table::{ColumnKind, InteractionTable, RawRecord, TableSchema};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default number of rows parsed per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// Tokens that load as NaN in nullable float columns.
const NA_TOKENS: [&[u8]; 7] = [b"", b"NA", b"N/A", b"NaN", b"nan", b"null", b"NULL"];

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to open interaction file '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed record in the interaction file: {0}")]
    Csv(#[from] csv::Error),
    #[error("Chunk size must be at least 1 row.")]
    ZeroChunkSize,
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "Line {line}: the value '{value}' in column '{column}' could not be converted to the expected type '{expected_type}'."
    )]
    Parse {
        line: u64,
        column: &'static str,
        value: String,
        expected_type: &'static str,
    },
    #[error("Line {line}: missing value in required column '{column}'.")]
    MissingValue { line: u64, column: &'static str },
    #[error("Line {line}: non-finite value (NaN or Infinity) in required column '{column}'.")]
    NonFiniteValue { line: u64, column: &'static str },
}

/// Reader settings: delimiter, chunk size and the column-to-type map.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub delimiter: u8,
    pub chunk_size: usize,
    pub schema: TableSchema,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            chunk_size: DEFAULT_CHUNK_SIZE,
            schema: TableSchema::default(),
        }
    }
}

/// Positions of the schema columns within a source record.
#[derive(Debug, Clone, Copy)]
struct ColumnPositions {
    query_allele: usize,
    array_allele: usize,
    growth_score: usize,
    p_value: usize,
}

/// Iterator over fully parsed table chunks of at most `chunk_size` rows.
pub struct ChunkedReader {
    reader: csv::Reader<Box<dyn Read>>,
    options: LoaderOptions,
    positions: ColumnPositions,
    source_columns: usize,
    record: csv::ByteRecord,
    finished: bool,
}

impl ChunkedReader {
    pub fn open(path: &Path, options: LoaderOptions) -> Result<Self, LoadError> {
        if options.chunk_size == 0 {
            return Err(LoadError::ZeroChunkSize);
        }
        let file = File::open(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let is_gzip = path.extension().is_some_and(|ext| ext == "gz");
        let source: Box<dyn Read> = if is_gzip {
            Box::new(MultiGzDecoder::new(BufReader::new(file)))
        } else {
            Box::new(file)
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .has_headers(true)
            .from_reader(source);
        let headers = reader.byte_headers()?;
        let source_columns = headers.len();
        let positions = locate_columns(headers, &options.schema)?;

        Ok(Self {
            reader,
            options,
            positions,
            source_columns,
            record: csv::ByteRecord::new(),
            finished: false,
        })
    }

    /// Number of columns in the file header, including ones outside the schema.
    pub fn source_columns(&self) -> usize {
        self.source_columns
    }

    fn read_chunk(&mut self) -> Result<InteractionTable, LoadError> {
        let schema = &self.options.schema;
        let mut chunk = InteractionTable::with_capacity(self.options.chunk_size.min(65_536));
        while chunk.len() < self.options.chunk_size {
            if !self.reader.read_byte_record(&mut self.record)? {
                self.finished = true;
                break;
            }
            let line = self.record.position().map_or(0, |p| p.line());
            let field = |i: usize| self.record.get(i).unwrap_or_default();
            let p = self.positions;

            let query_allele = coerce_text(field(p.query_allele), line, schema.columns()[0])?;
            let array_allele = coerce_text(field(p.array_allele), line, schema.columns()[1])?;
            let growth_score = coerce_float(field(p.growth_score), line, schema.columns()[2])?;
            let p_value = coerce_float(field(p.p_value), line, schema.columns()[3])?;

            chunk.push(RawRecord {
                query_allele,
                array_allele,
                growth_score,
                p_value,
            });
        }
        Ok(chunk)
    }
}

impl Iterator for ChunkedReader {
    type Item = Result<InteractionTable, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_chunk() {
            Ok(chunk) if chunk.is_empty() => None,
            Ok(chunk) => Some(Ok(chunk)),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

/// Loads the whole file chunk by chunk and concatenates the chunks in order.
/// The result is identical to a single-pass parse for any chunk size.
pub fn load_table(path: &Path, options: LoaderOptions) -> Result<InteractionTable, LoadError> {
    let chunk_size = options.chunk_size;
    let reader = ChunkedReader::open(path, options)?;
    let source_columns = reader.source_columns();
    let pb = create_progress_bar(None, "rows loaded");

    let mut table = InteractionTable::default();
    let mut chunks = 0usize;
    for chunk in reader {
        let chunk = chunk?;
        chunks += 1;
        pb.inc(chunk.len() as u64);
        log::debug!("Parsed chunk {} ({} rows)", chunks, chunk.len());
        table.append(chunk);
    }
    pb.finish_and_clear();

    log::info!(
        "Loaded {} rows from '{}' in {} chunk(s) of up to {} rows",
        table.len(),
        path.display(),
        chunks,
        chunk_size
    );
    log::info!("Number of columns: {source_columns}");
    Ok(table)
}

fn locate_columns(
    headers: &csv::ByteRecord,
    schema: &TableSchema,
) -> Result<ColumnPositions, LoadError> {
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim_ascii() == name.as_bytes())
            .ok_or_else(|| LoadError::ColumnNotFound(name.to_string()))
    };
    let [(qa, _), (aa, _), (gs, _), (pv, _)] = schema.columns();
    Ok(ColumnPositions {
        query_allele: find(qa)?,
        array_allele: find(aa)?,
        growth_score: find(gs)?,
        p_value: find(pv)?,
    })
}

fn coerce_text<'a>(
    raw: &'a [u8],
    line: u64,
    (column, kind): (&'static str, ColumnKind),
) -> Result<&'a str, LoadError> {
    let text = std::str::from_utf8(raw.trim_ascii()).map_err(|_| LoadError::Parse {
        line,
        column,
        value: String::from_utf8_lossy(raw).into_owned(),
        expected_type: kind.describe(),
    })?;
    if text.is_empty() {
        return Err(LoadError::MissingValue { line, column });
    }
    Ok(text)
}

fn coerce_float(
    raw: &[u8],
    line: u64,
    (column, kind): (&'static str, ColumnKind),
) -> Result<f64, LoadError> {
    let nullable = matches!(kind, ColumnKind::Float { nullable: true });
    let trimmed = raw.trim_ascii();
    if NA_TOKENS.contains(&trimmed) {
        return if nullable {
            Ok(f64::NAN)
        } else {
            Err(LoadError::MissingValue { line, column })
        };
    }
    let value = lexical_core::parse::<f64>(trimmed).map_err(|_| LoadError::Parse {
        line,
        column,
        value: String::from_utf8_lossy(raw).into_owned(),
        expected_type: kind.describe(),
    })?;
    if !nullable && !value.is_finite() {
        return Err(LoadError::NonFiniteValue { line, column });
    }
    Ok(value)
}

//! Parquet reader scaffolding (enabled with `--features parquet`).
//!
//! TODO: wire up `parquet::arrow::arrow_reader` with row-group pruning on
//! `ts_event`; today this only proves out the schema/column-count contract.

use arrow_array::RecordBatch;
use arrow_schema::SchemaRef;

use crate::Result;

pub struct ParquetReader {
    _placeholder: (),
}

impl ParquetReader {
    pub fn from_path(_path: &str) -> Result<Self> {
        Ok(Self { _placeholder: () })
    }

    pub fn next_batch(&mut self, _limit_rows: usize) -> Result<Option<RecordBatch>> {
        Ok(None)
    }

    pub fn schema(&self) -> SchemaRef {
        use std::sync::Arc;
        Arc::new(arrow_schema::Schema::empty())
    }
}

#[cfg(not(feature = "parquet"))]
compile_error!("parquet.rs was compiled without the `parquet` feature; enable `--features parquet` or exclude this module.");

use crate::error::CliError;
use clap::{Args, Subcommand};
use connectors::file::csv::settings::CsvSettings;
use engine_runtime::settings::IngestSettings;
use model::core::{
    identifiers::TableId,
    schema::{FieldSchema, TableSchema},
};
use std::{num::NonZeroUsize, path::PathBuf, time::Duration};

#[derive(Subcommand)]
pub enum Commands {
    /// Ingest a delimited file into a table
    Run(RunArgs),

    /// Provision a table in the local warehouse
    CreateTable {
        #[arg(long, env = "INGEST_TABLE", help = "Table id, project.dataset.table")]
        table: TableId,

        #[arg(long, help = "JSON schema file, a list of {name, type, mode} columns")]
        schema: PathBuf,

        #[command(flatten)]
        warehouse: WarehouseArgs,
    },

    /// Show the schema and row count of a table
    Describe {
        #[arg(long, env = "INGEST_TABLE", help = "Table id, project.dataset.table")]
        table: TableId,

        #[command(flatten)]
        warehouse: WarehouseArgs,

        #[arg(long, help = "Print as JSON instead of a table")]
        json: bool,
    },
}

#[derive(Args)]
pub struct WarehouseArgs {
    #[arg(
        long,
        env = "INGEST_WAREHOUSE",
        help = "Warehouse directory [default: ~/.ingest/warehouse]"
    )]
    pub warehouse: Option<PathBuf>,
}

impl WarehouseArgs {
    pub fn resolve(&self) -> Result<PathBuf, CliError> {
        if let Some(dir) = &self.warehouse {
            return Ok(dir.clone());
        }
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Unexpected("Could not determine home directory".into()))?;
        Ok(home.join(".ingest/warehouse"))
    }
}

#[derive(Args)]
pub struct RunArgs {
    #[arg(long, env = "INGEST_SOURCE", help = "Source file; .gz and .zip are decompressed")]
    pub source: PathBuf,

    #[arg(long, env = "INGEST_TABLE", help = "Table id, project.dataset.table")]
    pub table: TableId,

    #[command(flatten)]
    pub warehouse: WarehouseArgs,

    #[arg(long, env = "INGEST_CHUNK_SIZE", help = "Rows per append [default: 2000]")]
    pub chunk_size: Option<NonZeroUsize>,

    #[arg(long, env = "INGEST_PARALLELISM", help = "Batches in flight [default: 20]")]
    pub parallelism: Option<NonZeroUsize>,

    #[arg(long, env = "INGEST_SOURCE_ID", help = "Value of the source column [default: file name]")]
    pub source_id: Option<String>,

    #[arg(long, env = "INGEST_CLOSE_TIMEOUT_SECS", help = "Bound on closing the stream [default: 5]")]
    pub close_timeout_secs: Option<u64>,

    #[arg(long, default_value_t = ';')]
    pub delimiter: char,

    #[arg(long, help = "Skip the first line of the source")]
    pub has_headers: bool,

    #[arg(long, help = "Print the report as JSON")]
    pub json: bool,
}

impl RunArgs {
    pub fn settings(&self) -> IngestSettings {
        let mut settings = IngestSettings::default();
        if let Some(chunk_size) = self.chunk_size {
            settings = settings.with_chunk_size(chunk_size);
        }
        if let Some(parallelism) = self.parallelism {
            settings = settings.with_parallelism(parallelism);
        }
        if let Some(source_id) = &self.source_id {
            settings = settings.with_source_id(source_id.clone());
        }
        if let Some(secs) = self.close_timeout_secs {
            settings = settings.with_close_timeout(Duration::from_secs(secs));
        }
        settings
    }

    pub fn csv_settings(&self) -> Result<CsvSettings, CliError> {
        Ok(CsvSettings::new(self.delimiter, self.has_headers)?)
    }
}

/// Accepts either `{"fields": [...]}` or a bare column list.
pub fn parse_schema(content: &str) -> Result<TableSchema, CliError> {
    if content.trim_start().starts_with('[') {
        let fields: Vec<FieldSchema> = serde_json::from_str(content)?;
        Ok(TableSchema::new(fields))
    } else {
        Ok(serde_json::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use model::core::{data_type::DataType, schema::FieldMode};

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Commands,
    }

    fn parse(args: &[&str]) -> Commands {
        TestCli::try_parse_from(std::iter::once("ingest").chain(args.iter().copied()))
            .unwrap()
            .command
    }

    #[test]
    fn test_run_defaults() {
        let Commands::Run(args) = parse(&[
            "run",
            "--source",
            "data.csv.gz",
            "--table",
            "my-project.ingest_demo.insert_test",
        ]) else {
            panic!("expected run");
        };

        assert_eq!(args.table, TableId::new("my-project", "ingest_demo", "insert_test"));
        assert_eq!(args.settings(), IngestSettings::default());
        assert_eq!(args.csv_settings().unwrap(), CsvSettings::default());
    }

    #[test]
    fn test_run_overrides() {
        let Commands::Run(args) = parse(&[
            "run",
            "--source",
            "data.csv",
            "--table",
            "p.d.t",
            "--chunk-size",
            "500",
            "--parallelism",
            "4",
            "--source-id",
            "upload-7",
            "--close-timeout-secs",
            "9",
            "--warehouse",
            "/tmp/wh",
        ]) else {
            panic!("expected run");
        };

        let settings = args.settings();
        assert_eq!(settings.chunk_size.get(), 500);
        assert_eq!(settings.parallelism.get(), 4);
        assert_eq!(settings.source_id.as_deref(), Some("upload-7"));
        assert_eq!(settings.close_timeout, Duration::from_secs(9));
        assert_eq!(args.warehouse.resolve().unwrap(), PathBuf::from("/tmp/wh"));
    }

    #[test]
    fn test_rejects_zero_parallelism_and_bad_table() {
        let zero = TestCli::try_parse_from([
            "ingest", "run", "--source", "a.csv", "--table", "p.d.t", "--parallelism", "0",
        ]);
        assert!(zero.is_err());

        let table = TestCli::try_parse_from(["ingest", "run", "--source", "a.csv", "--table", "t"]);
        assert!(table.is_err());
    }

    #[test]
    fn test_non_ascii_delimiter_fails_settings() {
        let Commands::Run(args) = parse(&[
            "run",
            "--source",
            "a.csv",
            "--table",
            "p.d.t",
            "--delimiter",
            "€",
        ]) else {
            panic!("expected run");
        };
        assert!(args.csv_settings().is_err());

        let Commands::Run(args) = parse(&[
            "run", "--source", "a.csv", "--table", "p.d.t", "--delimiter", "|",
        ]) else {
            panic!("expected run");
        };
        assert_eq!(args.csv_settings().unwrap().delimiter, '|');
    }

    #[test]
    fn test_parse_schema_forms() {
        let list = r#"[
            {"name": "A", "type": "STRING"},
            {"name": "B", "type": "INTEGER", "mode": "REQUIRED"},
            {"name": "_filename", "type": "STRING"},
            {"name": "_inserted_at", "type": "TIMESTAMP"}
        ]"#;
        let schema = parse_schema(list).unwrap();
        assert_eq!(schema.len(), 4);
        assert_eq!(schema.fields[1].data_type, DataType::Int64);
        assert_eq!(schema.fields[1].mode, FieldMode::Required);

        let wrapped = format!(r#"{{"fields": {list}}}"#);
        assert_eq!(parse_schema(&wrapped).unwrap(), schema);

        assert!(parse_schema(r#"[{"name": "A", "type": "BLOB"}]"#).is_err());
    }
}

use crate::error::CliError;
use connectors::destination::local::TableInfo;
use engine_runtime::pipeline::IngestReport;
use model::core::identifiers::TableId;
use serde_json::{Value, json};

fn report_json(report: &IngestReport) -> Value {
    let snap = &report.snapshot;
    json!({
        "table": report.table.to_string(),
        "stream": report.stream.as_str(),
        "rows_ingested": snap.rows_ingested,
        "batches_appended": snap.batches_appended,
        "bytes_appended": snap.bytes_appended,
        "started_at": snap.started_at.to_rfc3339(),
        "elapsed_ms": snap.elapsed.as_millis() as u64,
        "local_ratio": snap.local_ratio,
        "remote_ratio": snap.remote_ratio,
    })
}

pub fn print_report(report: &IngestReport, as_json: bool) -> Result<(), CliError> {
    if as_json {
        let json =
            serde_json::to_string_pretty(&report_json(report)).map_err(CliError::JsonSerialize)?;
        println!("{json}");
        return Ok(());
    }

    let snap = &report.snapshot;
    println!("Ingested into {}", report.table);
    println!("-----------------------------");
    println!("{:<16} {}", "Stream", report.stream);
    println!("{:<16} {}", "Rows", snap.rows_ingested);
    println!("{:<16} {}", "Batches", snap.batches_appended);
    println!("{:<16} {}", "Bytes", snap.bytes_appended);
    println!("{:<16} {:?}", "Elapsed", snap.elapsed);
    println!("{:<16} {:.1}", "Rows/sec", snap.rows_per_second());
    Ok(())
}

pub fn print_table_info(table: &TableId, info: &TableInfo, as_json: bool) -> Result<(), CliError> {
    if as_json {
        let json = serde_json::to_string_pretty(&json!({
            "table": table.to_string(),
            "schema": info.schema,
            "streams": info.streams,
            "rows": info.rows,
        }))
        .map_err(CliError::JsonSerialize)?;
        println!("{json}");
        return Ok(());
    }

    println!("Table {table}: {} rows in {} streams", info.rows, info.streams);
    println!("-----------------------------");
    for field in &info.schema.fields {
        println!("{:<24} {:<12} {:?}", field.name, field.data_type.name(), field.mode);
    }
    Ok(())
}

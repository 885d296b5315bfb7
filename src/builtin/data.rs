//! Data processing pipeline: Load -> Transform -> [Validate || Analyze] -> Save.
//!
//! Rows are maps with an integer `id`, an integer `value` and a string
//! `status`. The individual steps simulate I/O latency so that the parallel
//! group is observable in event timings.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::core::{AtomicProcess, Composition, OrchestratedProcess, Process};
use crate::domain::{Parameter, ParameterSet, Value, ValueType};

/// Upper bound for a valid row value
pub const MAX_ROW_VALUE: i64 = 1000;

async fn simulate_latency(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn row(id: i64, value: i64, status: &str) -> Value {
    let mut row = BTreeMap::new();
    row.insert("id".to_string(), Value::Int(id));
    row.insert("value".to_string(), Value::Int(value));
    row.insert("status".to_string(), Value::from(status));
    Value::Map(row)
}

fn sample_rows() -> Vec<Value> {
    vec![
        row(1, 100, "active"),
        row(2, 200, "active"),
        row(3, 150, "inactive"),
        row(4, 300, "active"),
    ]
}

fn field<'a>(row: &'a Value, name: &str) -> Result<&'a Value> {
    row.as_map()
        .context("Row is not a map")?
        .get(name)
        .with_context(|| format!("Row has no '{}' field", name))
}

fn int_field(row: &Value, name: &str) -> Result<i64> {
    field(row, name)?
        .as_int()
        .with_context(|| format!("Row field '{}' is not an int", name))
}

/// Load rows from a JSON file, or sample rows when the file does not exist
#[derive(Debug, Default)]
pub struct LoadData;

#[async_trait]
impl AtomicProcess for LoadData {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet) {
        input.add(Parameter::new("filename", ValueType::Str).with_description("File to load"));
        output
            .add(
                Parameter::new("data", ValueType::list_of(ValueType::map()))
                    .with_description("Loaded rows"),
            )
            .add(Parameter::new("row_count", ValueType::Int).with_description("Number of rows"));
    }

    async fn execute_impl(&self, input: &ParameterSet, output: &mut ParameterSet) -> Result<()> {
        let filename = input.str("filename")?;
        let path = Path::new(filename);

        let rows = if path.exists() {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read data file: {}", path.display()))?;
            let json: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse data file: {}", path.display()))?;
            match Value::from_json(json) {
                Some(Value::List(rows)) => rows,
                _ => bail!("Data file must contain a JSON array: {}", path.display()),
            }
        } else {
            debug!(filename = %filename, "Data file not found, using sample rows");
            simulate_latency(120).await;
            sample_rows()
        };

        output.set("row_count", rows.len())?;
        output.set("data", rows)?;
        Ok(())
    }

    fn description(&self) -> &str {
        "Load rows from a JSON file"
    }
}

/// Keep active rows and double their value
#[derive(Debug, Default)]
pub struct TransformData;

#[async_trait]
impl AtomicProcess for TransformData {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet) {
        input.add(Parameter::new("data", ValueType::list()));
        output.add(Parameter::new("transformed_data", ValueType::list()));
    }

    async fn execute_impl(&self, input: &ParameterSet, output: &mut ParameterSet) -> Result<()> {
        let data = input.list("data")?;
        simulate_latency(100).await;

        let mut transformed = Vec::with_capacity(data.len());
        for item in data {
            if field(item, "status")?.as_str() != Some("active") {
                continue;
            }
            let value = int_field(item, "value")?;
            let mut item = item.clone();
            if let Value::Map(fields) = &mut item {
                fields.insert("value".to_string(), Value::Int(value.saturating_mul(2)));
            }
            transformed.push(item);
        }

        output.set("transformed_data", transformed)?;
        Ok(())
    }

    fn description(&self) -> &str {
        "Filter active rows and double their values"
    }
}

/// Check every row value lies in `1..=MAX_ROW_VALUE`
#[derive(Debug, Default)]
pub struct ValidateData;

#[async_trait]
impl AtomicProcess for ValidateData {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet) {
        input.add(Parameter::new("data", ValueType::list()));
        output
            .add(Parameter::new("is_valid", ValueType::Bool))
            .add(Parameter::new("validation_errors", ValueType::list_of(ValueType::Str)));
    }

    async fn execute_impl(&self, input: &ParameterSet, output: &mut ParameterSet) -> Result<()> {
        let data = input.list("data")?;
        simulate_latency(100).await;

        let mut errors = Vec::new();
        for item in data {
            let id = int_field(item, "id")?;
            let value = int_field(item, "value")?;
            if value <= 0 {
                errors.push(format!("Row {}: Value must be positive", id));
            }
            if value > MAX_ROW_VALUE {
                errors.push(format!("Row {}: Value too large (>{})", id, MAX_ROW_VALUE));
            }
        }

        output.set("is_valid", errors.is_empty())?;
        output.set("validation_errors", errors)?;
        Ok(())
    }

    fn description(&self) -> &str {
        "Validate row values"
    }
}

/// Compute count, sum, avg, min and max of row values
#[derive(Debug, Default)]
pub struct AnalyzeData;

#[async_trait]
impl AtomicProcess for AnalyzeData {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet) {
        input.add(Parameter::new("data", ValueType::list()));
        output.add(Parameter::new("stats", ValueType::map()));
    }

    async fn execute_impl(&self, input: &ParameterSet, output: &mut ParameterSet) -> Result<()> {
        let data = input.list("data")?;
        simulate_latency(140).await;

        let values = data
            .iter()
            .map(|item| int_field(item, "value"))
            .collect::<Result<Vec<_>>>()?;
        let sum: i64 = values.iter().sum();

        let mut stats = BTreeMap::new();
        stats.insert("count".to_string(), Value::from(values.len()));
        stats.insert("sum".to_string(), Value::Int(sum));
        stats.insert(
            "avg".to_string(),
            Value::Float(if values.is_empty() {
                0.0
            } else {
                sum as f64 / values.len() as f64
            }),
        );
        stats.insert("min".to_string(), Value::Int(values.iter().copied().min().unwrap_or(0)));
        stats.insert("max".to_string(), Value::Int(values.iter().copied().max().unwrap_or(0)));

        output.set("stats", stats)?;
        Ok(())
    }

    fn description(&self) -> &str {
        "Compute summary statistics"
    }
}

/// Write rows and stats as JSON into the temp directory
#[derive(Debug, Default)]
pub struct SaveResult;

#[async_trait]
impl AtomicProcess for SaveResult {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet) {
        input
            .add(Parameter::new("data", ValueType::list()))
            .add(Parameter::new("stats", ValueType::map()))
            .add(Parameter::new("is_valid", ValueType::Bool));
        output
            .add(Parameter::new("saved_path", ValueType::Str))
            .add(Parameter::new("success", ValueType::Bool));
    }

    async fn execute_impl(&self, input: &ParameterSet, output: &mut ParameterSet) -> Result<()> {
        if !input.bool("is_valid")? {
            bail!("Cannot save: Data validation failed");
        }

        let mut document = BTreeMap::new();
        document.insert("data".to_string(), input.value("data")?.clone());
        document.insert("stats".to_string(), input.value("stats")?.clone());
        let content =
            serde_json::to_string_pretty(&document).context("Failed to serialize result")?;

        let path = std::env::temp_dir().join(format!("swfme-result-{}.json", Uuid::new_v4()));
        fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write result: {}", path.display()))?;

        output.set("saved_path", path.display().to_string())?;
        output.set("success", true)?;
        Ok(())
    }

    fn description(&self) -> &str {
        "Save rows and statistics as JSON"
    }
}

/// Load -> Transform -> [Validate || Analyze] -> Save
#[derive(Debug, Default)]
pub struct DataPipeline;

impl OrchestratedProcess for DataPipeline {
    fn define_parameters(&self, input: &mut ParameterSet, output: &mut ParameterSet) {
        input.add(Parameter::new("filename", ValueType::Str).with_description("Input file"));
        output
            .add(Parameter::new("result_path", ValueType::Str).with_description("Output file"))
            .add(Parameter::new("statistics", ValueType::map()).with_description("Data statistics"))
            .add(Parameter::new("row_count", ValueType::Int).with_description("Loaded rows"));
    }

    fn orchestrate(&self, plan: &mut Composition) -> Result<()> {
        let load = plan.sequential(Process::atomic(LoadData));
        plan.connect(plan.input("filename"), load.input("filename"));

        let transform = plan.sequential(Process::atomic(TransformData));
        plan.connect(load.output("data"), transform.input("data"));

        let validate = plan.parallel(Process::atomic(ValidateData));
        plan.connect(transform.output("transformed_data"), validate.input("data"));

        let analyze = plan.parallel(Process::atomic(AnalyzeData));
        plan.connect(transform.output("transformed_data"), analyze.input("data"));

        let save = plan.sequential(Process::atomic(SaveResult));
        plan.connect(transform.output("transformed_data"), save.input("data"));
        plan.connect(analyze.output("stats"), save.input("stats"));
        plan.connect(validate.output("is_valid"), save.input("is_valid"));

        plan.connect(save.output("saved_path"), plan.output("result_path"));
        plan.connect(analyze.output("stats"), plan.output("statistics"));
        plan.connect(load.output("row_count"), plan.output("row_count"));
        Ok(())
    }

    fn description(&self) -> &str {
        "Load, transform, validate and analyze, then save"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NoopNotifier;
    use crate::domain::ExecutionMode;

    #[tokio::test]
    async fn test_transform_keeps_active_rows_doubled() {
        let mut transform = Process::atomic(TransformData);
        transform.input_mut().set("data", sample_rows()).unwrap();

        assert!(transform.execute(&NoopNotifier).await);
        let rows = transform.output().list("transformed_data").unwrap();
        let values: Vec<i64> = rows.iter().map(|r| int_field(r, "value").unwrap()).collect();
        assert_eq!(values, vec![200, 400, 600]);
    }

    #[tokio::test]
    async fn test_validate_reports_out_of_range_rows() {
        let mut validate = Process::atomic(ValidateData);
        validate
            .input_mut()
            .set("data", vec![row(1, 0, "active"), row(2, 5000, "active"), row(3, 10, "active")])
            .unwrap();

        assert!(validate.execute(&NoopNotifier).await);
        assert!(!validate.output().bool("is_valid").unwrap());
        assert_eq!(validate.output().list("validation_errors").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_save_refuses_invalid_data() {
        let mut save = Process::atomic(SaveResult);
        save.input_mut().set("data", Vec::<Value>::new()).unwrap();
        save.input_mut().set("stats", BTreeMap::<String, Value>::new()).unwrap();
        save.input_mut().set("is_valid", false).unwrap();

        assert!(!save.execute(&NoopNotifier).await);
        assert_eq!(save.error(), Some("Cannot save: Data validation failed"));
    }

    #[tokio::test]
    async fn test_load_reads_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("rows.json");
        std::fs::write(&path, r#"[{"id": 1, "value": 7, "status": "active"}]"#).unwrap();

        let mut load = Process::atomic(LoadData);
        load.input_mut().set("filename", path.display().to_string()).unwrap();

        assert!(load.execute(&NoopNotifier).await);
        assert_eq!(load.output().int("row_count").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_data_pipeline() {
        let mut pipeline = Process::orchestrated(DataPipeline).named("DataPipeline");
        pipeline.input_mut().set("filename", "does-not-exist.csv").unwrap();

        assert!(pipeline.execute(&NoopNotifier).await, "{:?}", pipeline.error());
        assert_eq!(pipeline.output().int("row_count").unwrap(), 4);

        let stats = pipeline.output().map("statistics").unwrap();
        assert_eq!(stats.get("count"), Some(&Value::Int(3)));
        assert_eq!(stats.get("sum"), Some(&Value::Int(1200)));

        let saved = pipeline.output().str("result_path").unwrap().to_string();
        assert!(Path::new(&saved).exists());
        std::fs::remove_file(saved).unwrap();

        let groups = pipeline.execution_groups();
        assert_eq!(groups.len(), 4);
        assert_eq!(groups[2].mode(), ExecutionMode::Parallel);
        assert_eq!(groups[2].members(), &[2, 3]);
    }
}

//! External record sources for bulk ingestion.
//!
//! A [`RecordSource`] turns a collection name plus an aggregation pipeline
//! into an ordered async stream of raw JSON records. Records arrive one at
//! a time; the indexer never holds more than one batch in memory.
//!
//! # Aggregation subset
//!
//! Pipelines are lists of single-key stage objects, applied in order:
//!
//! | Stage | Meaning |
//! |-------|---------|
//! | `{"$match": {field: cond, ...}}` | keep records where every condition holds |
//! | `{"$skip": n}` | drop the first `n` records reaching the stage |
//! | `{"$limit": n}` | stop after `n` records pass the stage |
//! | `{"$project": {field: 1, ...}}` | keep only the listed fields (`_id` unless `_id: 0`) |
//!
//! A condition is either a literal (equality; an array field matches if it
//! contains the literal) or an operator object using `$eq`, `$ne`, `$in`,
//! `$nin` or `$exists`. Field names may be dotted paths into nested
//! objects. Anything else is rejected when the pipeline is parsed, before a
//! single record is read.

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use nls_core::{Error, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::LinesStream;

/// A raw record from an external source.
pub type Record = Map<String, Value>;

/// An ordered stream of records. An `Err` item means the source itself
/// failed and no further items follow.
pub type RecordStream = BoxStream<'static, Result<Record>>;

/// A queryable external collection store.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Source name for diagnostics.
    fn name(&self) -> &str;

    /// Total records in `collection`, if the source can tell.
    async fn count(&self, _collection: &str) -> Result<Option<u64>> {
        Ok(None)
    }

    /// Stream the records of `collection` through `pipeline`.
    async fn aggregate(&self, collection: &str, pipeline: Aggregation) -> Result<RecordStream>;
}

// ============================================================================
// Aggregation
// ============================================================================

/// A parsed, validated aggregation pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation {
    stages: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq)]
enum Stage {
    Match(Vec<(String, Condition)>),
    Skip(usize),
    Limit(usize),
    Project { fields: Vec<String>, keep_id: bool },
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
}

enum Step {
    Emit(Record),
    Drop,
    Done,
}

impl Aggregation {
    /// Parse a JSON pipeline.
    ///
    /// # Errors
    ///
    /// Returns a validation error for unknown stages, unknown operators,
    /// or malformed stage arguments.
    pub fn parse(pipeline: &[Value]) -> Result<Self> {
        let stages = pipeline
            .iter()
            .enumerate()
            .map(|(i, stage)| parse_stage(i, stage))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { stages })
    }

    /// Whether the pipeline has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Apply the pipeline lazily to a record stream.
    pub fn apply(self, input: RecordStream) -> RecordStream {
        if self.stages.is_empty() {
            return input;
        }
        let counters = vec![0usize; self.stages.len()];
        stream::unfold(
            (input, self, counters, false),
            |(mut input, agg, mut counters, done)| async move {
                if done {
                    return None;
                }
                loop {
                    match input.next().await? {
                        Err(e) => return Some((Err(e), (input, agg, counters, true))),
                        Ok(record) => match agg.step(record, &mut counters) {
                            Step::Emit(r) => return Some((Ok(r), (input, agg, counters, false))),
                            Step::Drop => continue,
                            Step::Done => return None,
                        },
                    }
                }
            },
        )
        .boxed()
    }

    fn step(&self, mut record: Record, counters: &mut [usize]) -> Step {
        for (stage, seen) in self.stages.iter().zip(counters.iter_mut()) {
            match stage {
                Stage::Match(conditions) => {
                    if !conditions
                        .iter()
                        .all(|(path, cond)| cond.matches(lookup(&record, path)))
                    {
                        return Step::Drop;
                    }
                }
                Stage::Skip(n) => {
                    if *seen < *n {
                        *seen += 1;
                        return Step::Drop;
                    }
                }
                Stage::Limit(n) => {
                    if *seen >= *n {
                        return Step::Done;
                    }
                    *seen += 1;
                }
                Stage::Project { fields, keep_id } => {
                    record = project(&record, fields, *keep_id);
                }
            }
        }
        Step::Emit(record)
    }
}

fn parse_stage(index: usize, stage: &Value) -> Result<Stage> {
    let invalid = |msg: &str| Error::validation(format!("Pipeline stage {index}: {msg}"));

    let obj = stage
        .as_object()
        .filter(|o| o.len() == 1)
        .ok_or_else(|| invalid("each stage must be an object with exactly one key"))?;
    let (name, arg) = obj
        .iter()
        .next()
        .ok_or_else(|| invalid("empty stage"))?;

    match name.as_str() {
        "$match" => {
            let filter = arg
                .as_object()
                .ok_or_else(|| invalid("$match expects an object"))?;
            let conditions = filter
                .iter()
                .map(|(field, cond)| {
                    if field.starts_with('$') {
                        return Err(invalid(&format!("unsupported $match operator '{field}'")));
                    }
                    Ok((field.clone(), parse_condition(cond).map_err(|m| invalid(&m))?))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Stage::Match(conditions))
        }
        "$skip" => arg
            .as_u64()
            .map(|n| Stage::Skip(n as usize))
            .ok_or_else(|| invalid("$skip expects a non-negative integer")),
        "$limit" => arg
            .as_u64()
            .map(|n| Stage::Limit(n as usize))
            .ok_or_else(|| invalid("$limit expects a non-negative integer")),
        "$project" => {
            let projection = arg
                .as_object()
                .ok_or_else(|| invalid("$project expects an object"))?;
            let mut keep_id = true;
            let mut fields = Vec::new();
            for (field, flag) in projection {
                let include = match flag {
                    Value::Bool(b) => *b,
                    Value::Number(n) => n.as_f64() != Some(0.0),
                    _ => return Err(invalid("$project only supports field inclusion")),
                };
                if field == "_id" {
                    keep_id = include;
                } else if include {
                    fields.push(field.clone());
                } else {
                    return Err(invalid("$project exclusion is only supported for _id"));
                }
            }
            Ok(Stage::Project { fields, keep_id })
        }
        other => Err(invalid(&format!("unsupported stage '{other}'"))),
    }
}

fn parse_condition(cond: &Value) -> std::result::Result<Condition, String> {
    let Some(obj) = cond.as_object() else {
        return Ok(Condition::Eq(cond.clone()));
    };
    if !obj.keys().any(|k| k.starts_with('$')) {
        return Ok(Condition::Eq(cond.clone()));
    }
    if obj.len() != 1 {
        return Err("combine at most one operator per field".to_string());
    }
    let (op, arg) = obj
        .iter()
        .next()
        .ok_or_else(|| "empty condition".to_string())?;
    let list = |arg: &Value| {
        arg.as_array()
            .cloned()
            .ok_or_else(|| format!("{op} expects an array"))
    };
    match op.as_str() {
        "$eq" => Ok(Condition::Eq(arg.clone())),
        "$ne" => Ok(Condition::Ne(arg.clone())),
        "$in" => Ok(Condition::In(list(arg)?)),
        "$nin" => Ok(Condition::Nin(list(arg)?)),
        "$exists" => arg
            .as_bool()
            .map(Condition::Exists)
            .ok_or_else(|| "$exists expects a boolean".to_string()),
        other => Err(format!("unsupported operator '{other}'")),
    }
}

impl Condition {
    fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Self::Exists(expected) => value.is_some() == *expected,
            Self::Eq(target) => value.is_some_and(|v| field_matches(v, target)),
            Self::Ne(target) => !value.is_some_and(|v| field_matches(v, target)),
            Self::In(targets) => {
                value.is_some_and(|v| targets.iter().any(|t| field_matches(v, t)))
            }
            Self::Nin(targets) => {
                !value.is_some_and(|v| targets.iter().any(|t| field_matches(v, t)))
            }
        }
    }
}

/// Equality with array containment, numbers compared by value.
fn field_matches(field: &Value, target: &Value) -> bool {
    if values_equal(field, target) {
        return true;
    }
    match field {
        Value::Array(items) => items.iter().any(|item| values_equal(item, target)),
        _ => false,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Resolve a dotted path inside a record.
pub fn lookup<'a>(record: &'a Record, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn project(record: &Record, fields: &[String], keep_id: bool) -> Record {
    let mut out = Record::new();
    if keep_id && let Some(id) = record.get("_id") {
        out.insert("_id".to_string(), id.clone());
    }
    for path in fields {
        if let Some(value) = lookup(record, path) {
            insert_path(&mut out, path, value.clone());
        }
    }
    out
}

fn insert_path(record: &mut Record, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            record.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = record
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = child {
                insert_path(map, rest, value);
            }
        }
    }
}

// ============================================================================
// JSON-lines source
// ============================================================================

/// Reads `<root>/<collection>.jsonl`, one JSON object per line.
#[derive(Debug, Clone)]
pub struct JsonlSource {
    root: PathBuf,
}

impl JsonlSource {
    /// A source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory holding the collection files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf> {
        let valid = !collection.is_empty()
            && collection != "."
            && collection != ".."
            && !collection.contains(['/', '\\']);
        if !valid {
            return Err(Error::validation(format!(
                "Invalid collection name: '{collection}'"
            )));
        }
        Ok(self.root.join(format!("{collection}.jsonl")))
    }

    async fn open(&self, collection: &str) -> Result<BufReader<tokio::fs::File>> {
        let path = self.collection_path(collection)?;
        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            Error::source_error(format!(
                "Cannot open collection '{collection}' at {}: {e}",
                path.display()
            ))
        })?;
        Ok(BufReader::new(file))
    }
}

#[async_trait]
impl RecordSource for JsonlSource {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn count(&self, collection: &str) -> Result<Option<u64>> {
        let mut lines = self.open(collection).await?.lines();
        let mut count = 0u64;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| Error::source_error(format!("Failed reading '{collection}': {e}")))?
        {
            if !line.trim().is_empty() {
                count += 1;
            }
        }
        Ok(Some(count))
    }

    async fn aggregate(&self, collection: &str, pipeline: Aggregation) -> Result<RecordStream> {
        let reader = self.open(collection).await?;
        let collection = collection.to_string();

        let records = LinesStream::new(reader.lines())
            .enumerate()
            .filter_map(move |(index, line)| {
                let collection = collection.clone();
                async move {
                    let line_no = index + 1;
                    match line {
                        Err(e) => Some(Err(Error::source_error(format!(
                            "Failed reading '{collection}' at line {line_no}: {e}"
                        )))),
                        Ok(text) if text.trim().is_empty() => None,
                        Ok(text) => Some(parse_record(&text).map_err(|msg| {
                            Error::source_error(format!(
                                "Malformed record in '{collection}' at line {line_no}: {msg}"
                            ))
                        })),
                    }
                }
            })
            .boxed();

        Ok(pipeline.apply(records))
    }
}

fn parse_record(text: &str) -> std::result::Result<Record, String> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("not a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

// ============================================================================
// In-memory source
// ============================================================================

/// Collections held in memory. A collection can be made to fail after a
/// number of records, to stand in for a lost upstream connection.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordSource {
    collections: HashMap<String, Vec<Record>>,
    failures: HashMap<String, (usize, String)>,
}

impl MemoryRecordSource {
    /// An empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a collection.
    pub fn with_collection(mut self, name: impl Into<String>, records: Vec<Record>) -> Self {
        self.collections.insert(name.into(), records);
        self
    }

    /// Fail `collection`'s stream with a source error after `after` records.
    pub fn with_failure_after(
        mut self,
        collection: impl Into<String>,
        after: usize,
        message: impl Into<String>,
    ) -> Self {
        self.failures
            .insert(collection.into(), (after, message.into()));
        self
    }
}

#[async_trait]
impl RecordSource for MemoryRecordSource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn count(&self, collection: &str) -> Result<Option<u64>> {
        Ok(self.collections.get(collection).map(|r| r.len() as u64))
    }

    async fn aggregate(&self, collection: &str, pipeline: Aggregation) -> Result<RecordStream> {
        let records = self
            .collections
            .get(collection)
            .cloned()
            .ok_or_else(|| Error::source_error(format!("Unknown collection '{collection}'")))?;

        let mut items: Vec<Result<Record>> = records.into_iter().map(Ok).collect();
        if let Some((after, message)) = self.failures.get(collection) {
            items.truncate(*after);
            items.push(Err(Error::source_error(message.clone())));
        }

        Ok(pipeline.apply(stream::iter(items).boxed()))
    }
}

// ============================================================================
// Tests
// ============================================================================

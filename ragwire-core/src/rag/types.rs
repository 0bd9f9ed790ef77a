use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Default title for documents that don't carry one.
pub const UNTITLED: &str = "Untitled";
/// Default source locator for documents that don't carry one.
pub const UNKNOWN_SOURCE: &str = "Unknown";

/// Builds the store id of a chunk: `{document_id}_chunk_{index}`.
///
/// The id only depends on its inputs, so re-indexing a document replaces its
/// previous records instead of duplicating them.
pub fn vector_id(document_id: &str, chunk_index: usize) -> String {
    format!("{}_chunk_{}", document_id, chunk_index)
}

/// A source document, before chunking.
///
/// # Example
///
/// ```no_run
/// # use ragwire_core::rag::Document;
/// let doc = Document::new("legus-food-1", "Legus loves carbonara.")
///     .with_title("Legus Favorite Foods")
///     .with_source("Personal Preferences")
///     .with_metadata("category", "food");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default = "generated_id")]
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_source")]
    pub source: String,
    pub text: String,
    /// Extra metadata merged over the defaults of every chunk record.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

fn generated_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_title() -> String {
    UNTITLED.to_string()
}

fn default_source() -> String {
    UNKNOWN_SOURCE.to_string()
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: default_title(),
            source: default_source(),
            text: text.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Creates a document with a random (UUID v4) id.
    pub fn with_generated_id(text: impl Into<String>) -> Self {
        Self::new(generated_id(), text)
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// One contiguous piece of a document's text.
///
/// `embedding` stays empty until the indexer attaches one.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub document_id: String,
    pub index: usize,
    pub total: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl Chunk {
    pub fn id(&self) -> String {
        vector_id(&self.document_id, self.index)
    }
}

/// Metadata persisted with every vector.
///
/// The named fields map to typed columns in stores that declare a schema;
/// anything else the caller attached lives in `extra`.
///
/// Human-readable formats (JSON) see one flat object: typed fields and extra
/// keys side by side. Reading is lenient there: missing keys take defaults
/// (`""`, `chunk_index` 0, `total_chunks` 1), whole floats are accepted for
/// the counters and non-string extra values are kept as their JSON text.
/// Binary formats (bincode) use the plain struct layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordMetadata {
    pub text: String,
    pub title: String,
    pub source: String,
    pub chunk_index: u64,
    pub total_chunks: u64,
    pub extra: BTreeMap<String, String>,
}

const TYPED_FIELDS: [&str; 5] = ["text", "title", "source", "chunk_index", "total_chunks"];

#[derive(Serialize)]
#[serde(rename = "RecordMetadata")]
struct CompactRef<'a> {
    text: &'a str,
    title: &'a str,
    source: &'a str,
    chunk_index: u64,
    total_chunks: u64,
    extra: &'a BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename = "RecordMetadata")]
struct Compact {
    text: String,
    title: String,
    source: String,
    chunk_index: u64,
    total_chunks: u64,
    extra: BTreeMap<String, String>,
}

/// Reads a non-negative integer that may have been written as a float.
fn lenient_count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
            .map(|f| f as u64)
    })
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl RecordMetadata {
    /// Merges caller metadata over the defaults.
    ///
    /// Keys naming a typed field replace it (integer fields only when the value
    /// parses); every other key goes to `extra`.
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, String>) {
        for (key, value) in overrides {
            match key.as_str() {
                "text" => self.text = value.clone(),
                "title" => self.title = value.clone(),
                "source" => self.source = value.clone(),
                "chunk_index" => {
                    if let Ok(parsed) = value.parse() {
                        self.chunk_index = parsed;
                    }
                }
                "total_chunks" => {
                    if let Ok(parsed) = value.parse() {
                        self.total_chunks = parsed;
                    }
                }
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// One flat object: typed fields plus extra keys.
    pub fn to_flat(&self) -> Map<String, Value> {
        let mut map: Map<String, Value> = self
            .extra
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        map.insert("text".into(), Value::from(self.text.as_str()));
        map.insert("title".into(), Value::from(self.title.as_str()));
        map.insert("source".into(), Value::from(self.source.as_str()));
        map.insert("chunk_index".into(), Value::from(self.chunk_index));
        map.insert("total_chunks".into(), Value::from(self.total_chunks));
        map
    }

    /// Rebuilds metadata from a flat object, filling in missing keys.
    ///
    /// A nested `extra` object (the layout of older exports) is merged into
    /// the extra keys.
    pub fn from_flat(map: &Map<String, Value>) -> Self {
        let text = |key: &str| map.get(key).map(value_text).unwrap_or_default();
        let count = |key: &str, default: u64| map.get(key).and_then(lenient_count).unwrap_or(default);

        let mut extra = BTreeMap::new();
        for (key, value) in map {
            match (key.as_str(), value) {
                (k, _) if TYPED_FIELDS.contains(&k) => {}
                ("extra", Value::Object(nested)) => {
                    for (k, v) in nested {
                        extra.insert(k.clone(), value_text(v));
                    }
                }
                (_, Value::Null) => {}
                _ => {
                    extra.insert(key.clone(), value_text(value));
                }
            }
        }

        Self {
            text: text("text"),
            title: text("title"),
            source: text("source"),
            chunk_index: count("chunk_index", 0),
            total_chunks: count("total_chunks", 1),
            extra,
        }
    }

    /// All metadata keys, typed fields first.
    pub fn keys(&self) -> Vec<String> {
        TYPED_FIELDS
            .into_iter()
            .map(String::from)
            .chain(self.extra.keys().cloned())
            .collect()
    }
}

impl Serialize for RecordMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            self.to_flat().serialize(serializer)
        } else {
            CompactRef {
                text: &self.text,
                title: &self.title,
                source: &self.source,
                chunk_index: self.chunk_index,
                total_chunks: self.total_chunks,
                extra: &self.extra,
            }
            .serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for RecordMetadata {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let map = Map::<String, Value>::deserialize(deserializer)?;
            Ok(Self::from_flat(&map))
        } else {
            let compact = Compact::deserialize(deserializer)?;
            Ok(Self {
                text: compact.text,
                title: compact.title,
                source: compact.source,
                chunk_index: compact.chunk_index,
                total_chunks: compact.total_chunks,
                extra: compact.extra,
            })
        }
    }
}

/// The persisted unit in a vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

impl IndexRecord {
    /// Reads a string column by schema field name.
    pub fn string_field(&self, name: &str) -> Option<String> {
        match name {
            "id" => Some(self.id.clone()),
            "text" => Some(self.metadata.text.clone()),
            "title" => Some(self.metadata.title.clone()),
            "source" => Some(self.metadata.source.clone()),
            _ => self.metadata.extra.get(name).cloned(),
        }
    }

    /// Reads an integer column by schema field name.
    pub fn int_field(&self, name: &str) -> Option<i64> {
        match name {
            "chunk_index" => i64::try_from(self.metadata.chunk_index).ok(),
            "total_chunks" => i64::try_from(self.metadata.total_chunks).ok(),
            _ => self.metadata.extra.get(name).and_then(|v| v.parse().ok()),
        }
    }
}

/// A search hit: the stored record's metadata plus its similarity score.
///
/// Scores are cosine similarities; higher is more relevant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub id: String,
    pub score: f32,
    pub metadata: RecordMetadata,
}

impl RetrievalResult {
    pub fn text(&self) -> &str {
        &self.metadata.text
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }
}

/// Element of an export file.
///
/// `score` is only present when the source backend enumerated records through
/// a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
    #[serde(default)]
    pub score: Option<f32>,
}

impl From<IndexRecord> for ExportRecord {
    fn from(record: IndexRecord) -> Self {
        Self {
            id: record.id,
            values: record.values,
            metadata: record.metadata,
            score: None,
        }
    }
}

impl From<ExportRecord> for IndexRecord {
    fn from(record: ExportRecord) -> Self {
        Self {
            id: record.id,
            values: record.values,
            metadata: record.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_id_format() {
        assert_eq!(vector_id("doc1", 0), "doc1_chunk_0");
        assert_eq!(vector_id("doc1", 2), "doc1_chunk_2");
    }

    #[test]
    fn test_document_defaults() {
        let doc = Document::new("d", "body");
        assert_eq!(doc.title, "Untitled");
        assert_eq!(doc.source, "Unknown");
        assert!(doc.metadata.is_empty());
    }

    #[test]
    fn test_generated_ids_differ() {
        let a = Document::with_generated_id("x");
        let b = Document::with_generated_id("x");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_overrides_replace_named_fields() {
        let mut metadata = RecordMetadata {
            text: "chunk".into(),
            title: "Untitled".into(),
            source: "Unknown".into(),
            chunk_index: 1,
            total_chunks: 3,
            extra: BTreeMap::new(),
        };
        let overrides = BTreeMap::from([
            ("title".to_string(), "Better".to_string()),
            ("total_chunks".to_string(), "not a number".to_string()),
            ("category".to_string(), "food".to_string()),
        ]);

        metadata.apply_overrides(&overrides);

        assert_eq!(metadata.title, "Better");
        assert_eq!(metadata.total_chunks, 3);
        assert_eq!(metadata.extra.get("category").map(String::as_str), Some("food"));
        assert!(!metadata.extra.contains_key("title"));
    }

    #[test]
    fn test_document_json_defaults() {
        let doc: Document = serde_json::from_str(r#"{"id":"a","text":"hello"}"#).unwrap();
        assert_eq!(doc.title, UNTITLED);
        assert_eq!(doc.source, UNKNOWN_SOURCE);
        assert_eq!(doc.id, "a");
    }

    #[test]
    fn test_document_without_id_gets_uuid() {
        let doc: Document = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert_eq!(doc.id.len(), 36);
        assert!(uuid::Uuid::parse_str(&doc.id).is_ok());

        let other: Document = serde_json::from_str(r#"{"text":"hello"}"#).unwrap();
        assert_ne!(doc.id, other.id);
    }

    #[test]
    fn test_flat_metadata_json_is_lenient() {
        let metadata: RecordMetadata = serde_json::from_str(
            r#"{"text":"t","title":"x","chunk_index":2.0,"total_chunks":3.0,"category":"food","rating":4.5,"draft":false}"#,
        )
        .unwrap();

        assert_eq!(metadata.text, "t");
        assert_eq!(metadata.source, "");
        assert_eq!(metadata.chunk_index, 2);
        assert_eq!(metadata.total_chunks, 3);
        assert_eq!(metadata.extra.get("category").map(String::as_str), Some("food"));
        assert_eq!(metadata.extra.get("rating").map(String::as_str), Some("4.5"));
        assert_eq!(metadata.extra.get("draft").map(String::as_str), Some("false"));
    }

    #[test]
    fn test_missing_counters_default() {
        let metadata: RecordMetadata = serde_json::from_str(r#"{"text":"t"}"#).unwrap();
        assert_eq!(metadata.chunk_index, 0);
        assert_eq!(metadata.total_chunks, 1);
        assert!(metadata.extra.is_empty());
    }

    #[test]
    fn test_metadata_json_is_flat_and_bincode_is_not() {
        let mut metadata = RecordMetadata {
            text: "t".into(),
            title: "x".into(),
            source: "s".into(),
            chunk_index: 1,
            total_chunks: 2,
            extra: BTreeMap::new(),
        };
        metadata.extra.insert("category".into(), "food".into());

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["category"], "food");
        assert_eq!(json["chunk_index"], 1);
        assert!(json.get("extra").is_none());
        assert_eq!(serde_json::from_value::<RecordMetadata>(json).unwrap(), metadata);

        let bytes = bincode::serialize(&metadata).unwrap();
        assert_eq!(bincode::deserialize::<RecordMetadata>(&bytes).unwrap(), metadata);
    }
}

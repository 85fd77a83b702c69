//! RediSearch-backed store.
//!
//! Records are Redis hashes under the descriptor prefix. The vector field
//! holds the raw FLOAT32 blob; every other field is a plain string.

use async_trait::async_trait;
use redis::Value;
use redis::aio::ConnectionManager;
use tracing::{debug, info, warn};
use zerocopy::IntoBytes;

use super::{
    FieldKind, FieldPredicate, Fields, FilterQuery, IndexDescriptor, IndexStatus, SearchHit,
    StoredRecord, VectorStore,
};
use crate::errors::{KnowledgeError, KnowledgeResult};

const SCORE_FIELD: &str = "__score";
const SCAN_BATCH: usize = 500;
const FLOAT32_BYTES: usize = 4;

/// Open a managed, auto-reconnecting connection.
pub async fn connect(url: &str) -> KnowledgeResult<ConnectionManager> {
    let client = redis::Client::open(url)
        .map_err(|e| KnowledgeError::Config(format!("invalid store url {url}: {e}")))?;
    client.get_connection_manager().await.map_err(|e| {
        KnowledgeError::StoreUnavailable(format!("cannot connect to {url}: {e}"))
    })
}

pub struct RedisVectorStore {
    conn: ConnectionManager,
    descriptor: IndexDescriptor,
}

impl RedisVectorStore {
    pub fn new(conn: ConnectionManager, descriptor: IndexDescriptor) -> Self {
        Self { conn, descriptor }
    }

    async fn index_exists(&self) -> KnowledgeResult<bool> {
        let mut conn = self.conn.clone();
        let names: Vec<String> = redis::cmd("FT._LIST")
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_error(e))?;
        Ok(names.iter().any(|name| name == self.descriptor.name()))
    }

    async fn run_search(&self, args: Vec<Vec<u8>>) -> KnowledgeResult<Value> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("FT.SEARCH");
        cmd.arg(self.descriptor.name());
        for arg in args {
            cmd.arg(arg);
        }
        cmd.query_async(&mut conn)
            .await
            .map_err(|e| self.map_error(e))
    }

    /// Fail when an index created elsewhere disagrees with the descriptor
    /// on vector geometry.
    async fn verify_existing_schema(&self) -> KnowledgeResult<()> {
        let mut conn = self.conn.clone();
        let info: Value = redis::cmd("FT.INFO")
            .arg(self.descriptor.name())
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_error(e))?;
        check_vector_schema(&self.descriptor, &info)
    }

    fn map_error(&self, err: redis::RedisError) -> KnowledgeError {
        let message = err.to_string().to_lowercase();
        if message.contains("no such index") || message.contains("unknown index") {
            return KnowledgeError::UnknownIndex(self.descriptor.name().to_string());
        }
        if message.contains("expected size") {
            return match blob_size_mismatch(&message) {
                Some((index_bytes, query_bytes)) => KnowledgeError::DimensionMismatch {
                    expected: index_bytes / FLOAT32_BYTES,
                    actual: query_bytes / FLOAT32_BYTES,
                },
                None => KnowledgeError::InvalidDescriptor {
                    index: self.descriptor.name().to_string(),
                    reason: err.to_string(),
                },
            };
        }
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
            || err.is_timeout()
        {
            return KnowledgeError::StoreUnavailable(err.to_string());
        }
        KnowledgeError::Redis(err)
    }
}

impl std::fmt::Debug for RedisVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisVectorStore")
            .field("index", &self.descriptor.name())
            .field("prefix", &self.descriptor.prefix())
            .finish()
    }
}

#[async_trait]
impl VectorStore for RedisVectorStore {
    fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }

    async fn create_index(&self) -> KnowledgeResult<IndexStatus> {
        if self.index_exists().await? {
            self.verify_existing_schema().await?;
            debug!("Index {} already exists", self.descriptor.name());
            return Ok(IndexStatus::AlreadyExists);
        }

        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FT.CREATE")
            .arg(create_index_args(&self.descriptor))
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_error(e))?;
        info!(
            "Created index {} on prefix {} ({} dims)",
            self.descriptor.name(),
            self.descriptor.prefix(),
            self.descriptor.dimension()
        );
        Ok(IndexStatus::Created)
    }

    async fn drop_index(&self) -> KnowledgeResult<bool> {
        if !self.index_exists().await? {
            return Ok(false);
        }
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FT.DROPINDEX")
            .arg(self.descriptor.name())
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_error(e))?;
        info!("Dropped index {}", self.descriptor.name());
        Ok(true)
    }

    async fn upsert(&self, id: &str, fields: &Fields, vector: &[f32]) -> KnowledgeResult<()> {
        self.descriptor.check_vector(vector)?;
        let key = self.descriptor.key_for(id);

        let mut hset = redis::cmd("HSET");
        hset.arg(&key);
        for (name, value) in fields {
            hset.arg(name).arg(value);
        }
        hset.arg(self.descriptor.vector_field()).arg(vector.as_bytes());

        // DEL + HSET in one transaction so no reader sees a half-written record
        let mut pipe = redis::pipe();
        pipe.atomic().del(&key).ignore().add_command(hset).ignore();

        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| self.map_error(e))?;
        Ok(())
    }

    async fn search(&self, vector: &[f32], k: usize) -> KnowledgeResult<Vec<SearchHit>> {
        self.descriptor.check_vector(vector)?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut args: Vec<Vec<u8>> = vec![
            knn_query(self.descriptor.vector_field()).into_bytes(),
            b"PARAMS".to_vec(),
            b"4".to_vec(),
            b"K".to_vec(),
            k.to_string().into_bytes(),
            b"BLOB".to_vec(),
            vector.as_bytes().to_vec(),
            b"SORTBY".to_vec(),
            SCORE_FIELD.as_bytes().to_vec(),
            b"ASC".to_vec(),
        ];
        let mut returned: Vec<String> = self
            .descriptor
            .scalar_fields()
            .map(|f| f.name.clone())
            .collect();
        returned.push(SCORE_FIELD.to_string());
        args.extend(return_clause(&returned));
        args.extend(limit_clause(k));
        args.push(b"DIALECT".to_vec());
        args.push(b"2".to_vec());

        let reply = self.run_search(args).await?;
        let (_, rows) = parse_search_reply(&reply)?;
        rows.into_iter()
            .map(|(id, mut fields)| {
                let distance = fields
                    .remove(SCORE_FIELD)
                    .ok_or_else(|| KnowledgeError::MissingField(SCORE_FIELD.to_string()))?
                    .parse::<f32>()
                    .map_err(|e| KnowledgeError::MalformedReply(format!("bad score: {e}")))?;
                Ok(SearchHit {
                    id,
                    distance,
                    fields,
                })
            })
            .collect()
    }

    async fn filter(&self, query: &FilterQuery) -> KnowledgeResult<Vec<StoredRecord>> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let mut args: Vec<Vec<u8>> = vec![filter_query_string(&query.predicates).into_bytes()];
        if let Some(sort) = &query.sort_by {
            args.push(b"SORTBY".to_vec());
            args.push(sort.field.clone().into_bytes());
            args.push(if sort.descending { b"DESC".to_vec() } else { b"ASC".to_vec() });
        }
        let returned: Vec<String> = self
            .descriptor
            .scalar_fields()
            .map(|f| f.name.clone())
            .collect();
        args.extend(return_clause(&returned));
        args.extend(limit_clause(query.limit));
        args.push(b"DIALECT".to_vec());
        args.push(b"2".to_vec());

        let reply = self.run_search(args).await?;
        let (_, rows) = parse_search_reply(&reply)?;
        Ok(rows
            .into_iter()
            .map(|(id, fields)| StoredRecord { id, fields })
            .collect())
    }

    async fn clear(&self) -> KnowledgeResult<usize> {
        let pattern = format!("{}*", self.descriptor.prefix());
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e| self.map_error(e))?;
            if !keys.is_empty() {
                let deleted: usize = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| self.map_error(e))?;
                removed += deleted;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        info!("Cleared {} records under {}", removed, self.descriptor.prefix());
        Ok(removed)
    }

    async fn count(&self) -> KnowledgeResult<usize> {
        let args = vec![b"*".to_vec(), b"LIMIT".to_vec(), b"0".to_vec(), b"0".to_vec()];
        let reply = self.run_search(args).await?;
        let (total, _) = parse_search_reply(&reply)?;
        Ok(total)
    }
}

/// Arguments of `FT.CREATE` after the command name.
pub(crate) fn create_index_args(descriptor: &IndexDescriptor) -> Vec<String> {
    let mut args = vec![
        descriptor.name().to_string(),
        "ON".to_string(),
        "HASH".to_string(),
        "PREFIX".to_string(),
        "1".to_string(),
        descriptor.prefix().to_string(),
        "SCHEMA".to_string(),
    ];
    for field in descriptor.fields() {
        args.push(field.name.clone());
        match field.kind {
            FieldKind::Text => args.push("TEXT".to_string()),
            FieldKind::Tag => args.push("TAG".to_string()),
            FieldKind::NumericSortable => {
                args.push("NUMERIC".to_string());
                args.push("SORTABLE".to_string());
            }
            FieldKind::Vector => args.extend([
                "VECTOR".to_string(),
                "HNSW".to_string(),
                "6".to_string(),
                "TYPE".to_string(),
                "FLOAT32".to_string(),
                "DIM".to_string(),
                descriptor.dimension().to_string(),
                "DISTANCE_METRIC".to_string(),
                descriptor.metric().as_str().to_string(),
            ]),
        }
    }
    args
}

pub(crate) fn knn_query(vector_field: &str) -> String {
    format!("*=>[KNN $K @{vector_field} $BLOB AS {SCORE_FIELD}]")
}

/// Query string for AND-ed predicates; `*` when there are none.
pub(crate) fn filter_query_string(predicates: &[FieldPredicate]) -> String {
    if predicates.is_empty() {
        return "*".to_string();
    }
    predicates
        .iter()
        .map(|predicate| match predicate {
            FieldPredicate::Text { field, value } => {
                let words: Vec<String> = value.split_whitespace().map(escape).collect();
                format!("@{field}:({})", words.join(" "))
            }
            FieldPredicate::Tag { field, value } => format!("@{field}:{{{}}}", escape(value)),
            FieldPredicate::Range { field, min, max } => format!(
                "@{field}:[{} {}]",
                min.map_or_else(|| "-inf".to_string(), |v| v.to_string()),
                max.map_or_else(|| "+inf".to_string(), |v| v.to_string())
            ),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Vector geometry of one attribute as reported by `FT.INFO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VectorSchema {
    pub dimension: usize,
    pub metric: String,
}

/// Find the vector attribute named `vector_field` in an `FT.INFO` reply.
///
/// Returns `Ok(None)` when the reply carries no attribute list at all.
pub(crate) fn parse_vector_schema(
    info: &Value,
    vector_field: &str,
) -> KnowledgeResult<Option<VectorSchema>> {
    let top = flatten_pairs(info);
    let Some(attributes) = top.iter().find_map(|(key, value)| match value {
        Value::Array(items) if key == "attributes" => Some(items),
        _ => None,
    }) else {
        return Ok(None);
    };

    for attribute in attributes {
        let mut props = Vec::new();
        collect_scalars(attribute, &mut props);
        let named = props.iter().any(|(key, value)| {
            (key == "identifier" || key == "attribute") && value == vector_field
        });
        if !named {
            continue;
        }
        let lookup = |wanted: &str| {
            props
                .iter()
                .find(|(key, _)| key == wanted)
                .map(|(_, value)| value.clone())
        };
        let dimension = lookup("dim")
            .ok_or_else(|| KnowledgeError::MissingField("dim".to_string()))?
            .parse::<usize>()
            .map_err(|e| KnowledgeError::MalformedReply(format!("bad vector dim: {e}")))?;
        let metric = lookup("distance_metric").unwrap_or_default().to_uppercase();
        return Ok(Some(VectorSchema { dimension, metric }));
    }

    Err(KnowledgeError::MissingField(vector_field.to_string()))
}

/// Compare an existing index's vector attribute against the descriptor.
pub(crate) fn check_vector_schema(
    descriptor: &IndexDescriptor,
    info: &Value,
) -> KnowledgeResult<()> {
    let schema = match parse_vector_schema(info, descriptor.vector_field()) {
        Ok(Some(schema)) => schema,
        Ok(None) => {
            warn!(
                "FT.INFO for {} lists no attributes, skipping schema check",
                descriptor.name()
            );
            return Ok(());
        }
        Err(KnowledgeError::MissingField(field)) => {
            return Err(KnowledgeError::InvalidDescriptor {
                index: descriptor.name().to_string(),
                reason: format!("existing index has no usable vector field {field}"),
            });
        }
        Err(err) => return Err(err),
    };

    if schema.dimension != descriptor.dimension() {
        return Err(KnowledgeError::DimensionMismatch {
            expected: schema.dimension,
            actual: descriptor.dimension(),
        });
    }
    if !schema.metric.is_empty() && schema.metric != descriptor.metric().as_str() {
        return Err(KnowledgeError::InvalidDescriptor {
            index: descriptor.name().to_string(),
            reason: format!(
                "existing index uses {} distance, expected {}",
                schema.metric,
                descriptor.metric().as_str()
            ),
        });
    }
    Ok(())
}

/// Key/value pairs of a RESP2 flat array or a RESP3 map; keys lowercased.
fn flatten_pairs(value: &Value) -> Vec<(String, &Value)> {
    match value {
        Value::Array(items) => items
            .chunks(2)
            .filter_map(|pair| match pair {
                [key, value] => value_to_string(key)
                    .ok()
                    .map(|key| (key.to_lowercase(), value)),
                _ => None,
            })
            .collect(),
        Value::Map(entries) => entries
            .iter()
            .filter_map(|(key, value)| {
                value_to_string(key)
                    .ok()
                    .map(|key| (key.to_lowercase(), value))
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Scalar properties of one attribute, descending into nested parameter
/// lists.
fn collect_scalars(value: &Value, out: &mut Vec<(String, String)>) {
    for (key, value) in flatten_pairs(value) {
        match value {
            Value::Array(_) | Value::Map(_) => collect_scalars(value, out),
            scalar => {
                if let Ok(text) = value_to_string(scalar) {
                    out.push((key, text));
                }
            }
        }
    }
}

/// Byte sizes from a "query vector blob size (N) does not match index's
/// expected size (M)" error, as `(index, query)`.
pub(crate) fn blob_size_mismatch(message: &str) -> Option<(usize, usize)> {
    fn number_after(message: &str, label: &str) -> Option<usize> {
        let start = message.find(label)? + label.len();
        let rest = &message[start..];
        let end = rest.find(')')?;
        rest[..end].trim().parse().ok()
    }
    let query = number_after(message, "blob size (")?;
    let index = number_after(message, "expected size (")?;
    Some((index, query))
}

/// Backslash-escape query syntax characters.
pub(crate) fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if (ch.is_ascii_punctuation() && ch != '_') || ch.is_whitespace() {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn return_clause(fields: &[String]) -> Vec<Vec<u8>> {
    let mut args = vec![b"RETURN".to_vec(), fields.len().to_string().into_bytes()];
    args.extend(fields.iter().map(|f| f.clone().into_bytes()));
    args
}

fn limit_clause(limit: usize) -> Vec<Vec<u8>> {
    vec![
        b"LIMIT".to_vec(),
        b"0".to_vec(),
        limit.to_string().into_bytes(),
    ]
}

/// Decode a RESP2 `FT.SEARCH` reply: total, then `key, [field, value, ...]`
/// pairs.
pub(crate) fn parse_search_reply(reply: &Value) -> KnowledgeResult<(usize, Vec<(String, Fields)>)> {
    let Value::Array(items) = reply else {
        return Err(KnowledgeError::MalformedReply(format!(
            "expected array, got {reply:?}"
        )));
    };
    let mut items = items.iter();
    let total = match items.next() {
        Some(Value::Int(n)) => usize::try_from(*n).unwrap_or(0),
        other => {
            return Err(KnowledgeError::MalformedReply(format!(
                "expected result count, got {other:?}"
            )));
        }
    };

    let mut rows = Vec::new();
    while let Some(key) = items.next() {
        let id = value_to_string(key)?;
        let mut fields = Fields::new();
        match items.next() {
            Some(Value::Array(pairs)) => {
                for pair in pairs.chunks(2) {
                    if let [name, value] = pair {
                        fields.insert(value_to_string(name)?, value_to_string(value)?);
                    }
                }
            }
            Some(other) => {
                return Err(KnowledgeError::MalformedReply(format!(
                    "expected field list for {id}, got {other:?}"
                )));
            }
            None => {}
        }
        rows.push((id, fields));
    }
    Ok((total, rows))
}

fn value_to_string(value: &Value) -> KnowledgeResult<String> {
    match value {
        Value::BulkString(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
        Value::SimpleString(text) => Ok(text.clone()),
        Value::Int(n) => Ok(n.to_string()),
        Value::Double(n) => Ok(n.to_string()),
        other => Err(KnowledgeError::MalformedReply(format!(
            "unexpected value {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DistanceMetric, FieldSpec};

    fn descriptor() -> IndexDescriptor {
        IndexDescriptor::new(
            "chat_history_idx",
            "chat:history:",
            vec![
                FieldSpec::new("prompt", FieldKind::Text),
                FieldSpec::new("timestamp", FieldKind::NumericSortable),
                FieldSpec::new("maker", FieldKind::Tag),
                FieldSpec::new("prompt_vector", FieldKind::Vector),
            ],
            384,
            DistanceMetric::Cosine,
        )
        .unwrap()
    }

    fn decode_vector(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn bulk(text: &str) -> Value {
        Value::BulkString(text.as_bytes().to_vec())
    }

    #[test]
    fn test_create_index_args() {
        let args = create_index_args(&descriptor()).join(" ");
        assert_eq!(
            args,
            "chat_history_idx ON HASH PREFIX 1 chat:history: SCHEMA prompt TEXT \
             timestamp NUMERIC SORTABLE maker TAG prompt_vector VECTOR HNSW 6 \
             TYPE FLOAT32 DIM 384 DISTANCE_METRIC COSINE"
        );
    }

    #[test]
    fn test_knn_query() {
        assert_eq!(
            knn_query("content_vector"),
            "*=>[KNN $K @content_vector $BLOB AS __score]"
        );
    }

    #[test]
    fn test_filter_query_string() {
        assert_eq!(filter_query_string(&[]), "*");
        let query = filter_query_string(&[
            FieldPredicate::Text {
                field: "name".into(),
                value: "para-cetamol  500mg".into(),
            },
            FieldPredicate::Tag {
                field: "maker".into(),
                value: "Sun Pharma".into(),
            },
            FieldPredicate::Range {
                field: "timestamp".into(),
                min: Some(10.0),
                max: None,
            },
        ]);
        assert_eq!(
            query,
            r"@name:(para\-cetamol 500mg) @maker:{Sun\ Pharma} @timestamp:[10 +inf]"
        );
    }

    #[test]
    fn test_parse_search_reply() {
        let reply = Value::Array(vec![
            Value::Int(2),
            bulk("medicine:1"),
            Value::Array(vec![bulk("name"), bulk("Aspirin"), bulk("__score"), bulk("0.25")]),
            bulk("medicine:2"),
            Value::Array(vec![bulk("name"), Value::SimpleString("Brufen".into())]),
        ]);
        let (total, rows) = parse_search_reply(&reply).unwrap();
        assert_eq!(total, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "medicine:1");
        assert_eq!(rows[0].1.get("__score").map(String::as_str), Some("0.25"));
        assert_eq!(rows[1].1.get("name").map(String::as_str), Some("Brufen"));
    }

    #[test]
    fn test_parse_count_only_reply() {
        let (total, rows) = parse_search_reply(&Value::Array(vec![Value::Int(7)])).unwrap();
        assert_eq!(total, 7);
        assert!(rows.is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_search_reply(&Value::Nil),
            Err(KnowledgeError::MalformedReply(_))
        ));
        assert!(parse_search_reply(&Value::Array(vec![bulk("oops")])).is_err());
    }

    fn info_reply(dim: &str, metric: &str) -> Value {
        Value::Array(vec![
            bulk("index_name"),
            bulk("chat_history_idx"),
            bulk("attributes"),
            Value::Array(vec![
                Value::Array(vec![
                    bulk("identifier"),
                    bulk("prompt"),
                    bulk("attribute"),
                    bulk("prompt"),
                    bulk("type"),
                    bulk("TEXT"),
                ]),
                Value::Array(vec![
                    bulk("identifier"),
                    bulk("prompt_vector"),
                    bulk("attribute"),
                    bulk("prompt_vector"),
                    bulk("type"),
                    bulk("VECTOR"),
                    bulk("algorithm"),
                    bulk("HNSW"),
                    bulk("data_type"),
                    bulk("FLOAT32"),
                    bulk("dim"),
                    Value::Int(dim.parse().unwrap()),
                    bulk("distance_metric"),
                    bulk(metric),
                ]),
            ]),
            bulk("num_docs"),
            bulk("12"),
        ])
    }

    #[test]
    fn test_parse_vector_schema() {
        let schema = parse_vector_schema(&info_reply("768", "COSINE"), "prompt_vector")
            .unwrap()
            .unwrap();
        assert_eq!(
            schema,
            VectorSchema {
                dimension: 768,
                metric: "COSINE".to_string()
            }
        );
        assert!(parse_vector_schema(&info_reply("768", "COSINE"), "content_vector").is_err());
        assert_eq!(
            parse_vector_schema(&Value::Array(vec![bulk("index_name"), bulk("x")]), "v").unwrap(),
            None
        );
    }

    #[test]
    fn test_parse_vector_schema_nested_params() {
        let info = Value::Array(vec![
            bulk("attributes"),
            Value::Array(vec![Value::Array(vec![
                bulk("identifier"),
                bulk("prompt_vector"),
                bulk("type"),
                bulk("VECTOR"),
                bulk("params"),
                Value::Array(vec![
                    bulk("dim"),
                    bulk("384"),
                    bulk("distance_metric"),
                    bulk("cosine"),
                ]),
            ])]),
        ]);
        let schema = parse_vector_schema(&info, "prompt_vector").unwrap().unwrap();
        assert_eq!(schema.dimension, 384);
        assert_eq!(schema.metric, "COSINE");
    }

    #[test]
    fn test_existing_index_with_other_dimension_is_fatal() {
        assert!(check_vector_schema(&descriptor(), &info_reply("384", "COSINE")).is_ok());

        let err = check_vector_schema(&descriptor(), &info_reply("768", "COSINE")).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err,
            KnowledgeError::DimensionMismatch {
                expected: 768,
                actual: 384
            }
        ));

        let err = check_vector_schema(&descriptor(), &info_reply("384", "L2")).unwrap_err();
        assert!(matches!(err, KnowledgeError::InvalidDescriptor { .. }));
    }

    #[test]
    fn test_blob_size_mismatch_message() {
        let message = "error parsing vector similarity query: query vector blob size (1536) \
                       does not match index's expected size (3072).";
        assert_eq!(blob_size_mismatch(message), Some((3072, 1536)));
        assert_eq!(blob_size_mismatch("expected size unknown"), None);
    }

    #[test]
    fn test_vector_blob_layout() {
        let vector = [0.5_f32, -1.0, 2.25];
        let bytes = vector.as_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(decode_vector(bytes), vector.to_vec());
    }
}

use crate::errors::{KnowledgeError, KnowledgeResult};

/// Distance metric declared on the vector field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    Cosine,
    L2,
    InnerProduct,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "COSINE",
            DistanceMetric::L2 => "L2",
            DistanceMetric::InnerProduct => "IP",
        }
    }
}

/// Declared type of an indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Tokenized full-text field
    Text,
    /// Exact-match categorical field
    Tag,
    /// Numeric field usable for range filters and sorting
    NumericSortable,
    /// The dense vector field
    Vector,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Schema of one corpus: name, key prefix, fields and vector geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    name: String,
    prefix: String,
    fields: Vec<FieldSpec>,
    dimension: usize,
    metric: DistanceMetric,
}

impl IndexDescriptor {
    /// Validate and build a descriptor.
    ///
    /// Requires exactly one vector field, at most one numeric sortable field,
    /// unique field names and a non-zero dimension.
    pub fn new(
        name: impl Into<String>,
        prefix: impl Into<String>,
        fields: Vec<FieldSpec>,
        dimension: usize,
        metric: DistanceMetric,
    ) -> KnowledgeResult<Self> {
        let name = name.into();
        let invalid = |reason: String| KnowledgeError::InvalidDescriptor {
            index: name.clone(),
            reason,
        };

        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(invalid("key prefix must not be empty".to_string()));
        }
        if dimension == 0 {
            return Err(invalid("vector dimension must be non-zero".to_string()));
        }

        let vectors = fields.iter().filter(|f| f.kind == FieldKind::Vector).count();
        if vectors != 1 {
            return Err(invalid(format!(
                "expected exactly one vector field, found {vectors}"
            )));
        }
        let sortable = fields
            .iter()
            .filter(|f| f.kind == FieldKind::NumericSortable)
            .count();
        if sortable > 1 {
            return Err(invalid(format!(
                "at most one numeric sortable field allowed, found {sortable}"
            )));
        }
        for (idx, field) in fields.iter().enumerate() {
            if fields[..idx].iter().any(|other| other.name == field.name) {
                return Err(invalid(format!("duplicate field {}", field.name)));
            }
        }

        Ok(Self {
            name,
            prefix,
            fields,
            dimension,
            metric,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn vector_field(&self) -> &str {
        self.fields
            .iter()
            .find(|f| f.kind == FieldKind::Vector)
            .map(|f| f.name.as_str())
            .unwrap_or_default()
    }

    /// Every non-vector field, in declaration order.
    pub fn scalar_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.kind != FieldKind::Vector)
    }

    pub fn field_kind(&self, name: &str) -> Option<FieldKind> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.kind)
    }

    /// Full storage key for a record id; ids already carrying the prefix
    /// are kept as they are.
    pub fn key_for(&self, id: &str) -> String {
        if id.starts_with(&self.prefix) {
            id.to_string()
        } else {
            format!("{}{}", self.prefix, id)
        }
    }

    /// Fail unless `vector` has the declared dimension.
    pub fn check_vector(&self, vector: &[f32]) -> KnowledgeResult<()> {
        if vector.len() != self.dimension {
            return Err(KnowledgeError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

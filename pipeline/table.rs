//! Columnar storage for genetic-interaction records.

/// Header names of the interaction file. These are not configurable.
pub const QUERY_ALLELE: &str = "Query_allele";
pub const ARRAY_ALLELE: &str = "Array_allele";
pub const GROWTH_SCORE: &str = "aggregated_growth_score";
pub const P_VALUE: &str = "weighted_average_pvalue";

/// Declared type of a loaded column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    /// A float column. When `nullable`, empty and NA-like fields load as NaN.
    Float { nullable: bool },
}

impl ColumnKind {
    pub fn describe(&self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Float { .. } => "f64 (numeric)",
        }
    }
}

/// Explicit column-to-type map for the four columns the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub query_allele: ColumnKind,
    pub array_allele: ColumnKind,
    pub growth_score: ColumnKind,
    pub p_value: ColumnKind,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            query_allele: ColumnKind::Text,
            array_allele: ColumnKind::Text,
            growth_score: ColumnKind::Float { nullable: false },
            p_value: ColumnKind::Float { nullable: true },
        }
    }
}

impl TableSchema {
    /// Column names paired with their declared kinds, in schema order.
    pub fn columns(&self) -> [(&'static str, ColumnKind); 4] {
        [
            (QUERY_ALLELE, self.query_allele),
            (ARRAY_ALLELE, self.array_allele),
            (GROWTH_SCORE, self.growth_score),
            (P_VALUE, self.p_value),
        ]
    }
}

/// One borrowed row of an [`InteractionTable`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawRecord<'a> {
    pub query_allele: &'a str,
    pub array_allele: &'a str,
    pub growth_score: f64,
    pub p_value: f64,
}

/// Four parallel columns, row order preserved from the source file.
#[derive(Debug, Clone, Default)]
pub struct InteractionTable {
    pub query_allele: Vec<String>,
    pub array_allele: Vec<String>,
    pub growth_score: Vec<f64>,
    pub p_value: Vec<f64>,
}

impl PartialEq for InteractionTable {
    // NaN p-values compare equal to each other so that two loads of the same
    // file are equal tables.
    fn eq(&self, other: &Self) -> bool {
        fn same_floats(a: &[f64], b: &[f64]) -> bool {
            a.len() == b.len()
                && a.iter()
                    .zip(b)
                    .all(|(x, y)| x.to_bits() == y.to_bits() || (x.is_nan() && y.is_nan()))
        }
        self.query_allele == other.query_allele
            && self.array_allele == other.array_allele
            && same_floats(&self.growth_score, &other.growth_score)
            && same_floats(&self.p_value, &other.p_value)
    }
}

impl InteractionTable {
    pub fn with_capacity(rows: usize) -> Self {
        Self {
            query_allele: Vec::with_capacity(rows),
            array_allele: Vec::with_capacity(rows),
            growth_score: Vec::with_capacity(rows),
            p_value: Vec::with_capacity(rows),
        }
    }

    pub fn len(&self) -> usize {
        self.growth_score.len()
    }

    pub fn is_empty(&self) -> bool {
        self.growth_score.is_empty()
    }

    pub fn push(&mut self, record: RawRecord<'_>) {
        self.query_allele.push(record.query_allele.to_owned());
        self.array_allele.push(record.array_allele.to_owned());
        self.growth_score.push(record.growth_score);
        self.p_value.push(record.p_value);
    }

    pub fn record(&self, i: usize) -> RawRecord<'_> {
        RawRecord {
            query_allele: &self.query_allele[i],
            array_allele: &self.array_allele[i],
            growth_score: self.growth_score[i],
            p_value: self.p_value[i],
        }
    }

    /// Moves all rows of `other` to the end of `self`.
    pub fn append(&mut self, mut other: InteractionTable) {
        self.query_allele.append(&mut other.query_allele);
        self.array_allele.append(&mut other.array_allele);
        self.growth_score.append(&mut other.growth_score);
        self.p_value.append(&mut other.p_value);
    }

    /// A new table holding the listed rows in the listed order.
    pub fn take(&self, rows: &[usize]) -> InteractionTable {
        let mut out = InteractionTable::with_capacity(rows.len());
        for &i in rows {
            out.push(self.record(i));
        }
        out
    }

    /// Approximate heap footprint in bytes, including string payloads.
    pub fn heap_bytes(&self) -> usize {
        let strings: usize = self
            .query_allele
            .iter()
            .chain(self.array_allele.iter())
            .map(|s| s.capacity() + std::mem::size_of::<String>())
            .sum();
        strings + (self.growth_score.capacity() + self.p_value.capacity()) * 8
    }
}

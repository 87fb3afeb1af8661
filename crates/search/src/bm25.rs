use anyhow::{Context, Result};
use sr_core::models::LexicalHit;
use std::path::Path;
use std::sync::Mutex;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::*;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Term, doc};

const WRITER_HEAP_BYTES: usize = 50_000_000;

struct Fields {
    chunk_id: Field,
    doc_id: Field,
    text: Field,
}

fn build_schema() -> (Schema, Fields) {
    let mut schema_builder = Schema::builder();

    let chunk_id = schema_builder.add_text_field("chunk_id", STRING | STORED);
    let doc_id = schema_builder.add_text_field("doc_id", STRING | STORED);
    let text = schema_builder.add_text_field(
        "text",
        TextOptions::default().set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer("default")
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        ),
    );

    (
        schema_builder.build(),
        Fields {
            chunk_id,
            doc_id,
            text,
        },
    )
}

/// BM25 full-text index over document chunks, using Tantivy.
///
/// Every chunk is its own tantivy document, so a query can hit the same
/// document id several times.
pub struct Bm25Index {
    index: Index,
    reader: IndexReader,
    writer: Mutex<IndexWriter>,
    fields: Fields,
}

impl Bm25Index {
    /// Open or create an index in the given directory
    pub fn new(index_dir: impl AsRef<Path>) -> Result<Self> {
        let (schema, fields) = build_schema();
        let index_path = index_dir.as_ref();
        std::fs::create_dir_all(index_path)?;
        let index = Index::open_or_create(
            tantivy::directory::MmapDirectory::open(index_path)?,
            schema,
        )
        .with_context(|| format!("Failed to open BM25 index at {}", index_path.display()))?;
        Self::from_index(index, fields)
    }

    /// Create an in-memory index
    pub fn in_memory() -> Result<Self> {
        let (schema, fields) = build_schema();
        Self::from_index(Index::create_in_ram(schema), fields)
    }

    fn from_index(index: Index, fields: Fields) -> Result<Self> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let writer: IndexWriter = index.writer(WRITER_HEAP_BYTES)?;
        Ok(Self {
            index,
            reader,
            writer: Mutex::new(writer),
            fields,
        })
    }

    /// Index one chunk of a document, replacing any chunk with the same id
    pub fn add(&self, chunk_id: &str, doc_id: &str, text: &str) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("BM25 writer lock poisoned: {e}"))?;
        writer.delete_term(Term::from_field_text(self.fields.chunk_id, chunk_id));
        writer.add_document(doc!(
            self.fields.chunk_id => chunk_id,
            self.fields.doc_id => doc_id,
            self.fields.text => text,
        ))?;
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// One hit per matching chunk, best first.
    ///
    /// Malformed query syntax is parsed leniently rather than rejected.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<LexicalHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let searcher = self.reader.searcher();

        let query_parser = QueryParser::for_index(&self.index, vec![self.fields.text]);
        let (query, errors) = query_parser.parse_query_lenient(query_str);
        if !errors.is_empty() {
            tracing::debug!(errors = errors.len(), "BM25 query parsed leniently");
        }

        let top_docs = searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc = searcher.doc::<TantivyDocument>(doc_address)?;
            if let Some(id) = doc.get_first(self.fields.doc_id).and_then(|v| v.as_str()) {
                results.push(LexicalHit::new(id, f64::from(score)));
            }
        }

        Ok(results)
    }

    /// Remove every chunk of a document
    pub fn remove_document(&self, doc_id: &str) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| anyhow::anyhow!("BM25 writer lock poisoned: {e}"))?;
        writer.delete_term(Term::from_field_text(self.fields.doc_id, doc_id));
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    /// Number of indexed chunks
    pub fn len(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

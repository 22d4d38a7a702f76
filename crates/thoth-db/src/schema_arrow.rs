//! Arrow schema definitions and record-batch conversions for each table.

use crate::error::{DbError, Result};
use crate::schema::*;
use arrow_array::{Array, BinaryArray, BooleanArray, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

fn opt_rfc3339(dt: Option<chrono::DateTime<chrono::Utc>>) -> Option<String> {
    dt.map(|d| d.to_rfc3339())
}

fn parse_rfc3339(s: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&chrono::Utc)).unwrap_or_else(|_| chrono::Utc::now())
}

fn parse_opt_rfc3339(s: Option<String>) -> Option<chrono::DateTime<chrono::Utc>> {
    s.and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok()).map(|d| d.with_timezone(&chrono::Utc))
}

macro_rules! get_string {
    ($batch:expr, $col:expr, $row:expr) => {
        $batch.column($col).as_any().downcast_ref::<StringArray>().unwrap().value($row).to_string()
    };
}

macro_rules! get_opt_string {
    ($batch:expr, $col:expr, $row:expr) => {{
        let arr = $batch.column($col).as_any().downcast_ref::<StringArray>().unwrap();
        if arr.is_null($row) { None } else { Some(arr.value($row).to_string()) }
    }};
}

macro_rules! get_opt_i64 {
    ($batch:expr, $col:expr, $row:expr) => {{
        let arr = $batch.column($col).as_any().downcast_ref::<Int64Array>().unwrap();
        if arr.is_null($row) { None } else { Some(arr.value($row)) }
    }};
}

macro_rules! get_i64 {
    ($batch:expr, $col:expr, $row:expr) => {
        $batch.column($col).as_any().downcast_ref::<Int64Array>().unwrap().value($row)
    };
}

macro_rules! get_opt_i32 {
    ($batch:expr, $col:expr, $row:expr) => {{
        let arr = $batch.column($col).as_any().downcast_ref::<Int32Array>().unwrap();
        if arr.is_null($row) { None } else { Some(arr.value($row)) }
    }};
}

macro_rules! get_bool {
    ($batch:expr, $col:expr, $row:expr) => {
        $batch.column($col).as_any().downcast_ref::<BooleanArray>().unwrap().value($row)
    };
}

// =============================================================================
// Paper
// =============================================================================

pub fn paper_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("authors", DataType::Utf8, false),
        Field::new("year", DataType::Int32, true),
        Field::new("venue", DataType::Utf8, true),
        Field::new("doi", DataType::Utf8, true),
        Field::new("arxiv_id", DataType::Utf8, true),
        Field::new("abstract_text", DataType::Utf8, true),
        Field::new("tags", DataType::Utf8, false),
        Field::new("pdf_path", DataType::Utf8, false),
        Field::new("markdown_path_with_images", DataType::Utf8, true),
        Field::new("markdown_path_no_images", DataType::Utf8, true),
        Field::new("analysis", DataType::Utf8, true),
        Field::new("embeddings_generated", DataType::Boolean, false),
        Field::new("llm_model_used", DataType::Utf8, true),
        Field::new("processing_version", DataType::Int64, false),
        Field::new("status", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
        Field::new("updated_at", DataType::Utf8, false),
        Field::new("note_path", DataType::Utf8, true),
    ]))
}

pub fn paper_to_record(paper: &Paper) -> Result<RecordBatch> {
    let schema = paper_schema();
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec![paper.id.as_str()])) as Arc<dyn Array>,
            Arc::new(StringArray::from(vec![paper.title.as_str()])),
            Arc::new(StringArray::from(vec![paper.authors.as_str()])),
            Arc::new(Int32Array::from(vec![paper.year])),
            Arc::new(StringArray::from(vec![paper.venue.as_deref()])),
            Arc::new(StringArray::from(vec![paper.doi.as_deref()])),
            Arc::new(StringArray::from(vec![paper.arxiv_id.as_deref()])),
            Arc::new(StringArray::from(vec![paper.abstract_text.as_deref()])),
            Arc::new(StringArray::from(vec![paper.tags.as_str()])),
            Arc::new(StringArray::from(vec![paper.pdf_path.as_str()])),
            Arc::new(StringArray::from(vec![paper.markdown_path_with_images.as_deref()])),
            Arc::new(StringArray::from(vec![paper.markdown_path_no_images.as_deref()])),
            Arc::new(StringArray::from(vec![paper.analysis.as_deref()])),
            Arc::new(BooleanArray::from(vec![paper.embeddings_generated])),
            Arc::new(StringArray::from(vec![paper.llm_model_used.as_deref()])),
            Arc::new(Int64Array::from(vec![paper.processing_version])),
            Arc::new(StringArray::from(vec![paper.status.as_str()])),
            Arc::new(StringArray::from(vec![paper.created_at.to_rfc3339()])),
            Arc::new(StringArray::from(vec![paper.updated_at.to_rfc3339()])),
            Arc::new(StringArray::from(vec![paper.note_path.as_deref()])),
        ],
    )
    .map_err(|e| DbError::Arrow(e.to_string()))
}

pub fn record_to_paper(batch: &RecordBatch, row: usize) -> Result<Paper> {
    Ok(Paper {
        id: get_string!(batch, 0, row),
        title: get_string!(batch, 1, row),
        authors: get_string!(batch, 2, row),
        year: get_opt_i32!(batch, 3, row),
        venue: get_opt_string!(batch, 4, row),
        doi: get_opt_string!(batch, 5, row),
        arxiv_id: get_opt_string!(batch, 6, row),
        abstract_text: get_opt_string!(batch, 7, row),
        tags: get_string!(batch, 8, row),
        pdf_path: get_string!(batch, 9, row),
        markdown_path_with_images: get_opt_string!(batch, 10, row),
        markdown_path_no_images: get_opt_string!(batch, 11, row),
        analysis: get_opt_string!(batch, 12, row),
        embeddings_generated: get_bool!(batch, 13, row),
        llm_model_used: get_opt_string!(batch, 14, row),
        processing_version: get_i64!(batch, 15, row),
        status: get_string!(batch, 16, row),
        created_at: parse_rfc3339(&get_string!(batch, 17, row)),
        updated_at: parse_rfc3339(&get_string!(batch, 18, row)),
        note_path: get_opt_string!(batch, 19, row),
    })
}

// =============================================================================
// ProcessingVersion
// =============================================================================

pub fn processing_version_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("paper_id", DataType::Utf8, false),
        Field::new("version", DataType::Int64, false),
        Field::new("llm_model", DataType::Utf8, false),
        Field::new("processing_config", DataType::Utf8, false),
        Field::new("markdown_content", DataType::Utf8, false),
        Field::new("analysis", DataType::Utf8, true),
        Field::new("is_active", DataType::Boolean, false),
        Field::new("processed_at", DataType::Utf8, false),
    ]))
}

pub fn processing_version_to_record(v: &ProcessingVersion) -> Result<RecordBatch> {
    let schema = processing_version_schema();
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec![v.paper_id.as_str()])) as Arc<dyn Array>,
            Arc::new(Int64Array::from(vec![v.version])),
            Arc::new(StringArray::from(vec![v.llm_model.as_str()])),
            Arc::new(StringArray::from(vec![v.processing_config.as_str()])),
            Arc::new(StringArray::from(vec![v.markdown_content.as_str()])),
            Arc::new(StringArray::from(vec![v.analysis.as_deref()])),
            Arc::new(BooleanArray::from(vec![v.is_active])),
            Arc::new(StringArray::from(vec![v.processed_at.to_rfc3339()])),
        ],
    )
    .map_err(|e| DbError::Arrow(e.to_string()))
}

pub fn record_to_processing_version(batch: &RecordBatch, row: usize) -> Result<ProcessingVersion> {
    Ok(ProcessingVersion {
        paper_id: get_string!(batch, 0, row),
        version: get_i64!(batch, 1, row),
        llm_model: get_string!(batch, 2, row),
        processing_config: get_string!(batch, 3, row),
        markdown_content: get_string!(batch, 4, row),
        analysis: get_opt_string!(batch, 5, row),
        is_active: get_bool!(batch, 6, row),
        processed_at: parse_rfc3339(&get_string!(batch, 7, row)),
    })
}

// =============================================================================
// Citation
// =============================================================================

pub fn citation_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("citing_paper_id", DataType::Utf8, false),
        Field::new("citing_version", DataType::Int64, false),
        Field::new("citation_text", DataType::Utf8, false),
        Field::new("extracted_title", DataType::Utf8, true),
        Field::new("extracted_authors", DataType::Utf8, false),
        Field::new("extracted_year", DataType::Int32, true),
        Field::new("extracted_venue", DataType::Utf8, true),
        Field::new("resolved_doi", DataType::Utf8, true),
        Field::new("resolved_arxiv_id", DataType::Utf8, true),
        Field::new("cited_paper_id", DataType::Utf8, true),
        Field::new("is_influential", DataType::Boolean, false),
        Field::new("confidence", DataType::Float32, false),
        Field::new("resolver_stage", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

pub fn citation_to_record(c: &Citation) -> Result<RecordBatch> {
    let schema = citation_schema();
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec![c.id.to_string()])) as Arc<dyn Array>,
            Arc::new(StringArray::from(vec![c.citing_paper_id.as_str()])),
            Arc::new(Int64Array::from(vec![c.citing_version])),
            Arc::new(StringArray::from(vec![c.citation_text.as_str()])),
            Arc::new(StringArray::from(vec![c.extracted_title.as_deref()])),
            Arc::new(StringArray::from(vec![c.extracted_authors.as_str()])),
            Arc::new(Int32Array::from(vec![c.extracted_year])),
            Arc::new(StringArray::from(vec![c.extracted_venue.as_deref()])),
            Arc::new(StringArray::from(vec![c.resolved_doi.as_deref()])),
            Arc::new(StringArray::from(vec![c.resolved_arxiv_id.as_deref()])),
            Arc::new(StringArray::from(vec![c.cited_paper_id.as_deref()])),
            Arc::new(BooleanArray::from(vec![c.is_influential])),
            Arc::new(Float32Array::from(vec![c.confidence])),
            Arc::new(StringArray::from(vec![c.resolver_stage.as_str()])),
            Arc::new(StringArray::from(vec![c.created_at.to_rfc3339()])),
        ],
    )
    .map_err(|e| DbError::Arrow(e.to_string()))
}

pub fn record_to_citation(batch: &RecordBatch, row: usize) -> Result<Citation> {
    Ok(Citation {
        id: uuid::Uuid::parse_str(&get_string!(batch, 0, row)).map_err(|e| DbError::InvalidQuery(e.to_string()))?,
        citing_paper_id: get_string!(batch, 1, row),
        citing_version: get_i64!(batch, 2, row),
        citation_text: get_string!(batch, 3, row),
        extracted_title: get_opt_string!(batch, 4, row),
        extracted_authors: get_string!(batch, 5, row),
        extracted_year: get_opt_i32!(batch, 6, row),
        extracted_venue: get_opt_string!(batch, 7, row),
        resolved_doi: get_opt_string!(batch, 8, row),
        resolved_arxiv_id: get_opt_string!(batch, 9, row),
        cited_paper_id: get_opt_string!(batch, 10, row),
        is_influential: get_bool!(batch, 11, row),
        confidence: batch.column(12).as_any().downcast_ref::<Float32Array>().unwrap().value(row),
        resolver_stage: get_string!(batch, 13, row),
        created_at: parse_rfc3339(&get_string!(batch, 14, row)),
    })
}

// =============================================================================
// Chunk
// =============================================================================

pub fn chunk_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("paper_id", DataType::Utf8, false),
        Field::new("processing_version", DataType::Int64, false),
        Field::new("source_kind", DataType::Utf8, false),
        Field::new("ordinal", DataType::Int64, false),
        Field::new("text", DataType::Utf8, false),
        Field::new(
            "embedding",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, false)), EMBEDDING_DIM as i32),
            true,
        ),
        Field::new("lexical_tokens", DataType::Utf8, false),
        Field::new("section_heading", DataType::Utf8, true),
        Field::new("page_hint", DataType::Int64, true),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

pub fn chunk_to_record(chunk: &Chunk) -> Result<RecordBatch> {
    let schema = chunk_schema();

    let embedding: Arc<dyn Array> = if let Some(ref emb) = chunk.embedding {
        if emb.len() != EMBEDDING_DIM {
            return Err(DbError::InvalidEmbeddingDimension { expected: EMBEDDING_DIM, actual: emb.len() });
        }
        let values = Float32Array::from(emb.clone());
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        Arc::new(
            FixedSizeListArray::try_new(field, EMBEDDING_DIM as i32, Arc::new(values), None)
                .map_err(|e| DbError::Arrow(e.to_string()))?,
        )
    } else {
        Arc::new(FixedSizeListArray::new_null(Arc::new(Field::new("item", DataType::Float32, false)), EMBEDDING_DIM as i32, 1))
    };

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec![chunk.id.to_string()])) as Arc<dyn Array>,
            Arc::new(StringArray::from(vec![chunk.paper_id.as_str()])),
            Arc::new(Int64Array::from(vec![chunk.processing_version])),
            Arc::new(StringArray::from(vec![chunk.source_kind.as_str()])),
            Arc::new(Int64Array::from(vec![chunk.ordinal])),
            Arc::new(StringArray::from(vec![chunk.text.as_str()])),
            embedding,
            Arc::new(StringArray::from(vec![chunk.lexical_tokens.as_str()])),
            Arc::new(StringArray::from(vec![chunk.section_heading.as_deref()])),
            Arc::new(Int64Array::from(vec![chunk.page_hint])),
            Arc::new(StringArray::from(vec![chunk.created_at.to_rfc3339()])),
        ],
    )
    .map_err(|e| DbError::Arrow(e.to_string()))
}

pub fn record_to_chunk(batch: &RecordBatch, row: usize) -> Result<Chunk> {
    let embedding = {
        let arr = batch.column(6);
        if arr.is_null(row) {
            None
        } else {
            let list_arr = arr.as_any().downcast_ref::<FixedSizeListArray>().unwrap();
            if list_arr.is_null(row) {
                None
            } else {
                let values = list_arr.value(row);
                let float_arr = values.as_any().downcast_ref::<Float32Array>().unwrap();
                Some(float_arr.values().to_vec())
            }
        }
    };

    Ok(Chunk {
        id: uuid::Uuid::parse_str(&get_string!(batch, 0, row)).map_err(|e| DbError::InvalidQuery(e.to_string()))?,
        paper_id: get_string!(batch, 1, row),
        processing_version: get_i64!(batch, 2, row),
        source_kind: get_string!(batch, 3, row),
        ordinal: get_i64!(batch, 4, row),
        text: get_string!(batch, 5, row),
        embedding,
        lexical_tokens: get_string!(batch, 7, row),
        section_heading: get_opt_string!(batch, 8, row),
        page_hint: get_opt_i64!(batch, 9, row),
        created_at: parse_rfc3339(&get_string!(batch, 10, row)),
    })
}

// =============================================================================
// CacheEntryRow
// =============================================================================

pub fn cache_entry_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("kind", DataType::Utf8, false),
        Field::new("fingerprint", DataType::Utf8, false),
        Field::new("value", DataType::Binary, false),
        Field::new("size_bytes", DataType::Int64, false),
        Field::new("created_at", DataType::Utf8, false),
        Field::new("expires_at", DataType::Utf8, true),
    ]))
}

pub fn cache_entry_to_record(e: &CacheEntryRow) -> Result<RecordBatch> {
    let schema = cache_entry_schema();
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec![e.kind.as_str()])) as Arc<dyn Array>,
            Arc::new(StringArray::from(vec![e.fingerprint.as_str()])),
            Arc::new(BinaryArray::from(vec![e.value.as_slice()])),
            Arc::new(Int64Array::from(vec![e.size_bytes])),
            Arc::new(StringArray::from(vec![e.created_at.to_rfc3339()])),
            Arc::new(StringArray::from(vec![opt_rfc3339(e.expires_at)])),
        ],
    )
    .map_err(|e| DbError::Arrow(e.to_string()))
}

pub fn record_to_cache_entry(batch: &RecordBatch, row: usize) -> Result<CacheEntryRow> {
    let value = batch.column(2).as_any().downcast_ref::<BinaryArray>().unwrap().value(row).to_vec();
    Ok(CacheEntryRow {
        kind: get_string!(batch, 0, row),
        fingerprint: get_string!(batch, 1, row),
        value,
        size_bytes: get_i64!(batch, 3, row),
        created_at: parse_rfc3339(&get_string!(batch, 4, row)),
        expires_at: parse_opt_rfc3339(get_opt_string!(batch, 5, row)),
    })
}

// =============================================================================
// ResearchQuery
// =============================================================================

pub fn research_query_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("description", DataType::Utf8, false),
        Field::new("keywords", DataType::Utf8, false),
        Field::new("include_criteria", DataType::Utf8, false),
        Field::new("exclude_criteria", DataType::Utf8, false),
        Field::new("schedule", DataType::Utf8, true),
        Field::new("created_at", DataType::Utf8, false),
        Field::new("updated_at", DataType::Utf8, false),
    ]))
}

pub fn research_query_to_record(q: &ResearchQuery) -> Result<RecordBatch> {
    let schema = research_query_schema();
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec![q.id.to_string()])) as Arc<dyn Array>,
            Arc::new(StringArray::from(vec![q.name.as_str()])),
            Arc::new(StringArray::from(vec![q.description.as_str()])),
            Arc::new(StringArray::from(vec![q.keywords.as_str()])),
            Arc::new(StringArray::from(vec![q.include_criteria.as_str()])),
            Arc::new(StringArray::from(vec![q.exclude_criteria.as_str()])),
            Arc::new(StringArray::from(vec![q.schedule.as_deref()])),
            Arc::new(StringArray::from(vec![q.created_at.to_rfc3339()])),
            Arc::new(StringArray::from(vec![q.updated_at.to_rfc3339()])),
        ],
    )
    .map_err(|e| DbError::Arrow(e.to_string()))
}

pub fn record_to_research_query(batch: &RecordBatch, row: usize) -> Result<ResearchQuery> {
    Ok(ResearchQuery {
        id: uuid::Uuid::parse_str(&get_string!(batch, 0, row)).map_err(|e| DbError::InvalidQuery(e.to_string()))?,
        name: get_string!(batch, 1, row),
        description: get_string!(batch, 2, row),
        keywords: get_string!(batch, 3, row),
        include_criteria: get_string!(batch, 4, row),
        exclude_criteria: get_string!(batch, 5, row),
        schedule: get_opt_string!(batch, 6, row),
        created_at: parse_rfc3339(&get_string!(batch, 7, row)),
        updated_at: parse_rfc3339(&get_string!(batch, 8, row)),
    })
}

use async_trait::async_trait;
use ragwire_core::config::{Config, StorageMode};
use ragwire_core::provider::{self, ChatOutcome, ChatRequest, EmbeddingProvider, Message, Provider};
use ragwire_core::rag::{CollectionSchema, RagEngine};
use ragwire_core::samples::sample_documents;
use ragwire_core::{AnswerStatus, ChatManager};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const KEYWORDS: [&str; 8] = ["pasta", "climb", "hik", "japan", "rust", "ai", "goal", "guitar"];

/// Counts keyword occurrences; the last component keeps vectors non-zero.
struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> provider::Result<Vec<f32>> {
        let text = text.to_lowercase();
        let mut vector: Vec<f32> = KEYWORDS
            .iter()
            .map(|keyword| text.matches(keyword).count() as f32)
            .collect();
        vector.push(0.01);
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len() + 1
    }
}

/// Answers every request with the same text and keeps the prompts.
#[derive(Default)]
struct EchoProvider {
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Provider for EchoProvider {
    async fn chat(&self, request: ChatRequest) -> provider::Result<ChatOutcome> {
        let prompt = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt);
        Ok(ChatOutcome::Reply(Message::assistant("Here is what I know.")))
    }
}

fn memory_config() -> Config {
    let mut config = Config::default();
    config.storage.storage_mode = StorageMode::Memory;
    config.rag.chunk_size = 300;
    config.rag.chunk_overlap = 50;
    config.rag.batch_size = 4;
    config
}

async fn open_engine(config: &Config) -> RagEngine {
    RagEngine::open(config, Arc::new(KeywordEmbedder)).await.unwrap()
}

#[tokio::test]
async fn upload_then_retrieve_ranks_relevant_chunks_first() {
    let config = memory_config();
    let engine = open_engine(&config).await;

    let summary = engine.upload(&sample_documents()).await.unwrap();
    assert_eq!(summary.documents, 5);
    assert!(summary.is_complete());
    assert_eq!(engine.count().await.unwrap(), summary.chunks);

    let results = engine.retrieve("What pasta does Legus like?", None).await.unwrap();
    assert!(!results.is_empty());
    assert!(results.len() <= config.rag.top_k);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(results[0].id.starts_with("legus-food-1_chunk_"));

    let again = engine.upload(&sample_documents()).await.unwrap();
    assert_eq!(again.succeeded, summary.succeeded);
    assert_eq!(engine.count().await.unwrap(), summary.chunks);

    engine.close().await.unwrap();
}

#[tokio::test]
async fn every_record_agrees_on_total_chunks() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&memory_config()).await;
    engine.upload(&sample_documents()).await.unwrap();

    let (files, _) = engine.export(&dir.path().join("export.json")).await.unwrap().unwrap();
    let records = ragwire_core::rag::migrate::load_export(&files.json).unwrap();

    for document in sample_documents() {
        let chunks: Vec<_> = records
            .iter()
            .filter(|r| r.id.starts_with(&format!("{}_chunk_", document.id)))
            .collect();
        assert!(!chunks.is_empty());
        for record in &chunks {
            assert_eq!(record.metadata.total_chunks as usize, chunks.len());
            assert_eq!(record.metadata.title, document.title);
        }
    }
}

#[tokio::test]
async fn grounded_answer_quotes_the_knowledge_base() {
    let config = memory_config();
    let engine = open_engine(&config).await;
    engine.upload(&sample_documents()).await.unwrap();

    let provider = Arc::new(EchoProvider::default());
    let manager = ChatManager::new(config, provider.clone()).with_rag(engine);

    let answer = manager.ask("Where does Legus climb?").await.unwrap();
    assert_eq!(answer.status, AnswerStatus::Grounded);
    assert!(!answer.content.is_empty());

    let prompts = provider.prompts.lock().unwrap();
    assert!(prompts[0].contains("rock climbing"));
    assert!(prompts[0].contains("User Question: Where does Legus climb?"));
}

#[tokio::test]
async fn empty_store_still_produces_an_answer() {
    let config = memory_config();
    let engine = open_engine(&config).await;
    let provider = Arc::new(EchoProvider::default());
    let manager = ChatManager::new(config, provider.clone()).with_rag(engine);

    let answer = manager.ask("Anything?").await.unwrap();
    assert_eq!(answer.status, AnswerStatus::NoContext);
    assert!(!answer.content.is_empty());
    assert_eq!(provider.prompts.lock().unwrap()[0], "Anything?");
}

#[tokio::test]
async fn export_and_import_between_engines() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vector_export.json");
    let config = memory_config();

    let source = open_engine(&config).await;
    let uploaded = source.upload(&sample_documents()).await.unwrap();
    let (files, summary) = source.export(&path).await.unwrap().unwrap();
    assert_eq!(summary.count, uploaded.chunks);
    assert_eq!(summary.dimension, Some(KEYWORDS.len() + 1));
    assert!(files.binary.exists());

    for input in [&files.json, &files.binary] {
        let target = open_engine(&config).await;
        let schema = CollectionSchema::standard(KEYWORDS.len() + 1, config.storage.index);
        let report = target.import(input, &schema, true).await.unwrap();

        assert_eq!(report.loaded, uploaded.chunks);
        assert_eq!(report.final_count, uploaded.chunks);
        assert!(!report.smoke_test.is_empty());
        assert!(report.smoke_test.len() <= 3);
        assert!(report.smoke_test.windows(2).all(|w| w[0].score >= w[1].score));
    }
}

#[tokio::test]
async fn import_rejects_mismatched_dimensions() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vector_export.json");
    let config = memory_config();

    let source = open_engine(&config).await;
    source.upload(&sample_documents()[..1]).await.unwrap();
    source.export(&path).await.unwrap().unwrap();

    let target = open_engine(&config).await;
    let schema = CollectionSchema::standard(4, config.storage.index);
    let result = target.import(&path, &schema, true).await;

    assert!(matches!(result, Err(ragwire_core::RagError::Schema(_))));
    assert_eq!(target.count().await.unwrap(), 0);
}

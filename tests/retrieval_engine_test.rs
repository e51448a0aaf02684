//! Tests for the retrieval and plain engines over mock models.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;
use mimir::engine::{ChunkConfig, VectorIndex};
use mimir::pipeline;
use mimir::{
    ChatEngine, ChatModel, DocumentSet, Embedder, EmbeddingCache, EngineFactory,
    EngineSettings, EventStream, GenerationEvent, Message, MimirError, ModelEngineFactory,
    PlainEngine, Result, RetrievalParams, Upload,
};

// ============================================================================
// Mocks
// ============================================================================

const VOCABULARY: [&str; 3] = ["apple", "river", "stone"];

/// Embeds text as keyword counts over a tiny vocabulary.
#[derive(Default)]
struct KeywordEmbedder {
    embedded_texts: AtomicUsize,
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model(&self) -> &str {
        "keywords"
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.embedded_texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                VOCABULARY
                    .iter()
                    .map(|word| t.matches(word).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Records what it was asked and answers with a fixed token stream.
#[derive(Default)]
struct RecordingChat {
    system: Mutex<Option<String>>,
    messages: Mutex<Vec<Message>>,
}

#[async_trait]
impl ChatModel for RecordingChat {
    fn name(&self) -> &str {
        "recording"
    }

    async fn chat(&self, system: Option<&str>, messages: &[Message]) -> Result<String> {
        *self.system.lock().unwrap() = system.map(str::to_string);
        *self.messages.lock().unwrap() = messages.to_vec();
        Ok("plain answer".to_string())
    }

    async fn chat_stream(
        &self,
        system: Option<&str>,
        messages: &[Message],
    ) -> Result<EventStream> {
        *self.system.lock().unwrap() = system.map(str::to_string);
        *self.messages.lock().unwrap() = messages.to_vec();
        Ok(Box::pin(stream::iter(vec![
            Ok(GenerationEvent::Token("grounded ".into())),
            Ok(GenerationEvent::Token("answer".into())),
            Ok(GenerationEvent::Done),
        ])))
    }
}

struct BrokenEmbedder;

#[async_trait]
impl Embedder for BrokenEmbedder {
    fn model(&self) -> &str {
        "broken"
    }

    async fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Err(MimirError::Llm("connection refused".into()))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn documents() -> DocumentSet {
    DocumentSet::new(vec![
        Upload::new("apple.txt", "apple apple"),
        Upload::new("river.txt", "river"),
        Upload::new("mixed.txt", "apple river"),
    ])
}

struct Fixture {
    chat: Arc<RecordingChat>,
    embedder: Arc<KeywordEmbedder>,
    factory: ModelEngineFactory,
}

fn fixture() -> Fixture {
    let chat = Arc::new(RecordingChat::default());
    let embedder = Arc::new(KeywordEmbedder::default());
    let factory = ModelEngineFactory::new(
        chat.clone(),
        embedder.clone(),
        EmbeddingCache::default(),
        EngineSettings::default(),
    );
    Fixture {
        chat,
        embedder,
        factory,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn threshold_filters_and_ranks_sources() {
    let fx = fixture();
    let params = RetrievalParams::new(5, 0.5).unwrap();
    let engine = fx.factory.retrieval(&documents(), params).await.unwrap();

    let response = engine.generate("apple", &[]).await.unwrap();
    let names: Vec<_> = response
        .sources()
        .iter()
        .map(|s| s.identifier.as_str())
        .collect();
    assert_eq!(names, vec!["apple.txt", "mixed.txt"]);

    let completion = pipeline::complete(Ok(response), |_| {}).await;
    assert_eq!(completion.response, "grounded answer");
    assert_eq!(
        completion.sources.as_deref(),
        Some(
            "📄 **apple.txt** (Similarity: 1.00)\n> apple apple\n\n\
             📄 **mixed.txt** (Similarity: 0.71)\n> apple river"
        )
    );
}

#[tokio::test]
async fn num_docs_limits_sources() {
    let fx = fixture();
    let params = RetrievalParams::new(1, 0.5).unwrap();
    let engine = fx.factory.retrieval(&documents(), params).await.unwrap();

    let response = engine.generate("apple", &[]).await.unwrap();
    assert_eq!(response.sources().len(), 1);
    assert_eq!(response.sources()[0].identifier, "apple.txt");
}

#[tokio::test]
async fn retrieved_text_reaches_the_system_prompt() {
    let fx = fixture();
    let engine = fx
        .factory
        .retrieval(&documents(), RetrievalParams::new(5, 0.9).unwrap())
        .await
        .unwrap();

    let history = vec![Message::assistant("earlier reply")];
    let response = engine.generate("apple", &history).await.unwrap();
    pipeline::complete(Ok(response), |_| {}).await;

    let system = fx.chat.system.lock().unwrap().clone().unwrap();
    assert!(system.contains("apple apple"));
    assert!(!system.contains("apple river"));

    let messages = fx.chat.messages.lock().unwrap().clone();
    assert_eq!(
        messages,
        vec![Message::assistant("earlier reply"), Message::user("apple")]
    );
}

#[tokio::test]
async fn nothing_above_threshold_still_asks_the_model() {
    let fx = fixture();
    let engine = fx
        .factory
        .retrieval(&documents(), RetrievalParams::new(5, 0.5).unwrap())
        .await
        .unwrap();

    let response = engine.generate("stone", &[]).await.unwrap();
    assert!(response.sources().is_empty());

    let completion = pipeline::complete(Ok(response), |_| {}).await;
    assert!(completion.is_success());
    assert!(completion.sources.is_none());
}

#[tokio::test]
async fn rebuilding_reuses_cached_chunk_embeddings() {
    let fx = fixture();
    let docs = documents();

    fx.factory
        .retrieval(&docs, RetrievalParams::default())
        .await
        .unwrap();
    assert_eq!(fx.embedder.embedded_texts.load(Ordering::SeqCst), 3);

    fx.factory
        .retrieval(&docs, RetrievalParams::new(2, 0.1).unwrap())
        .await
        .unwrap();
    assert_eq!(fx.embedder.embedded_texts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn binary_upload_is_rejected() {
    let fx = fixture();
    let docs = DocumentSet::new(vec![Upload::new("image.png", vec![0x89, 0x50, 0xff, 0xfe])]);

    let result = fx.factory.retrieval(&docs, RetrievalParams::default()).await;
    assert!(matches!(result, Err(MimirError::UnsupportedDocument { .. })));
}

#[tokio::test]
async fn embedder_failure_fails_the_build() {
    let result = VectorIndex::build(
        &documents(),
        &BrokenEmbedder,
        &EmbeddingCache::default(),
        &ChunkConfig::default(),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn long_documents_are_chunked() {
    let embedder = KeywordEmbedder::default();
    let text = "apple ".repeat(100);
    let docs = DocumentSet::new(vec![Upload::new("long.txt", text)]);
    let config = ChunkConfig {
        chunk_size: 100,
        chunk_overlap: 20,
    };

    let index = VectorIndex::build(&docs, &embedder, &EmbeddingCache::default(), &config)
        .await
        .unwrap();
    assert!(index.len() > 1);
}

#[tokio::test]
async fn plain_engine_prefixes_assistant_replies() {
    let chat = Arc::new(RecordingChat::default());
    let engine = PlainEngine::new(chat.clone(), 4000);
    let history = vec![
        Message::assistant("Hello there"),
        Message::user("ignored question"),
        Message::assistant("Second reply"),
    ];

    let response = engine.generate("next?", &history).await.unwrap();
    let completion = pipeline::complete(Ok(response), |_| {}).await;
    assert_eq!(completion.response, "plain answer");
    assert!(completion.sources.is_none());

    let sent = chat.messages.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![Message::user("Hello there\nSecond reply\nnext?")]
    );
    assert!(chat.system.lock().unwrap().is_none());
}

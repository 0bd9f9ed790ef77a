//! Single-turn question answering with optional retrieval.
//!
//! Three ways to answer a question:
//!
//! - [`ChatManager::chat`]: the question goes to the model as is
//! - [`ChatManager::ask`]: retrieve first, then ask with the context spliced
//!   into the prompt (eager retrieval)
//! - [`ChatManager::ask_with_tools`]: offer `search_knowledge_base` and let the
//!   model decide whether to call it (tool-mediated retrieval)
//!
//! # Tool Calling Flow
//!
//! ```text
//! User Query → LLM → Tool Call?
//!                ↓         ↓
//!             Response   Execute each call, in order
//!                          ↓
//!                     LLM with results → Response
//! ```
//!
//! Exactly one follow-up request is made after tool execution.

use crate::config::Config;
use crate::provider::{ChatOutcome, ChatRequest, Message, Provider, Tool};
use crate::rag::{compose_prompt, RagEngine, RagError, Result, RetrievalResult};
use crate::tools::{SearchKnowledgeBase, ToolError, ToolRegistry};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Content of an [`Answer`] when the endpoint returned no choices.
pub const NO_RESPONSE_CONTENT: &str = "Error: No response from AI";

/// How an answer was produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    /// Eager retrieval found context and the prompt included it.
    Grounded,
    /// Eager retrieval found nothing; the bare question was sent.
    NoContext,
    /// No retrieval was involved (plain chat, or the model answered without
    /// calling a tool).
    Direct,
    /// The model called tools and answered from their results.
    ToolAssisted,
    /// The endpoint's reply had no usable choices.
    NoResponse { available_keys: Vec<String> },
}

/// One tool invocation made on the model's behalf.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    /// The raw JSON argument string the model sent
    pub arguments: String,
    pub result: String,
}

/// Prompt and reply of one exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationTurn {
    pub prompt: String,
    pub response: String,
    pub tool_calls: Vec<ToolCallRecord>,
}

/// The final answer to a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub content: String,
    pub status: AnswerStatus,
    /// Chunks spliced into the prompt (eager mode only)
    pub sources: Vec<RetrievalResult>,
    pub turn: ConversationTurn,
}

impl Answer {
    fn new(prompt: String, content: String, status: AnswerStatus) -> Self {
        Self {
            turn: ConversationTurn {
                prompt,
                response: content.clone(),
                tool_calls: Vec::new(),
            },
            content,
            status,
            sources: Vec::new(),
        }
    }

    fn no_response(prompt: String, available_keys: Vec<String>) -> Self {
        warn!(?available_keys, "No choices found in response");
        Self::new(
            prompt,
            NO_RESPONSE_CONTENT.to_string(),
            AnswerStatus::NoResponse { available_keys },
        )
    }

    pub fn is_no_response(&self) -> bool {
        matches!(self.status, AnswerStatus::NoResponse { .. })
    }
}

/// Answers questions against the inference endpoint.
///
/// Plain chat needs only a [`Provider`]. Retrieval modes need a knowledge
/// base attached with [`with_rag`](Self::with_rag), which also registers the
/// `search_knowledge_base` tool.
///
/// # Examples
///
/// ```no_run
/// use ragwire_core::{ChatManager, Config, OpenAiProvider};
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load_or_default();
/// let provider = Arc::new(OpenAiProvider::from_config(&config));
/// let manager = ChatManager::new(config, provider);
///
/// let answer = manager.chat("What is retrieval augmented generation?").await?;
/// println!("Assistant: {}", answer.content);
/// # Ok(())
/// # }
/// ```
pub struct ChatManager {
    config: Config,
    provider: Arc<dyn Provider>,
    rag: Option<RagEngine>,
    tools: ToolRegistry,
}

impl ChatManager {
    pub fn new(config: Config, provider: Arc<dyn Provider>) -> Self {
        Self {
            config,
            provider,
            rag: None,
            tools: ToolRegistry::new(),
        }
    }

    /// Attaches a knowledge base and registers `search_knowledge_base`.
    pub fn with_rag(mut self, rag: RagEngine) -> Self {
        self.tools
            .register(Arc::new(SearchKnowledgeBase::new(rag.retriever().clone())));
        self.rag = Some(rag);
        self
    }

    pub fn rag(&self) -> Option<&RagEngine> {
        self.rag.as_ref()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn require_rag(&self) -> Result<&RagEngine> {
        self.rag.as_ref().ok_or_else(|| {
            RagError::Config(crate::config::ConfigError::Invalid(
                "no knowledge base attached to the chat manager".to_string(),
            ))
        })
    }

    fn request(&self, messages: Vec<Message>, tools: Vec<Tool>) -> ChatRequest {
        ChatRequest::new(&self.config.llm.model, messages)
            .with_max_tokens(self.config.llm.max_tokens)
            .with_temperature(self.config.llm.temperature)
            .with_tools(tools)
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatOutcome> {
        debug!(
            message_count = request.messages.len(),
            tool_count = request.tools.as_ref().map_or(0, Vec::len),
            "Sending request to provider"
        );
        Ok(self.provider.chat(request).await?)
    }

    /// Sends one user message without tools.
    async fn complete(&self, prompt: String, status: AnswerStatus) -> Result<Answer> {
        let request = self.request(vec![Message::user(prompt.clone())], Vec::new());
        match self.send(request).await? {
            ChatOutcome::Reply(message) => Ok(Answer::new(prompt, message.content, status)),
            ChatOutcome::NoResponse { available_keys } => Ok(Answer::no_response(prompt, available_keys)),
        }
    }

    /// Sends the question straight to the model.
    pub async fn chat(&self, question: &str) -> Result<Answer> {
        self.complete(question.to_string(), AnswerStatus::Direct).await
    }

    /// Retrieves context for the question, then asks the model with it.
    ///
    /// When nothing is retrieved the bare question is sent instead and the
    /// answer is marked [`AnswerStatus::NoContext`].
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let rag = self.require_rag()?;

        info!("Retrieving relevant documents...");
        let sources = rag.retrieve(question, None).await?;

        if sources.is_empty() {
            info!("No relevant documents found, asking without context");
            return self.complete(question.to_string(), AnswerStatus::NoContext).await;
        }

        let prompt = compose_prompt(question, &sources);
        let mut answer = self.complete(prompt, AnswerStatus::Grounded).await?;
        answer.sources = sources;
        Ok(answer)
    }

    /// Offers the registered tools and lets the model decide to use them.
    ///
    /// Tool calls are executed in the order received; each result is sent
    /// back as a `tool` message keyed by its call id, followed by exactly one
    /// more request. Bad arguments or unknown tool names are reported back to
    /// the model as the tool result; retrieval failures abort the turn.
    pub async fn ask_with_tools(&self, question: &str) -> Result<Answer> {
        self.require_rag()?;
        let tools = self.tools.definitions();
        let mut messages = vec![
            Message::system(self.config.system_prompt.clone()),
            Message::user(question),
        ];

        let first = self.send(self.request(messages.clone(), tools.clone())).await?;
        let reply = match first {
            ChatOutcome::Reply(message) => message,
            ChatOutcome::NoResponse { available_keys } => {
                return Ok(Answer::no_response(question.to_string(), available_keys));
            }
        };

        let calls = reply.requested_tool_calls().to_vec();
        if calls.is_empty() {
            debug!("Model answered without calling a tool");
            return Ok(Answer::new(question.to_string(), reply.content, AnswerStatus::Direct));
        }

        info!(tool_call_count = calls.len(), "Processing tool calls from LLM");
        messages.push(Message::assistant_tool_calls(reply.content.clone(), calls.clone()));

        let mut records = Vec::with_capacity(calls.len());
        for call in &calls {
            let result = match self.tools.execute(call).await {
                Ok(output) => output,
                Err(ToolError::ExecutionFailed(e)) => return Err(e),
                Err(e) => {
                    warn!(tool_name = %call.function.name, error = %e, "Tool call rejected");
                    format!("Error: {}", e)
                }
            };

            messages.push(Message::tool(call.id.clone(), result.clone()));
            records.push(ToolCallRecord {
                id: call.id.clone(),
                name: call.function.name.clone(),
                arguments: call.function.arguments.clone(),
                result,
            });
        }

        let mut answer = match self.send(self.request(messages, tools)).await? {
            ChatOutcome::Reply(message) => {
                if !message.requested_tool_calls().is_empty() {
                    warn!(
                        tool_call_count = message.requested_tool_calls().len(),
                        "Follow-up response requested more tools, ignoring them"
                    );
                }
                Answer::new(question.to_string(), message.content, AnswerStatus::ToolAssisted)
            }
            ChatOutcome::NoResponse { available_keys } => Answer::no_response(question.to_string(), available_keys),
        };
        answer.turn.tool_calls = records;
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{EmbeddingProvider, ToolCall, ToolCallFunction};
    use crate::rag::{CollectionSchema, Document, Embedder, InMemoryStore, IndexSpec};
    use crate::tools::SEARCH_KNOWLEDGE_BASE;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Maps text onto a food axis and a hiking axis.
    struct TopicEmbedder;

    #[async_trait]
    impl EmbeddingProvider for TopicEmbedder {
        async fn embed(&self, text: &str) -> crate::provider::Result<Vec<f32>> {
            let text = text.to_lowercase();
            let food = if text.contains("food") || text.contains("carbonara") { 1.0 } else { 0.0 };
            let hiking = if text.contains("hik") { 1.0 } else { 0.0 };
            Ok(vec![food, hiking, 0.1])
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    /// Replays canned outcomes and records every request.
    struct ScriptedProvider {
        replies: Mutex<VecDeque<ChatOutcome>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<ChatOutcome>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<ChatRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn chat(&self, request: ChatRequest) -> crate::provider::Result<ChatOutcome> {
            self.requests.lock().unwrap().push(request);
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted reply left"))
        }
    }

    fn reply(content: &str) -> ChatOutcome {
        ChatOutcome::Reply(Message::assistant(content))
    }

    fn call(id: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.to_string(),
            call_type: "function".to_string(),
            function: ToolCallFunction {
                name: SEARCH_KNOWLEDGE_BASE.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    fn tool_reply(calls: Vec<ToolCall>) -> ChatOutcome {
        ChatOutcome::Reply(Message::assistant_tool_calls("", calls))
    }

    async fn engine(documents: &[Document]) -> RagEngine {
        let config = Config::default();
        let store = Arc::new(InMemoryStore::new(CollectionSchema::standard(3, IndexSpec::default())));
        let engine = RagEngine::with_store(&config, Embedder::new(Arc::new(TopicEmbedder)), store).unwrap();
        engine.upload(documents).await.unwrap();
        engine
    }

    fn documents() -> Vec<Document> {
        vec![
            Document::new("food", "Legus loves carbonara and other Italian food.").with_title("Foods"),
            Document::new("hiking", "Legus goes hiking every weekend.").with_title("Activities"),
        ]
    }

    fn manager(provider: Arc<ScriptedProvider>, engine: RagEngine) -> ChatManager {
        ChatManager::new(Config::default(), provider).with_rag(engine)
    }

    #[tokio::test]
    async fn test_chat_sends_bare_question() {
        let provider = ScriptedProvider::new(vec![reply("Hello!")]);
        let manager = ChatManager::new(Config::default(), provider.clone());

        let answer = manager.chat("Hi there").await.unwrap();
        assert_eq!(answer.content, "Hello!");
        assert_eq!(answer.status, AnswerStatus::Direct);

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages, vec![Message::user("Hi there")]);
        assert!(requests[0].tools.is_none());
    }

    #[tokio::test]
    async fn test_ask_grounds_prompt_in_retrieved_chunks() {
        let provider = ScriptedProvider::new(vec![reply("Carbonara.")]);
        let manager = manager(provider.clone(), engine(&documents()).await);

        let answer = manager.ask("What food does Legus like?").await.unwrap();
        assert_eq!(answer.status, AnswerStatus::Grounded);
        assert_eq!(answer.sources[0].id, "food_chunk_0");
        assert!(answer.sources.windows(2).all(|w| w[0].score >= w[1].score));

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].messages[0].content;
        assert_eq!(prompt, &compose_prompt("What food does Legus like?", &answer.sources));
        assert!(prompt.contains("Legus loves carbonara"));
        assert_eq!(answer.turn.prompt, *prompt);
    }

    #[tokio::test]
    async fn test_ask_without_hits_sends_bare_question() {
        let provider = ScriptedProvider::new(vec![reply("No idea.")]);
        let manager = manager(provider.clone(), engine(&[]).await);

        let answer = manager.ask("What food?").await.unwrap();
        assert_eq!(answer.status, AnswerStatus::NoContext);
        assert!(answer.sources.is_empty());
        assert_eq!(provider.requests()[0].messages, vec![Message::user("What food?")]);
    }

    #[tokio::test]
    async fn test_missing_choices_is_reported_not_raised() {
        let provider = ScriptedProvider::new(vec![ChatOutcome::NoResponse {
            available_keys: vec!["error".to_string()],
        }]);
        let manager = ChatManager::new(Config::default(), provider);

        let answer = manager.chat("Hi").await.unwrap();
        assert!(answer.is_no_response());
        assert_eq!(answer.content, NO_RESPONSE_CONTENT);
        assert_eq!(
            answer.status,
            AnswerStatus::NoResponse {
                available_keys: vec!["error".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_ask_requires_knowledge_base() {
        let provider = ScriptedProvider::new(vec![]);
        let manager = ChatManager::new(Config::default(), provider);
        assert!(matches!(manager.ask("x").await, Err(RagError::Config(_))));
        assert!(manager.tools().is_empty());
    }

    #[tokio::test]
    async fn test_tool_answer_without_calls_is_direct() {
        let provider = ScriptedProvider::new(vec![reply("Paris.")]);
        let manager = manager(provider.clone(), engine(&documents()).await);

        let answer = manager.ask_with_tools("Capital of France?").await.unwrap();
        assert_eq!(answer.status, AnswerStatus::Direct);
        assert_eq!(answer.content, "Paris.");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].messages[0].role, "system");
        let tools = requests[0].tools.as_ref().unwrap();
        assert_eq!(tools[0].function.name, SEARCH_KNOWLEDGE_BASE);
    }

    #[tokio::test]
    async fn test_tool_result_is_keyed_by_call_id() {
        let provider = ScriptedProvider::new(vec![
            tool_reply(vec![call("call_1", r#"{"query": "favorite food", "top_k": 1}"#)]),
            reply("Legus loves carbonara."),
        ]);
        let manager = manager(provider.clone(), engine(&documents()).await);

        let answer = manager.ask_with_tools("What food does Legus like?").await.unwrap();
        assert_eq!(answer.status, AnswerStatus::ToolAssisted);
        assert_eq!(answer.content, "Legus loves carbonara.");
        assert_eq!(answer.turn.tool_calls.len(), 1);
        assert!(answer.turn.tool_calls[0].result.starts_with("Found 1 relevant documents:"));

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        let follow_up = &requests[1].messages;
        assert_eq!(follow_up.len(), 4);
        assert_eq!(follow_up[2].requested_tool_calls().len(), 1);
        assert_eq!(follow_up[3].role, "tool");
        assert_eq!(follow_up[3].tool_call_id.as_deref(), Some("call_1"));
        assert!(follow_up[3].content.contains("[1] Foods"));
    }

    #[tokio::test]
    async fn test_multiple_calls_run_in_order_with_one_follow_up() {
        let provider = ScriptedProvider::new(vec![
            tool_reply(vec![
                call("a", r#"{"query": "food"}"#),
                call("b", r#"{"query": "hiking"}"#),
            ]),
            tool_reply(vec![call("c", r#"{"query": "more"}"#)]),
        ]);
        let manager = manager(provider.clone(), engine(&documents()).await);

        let answer = manager.ask_with_tools("Tell me about Legus").await.unwrap();
        let ids: Vec<&str> = answer.turn.tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(provider.requests().len(), 2);

        let follow_up = &provider.requests()[1].messages;
        assert_eq!(follow_up[3].tool_call_id.as_deref(), Some("a"));
        assert_eq!(follow_up[4].tool_call_id.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_bad_arguments_are_reported_to_the_model() {
        let provider = ScriptedProvider::new(vec![
            tool_reply(vec![call("call_1", "not json")]),
            reply("Sorry."),
        ]);
        let manager = manager(provider.clone(), engine(&documents()).await);

        let answer = manager.ask_with_tools("What food?").await.unwrap();
        assert_eq!(answer.status, AnswerStatus::ToolAssisted);
        assert!(answer.turn.tool_calls[0].result.starts_with("Error: "));
        assert_eq!(provider.requests().len(), 2);
    }
}

//! FAQ 检索工具（信息助手使用）
//!
//! FaqStore 是外部检索能力的抽象（向量库、搜索服务等）；内置的 InMemoryFaqStore 按词重叠打分，
//! 可从 JSON 文件（`[{"question": ..., "answer": ...}]`）加载。

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ToolError;
use crate::tools::schema::{parameters_for, parse_args};
use crate::tools::Tool;

/// 默认返回条数
const DEFAULT_K: usize = 3;
/// 单次最多返回条数
const MAX_K: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqItem {
    pub question: String,
    pub answer: String,
}

/// FAQ 检索能力
#[async_trait]
pub trait FaqStore: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<FaqItem>, String>;

    /// 全部条目（按加载顺序）
    async fn list(&self) -> Result<Vec<FaqItem>, String>;
}

/// 内存 FAQ：按查询词与问答文本的重叠数排序
#[derive(Debug, Default, Clone)]
pub struct InMemoryFaqStore {
    items: Vec<FaqItem>,
}

impl InMemoryFaqStore {
    pub fn new(items: Vec<FaqItem>) -> Self {
        Self { items }
    }

    /// 从 JSON 文件加载；文件不存在或格式错误时返回空库并记录警告
    pub fn load(path: &Path) -> Self {
        let items = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Vec<FaqItem>>(&raw) {
                Ok(items) => items,
                Err(e) => {
                    tracing::warn!("Invalid FAQ file {}: {}", path.display(), e);
                    Vec::new()
                }
            },
            Err(e) => {
                tracing::warn!("FAQ file {} not readable: {}", path.display(), e);
                Vec::new()
            }
        };
        tracing::info!("Loaded {} FAQ entries", items.len());
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl FaqStore for InMemoryFaqStore {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<FaqItem>, String> {
        let query_words = words(query);
        let mut scored: Vec<(usize, usize)> = self
            .items
            .iter()
            .enumerate()
            .map(|(idx, item)| {
                let text = format!("{} {}", item.question, item.answer);
                (words(&text).intersection(&query_words).count(), idx)
            })
            .filter(|(score, _)| *score > 0)
            .collect();
        // 分数降序，同分保持原顺序
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, idx)| self.items[idx].clone())
            .collect())
    }

    async fn list(&self) -> Result<Vec<FaqItem>, String> {
        Ok(self.items.clone())
    }
}

#[derive(Deserialize, JsonSchema)]
struct FaqSearchArgs {
    /// 检索语句
    query: String,
    /// 返回条数，默认 3
    #[serde(default)]
    k: Option<usize>,
}

/// faq_search 工具
pub struct FaqSearchTool {
    store: Arc<dyn FaqStore>,
}

impl FaqSearchTool {
    pub fn new(store: Arc<dyn FaqStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for FaqSearchTool {
    fn name(&self) -> &str {
        "faq_search"
    }

    fn description(&self) -> &str {
        "Search the FAQ database for entries relevant to a query and return up to k results."
    }

    fn parameters_schema(&self) -> Value {
        parameters_for::<FaqSearchArgs>()
    }

    async fn execute(&self, args: Value) -> Result<Value, ToolError> {
        let args: FaqSearchArgs = parse_args(args)?;
        let k = args.k.unwrap_or(DEFAULT_K).clamp(1, MAX_K);
        let items = self
            .store
            .search(&args.query, k)
            .await
            .map_err(ToolError::Failed)?;
        Ok(serde_json::to_value(items)?)
    }
}

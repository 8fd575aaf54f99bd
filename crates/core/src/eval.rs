use crate::embeddings::Embedder;
use crate::error::EvalError;
use crate::llm::LlmClient;
use crate::models::SearchQuery;
use crate::retriever::Retriever;
use crate::traits::VectorIndex;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

const QA_SYSTEM_PROMPT: &str = "Answer the question using only the provided \
context passages. If the context does not contain the answer, say so.";

const JUDGE_SYSTEM_PROMPT: &str = "You are a strict evaluator of \
retrieval-augmented answers. Respond with only a JSON object of the form \
{\"score\": <number between 0 and 1>} and nothing else.";

/// One question/ground-truth pair of an evaluation dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaItem {
    pub id: String,
    pub question: String,
    pub ground_truth: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaDataset {
    pub name: String,
    pub items: Vec<QaItem>,
}

impl QaDataset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keep only the first `n` items, for quick runs over large datasets.
    pub fn take(&self, n: usize) -> Self {
        Self {
            name: self.name.clone(),
            items: self.items.iter().take(n).cloned().collect(),
        }
    }

    pub fn load_json(path: &Path) -> Result<Self, EvalError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|error| {
            EvalError::Dataset(format!("{}: {error}", path.display()))
        })
    }

    pub fn save_json(&self, path: &Path) -> Result<(), EvalError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|error| EvalError::Dataset(error.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub const SUPPORTED_EVAL_METRICS: &[&str] = &[
    "faithfulness",
    "answer-relevancy",
    "context-precision",
    "context-recall",
];

/// Metrics scored by the judge model. The scoring itself is delegated; this
/// crate only aggregates the returned scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvalMetric {
    Faithfulness,
    AnswerRelevancy,
    ContextPrecision,
    ContextRecall,
}

impl EvalMetric {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Faithfulness,
            Self::AnswerRelevancy,
            Self::ContextPrecision,
            Self::ContextRecall,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Faithfulness => "faithfulness",
            Self::AnswerRelevancy => "answer-relevancy",
            Self::ContextPrecision => "context-precision",
            Self::ContextRecall => "context-recall",
        }
    }
}

impl FromStr for EvalMetric {
    type Err = EvalError;

    fn from_str(value: &str) -> Result<Self, EvalError> {
        match value {
            "faithfulness" => Ok(Self::Faithfulness),
            "answer-relevancy" => Ok(Self::AnswerRelevancy),
            "context-precision" => Ok(Self::ContextPrecision),
            "context-recall" => Ok(Self::ContextRecall),
            other => Err(EvalError::InvalidMetric {
                requested: other.to_string(),
                supported: SUPPORTED_EVAL_METRICS,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricScore {
    pub metric: EvalMetric,
    pub score: f64,
}

/// The question, the generated answer, the contexts the answer was grounded
/// in, and the judge's per-metric scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalSample {
    pub question: String,
    pub answer: String,
    pub contexts: Vec<String>,
    pub ground_truth: Option<String>,
    pub scores: Vec<MetricScore>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub id: Uuid,
    pub dataset: String,
    pub samples: Vec<EvalSample>,
    pub mean_scores: Vec<MetricScore>,
    pub completed_at: DateTime<Utc>,
}

impl EvalReport {
    pub fn save_json(&self, path: &Path) -> Result<(), EvalError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|error| EvalError::Dataset(error.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Runs a full retrieve-answer-judge loop over a QA dataset against an
/// already indexed store. Strictly sequential: one question at a time.
pub struct EvalPipeline<V, E> {
    retriever: Retriever<V, E>,
    llm: LlmClient,
    metrics: Vec<EvalMetric>,
    top_k: usize,
}

impl<V, E> EvalPipeline<V, E>
where
    V: VectorIndex + Send + Sync,
    E: Embedder + Send + Sync,
{
    pub fn new(
        retriever: Retriever<V, E>,
        llm: LlmClient,
        metrics: Vec<EvalMetric>,
        top_k: usize,
    ) -> Result<Self, EvalError> {
        if metrics.is_empty() {
            return Err(EvalError::InvalidArgument(
                "expecting at least one eval metric".to_string(),
            ));
        }
        if top_k == 0 {
            return Err(EvalError::InvalidArgument(
                "top_k must be positive".to_string(),
            ));
        }

        Ok(Self {
            retriever,
            llm,
            metrics,
            top_k,
        })
    }

    pub async fn run(&self, dataset: &QaDataset) -> Result<EvalReport, EvalError> {
        if dataset.is_empty() {
            return Err(EvalError::Dataset(format!(
                "dataset {:?} has no items",
                dataset.name
            )));
        }

        let mut samples = Vec::with_capacity(dataset.len());

        for item in &dataset.items {
            let candidates = self
                .retriever
                .retrieve(&SearchQuery::new(item.question.clone(), self.top_k))
                .await?;
            let contexts: Vec<String> = candidates
                .into_iter()
                .map(|candidate| candidate.content)
                .collect();

            let answer = self
                .llm
                .complete(
                    Some(QA_SYSTEM_PROMPT),
                    &qa_prompt(&item.question, &contexts),
                )
                .await?;

            let mut scores = Vec::with_capacity(self.metrics.len());
            for metric in &self.metrics {
                let prompt = judge_prompt(
                    *metric,
                    &item.question,
                    &answer,
                    &contexts,
                    item.ground_truth.as_deref(),
                );
                let response = self.llm.complete(Some(JUDGE_SYSTEM_PROMPT), &prompt).await?;
                scores.push(MetricScore {
                    metric: *metric,
                    score: parse_score_response(&response)?,
                });
            }

            info!(question_id = %item.id, "evaluated sample");

            samples.push(EvalSample {
                question: item.question.clone(),
                answer,
                contexts,
                ground_truth: item.ground_truth.clone(),
                scores,
            });
        }

        Ok(EvalReport {
            id: Uuid::new_v4(),
            dataset: dataset.name.clone(),
            mean_scores: mean_scores(&self.metrics, &samples),
            samples,
            completed_at: Utc::now(),
        })
    }
}

pub fn qa_prompt(question: &str, contexts: &[String]) -> String {
    let mut prompt = String::from("Context passages:\n");
    for (index, context) in contexts.iter().enumerate() {
        prompt.push_str(&format!("[{}] {}\n", index + 1, context));
    }
    prompt.push_str(&format!("\nQuestion: {question}"));
    prompt
}

fn judge_prompt(
    metric: EvalMetric,
    question: &str,
    answer: &str,
    contexts: &[String],
    ground_truth: Option<&str>,
) -> String {
    let joined_contexts = contexts.join("\n---\n");
    let ground_truth_section = ground_truth
        .map(|value| format!("\n\nGround truth answer:\n{value}"))
        .unwrap_or_default();

    let criterion = match metric {
        EvalMetric::Faithfulness => {
            "Score how fully the answer is supported by the context passages \
             alone (1 = every claim is grounded, 0 = unsupported)."
        }
        EvalMetric::AnswerRelevancy => {
            "Score how directly the answer addresses the question \
             (1 = fully on point, 0 = unrelated)."
        }
        EvalMetric::ContextPrecision => {
            "Score what fraction of the context passages is relevant to \
             answering the question (1 = all relevant, 0 = none)."
        }
        EvalMetric::ContextRecall => {
            "Score how much of the information needed for the ground truth \
             answer appears in the context passages (1 = everything, 0 = nothing)."
        }
    };

    format!(
        "{criterion}\n\nQuestion:\n{question}\n\nAnswer:\n{answer}\n\n\
         Context passages:\n{joined_contexts}{ground_truth_section}"
    )
}

/// The judge must return `{"score": x}`; fenced or surrounded JSON is
/// tolerated, anything else is a parse error. Scores clamp into [0, 1].
fn parse_score_response(response: &str) -> Result<f64, EvalError> {
    #[derive(Deserialize)]
    struct RawScore {
        score: f64,
    }

    let json = extract_json(response);
    let raw: RawScore = serde_json::from_str(&json).map_err(|error| {
        EvalError::JudgeParse(format!("{error}; response: {response}"))
    })?;

    Ok(raw.score.clamp(0.0, 1.0))
}

fn extract_json(response: &str) -> String {
    let response = response.trim();

    if let Some(stripped) = response.strip_prefix("```json") {
        if let Some(end) = stripped.rfind("```") {
            return stripped[..end].trim().to_string();
        }
    }

    if let Some(stripped) = response.strip_prefix("```") {
        if let Some(end) = stripped.rfind("```") {
            let start = stripped.find('\n').map_or(0, |position| position + 1);
            if end > start {
                return stripped[start..end].trim().to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if end > start {
            return response[start..=end].to_string();
        }
    }

    response.to_string()
}

fn mean_scores(metrics: &[EvalMetric], samples: &[EvalSample]) -> Vec<MetricScore> {
    metrics
        .iter()
        .map(|metric| {
            let total: f64 = samples
                .iter()
                .flat_map(|sample| &sample.scores)
                .filter(|score| score.metric == *metric)
                .map(|score| score.score)
                .sum();
            MetricScore {
                metric: *metric,
                score: total / samples.len() as f64,
            }
        })
        .collect()
}

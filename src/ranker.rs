//! Relevance ranking.
//!
//! A [`RelevanceRanker`] returns a preference order over candidate indices.
//! The ranker never reorders listings itself: [`apply_ranking`] does that,
//! and it discards any order that names an index twice or out of range.
//!
//! | Provider | Implementation |
//! |----------|----------------|
//! | `disabled` | [`PassthroughRanker`]: no preference |
//! | `keyword` | [`KeywordRanker`]: query-term overlap, local |
//! | `openai`, `ollama` | [`ChatRelevanceRanker`]: chat model picks indices |

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::AssistConfig;
use crate::llm::ChatClient;
use crate::models::{CourseListing, NOT_AVAILABLE};

#[async_trait]
pub trait RelevanceRanker: Send + Sync {
    fn name(&self) -> &str;

    /// Preferred order of up to `count` indices into `candidates`, best first.
    async fn rank(
        &self,
        query: &str,
        candidates: &[CourseListing],
        count: usize,
    ) -> Result<Vec<usize>>;
}

/// Expresses no preference; results keep concatenation order.
pub struct PassthroughRanker;

#[async_trait]
impl RelevanceRanker for PassthroughRanker {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn rank(&self, _: &str, _: &[CourseListing], _: usize) -> Result<Vec<usize>> {
        Ok(Vec::new())
    }
}

/// Scores candidates by how many query terms they contain.
///
/// Title hits weigh twice as much as hits in the description, category or
/// tags. Ties keep concatenation order.
pub struct KeywordRanker;

impl KeywordRanker {
    fn score(terms: &[String], listing: &CourseListing) -> usize {
        let title = listing.title.to_lowercase();
        let body = format!(
            "{} {}",
            listing.description,
            listing.category.as_deref().unwrap_or_default()
        )
        .to_lowercase();

        terms
            .iter()
            .map(|t| {
                let mut s = 0;
                if title.contains(t.as_str()) {
                    s += 2;
                }
                if body.contains(t.as_str()) || listing.tags.contains(t.as_str()) {
                    s += 1;
                }
                s
            })
            .sum()
    }
}

#[async_trait]
impl RelevanceRanker for KeywordRanker {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn rank(
        &self,
        query: &str,
        candidates: &[CourseListing],
        count: usize,
    ) -> Result<Vec<usize>> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .filter(|t| t.len() > 1)
            .collect();

        let mut scored: Vec<(usize, usize)> = candidates
            .iter()
            .enumerate()
            .map(|(i, c)| (i, Self::score(&terms, c)))
            .collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(scored.into_iter().take(count).map(|(i, _)| i).collect())
    }
}

const RANK_PROMPT: &str = "You rank online courses by relevance to a learner's search. \
You receive the search and a numbered list of courses. \
Reply with a JSON array of course numbers, most relevant first, and nothing else.";

/// Ranker backed by a chat-completion model.
pub struct ChatRelevanceRanker {
    client: ChatClient,
}

impl ChatRelevanceRanker {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RelevanceRanker for ChatRelevanceRanker {
    fn name(&self) -> &str {
        self.client.model()
    }

    async fn rank(
        &self,
        query: &str,
        candidates: &[CourseListing],
        count: usize,
    ) -> Result<Vec<usize>> {
        let prompt = build_rank_prompt(query, candidates, count);
        let reply = self.client.complete(RANK_PROMPT, &prompt).await?;
        parse_index_array(&reply)
    }
}

fn build_rank_prompt(query: &str, candidates: &[CourseListing], count: usize) -> String {
    let mut prompt = format!("Search: {}\nReturn at most {} numbers.\n\nCourses:\n", query, count);
    for (i, c) in candidates.iter().enumerate() {
        let description: String = if c.description == NOT_AVAILABLE {
            String::new()
        } else {
            c.description.chars().take(160).collect()
        };
        prompt.push_str(&format!(
            "{}. {} [{}] level: {} {}\n",
            i,
            c.title,
            c.platform.display_name(),
            c.level,
            description
        ));
    }
    prompt
}

/// Pull the first JSON array of non-negative integers out of a model reply.
fn parse_index_array(reply: &str) -> Result<Vec<usize>> {
    let start = reply
        .find('[')
        .ok_or_else(|| anyhow!("ranker reply has no JSON array"))?;
    let end = reply[start..]
        .find(']')
        .map(|e| start + e)
        .ok_or_else(|| anyhow!("ranker reply has an unterminated JSON array"))?;
    let indices: Vec<usize> = serde_json::from_str(&reply[start..=end])?;
    Ok(indices)
}

/// Reorder `candidates` by `order`, then append the unranked remainder in
/// original order, capping at `limit`.
///
/// `None`, or an order with duplicate or out-of-range indices, keeps the
/// original order.
pub fn apply_ranking(
    candidates: Vec<CourseListing>,
    order: Option<&[usize]>,
    limit: usize,
) -> Vec<CourseListing> {
    let order = match order {
        Some(o) if is_valid_order(o, candidates.len()) => o,
        _ => return candidates.into_iter().take(limit).collect(),
    };

    let mut slots: Vec<Option<CourseListing>> = candidates.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(limit.min(slots.len()));

    for &i in order {
        if out.len() >= limit {
            break;
        }
        if let Some(c) = slots[i].take() {
            out.push(c);
        }
    }
    for c in slots.into_iter().flatten() {
        if out.len() >= limit {
            break;
        }
        out.push(c);
    }
    out
}

fn is_valid_order(order: &[usize], len: usize) -> bool {
    let mut seen = HashSet::with_capacity(order.len());
    order.iter().all(|&i| i < len && seen.insert(i))
}

pub fn create_ranker(config: &AssistConfig) -> Result<Arc<dyn RelevanceRanker>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(PassthroughRanker)),
        "keyword" => Ok(Arc::new(KeywordRanker)),
        "openai" | "ollama" => Ok(Arc::new(ChatRelevanceRanker::new(ChatClient::from_config(
            config,
        )?))),
        other => anyhow::bail!("Unknown ranker provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;

    fn listings(titles: &[&str]) -> Vec<CourseListing> {
        titles
            .iter()
            .enumerate()
            .map(|(i, t)| CourseListing::new(Platform::Edx, *t, format!("https://x.org/{}", i)))
            .collect()
    }

    fn titles(out: &[CourseListing]) -> Vec<&str> {
        out.iter().map(|c| c.title.as_str()).collect()
    }

    #[test]
    fn test_apply_ranking_reorders_then_fills() {
        let out = apply_ranking(listings(&["a", "b", "c", "d"]), Some(&[2, 0]), 3);
        assert_eq!(titles(&out), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_apply_ranking_invalid_order_falls_back() {
        let dup = apply_ranking(listings(&["a", "b", "c"]), Some(&[1, 1]), 2);
        assert_eq!(titles(&dup), vec!["a", "b"]);
        let oob = apply_ranking(listings(&["a", "b", "c"]), Some(&[7]), 2);
        assert_eq!(titles(&oob), vec!["a", "b"]);
        let none = apply_ranking(listings(&["a", "b", "c"]), None, 5);
        assert_eq!(titles(&none), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_apply_ranking_longer_order_is_capped() {
        let out = apply_ranking(listings(&["a", "b", "c"]), Some(&[2, 1, 0]), 2);
        assert_eq!(titles(&out), vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_keyword_ranker_prefers_title_hits() {
        let mut items = listings(&["Cooking 101", "Intro to Rust", "Advanced Rust Patterns"]);
        items[0].description = "learn rust while you cook".to_string();
        let order = KeywordRanker.rank("rust patterns", &items, 3).await.unwrap();
        assert_eq!(order, vec![2, 1, 0]);
    }

    #[tokio::test]
    async fn test_passthrough_has_no_preference() {
        let items = listings(&["a", "b"]);
        assert!(PassthroughRanker.rank("q", &items, 2).await.unwrap().is_empty());
    }

    #[test]
    fn test_parse_index_array() {
        assert_eq!(parse_index_array("[3, 1, 0]").unwrap(), vec![3, 1, 0]);
        assert_eq!(
            parse_index_array("Here you go:\n```json\n[1,2]\n```").unwrap(),
            vec![1, 2]
        );
        assert!(parse_index_array("I think course 2").is_err());
        assert!(parse_index_array("[-1, 2]").is_err());
    }

    #[test]
    fn test_rank_prompt_numbers_candidates() {
        let prompt = build_rank_prompt("rust", &listings(&["A", "B"]), 2);
        assert!(prompt.contains("0. A [edX]"));
        assert!(prompt.contains("1. B [edX]"));
    }
}

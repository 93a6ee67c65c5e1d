//! Priority-ordered reconciliation of candidate metadata records.

use std::collections::HashSet;

use tracing::debug;

use super::{ArticleMetadata, MetadataSource, RawMetadata, SOURCE_WEIGHTS, non_blank};

/// Reconciles candidate records into one.
///
/// Candidates are considered in [`SOURCE_WEIGHTS`] order (Semantic Scholar,
/// arXiv, language model). The first candidate with a non-blank title becomes
/// the base and receives its source's rank weight as confidence. Every other
/// candidate may fill the base's DOI, abstract or year when the base lacks
/// them, first found wins. Keywords become the de-duplicated union of all
/// candidates in first-seen order.
///
/// When no candidate has a title the language model record is returned
/// unchanged. `raw` is embedded document metadata; it is logged but never
/// contributes fields.
#[must_use]
pub fn combine(
    raw: &RawMetadata,
    llm: ArticleMetadata,
    arxiv: Option<ArticleMetadata>,
    scholar: Option<ArticleMetadata>,
) -> ArticleMetadata {
    debug!(
        raw_fields = raw.len(),
        title = raw.get("title").map(String::as_str),
        "embedded document metadata"
    );

    let mut llm = Some(llm);
    let mut arxiv = arxiv;
    let mut scholar = scholar;
    let mut slots: Vec<(f32, Option<ArticleMetadata>)> = SOURCE_WEIGHTS
        .iter()
        .map(|weight| {
            let candidate = match weight.source {
                MetadataSource::SemanticScholar => scholar.take(),
                MetadataSource::Arxiv => arxiv.take(),
                MetadataSource::Llm => llm.take(),
                MetadataSource::LlmFailed => None,
            };
            (weight.rank, candidate)
        })
        .collect();

    let chosen = slots
        .iter_mut()
        .find(|(_, slot)| slot.as_ref().is_some_and(ArticleMetadata::has_title))
        .and_then(|(rank, slot)| slot.take().map(|candidate| (*rank, candidate)));

    let Some((rank, mut base)) = chosen else {
        debug!("no candidate carries a title, keeping language model record");
        return slots
            .into_iter()
            .filter_map(|(_, slot)| slot)
            .find(|candidate| {
                matches!(
                    candidate.source,
                    MetadataSource::Llm | MetadataSource::LlmFailed
                )
            })
            .unwrap_or_else(ArticleMetadata::llm_failed);
    };

    base.confidence = rank;

    let mut seen: HashSet<String> = HashSet::new();
    let mut keywords = Vec::new();
    for keyword in std::mem::take(&mut base.keywords) {
        if seen.insert(keyword.clone()) {
            keywords.push(keyword);
        }
    }

    for other in slots.into_iter().filter_map(|(_, slot)| slot) {
        if non_blank(base.doi.as_deref()).is_none() && other.doi().is_some() {
            base.doi = other.doi;
        }
        if non_blank(base.abstract_text.as_deref()).is_none()
            && non_blank(other.abstract_text.as_deref()).is_some()
        {
            base.abstract_text = other.abstract_text;
        }
        if base.year.is_none() && other.year.is_some() {
            base.year = other.year;
        }
        for keyword in other.keywords {
            if seen.insert(keyword.clone()) {
                keywords.push(keyword);
            }
        }
    }
    base.keywords = keywords;

    debug!(
        source = %base.source,
        confidence = base.confidence,
        keywords = base.keywords.len(),
        "combined metadata"
    );
    base
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn candidate(source: MetadataSource, title: &str) -> ArticleMetadata {
        let mut meta = ArticleMetadata::empty(source);
        meta.title = title.to_string();
        meta
    }

    #[test]
    fn test_combine_scholar_wins_and_fills_from_others() {
        let mut llm = candidate(MetadataSource::Llm, "Deep Nets");
        llm.authors = vec!["Lee".to_string()];
        llm.year = Some(2020);
        llm.keywords = vec!["ml".to_string()];
        let mut arxiv = candidate(MetadataSource::Arxiv, "Deep Networks");
        arxiv.doi = Some("10.1/x".to_string());
        arxiv.keywords = vec!["cs.LG".to_string()];
        let mut scholar = candidate(MetadataSource::SemanticScholar, "Deep Neural Networks");
        scholar.authors = vec!["Lee, K.".to_string()];

        let combined = combine(&RawMetadata::new(), llm, Some(arxiv), Some(scholar));

        assert_eq!(combined.title, "Deep Neural Networks");
        assert_eq!(combined.authors, vec!["Lee, K.".to_string()]);
        assert_eq!(combined.source, MetadataSource::SemanticScholar);
        assert!((combined.confidence - 0.9).abs() < f32::EPSILON);
        assert_eq!(combined.doi.as_deref(), Some("10.1/x"));
        assert_eq!(combined.year, Some(2020));
        assert_eq!(combined.keywords, vec!["cs.LG".to_string(), "ml".to_string()]);
    }

    #[test]
    fn test_combine_arxiv_base_gets_rank_weight() {
        let llm = candidate(MetadataSource::Llm, "Title");
        let arxiv = candidate(MetadataSource::Arxiv, "Arxiv Title");

        let combined = combine(&RawMetadata::new(), llm, Some(arxiv), None);

        assert_eq!(combined.source, MetadataSource::Arxiv);
        assert!((combined.confidence - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_combine_ignores_self_reported_confidence() {
        let mut scholar = candidate(MetadataSource::SemanticScholar, "Scholar Title");
        scholar.confidence = 0.42;
        let mut llm = candidate(MetadataSource::Llm, "Llm Title");
        llm.confidence = 0.1;

        let combined = combine(&RawMetadata::new(), llm.clone(), None, Some(scholar));
        assert_eq!(combined.source, MetadataSource::SemanticScholar);
        assert!((combined.confidence - 0.9).abs() < f32::EPSILON);

        let combined = combine(&RawMetadata::new(), llm, None, None);
        assert_eq!(combined.source, MetadataSource::Llm);
        assert!((combined.confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_combine_skips_untitled_higher_priority_candidate() {
        let llm = candidate(MetadataSource::Llm, "From Text");
        let mut scholar = candidate(MetadataSource::SemanticScholar, "   ");
        scholar.doi = Some("10.2/y".to_string());

        let combined = combine(&RawMetadata::new(), llm, None, Some(scholar));

        assert_eq!(combined.title, "From Text");
        assert_eq!(combined.source, MetadataSource::Llm);
        assert!((combined.confidence - 0.7).abs() < f32::EPSILON);
        assert_eq!(combined.doi.as_deref(), Some("10.2/y"));
    }

    #[test]
    fn test_combine_no_title_returns_llm_unchanged() {
        let mut llm = ArticleMetadata::llm_failed();
        llm.keywords = vec!["a".to_string(), "a".to_string()];
        let arxiv = candidate(MetadataSource::Arxiv, "");

        let combined = combine(&RawMetadata::new(), llm.clone(), Some(arxiv), None);

        assert_eq!(combined, llm);
    }

    #[test]
    fn test_combine_base_values_are_not_overwritten() {
        let mut llm = candidate(MetadataSource::Llm, "Llm");
        llm.year = Some(2001);
        llm.doi = Some("10.9/llm".to_string());
        let mut scholar = candidate(MetadataSource::SemanticScholar, "Scholar");
        scholar.year = Some(2003);
        scholar.doi = Some(String::new());

        let combined = combine(&RawMetadata::new(), llm, None, Some(scholar));

        assert_eq!(combined.year, Some(2003));
        assert_eq!(combined.doi.as_deref(), Some("10.9/llm"));
    }

    #[test]
    fn test_combine_first_found_fill_wins() {
        let mut llm = candidate(MetadataSource::Llm, "");
        llm.abstract_text = Some("llm abstract".to_string());
        let mut arxiv = candidate(MetadataSource::Arxiv, "");
        arxiv.abstract_text = Some("arxiv abstract".to_string());
        let scholar = candidate(MetadataSource::SemanticScholar, "Scholar");

        let combined = combine(&RawMetadata::new(), llm, Some(arxiv), Some(scholar));

        assert_eq!(combined.abstract_text.as_deref(), Some("arxiv abstract"));
    }

    #[test]
    fn test_combine_deduplicates_base_keywords() {
        let mut llm = candidate(MetadataSource::Llm, "Only");
        llm.keywords = vec!["x".to_string(), "y".to_string(), "x".to_string()];

        let combined = combine(&RawMetadata::new(), llm, None, None);

        assert_eq!(combined.keywords, vec!["x".to_string(), "y".to_string()]);
    }
}

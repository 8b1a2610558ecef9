use std::fs;
use std::path::Path;

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::types::{document_name, ClassificationResult, DocumentOutcome, TopicScore};

/// Number of non-overlapping occurrences of `needle`, scanning left to right
/// and resuming after the end of each match ("aaa" holds "aa" once).
pub fn count_occurrences(haystack: &str, needle: &str) -> u64 {
    if needle.is_empty() { return 0; }
    let mut count = 0;
    let mut pos = 0;
    while let Some(found) = haystack[pos..].find(needle) {
        count += 1;
        pos += found + needle.len();
    }
    count
}

/// Scores `text` against every topic, in catalog order. Topics without any
/// match are reported with a zero count.
pub fn classify(catalog: &Catalog, text: &str) -> Vec<TopicScore> {
    catalog
        .iter()
        .map(|(topic, keywords)| {
            let count = keywords.iter().map(|k| count_occurrences(text, k)).sum();
            TopicScore::new(topic, count)
        })
        .collect()
}

/// Reads a document as one string with its line breaks removed, so a keyword
/// broken across two lines still matches.
pub fn read_document(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| Error::DocumentUnavailable { path: path.to_path_buf(), source })?;
    let content = String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
    Ok(join_lines(&content))
}

fn join_lines(content: &str) -> String {
    content.lines().collect()
}

pub fn classify_document(catalog: &Catalog, path: &Path) -> Result<ClassificationResult> {
    let text = read_document(path)?;
    Ok(ClassificationResult { document_name: document_name(path), scores: classify(catalog, &text) })
}

/// Like `classify_document`, but an unreadable document becomes a failed
/// outcome instead of an error.
pub fn classify_outcome(catalog: &Catalog, path: &Path) -> DocumentOutcome {
    match classify_document(catalog, path) {
        Ok(result) => DocumentOutcome::Classified(result),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "document skipped");
            let reason = match &e {
                Error::DocumentUnavailable { source, .. } => source.to_string(),
                other => other.to_string(),
            };
            DocumentOutcome::Failed { document_name: document_name(path), path: path.to_string_lossy().to_string(), reason }
        }
    }
}

/// The topic with the strictly highest count; the first one in catalog order
/// wins a tie. `None` if nothing matched.
pub fn relevant_topic(result: &ClassificationResult) -> Option<&TopicScore> {
    let mut best: Option<&TopicScore> = None;
    for score in &result.scores {
        if score.count > best.map_or(0, |b| b.count) { best = Some(score); }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sports_tech() -> Catalog {
        Catalog::from_entries(vec![("Sports", vec!["ball", "goal"]), ("Tech", vec!["cpu"])]).expect("catalog")
    }

    #[test]
    fn overlapping_matches_count_once() {
        assert_eq!(count_occurrences("aaa", "aa"), 1);
        assert_eq!(count_occurrences("aaaa", "aa"), 2);
        assert_eq!(count_occurrences("abcabc", "abc"), 2);
        assert_eq!(count_occurrences("", "a"), 0);
        assert_eq!(count_occurrences("abc", ""), 0);
    }

    #[test]
    fn matching_is_case_sensitive_substring() {
        assert_eq!(count_occurrences("Ball ball football", "ball"), 2);
        assert_eq!(count_occurrences("BALL", "ball"), 0);
    }

    #[test]
    fn multibyte_text_is_scanned_on_char_boundaries() {
        assert_eq!(count_occurrences("żółw żółw", "żółw"), 2);
        assert_eq!(count_occurrences("ééé", "éé"), 1);
    }

    #[test]
    fn sports_and_tech_example() {
        let scores = classify(&sports_tech(), "the ball hit the goal, what a goalball");
        assert_eq!(scores, vec![TopicScore::new("Sports", 4), TopicScore::new("Tech", 0)]);
    }

    #[test]
    fn every_topic_is_reported() {
        let catalog = Catalog::from_entries(vec![("A", vec!["x"]), ("B", vec!["y"])]).expect("catalog");
        let scores = classify(&catalog, "nothing relevant");
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| s.count == 0));
    }

    #[test]
    fn classification_is_deterministic() {
        let catalog = sports_tech();
        let text = "goal goal ball cpu cpucpu";
        assert_eq!(classify(&catalog, text), classify(&catalog, text));
    }

    #[test]
    fn line_breaks_are_removed_before_matching() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "go\nal and c\r\npu\n").unwrap();
        let result = classify_document(&sports_tech(), file.path()).expect("classify");
        assert_eq!(result.count_for("Sports"), Some(1));
        assert_eq!(result.count_for("Tech"), Some(1));
    }

    #[test]
    fn spaces_are_not_normalized() {
        assert_eq!(join_lines("a  b\nc"), "a  bc");
    }

    #[test]
    fn missing_document_becomes_failed_outcome() {
        let path = Path::new("/no/such/dir/missing.txt");
        assert!(matches!(classify_document(&sports_tech(), path), Err(Error::DocumentUnavailable { .. })));
        match classify_outcome(&sports_tech(), path) {
            DocumentOutcome::Failed { document_name, .. } => assert_eq!(document_name, "missing.txt"),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn relevant_topic_picks_highest_first_on_tie() {
        let result = ClassificationResult {
            document_name: "d".into(),
            scores: vec![TopicScore::new("A", 2), TopicScore::new("B", 3), TopicScore::new("C", 3)],
        };
        assert_eq!(relevant_topic(&result).map(|s| s.topic.as_str()), Some("B"));
        let none = ClassificationResult { document_name: "d".into(), scores: vec![TopicScore::new("A", 0)] };
        assert!(relevant_topic(&none).is_none());
    }
}

//! Near-duplicate detection for incoming submissions.

use std::collections::{BTreeMap, BTreeSet, HashSet};

pub const DEFAULT_THRESHOLD: f64 = 0.85;

/// Texts shorter than this (after normalization) only match exactly.
const MIN_CONTAINMENT_LEN: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub id: &'a str,
    pub text: &'a str,
}

/// Lowercases, drops punctuation and collapses whitespace.
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() {
                ch.to_lowercase().next().unwrap_or(ch)
            } else if ch == '\'' || ch == '\u{2019}' {
                '\0'
            } else {
                ' '
            }
        })
        .filter(|ch| *ch != '\0')
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Token-set Jaccard similarity of two normalized texts.
pub fn similarity(a: &str, b: &str) -> f64 {
    let left: HashSet<&str> = a.split_whitespace().collect();
    let right: HashSet<&str> = b.split_whitespace().collect();
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    let shared = left.intersection(&right).count() as f64;
    let union = left.union(&right).count() as f64;
    shared / union
}

pub fn find_potential_duplicates(
    text: &str,
    corpus: &[Candidate<'_>],
    threshold: f64,
) -> Vec<String> {
    let needle = normalize(text);
    if needle.is_empty() {
        return Vec::new();
    }

    let mut matches = Vec::new();
    for candidate in corpus {
        let other = normalize(candidate.text);
        if other.is_empty() {
            continue;
        }
        let contained = needle.len() >= MIN_CONTAINMENT_LEN
            && other.len() >= MIN_CONTAINMENT_LEN
            && (other.contains(&needle) || needle.contains(&other));
        if other == needle || contained || similarity(&needle, &other) >= threshold {
            if !matches.iter().any(|id: &String| id == candidate.id) {
                matches.push(candidate.id.to_string());
            }
        }
    }
    matches
}

/// Groups submissions that share at least one potential-duplicate id.
///
/// Input pairs are `(submission_id, potential_duplicate_ids)`. Each returned
/// group lists the shared ids and every submission reaching one of them,
/// transitively, so chains of overlapping submissions collapse into one group.
pub fn group_shared_duplicates(
    submissions: &[(String, Vec<String>)],
) -> Vec<DuplicateGroup> {
    let mut by_target: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (index, (_, targets)) in submissions.iter().enumerate() {
        for target in targets {
            by_target.entry(target.as_str()).or_default().push(index);
        }
    }

    let mut parent: Vec<usize> = (0..submissions.len()).collect();
    fn find(parent: &mut [usize], mut node: usize) -> usize {
        while parent[node] != node {
            parent[node] = parent[parent[node]];
            node = parent[node];
        }
        node
    }
    for members in by_target.values() {
        for pair in members.windows(2) {
            let (a, b) = (find(&mut parent, pair[0]), find(&mut parent, pair[1]));
            if a != b {
                parent[b] = a;
            }
        }
    }

    let mut groups: BTreeMap<usize, DuplicateGroup> = BTreeMap::new();
    for (target, members) in &by_target {
        if members.len() < 2 {
            continue;
        }
        let root = find(&mut parent, members[0]);
        let group = groups.entry(root).or_default();
        group.shared_ids.insert(target.to_string());
        for member in members {
            group.submission_ids.insert(submissions[*member].0.clone());
        }
    }

    groups.into_values().collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct DuplicateGroup {
    pub shared_ids: BTreeSet<String>,
    pub submission_ids: BTreeSet<String>,
}

#[cfg(test)]
mod tests {
    use super::{
        find_potential_duplicates, group_shared_duplicates, normalize, similarity, Candidate,
        DEFAULT_THRESHOLD,
    };

    #[test]
    fn normalize_ignores_case_punctuation_and_spacing() {
        assert_eq!(normalize("  Know   THYSELF!  "), "know thyself");
        assert_eq!(normalize("Don't panic."), "dont panic");
        assert_eq!(normalize("Don\u{2019}t panic"), "dont panic");
    }

    #[test]
    fn similarity_is_token_jaccard() {
        assert_eq!(similarity("a b c", "a b c"), 1.0);
        assert_eq!(similarity("a b", "c d"), 0.0);
        assert!((similarity("a b c d", "a b c e") - 0.6).abs() < 1e-9);
    }

    #[test]
    fn flags_exact_contained_and_similar_texts() {
        let corpus = [
            Candidate { id: "q-exact", text: "The unexamined life is not worth living." },
            Candidate {
                id: "q-longer",
                text: "Socrates said: the unexamined life is not worth living, at his trial.",
            },
            Candidate { id: "q-other", text: "Know thyself." },
        ];

        let found = find_potential_duplicates(
            "the unexamined life is NOT worth living",
            &corpus,
            DEFAULT_THRESHOLD,
        );
        assert_eq!(found, vec!["q-exact".to_string(), "q-longer".to_string()]);
    }

    #[test]
    fn short_texts_do_not_match_by_containment() {
        let corpus = [Candidate { id: "q-1", text: "Be kind, always, to everyone you meet." }];
        assert!(find_potential_duplicates("Be kind", &corpus, DEFAULT_THRESHOLD).is_empty());
    }

    #[test]
    fn groups_submissions_sharing_a_duplicate_id() {
        let submissions = vec![
            ("s-1".to_string(), vec!["q-1".to_string()]),
            ("s-2".to_string(), vec!["q-1".to_string(), "q-2".to_string()]),
            ("s-3".to_string(), vec!["q-2".to_string()]),
            ("s-4".to_string(), vec!["q-9".to_string()]),
            ("s-5".to_string(), vec![]),
        ];

        let groups = group_shared_duplicates(&submissions);
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(
            group.submission_ids.iter().cloned().collect::<Vec<_>>(),
            vec!["s-1", "s-2", "s-3"]
        );
        assert_eq!(group.shared_ids.iter().cloned().collect::<Vec<_>>(), vec!["q-1", "q-2"]);
    }
}

//! Cross-reference validation between stages.
//!
//! Records whose foreign key does not resolve within the same run are
//! dropped, never repaired.

use std::collections::HashSet;

use tracing::warn;

use crate::model::{Idea, Joke, Rubric};

/// Keep rubrics that point at a known idea, and critiques whose original
/// rubric is itself kept.
///
/// Returns the number of dropped rubrics.
pub fn retain_linked_rubrics(ideas: &[Idea], rubrics: &mut Vec<Rubric>) -> usize {
    let idea_ids: HashSet<&str> = ideas.iter().map(|i| i.id.as_str()).collect();
    let before = rubrics.len();

    rubrics.retain(|r| {
        let linked = idea_ids.contains(r.idea_id.as_str());
        if !linked {
            warn!(rubric_id = %r.id, idea_id = %r.idea_id, "Dropping rubric with unknown idea");
        }
        linked
    });

    let rubric_ids: HashSet<String> = rubrics
        .iter()
        .filter(|r| !r.is_critique())
        .map(|r| r.id.clone())
        .collect();

    rubrics.retain(|r| match &r.original_rubric_id {
        Some(original) if !rubric_ids.contains(original) => {
            warn!(rubric_id = %r.id, original_rubric_id = %original, "Dropping critique with unknown original");
            false
        }
        _ => true,
    });

    before - rubrics.len()
}

/// Keep jokes that point at a known rubric and idea.
///
/// Returns the number of dropped jokes.
pub fn retain_linked_jokes(ideas: &[Idea], rubrics: &[Rubric], jokes: &mut Vec<Joke>) -> usize {
    let idea_ids: HashSet<&str> = ideas.iter().map(|i| i.id.as_str()).collect();
    let rubric_ids: HashSet<&str> = rubrics.iter().map(|r| r.id.as_str()).collect();
    let before = jokes.len();

    jokes.retain(|j| {
        let linked = rubric_ids.contains(j.rubric_id.as_str()) && idea_ids.contains(j.idea_id.as_str());
        if !linked {
            warn!(joke_id = %j.id, rubric_id = %j.rubric_id, "Dropping joke with unknown rubric");
        }
        linked
    });

    before - jokes.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::JokeMetadata;

    fn idea(id: &str) -> Idea {
        Idea {
            id: id.into(),
            concept: "concept".into(),
        }
    }

    fn rubric(id: &str, idea_id: &str, original: Option<&str>) -> Rubric {
        Rubric {
            id: id.into(),
            idea_id: idea_id.into(),
            joke_type: "Pun".into(),
            structure: "One-liner".into(),
            key_elements: vec![],
            tone: "dry".into(),
            original_rubric_id: original.map(String::from),
            critique_of_original: None,
        }
    }

    fn joke(id: &str, idea_id: &str, rubric_id: &str) -> Joke {
        Joke {
            id: id.into(),
            theme: "penguins".into(),
            idea_id: idea_id.into(),
            rubric_id: rubric_id.into(),
            text: "text".into(),
            explanation: "explanation".into(),
            metadata: JokeMetadata {
                joke_type: "Pun".into(),
                tone: "dry".into(),
                structure: "One-liner".into(),
            },
        }
    }

    #[test]
    fn test_rubrics_with_unknown_idea_dropped() {
        let ideas = vec![idea("i1")];
        let mut rubrics = vec![rubric("r1", "i1", None), rubric("r2", "ghost", None)];
        assert_eq!(retain_linked_rubrics(&ideas, &mut rubrics), 1);
        assert_eq!(rubrics.len(), 1);
        assert_eq!(rubrics[0].id, "r1");
    }

    #[test]
    fn test_critique_of_dropped_rubric_dropped() {
        let ideas = vec![idea("i1")];
        let mut rubrics = vec![
            rubric("r1", "i1", None),
            rubric("c1", "i1", Some("r1")),
            rubric("c2", "i1", Some("missing")),
        ];
        assert_eq!(retain_linked_rubrics(&ideas, &mut rubrics), 1);
        let ids: Vec<&str> = rubrics.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r1", "c1"]);
    }

    #[test]
    fn test_jokes_with_unknown_rubric_dropped() {
        let ideas = vec![idea("i1")];
        let rubrics = vec![rubric("r1", "i1", None)];
        let mut jokes = vec![joke("j1", "i1", "r1"), joke("j2", "i1", "r9"), joke("j3", "i9", "r1")];
        assert_eq!(retain_linked_jokes(&ideas, &rubrics, &mut jokes), 2);
        assert_eq!(jokes[0].id, "j1");
    }
}

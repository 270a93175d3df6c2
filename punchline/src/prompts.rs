//! Prompt builders for every backend call.
//!
//! Upstream data is embedded verbatim; the system instruction carries the
//! structured shape the reply must take.

use crate::model::{Idea, Rubric};

pub const OBSERVATIONS_FORMAT: &str =
    r#"{"observations": ["observation1", "observation2", "observation3", ...]}"#;
pub const SECOND_ORDER_FORMAT: &str =
    r#"{"observations": ["specific_angle1", "specific_angle2", ...]}"#;
pub const IDEAS_FORMAT: &str =
    r#"{"ideas": [{"concept": "joke concept 1"}, {"concept": "joke concept 2"}, ...]}"#;
pub const RUBRIC_FORMAT: &str =
    r#"{"type": "...", "structure": "...", "key_elements": ["...", "..."], "tone": "..."}"#;
pub const CRITIQUE_FORMAT: &str = r#"{"type": "...", "structure": "...", "key_elements": ["...", "..."], "tone": "...", "critique_of_original": "..."}"#;
pub const JOKE_FORMAT: &str = r#"{"text": "...", "explanation": "..."}"#;
pub const JUDGMENT_FORMAT: &str = r#"{"originality": 1-10, "cleverness": 1-10, "surprise": 1-10, "relatability": 1-10, "overall": 1-10, "rationale": "..."}"#;

/// System instruction describing the reply shape.
pub fn system_instruction(format: &str) -> String {
    format!(
        "You are a helpful assistant. Your response should be a JSON string that can be parsed \
         into the following structure: {}. Do not include any explanatory text outside of the \
         JSON string itself.",
        format
    )
}

fn quoted_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| format!("'{}'", s)).collect();
    format!("[{}]", quoted.join(", "))
}

pub fn first_order_observations(theme: &str) -> String {
    format!(
        "For the theme '{}', generate 3-5 diverse, high-level 'observations' or 'humor angles'. \
         These should be broad starting points for jokes. Focus on common frustrations, ironies, \
         or absurdities related to the theme.",
        theme
    )
}

pub fn second_order_observations(theme: &str, first_order: &[String]) -> String {
    format!(
        "Given the theme '{}' and the following first-order humor observations: {}. \
         Derive 2-3 new, more specific, or nuanced humor angles or observations by building upon \
         or combining these.",
        theme,
        quoted_list(first_order)
    )
}

pub fn joke_ideas(theme: &str, observations: &[String]) -> String {
    format!(
        "Based on the theme '{}' and the following humor observations: {}. \
         Formulate 3-5 diverse and specific joke ideas or concepts. Each idea should represent a \
         distinct conceptual direction for a joke.",
        theme,
        quoted_list(observations)
    )
}

/// `index` is zero-based.
pub fn rubric(theme: &str, idea: &Idea, index: usize, total: usize) -> String {
    format!(
        "For the joke theme '{}' and the specific joke idea: '{}', create a detailed rubric for \
         constructing a joke. This rubric will guide the final joke writing. The rubric should \
         define: 1. 'type' (e.g., Observational, Pun, Character-based, Story, Setup-Punchline, \
         etc.), 2. 'structure' (a brief description of how the joke should be built), \
         3. 'key_elements' (a list of 2-4 essential components or details to include), \
         4. 'tone' (e.g., sarcastic, absurd, dry, witty, dark).\n\n\
         This is rubric {} of {}, so make it distinct from other potential rubrics for the same \
         joke idea.",
        theme,
        idea.concept,
        index + 1,
        total
    )
}

/// `index` is zero-based.
pub fn critique(theme: &str, idea: &Idea, original: &Rubric, index: usize, total: usize) -> String {
    format!(
        "For the joke theme '{}' and joke idea '{}', the following rubric was initially \
         generated: {}. This rubric is flawed or could be improved. Please critique it and propose \
         an alternative or refined rubric for the same joke idea to enhance creativity or humor. \
         Specifically focus on creating a significantly different approach than the original \
         rubric.\n\n\
         This is critique {} of {} for this rubric, so ensure it differs from other potential \
         critiques. The new/refined rubric should contain: 'type', 'structure', 'key_elements' \
         (a list of strings), and 'tone'. Also include a 'critique_of_original' (string) field \
         explaining how the original rubric could be improved.",
        theme,
        idea.concept,
        original.summary(),
        index + 1,
        total
    )
}

pub fn joke(theme: &str, idea: &Idea, rubric: &Rubric) -> String {
    format!(
        "You are a professional comedy writer. Create a joke based on the following \
         specifications:\n\n\
         Theme: '{}'\n\n\
         Joke Idea: '{}'\n\n\
         Joke Rubric:\n\
         - Type: {}\n\
         - Structure: {}\n\
         - Key Elements to Include: {}\n\
         - Tone: {}\n\n\
         Write a complete joke that strictly follows this rubric. Then provide a brief explanation \
         of how your joke implements the rubric and the original idea. Keep the joke concise, \
         entertaining, and aligned with the specified structure and tone.\n\n\
         Format your response as a JSON object with 'text' and 'explanation' fields.",
        theme,
        idea.concept,
        rubric.joke_type,
        rubric.structure,
        rubric.key_elements.join(", "),
        rubric.tone
    )
}

pub const BASIC_BASELINE_SYSTEM: &str = "You are a professional comedy writer. Create funny, \
    original jokes based on the given prompt. Each joke should be concise, clever, and \
    entertaining. Return your output as JSON.";

pub const ENHANCED_BASELINE_SYSTEM: &str = "You are a professional comedy writer with expertise \
    in joke construction. Create original, well-crafted jokes based on the given theme. Consider \
    different joke types (observational, character-based, absurdist, etc.) and tones (witty, \
    sarcastic, lighthearted, etc.) to create diverse jokes. Format your output as well-structured \
    JSON.";

pub fn basic_baseline(theme: &str, num_jokes: usize) -> String {
    format!(
        "Write {n} funny joke(s) about: {theme}.\n\n\
         Format your response as a JSON object using EXACTLY this structure:\n\n\
         {{\n  \"jokes\": [\n    {{\n      \"text\": \"The full joke goes here.\",\n      \
         \"type\": \"The type of joke (Pun, One-liner, etc.)\"\n    }},\n    {{\n      \
         \"text\": \"Another joke if more than one is requested.\",\n      \
         \"type\": \"Another joke type\"\n    }}\n  ]\n}}\n\n\
         Return ONLY the JSON. Include exactly {n} joke(s) in your response.",
        n = num_jokes,
        theme = theme
    )
}

pub fn enhanced_baseline(theme: &str, num_jokes: usize) -> String {
    format!(
        "Theme: {theme}\n\n\
         Please generate {n} distinct, high-quality joke(s) about this theme. For each joke:\n\
         1. Think about a specific angle or observation related to the theme\n\
         2. Consider what joke structure would work best (setup-punchline, misdirection, \
         character-based, etc.)\n\
         3. Include key elements that make the joke work (irony, absurdity, wordplay, etc.)\n\
         4. Use an appropriate tone for maximum comedic effect\n\
         5. Write a complete, polished joke\n\n\
         Format your response as a JSON object using EXACTLY this structure:\n\n\
         {{\n  \"jokes\": [\n    {{\n      \
         \"text\": \"The actual joke goes here with setup and punchline.\",\n      \
         \"type\": \"The style of joke (Observational, Wordplay, etc.)\",\n      \
         \"approach\": \"Brief explanation of the comedic technique used\",\n      \
         \"tone\": \"The emotional tone (Sarcastic, Absurd, etc.)\"\n    }}\n  ]\n}}\n\n\
         Make sure your response contains only this JSON object and nothing else.",
        n = num_jokes,
        theme = theme
    )
}

pub const JUDGE_SYSTEM: &str = "You are an experienced comedy critic. You rate jokes honestly \
    and consistently, using the full 1-10 scale.";

pub fn judgment(joke_text: &str) -> String {
    format!(
        "Rate the following joke on a scale of 1 to 10 for each of these criteria: \
         'originality' (how fresh the idea is), 'cleverness' (wit and craft), 'surprise' (how \
         unexpected the punchline is), 'relatability' (how well an audience connects with it) \
         and 'overall'. Add a one-sentence 'rationale'.\n\n\
         Joke:\n{}\n\n\
         Respond with a JSON object: {}",
        joke_text, JUDGMENT_FORMAT
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idea() -> Idea {
        Idea {
            id: "i1".into(),
            concept: "Penguins at a job interview".into(),
        }
    }

    fn rubric_record() -> Rubric {
        Rubric {
            id: "r1".into(),
            idea_id: "i1".into(),
            joke_type: "Pun".into(),
            structure: "One-liner".into(),
            key_elements: vec!["tuxedo".into(), "resume".into()],
            tone: "dry".into(),
            original_rubric_id: None,
            critique_of_original: None,
        }
    }

    #[test]
    fn test_upstream_data_embedded_verbatim() {
        let observations = vec!["cold feet".to_string(), "formal wear".to_string()];
        let prompt = joke_ideas("penguins", &observations);
        assert!(prompt.contains("'cold feet', 'formal wear'"));
        assert!(prompt.contains("Formulate 3-5 diverse"));
    }

    #[test]
    fn test_rubric_numbering_is_one_based() {
        let prompt = rubric("penguins", &idea(), 0, 2);
        assert!(prompt.contains("This is rubric 1 of 2"));
        assert!(prompt.contains("Penguins at a job interview"));
    }

    #[test]
    fn test_critique_embeds_original() {
        let prompt = critique("penguins", &idea(), &rubric_record(), 1, 3);
        assert!(prompt.contains("key_elements: [tuxedo, resume]"));
        assert!(prompt.contains("This is critique 2 of 3"));
    }

    #[test]
    fn test_joke_prompt_lists_rubric() {
        let prompt = joke("penguins", &idea(), &rubric_record());
        assert!(prompt.contains("- Type: Pun"));
        assert!(prompt.contains("- Key Elements to Include: tuxedo, resume"));
    }

    #[test]
    fn test_baseline_prompts() {
        assert!(basic_baseline("penguins", 3).contains("Include exactly 3 joke(s)"));
        let enhanced = enhanced_baseline("penguins", 2);
        assert!(enhanced.starts_with("Theme: penguins"));
        assert!(enhanced.contains("\"approach\""));
    }

    #[test]
    fn test_system_instruction_embeds_format() {
        assert!(system_instruction(JOKE_FORMAT).contains(r#"{"text": "...""#));
    }
}

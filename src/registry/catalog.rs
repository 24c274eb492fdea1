use crate::registry::question::Question;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CatalogCategory {
    pub name: &'static str,
    pub questions: &'static [&'static str],
}

static CATALOG: [CatalogCategory; 6] = [
    CatalogCategory {
        name: "Behavior and Emotions",
        questions: &[
            "On a scale of 1–5, how stable was your child’s mood today?",
            "How many emotional outbursts did your child have today?",
            "How many meltdowns occurred today?",
            "How many instances of aggression occurred today?",
            "How many minutes did the longest meltdown last?",
            "On a scale of 1–5, how intense was the most severe meltdown?",
            "How many times did your child direct aggression toward others?",
            "How many times did your child direct aggression toward themselves?",
        ],
    },
    CatalogCategory {
        name: "Daily Activities",
        questions: &[
            "How many hours did your child sleep last night?",
            "What time did your child wake up?",
            "What time did your child fall asleep?",
            "How many naps did your child take today?",
            "How many minutes did your child nap today?",
            "On a scale of 1–5, how well did your child eat today?",
            "How many meals/snacks did your child eat today?",
            "How many new foods did your child try today?",
            "How many minutes/hours did your child spend on screens today?",
            "How many minutes of physical activity did your child get today?",
            "On a scale of 1–5, how engaged was your child in physical activities?",
        ],
    },
    CatalogCategory {
        name: "Sensory Concerns",
        questions: &[
            "How many sensory-related behaviors occurred today?",
            "How many times did your child react strongly to sensory input today?",
            "On a scale of 1–5, how sensitive was your child to sensory input today?",
            "How many times did your child engage in sensory-seeking behaviors today?",
            "How many minutes did your child spend in sensory play today?",
            "How many times did your child show sensitivity to touch today?",
        ],
    },
    CatalogCategory {
        name: "Cognitive and Academic Performance",
        questions: &[
            "On a scale of 1–5, how well was your child able to focus on tasks today?",
            "How many times did your child lose focus during structured activities?",
            "How many minutes of focused activity was your child able to sustain at one time?",
            "How many tasks did your child complete today?",
            "How many learning-related frustrations did your child express today?",
            "How many minutes did your child spend on schoolwork or learning activities today?",
        ],
    },
    CatalogCategory {
        name: "Health and Medical",
        questions: &[
            "How many times did your child complain about physical discomfort today?",
            "How many times did your child wake up during the night?",
            "How long did it take (in minutes) for your child to fall asleep?",
            "How many doses of medication were administered today?",
            "How many side effects were observed today (e.g., drowsiness, appetite loss)?",
            "How many seizures or unusual movements occurred today?",
            "On a scale of 1–5, how severe were your child’s symptoms today?",
        ],
    },
    CatalogCategory {
        name: "Parent and Caregiver Observations",
        questions: &[
            "On a scale of 1–5, how stressed did you feel today while caring for your child?",
            "How many minutes did you spend on self-care today?",
            "How many positive interactions did you have with your child today (e.g., hugs, playing together)?",
            "What was the most challenging part of caring for your child today?",
            "What was the most positive part of your child’s day today?",
        ],
    },
];

/// A child's stored questions grouped the way the selection form shows them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogSelection {
    pub selected: Vec<(String, Vec<Question>)>,
    pub custom: Vec<Question>,
}

pub fn categories() -> &'static [CatalogCategory] {
    &CATALOG
}

pub fn find(text: &str) -> Option<Question> {
    let text = text.trim();
    CATALOG
        .iter()
        .flat_map(|category| category.questions.iter())
        .find(|question| **question == text)
        .map(|question| Question::new(*question))
}

/// Resolves a `category.question` reference (1-based, as printed by the CLI).
pub fn by_reference(reference: &str) -> Option<&'static str> {
    let (category, question) = reference.trim().split_once('.')?;
    let category = category.parse::<usize>().ok()?.checked_sub(1)?;
    let question = question.parse::<usize>().ok()?.checked_sub(1)?;

    CATALOG
        .get(category)
        .and_then(|entry| entry.questions.get(question))
        .copied()
}

/// Splits stored questions into per-category selections and custom questions.
/// A question listed in several categories is assigned to the first one.
pub fn split_selection(questions: &[Question]) -> CatalogSelection {
    let mut selected = CATALOG
        .iter()
        .map(|category| (category.name.to_string(), Vec::new()))
        .collect::<Vec<_>>();
    let mut custom = Vec::new();

    for question in questions {
        let slot = CATALOG
            .iter()
            .position(|category| category.questions.contains(&question.text.as_str()));

        match slot {
            Some(index) => selected[index].1.push(question.clone()),
            None => custom.push(question.clone()),
        }
    }

    CatalogSelection { selected, custom }
}

#[cfg(test)]
mod tests {
    use super::{by_reference, categories, find, split_selection};
    use crate::registry::question::{Question, QuestionKind};

    #[test]
    fn catalog_has_six_categories() {
        assert_eq!(categories().len(), 6);
        assert!(categories().iter().all(|category| !category.questions.is_empty()));
    }

    #[test]
    fn catalog_rating_questions_resolve_to_rating_kind() {
        let question = find("On a scale of 1–5, how well did your child eat today?")
            .expect("catalog question");
        assert_eq!(question.kind, QuestionKind::Rating);
    }

    #[test]
    fn reference_is_one_based() {
        assert_eq!(
            by_reference("1.3"),
            Some("How many meltdowns occurred today?")
        );
        assert_eq!(by_reference("0.1"), None);
        assert_eq!(by_reference("7.1"), None);
        assert_eq!(by_reference("nonsense"), None);
    }

    #[test]
    fn split_separates_custom_questions() {
        let questions = vec![
            Question::new("How many meltdowns occurred today?"),
            Question::new("What made today special?"),
            Question::new("How many tasks did your child complete today?"),
        ];

        let selection = split_selection(&questions);

        assert_eq!(selection.selected[0].1.len(), 1);
        assert_eq!(selection.selected[3].1.len(), 1);
        assert_eq!(selection.custom, vec![Question::new("What made today special?")]);
    }
}

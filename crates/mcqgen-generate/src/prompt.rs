use mcqgen_core::types::Difficulty;

/// Marks the end of the retrieved context inside the prompt.
pub const END_OF_EXTRACT: &str = "ADAPTER TOOTHPASTE MEDICINE";

pub const SYSTEM_PROMPT: &str = "You are a careful and expert MCQ generator. You follow JSON \
schemas strictly and return a JSON array of questions where each question is a JSON object, \
without any commentary or surrounding text.";

const SCHEMA: &str = r#"[
  {
    "question": "...",
    "options": {
      "A": "...",
      "B": "...",
      "C": "...",
      "D": "..."
    },
    "correct_answer": "B",
    "topics": ["..."],
    "explanation": "..."
  }
]"#;

const EASY_EXAMPLE: &str = r#"[
  {
    "question": "Which of the following is true?",
    "options": {"A": "2 + 0 = 5", "B": "5 - 3 = 2", "C": "6 + 4 = 7", "D": "7 = 8"},
    "correct_answer": "B",
    "topics": ["Basic Mathematics", "Addition and Subtraction"],
    "explanation": "B is correct because both sides are equal. A claims 2 = 5, C claims 10 = 7 and D states a plainly wrong equality."
  },
  {
    "question": "What is 9 + 6?",
    "options": {"A": "12", "B": "14", "C": "15", "D": "16"},
    "correct_answer": "C",
    "topics": ["Arithmetic"],
    "explanation": "9 + 6 equals 15. The other values are typical mistakes made when carrying digits."
  }
]"#;

const MEDIUM_EXAMPLE: &str = r#"[
  {
    "question": "All birds have feathers. Penguins are birds. Which of the following is true?",
    "options": {"A": "Penguins do not have feathers.", "B": "All birds are penguins.", "C": "Penguins have feathers.", "D": "Some penguins can fly."},
    "correct_answer": "C",
    "topics": ["Logical Reasoning", "Syllogisms"],
    "explanation": "Penguins are birds and all birds have feathers, so C follows. A contradicts the premises, B reverses them and D is not implied."
  },
  {
    "question": "Which part of the plant conducts photosynthesis?",
    "options": {"A": "Roots", "B": "Stem", "C": "Leaves", "D": "Flowers"},
    "correct_answer": "C",
    "topics": ["Biology", "Photosynthesis"],
    "explanation": "Leaves hold most of the chlorophyll. Roots absorb water, the stem transports it and flowers are for reproduction."
  }
]"#;

const HARD_EXAMPLE: &str = r#"[
  {
    "question": "A train travels 120 km in 2 hours and then 180 km in 3 hours. What is its average speed for the whole journey?",
    "options": {"A": "50 km/h", "B": "60 km/h", "C": "70 km/h", "D": "75 km/h"},
    "correct_answer": "B",
    "topics": ["Mathematics", "Speed and Time"],
    "explanation": "Total distance is 300 km over 5 hours, so 60 km/h. A and C come from averaging wrongly and D from adding the two leg speeds."
  },
  {
    "question": "Which of the following best describes utilitarianism?",
    "options": {"A": "The end always justifies the means", "B": "Strict adherence to rules regardless of outcome", "C": "Seeking the greatest good for the greatest number", "D": "All actions are inherently wrong"},
    "correct_answer": "C",
    "topics": ["Philosophy", "Ethics"],
    "explanation": "Utilitarianism maximizes overall welfare. A is a caricature, B describes deontology and D is moral nihilism."
  }
]"#;

pub fn example_for(difficulty: Difficulty) -> &'static str {
    match difficulty {
        Difficulty::Easy => EASY_EXAMPLE,
        Difficulty::Medium => MEDIUM_EXAMPLE,
        Difficulty::Hard => HARD_EXAMPLE,
    }
}

/// Build the generation prompt for one topic batch.
pub fn build_prompt(
    context: &str,
    topics: &[String],
    difficulty: Difficulty,
    count: usize,
) -> String {
    let topic_list = serde_json::to_string(topics).unwrap_or_else(|_| topics.join(", "));
    format!(
        "###
You are about to be given a text extract.
The text was extracted using Optical Character Recognition (OCR). Therefore:
- Ignore OCR errors, formatting issues and gibberish.
- Do not refer to diagrams, figures, tables or other non-textual elements mentioned in the passage.
(The text extract starts after this line and ends at the exact phrase \"{END_OF_EXTRACT}\")
{context}

{END_OF_EXTRACT}

###
Context:
You are an expert multiple-choice question (MCQ) generator. You write factual, educational, topic-focused questions using only the information in the text above.

###
Your Task:
Generate {count} high quality multiple-choice questions based on the text extract and the requested topics. Output them as a JSON array.

### Topic List
{topic_list}

###
Guidelines:
- Questions should test understanding, recall, reasoning or comparison, not trivial word matching.
- Distractors must be plausible but clearly wrong.
- Options must have distinct, unambiguous meanings.
- Tag each question with ALL topics from the topic list that apply to it, and only with topics from that list.
- The explanation justifies the correct answer and briefly says why each other option is wrong.

###
Constraints:
- Follow this format STRICTLY:

{SCHEMA}

- The \"topics\" field is a list chosen only from: {topic_list}
- Do not use information that is not in the extract.
- Check that the correct answer and its explanation agree with the extract and with the options.
- The difficulty level of the questions must be: {difficulty}
- Each question has exactly 4 options labelled A to D, and exactly one of them is correct.
- Return an array of EXACTLY {count} questions. No more, no less.
- Respond with ONLY the JSON array. No commentary or surrounding text.

###
Example of a correctly formatted {difficulty} array. It has 2 questions; your array must have exactly {count}.

{example}
",
        example = example_for(difficulty),
    )
}

//! The intake conversation state machine.
//!
//! `FlowState` is a pure state machine: feeding it a [`FlowInput`] produces a
//! [`Step`] and no side effects. Each variant carries exactly the answers
//! that are legal at that point in the conversation, so a half-filled
//! submission cannot be observed, let alone persisted.
//!
//! Invalid input is not an error. The machine stays in place and returns the
//! correction prompt to show the user; only well-formed answers advance it.

use serde::Serialize;

use crate::submission::{Gender, IntakeAnswers};

/// Maximum length, in characters, of the free-text answers.
pub const FREE_TEXT_MAX_CHARS: usize = 500;

/// Stable option ids used on flow prompts.
pub mod options {
    /// Gender pick: male.
    pub const GENDER_MALE: &str = "gender_male";
    /// Gender pick: female.
    pub const GENDER_FEMALE: &str = "gender_female";
    /// Skip the diet question.
    pub const SKIP_DIET: &str = "skip_diet";
    /// Skip the health-note question.
    pub const SKIP_HEALTH_NOTE: &str = "skip_health_note";
}

/// An outbound instruction for the transport adapter: text to show, plus
/// optional buttons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prompt {
    /// The message text.
    pub text: String,

    /// Buttons to offer, possibly empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<PromptOption>,
}

/// One button on a [`Prompt`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptOption {
    /// Stable id echoed back in a `SelectOption` event.
    pub id: String,

    /// Human-readable label.
    pub label: String,
}

impl Prompt {
    /// A plain text prompt with no options.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            options: Vec::new(),
        }
    }

    /// A prompt with buttons, given as `(id, label)` pairs.
    #[must_use]
    pub fn with_options(text: impl Into<String>, options: &[(&str, &str)]) -> Self {
        Self {
            text: text.into(),
            options: options
                .iter()
                .map(|(id, label)| PromptOption {
                    id: (*id).to_string(),
                    label: (*label).to_string(),
                })
                .collect(),
        }
    }
}

/// One user input fed into the state machine.
#[derive(Debug, Clone, Copy)]
pub enum FlowInput<'a> {
    /// Free-text answer.
    Text(&'a str),

    /// A button pick, by option id.
    Option(&'a str),

    /// An explicit skip.
    Skip,
}

/// The state of one user's pass through the intake questions.
///
/// Variants appear in conversation order; each carries only the answers
/// collected so far.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    /// Waiting for the gender pick.
    CollectingGender,

    /// Waiting for the age.
    CollectingAge {
        /// Gender answer.
        gender: Gender,
    },

    /// Waiting for the weight.
    CollectingWeight {
        /// Gender answer.
        gender: Gender,
        /// Age answer.
        age: i32,
    },

    /// Waiting for the workouts-per-week count.
    CollectingWorkouts {
        /// Gender answer.
        gender: Gender,
        /// Age answer.
        age: i32,
        /// Weight answer, kilograms.
        weight: f64,
    },

    /// Waiting for the optional diet note.
    CollectingDiet {
        /// Gender answer.
        gender: Gender,
        /// Age answer.
        age: i32,
        /// Weight answer, kilograms.
        weight: f64,
        /// Workouts-per-week answer.
        workouts_per_week: i32,
    },

    /// Waiting for the optional health/injury note.
    CollectingHealthNote {
        /// Gender answer.
        gender: Gender,
        /// Age answer.
        age: i32,
        /// Weight answer, kilograms.
        weight: f64,
        /// Workouts-per-week answer.
        workouts_per_week: i32,
        /// Diet answer, if not skipped.
        diet: Option<String>,
    },
}

/// The outcome of applying one input to a [`FlowState`].
#[derive(Debug, Clone)]
pub enum Step {
    /// Input rejected; stay in place and show the correction prompt.
    Retry {
        /// The unchanged state.
        state: FlowState,
        /// What to show the user.
        prompt: Prompt,
    },

    /// Input accepted; advance to the next question.
    Advance {
        /// The next state.
        state: FlowState,
        /// The next question, equal to `state.prompt()`.
        prompt: Prompt,
    },

    /// Input accepted and the flow is finished.
    Complete {
        /// Every collected answer.
        answers: IntakeAnswers,
    },
}

impl FlowState {
    /// The entry state of a fresh session.
    #[must_use]
    pub const fn first() -> Self {
        Self::CollectingGender
    }

    /// The question to show for the current state.
    #[must_use]
    pub fn prompt(&self) -> Prompt {
        match self {
            Self::CollectingGender => Prompt::with_options(
                "What is your gender?",
                &[
                    (options::GENDER_MALE, "Male"),
                    (options::GENDER_FEMALE, "Female"),
                ],
            ),
            Self::CollectingAge { .. } => Prompt::text("How old are you? Enter a number:"),
            Self::CollectingWeight { .. } => {
                Prompt::text("What is your weight in kilograms (for example, 75.5)?")
            }
            Self::CollectingWorkouts { .. } => {
                Prompt::text("How many workouts per week would you like? Enter a number:")
            }
            Self::CollectingDiet { .. } => Prompt::with_options(
                "Describe your current diet (you can skip this):",
                &[(options::SKIP_DIET, "Skip")],
            ),
            Self::CollectingHealthNote { .. } => Prompt::with_options(
                "Do you have any health problems or injuries? (you can skip this):",
                &[(options::SKIP_HEALTH_NOTE, "Skip")],
            ),
        }
    }

    /// Apply one input, consuming the state.
    #[must_use]
    pub fn apply(self, input: FlowInput<'_>) -> Step {
        match self {
            Self::CollectingGender => apply_gender(input),
            Self::CollectingAge { gender } => apply_age(gender, input),
            Self::CollectingWeight { gender, age } => apply_weight(gender, age, input),
            Self::CollectingWorkouts {
                gender,
                age,
                weight,
            } => apply_workouts(gender, age, weight, input),
            Self::CollectingDiet {
                gender,
                age,
                weight,
                workouts_per_week,
            } => apply_diet(gender, age, weight, workouts_per_week, input),
            Self::CollectingHealthNote {
                gender,
                age,
                weight,
                workouts_per_week,
                diet,
            } => apply_health_note(gender, age, weight, workouts_per_week, diet, input),
        }
    }
}

fn retry(state: FlowState, message: &str) -> Step {
    let mut prompt = state.prompt();
    prompt.text = message.to_string();
    Step::Retry { state, prompt }
}

fn advance(state: FlowState) -> Step {
    let prompt = state.prompt();
    Step::Advance { state, prompt }
}

fn apply_gender(input: FlowInput<'_>) -> Step {
    let gender = match input {
        FlowInput::Option(options::GENDER_MALE) => Some(Gender::Male),
        FlowInput::Option(options::GENDER_FEMALE) => Some(Gender::Female),
        _ => None,
    };
    match gender {
        Some(gender) => advance(FlowState::CollectingAge { gender }),
        None => retry(
            FlowState::CollectingGender,
            "Please choose one of the options:",
        ),
    }
}

fn apply_age(gender: Gender, input: FlowInput<'_>) -> Step {
    let state = FlowState::CollectingAge { gender };
    let FlowInput::Text(text) = input else {
        return retry(state, "Please enter a number:");
    };
    match parse_int(text) {
        Some(age) if (1..=150).contains(&age) => advance(FlowState::CollectingWeight { gender, age }),
        Some(_) => retry(state, "Please enter a valid age (1 to 150):"),
        None => retry(state, "Please enter a number:"),
    }
}

fn apply_weight(gender: Gender, age: i32, input: FlowInput<'_>) -> Step {
    let state = FlowState::CollectingWeight { gender, age };
    let FlowInput::Text(text) = input else {
        return retry(state, "Please enter a number (a decimal point is allowed):");
    };
    match parse_decimal(text) {
        Some(weight) if (1.0..=500.0).contains(&weight) => advance(FlowState::CollectingWorkouts {
            gender,
            age,
            weight,
        }),
        Some(_) => retry(state, "Please enter a valid weight (1 to 500 kg):"),
        None => retry(state, "Please enter a number (a decimal point is allowed):"),
    }
}

fn apply_workouts(gender: Gender, age: i32, weight: f64, input: FlowInput<'_>) -> Step {
    let state = FlowState::CollectingWorkouts {
        gender,
        age,
        weight,
    };
    let FlowInput::Text(text) = input else {
        return retry(state, "Please enter a number:");
    };
    match parse_int(text) {
        Some(workouts) if (1..=7).contains(&workouts) => advance(FlowState::CollectingDiet {
            gender,
            age,
            weight,
            workouts_per_week: workouts,
        }),
        Some(_) => retry(state, "Please enter a number from 1 to 7:"),
        None => retry(state, "Please enter a number:"),
    }
}

fn apply_diet(
    gender: Gender,
    age: i32,
    weight: f64,
    workouts_per_week: i32,
    input: FlowInput<'_>,
) -> Step {
    let diet = match input {
        FlowInput::Text(text) => Some(clip(text)),
        FlowInput::Skip | FlowInput::Option(options::SKIP_DIET) => None,
        FlowInput::Option(_) => {
            return retry(
                FlowState::CollectingDiet {
                    gender,
                    age,
                    weight,
                    workouts_per_week,
                },
                "Describe your current diet, or skip:",
            )
        }
    };
    advance(FlowState::CollectingHealthNote {
        gender,
        age,
        weight,
        workouts_per_week,
        diet,
    })
}

fn apply_health_note(
    gender: Gender,
    age: i32,
    weight: f64,
    workouts_per_week: i32,
    diet: Option<String>,
    input: FlowInput<'_>,
) -> Step {
    let health_note = match input {
        FlowInput::Text(text) => Some(clip(text)),
        FlowInput::Skip | FlowInput::Option(options::SKIP_HEALTH_NOTE) => None,
        FlowInput::Option(_) => {
            return retry(
                FlowState::CollectingHealthNote {
                    gender,
                    age,
                    weight,
                    workouts_per_week,
                    diet,
                },
                "Describe any health problems or injuries, or skip:",
            )
        }
    };
    Step::Complete {
        answers: IntakeAnswers {
            gender: Some(gender),
            age: Some(age),
            weight: Some(weight),
            workouts_per_week: Some(workouts_per_week),
            diet,
            health_note,
        },
    }
}

fn parse_int(text: &str) -> Option<i32> {
    text.trim().parse().ok()
}

/// Parse a decimal accepting either `.` or `,` as the separator.
fn parse_decimal(text: &str) -> Option<f64> {
    let normalized = text.trim().replace(',', ".");
    let value: f64 = normalized.parse().ok()?;
    value.is_finite().then_some(value)
}

/// Truncate free text to [`FREE_TEXT_MAX_CHARS`] characters, respecting
/// char boundaries.
fn clip(text: &str) -> String {
    text.chars().take(FREE_TEXT_MAX_CHARS).collect()
}

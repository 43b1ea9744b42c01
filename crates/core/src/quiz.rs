use crate::content::{OptionLetter, QuizItem};
use std::collections::BTreeMap;
use std::time::Duration;

/// Pause between the last answer and the completion signal being acted on,
/// so the final answer's feedback is on screen before the takeaways appear.
pub const COMPLETION_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// How one option should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionDisplay {
    /// No answer recorded yet for this question.
    Neutral,
    Correct,
    /// The learner's pick, and it was wrong.
    Incorrect,
    Dimmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerFeedback {
    pub chosen: OptionLetter,
    pub correct: OptionLetter,
    pub is_correct: bool,
    pub finishes_quiz: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizSummary {
    pub score: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionView<'a> {
    pub letter: OptionLetter,
    pub text: &'a str,
    pub display: OptionDisplay,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionView<'a> {
    /// 1-based position of the question.
    pub number: usize,
    pub total: usize,
    pub prompt: &'a str,
    pub options: Vec<OptionView<'a>>,
    pub explanation: Option<&'a str>,
    pub can_advance: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizView<'a> {
    Empty,
    Question(QuestionView<'a>),
    Complete(QuizSummary),
}

/// One pass through a fixed list of questions, one question at a time.
///
/// Answers are committed once per question and never change. The score is
/// updated when an answer is recorded.
#[derive(Debug, Clone)]
pub struct QuizSession {
    items: Vec<QuizItem>,
    current_index: usize,
    answers: BTreeMap<usize, OptionLetter>,
    score: usize,
    completion_signaled: bool,
}

impl QuizSession {
    pub fn new(items: Vec<QuizItem>) -> Self {
        Self {
            items,
            current_index: 0,
            answers: BTreeMap::new(),
            score: 0,
            completion_signaled: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn answer_for(&self, index: usize) -> Option<OptionLetter> {
        self.answers.get(&index).copied()
    }

    pub fn current_item(&self) -> Option<&QuizItem> {
        self.items.get(self.current_index)
    }

    fn current_answered(&self) -> bool {
        self.answers.contains_key(&self.current_index)
    }

    fn last_index(&self) -> Option<usize> {
        self.items.len().checked_sub(1)
    }

    /// Records the answer for the current question.
    ///
    /// Returns `None` without touching any state when the question already
    /// has an answer, the quiz is empty, or `option_index` is not one of the
    /// four options.
    pub fn select_answer(&mut self, option_index: usize) -> Option<AnswerFeedback> {
        if self.current_answered() {
            return None;
        }
        let chosen = OptionLetter::from_index(option_index)?;
        let correct = self.current_item()?.correct_option;

        self.answers.insert(self.current_index, chosen);
        let is_correct = chosen == correct;
        if is_correct {
            self.score += 1;
        }
        tracing::debug!(
            question = self.current_index,
            %chosen,
            %correct,
            "quiz answer recorded"
        );

        Some(AnswerFeedback {
            chosen,
            correct,
            is_correct,
            finishes_quiz: self.is_finished(),
        })
    }

    /// Moves to the next question. Only allowed once the current question is
    /// answered and it is not the last one.
    pub fn advance(&mut self) -> bool {
        match self.last_index() {
            Some(last) if self.current_answered() && self.current_index < last => {
                self.current_index += 1;
                true
            }
            _ => false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.last_index()
            .is_some_and(|last| self.current_index == last && self.current_answered())
    }

    /// Returns the summary the first time it is called on a finished quiz and
    /// `None` on every later call, however often the condition is re-checked.
    pub fn take_completion(&mut self) -> Option<QuizSummary> {
        if self.completion_signaled || !self.is_finished() {
            return None;
        }
        self.completion_signaled = true;
        Some(self.summary())
    }

    pub fn summary(&self) -> QuizSummary {
        QuizSummary {
            score: self.score,
            total: self.items.len(),
        }
    }

    pub fn option_display(&self, option_index: usize) -> OptionDisplay {
        let (Some(item), Some(chosen)) = (self.current_item(), self.answer_for(self.current_index))
        else {
            return OptionDisplay::Neutral;
        };
        match OptionLetter::from_index(option_index) {
            Some(letter) if letter == item.correct_option => OptionDisplay::Correct,
            Some(letter) if letter == chosen => OptionDisplay::Incorrect,
            _ => OptionDisplay::Dimmed,
        }
    }

    pub fn view(&self) -> QuizView<'_> {
        let Some(item) = self.current_item() else {
            return QuizView::Empty;
        };
        if self.is_finished() {
            return QuizView::Complete(self.summary());
        }

        let answered = self.current_answered();
        let options = item
            .options
            .iter()
            .zip(OptionLetter::ALL)
            .enumerate()
            .map(|(index, (text, letter))| OptionView {
                letter,
                text,
                display: self.option_display(index),
            })
            .collect();

        QuizView::Question(QuestionView {
            number: self.current_index + 1,
            total: self.items.len(),
            prompt: &item.prompt,
            options,
            explanation: answered.then_some(item.explanation.as_str()),
            can_advance: answered,
        })
    }
}

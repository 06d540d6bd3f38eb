/// An employer question found in the application form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    pub kind: QuestionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionKind {
    SingleChoice(Vec<String>),
    MultipleChoice(Vec<String>),
    Text,
    /// No input control was recognised.
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuestionAnswer {
    Choose(String),
    ChooseMany(Vec<String>),
    Text(String),
}

//! Prompt flavors: fixed templates wrapped around the caller's text.
//!
//! Flavors only build the string handed to the engine; they carry no
//! capture semantics of their own.

use clap::ValueEnum;

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[clap(rename_all = "kebab-case")]
pub enum Flavor {
    /// Pass the text through untouched.
    #[default]
    Ask,
    /// Ask for a review of the given code.
    CodeReview,
    /// Ask for a short summary of the given text.
    Summarize,
}

impl std::fmt::Display for Flavor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Flavor::Ask => "ask",
            Flavor::CodeReview => "code-review",
            Flavor::Summarize => "summarize",
        };
        write!(f, "{name}")
    }
}

pub fn format_prompt(flavor: Flavor, text: &str) -> String {
    match flavor {
        Flavor::Ask => text.to_string(),
        Flavor::CodeReview => format!(
            "Please review the following code. Point out bugs, risky edge cases, and unclear \
naming, and suggest concrete fixes.\n\n{text}"
        ),
        Flavor::Summarize => format!(
            "Summarize the following in a few short paragraphs, keeping the key facts and \
numbers.\n\n{text}"
        ),
    }
}

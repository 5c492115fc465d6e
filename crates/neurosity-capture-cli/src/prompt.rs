use std::io;

use dialoguer::{Input, Password};

use neurosity_capture::Prompter;

/// Terminal prompts for credentials missing from the environment.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn prompt(&self, label: &str, hidden: bool) -> io::Result<String> {
        let answer = if hidden {
            Password::new().with_prompt(label).interact()
        } else {
            Input::<String>::new().with_prompt(label).interact_text()
        };
        answer.map_err(|e| io::Error::other(e.to_string()))
    }
}

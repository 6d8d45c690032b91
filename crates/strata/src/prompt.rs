//! Console prompter for interactive resolution.

use colored::Colorize;
use std::io::{self, BufRead, Write};
use strata_core::{Placeholder, PlaceholderKind, Prompt};

/// Prompts on stdin/stdout and remembers the last raw value entered per
/// path so accepted values can be written back to the settings file.
/// (If the run ultimately fails, nothing is written back, so a rejected
/// final attempt is harmless.)
#[derive(Default)]
pub struct ConsolePrompt {
    collected: Vec<(String, String)>,
}

impl ConsolePrompt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw values entered during prompting, in prompt order.
    pub fn collected(&self) -> &[(String, String)] {
        &self.collected
    }

    fn record(&mut self, path: &str, raw: &str) {
        match self.collected.iter_mut().find(|(p, _)| p == path) {
            Some(entry) => entry.1 = raw.to_string(),
            None => self.collected.push((path.to_string(), raw.to_string())),
        }
    }
}

impl Prompt for ConsolePrompt {
    fn ask(
        &mut self,
        path: &str,
        placeholder: &Placeholder,
        previous_error: Option<&str>,
    ) -> Option<String> {
        if let Some(error) = previous_error {
            eprintln!("{} {error}", "invalid:".red().bold());
        }
        let label = match placeholder.kind() {
            PlaceholderKind::Secret => "secret setting",
            _ => "local setting",
        };
        println!(
            "{}",
            format!("Enter a value for the {label} `{path}` (strings quoted)").cyan()
        );
        if let Some(doc) = placeholder.doc() {
            println!("{}", doc.cyan());
        }
        print!("> ");
        io::stdout().flush().ok()?;

        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            // EOF means there's no one to ask after all.
            Ok(0) => None,
            Ok(_) => {
                let raw = line.trim().to_string();
                if !raw.is_empty() {
                    self.record(path, &raw);
                }
                Some(raw)
            }
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keeps_the_last_value_per_path() {
        let mut prompt = ConsolePrompt::new();
        prompt.record("A", "1");
        prompt.record("B", "2");
        prompt.record("A", "3");
        assert_eq!(
            prompt.collected(),
            &[
                ("A".to_string(), "3".to_string()),
                ("B".to_string(), "2".to_string()),
            ]
        );
    }
}

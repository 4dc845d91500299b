//! Terminal prompts for commands that need a human decision.
//!
//! Uses dialoguer for the prompts themselves. With `assume_yes` every
//! prompt answers with its default so commands can run unattended.

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, Input, Select, theme::ColorfulTheme};

use appcloud_core::catalog::{Candidate, ChoiceLevel, Chooser};
use appcloud_core::types::MEMORY_CHOICES;

/// Prompts shared by push, update, delete and the service commands.
pub struct Prompter {
    theme: ColorfulTheme,
    assume_yes: bool,
}

impl Prompter {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            theme: ColorfulTheme::default(),
            assume_yes,
        }
    }

    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.assume_yes {
            return Ok(default);
        }
        Ok(Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(default)
            .interact()?)
    }

    /// Pick a memory reservation, starting from `current`.
    pub fn memory(&self, prompt: &str, current: &str) -> Result<String> {
        if self.assume_yes {
            return Ok(current.to_string());
        }
        let default = MEMORY_CHOICES
            .iter()
            .position(|choice| *choice == current)
            .unwrap_or(0);
        let selection = Select::with_theme(&self.theme)
            .with_prompt(format!("{prompt} [{current}]"))
            .items(&MEMORY_CHOICES[..])
            .default(default)
            .interact()?;
        Ok(MEMORY_CHOICES[selection].to_string())
    }

    /// Offer a database to a freshly pushed application. Unattended pushes take it.
    pub fn offer_database(&self) -> Result<bool> {
        self.confirm("Would you like to bind a database to this application?", true)
    }

    /// Ask whether a bound service goes away with its application.
    pub fn release_service(&self, app: &str, service: &str) -> Result<bool> {
        self.confirm(
            &format!("Service '{service}' is bound to '{app}', delete it as well?"),
            false,
        )
    }
}

impl Chooser for Prompter {
    fn choose(&mut self, level: &ChoiceLevel, candidates: &[Candidate]) -> Result<usize> {
        if self.assume_yes {
            return Ok(0);
        }
        let labels: Vec<&str> = candidates.iter().map(|c| c.label.as_str()).collect();
        let prompt = match level {
            ChoiceLevel::Option {
                name,
                description: Some(description),
            } => format!("{description} ({name})"),
            ChoiceLevel::Option { name, .. } => format!("Value for {name}"),
            other => format!("Which {}?", other.noun()),
        };
        Ok(Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(&labels)
            .default(0)
            .interact()?)
    }

    fn auto_selected(&mut self, level: &ChoiceLevel, candidate: &Candidate) {
        println!(
            "  {} {}",
            style(format!("{}:", level.noun())).dim(),
            style(&candidate.label).green()
        );
    }

    fn service_name(&mut self, default: &str) -> Result<Option<String>> {
        if self.assume_yes {
            return Ok(None);
        }
        let name: String = Input::with_theme(&self.theme)
            .with_prompt("Service name")
            .default(default.to_string())
            .interact_text()?;
        Ok((name != default).then_some(name))
    }
}

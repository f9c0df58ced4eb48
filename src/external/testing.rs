//! Scripted stand-in for the process executor

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::command::{CommandError, CommandExecutor, CommandOutput};

type Effect = Box<dyn Fn(&[&str]) + Send + Sync>;

struct Rule {
    needle: String,
    outputs: VecDeque<CommandOutput>,
    effect: Option<Effect>,
}

/// Answers each command from the first rule whose needle occurs in the
/// command line. A rule with several outputs hands them out in order and then
/// repeats the last one. Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct ScriptedExecutor {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, needle: &str, output: CommandOutput) -> Self {
        self.on_sequence(needle, vec![output])
    }

    pub fn on_sequence(self, needle: &str, outputs: Vec<CommandOutput>) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            outputs: outputs.into(),
            effect: None,
        });
        self
    }

    /// Run `effect` with the arguments whenever `needle` matches, then succeed
    pub fn on_effect(self, needle: &str, effect: impl Fn(&[&str]) + Send + Sync + 'static) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            outputs: VecDeque::from([CommandOutput::ok("")]),
            effect: Some(Box::new(effect)),
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.contains(needle)).count()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(&self, program: &str, args: &[&str]) -> Result<CommandOutput, CommandError> {
        let line = format!("{} {}", program, args.join(" "));
        self.calls.lock().unwrap().push(line.clone());

        let mut rules = self.rules.lock().unwrap();
        let Some(rule) = rules.iter_mut().find(|r| line.contains(&r.needle)) else {
            return Ok(CommandOutput::ok(""));
        };
        if let Some(effect) = &rule.effect {
            effect(args);
        }
        let output = if rule.outputs.len() > 1 {
            rule.outputs.pop_front()
        } else {
            rule.outputs.front().cloned()
        };
        Ok(output.unwrap_or_else(|| CommandOutput::ok("")))
    }
}

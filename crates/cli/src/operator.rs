//! The terminal operator: confirms each command and answers `ask_user`.

use async_trait::async_trait;
use issola_agent::{Confirmation, Operator};
use issola_core::decision::Decision;
use issola_tools::UserChannel;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

/// Reads the operator's answer from stdin.
///
/// `y` approves, `y -N` approves this and the next N commands, `n` quits,
/// anything else is sent back to the model as feedback.
pub struct StdinOperator {
    agent_name: String,
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl StdinOperator {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn read_line(&self) -> Option<String> {
        print!("  Input: ");
        let _ = std::io::stdout().flush();
        self.lines.lock().await.next_line().await.ok().flatten()
    }
}

#[async_trait]
impl Operator for StdinOperator {
    async fn confirm(&self, decision: &Decision) -> Confirmation {
        println!(
            "\n  NEXT ACTION:  COMMAND = {}  ARGUMENTS = {}",
            decision.command.name,
            serde_json::Value::Object(decision.command.args.clone())
        );
        println!(
            "  Enter 'y' to authorise command, 'y -N' to run N continuous commands, \
             'n' to exit program, or enter feedback for {}...",
            self.agent_name
        );
        match self.read_line().await {
            Some(line) => parse_confirmation(&line),
            // Closed stdin cannot approve anything.
            None => Confirmation::Quit,
        }
    }
}

#[async_trait]
impl UserChannel for StdinOperator {
    async fn ask(&self, prompt: &str) -> Option<String> {
        println!("\n  {} ASKS:  {prompt}", self.agent_name.to_uppercase());
        self.read_line().await.map(|line| line.trim().to_string())
    }
}

pub fn parse_confirmation(input: &str) -> Confirmation {
    let input = input.trim();
    let lowered = input.to_lowercase();

    if lowered == "y" {
        return Confirmation::Approve;
    }
    if let Some(count) = lowered.strip_prefix("y -") {
        return match count.trim().parse::<u32>() {
            Ok(n) => Confirmation::ApproveMany(n),
            Err(_) => Confirmation::Reject(format!(
                "Invalid input format. Please enter 'y -n' where n is the number of continuous tasks. Got '{input}'"
            )),
        };
    }
    if lowered == "n" {
        return Confirmation::Quit;
    }
    Confirmation::Reject(input.to_string())
}

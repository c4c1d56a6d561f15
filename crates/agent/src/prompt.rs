//! Persona preamble sent as the protected first message of every run.

use issola_config::AgentSettings;

/// The JSON shape the model must answer with. Shared with the repairer.
pub const RESPONSE_SCHEMA: &str = r#"{
    "thoughts":
    {
        "text": "thought",
        "reasoning": "reasoning",
        "plan": "- short bulleted\n- list that conveys\n- long-term plan",
        "criticism": "constructive self-criticism",
        "speak": "thoughts summary to say to user"
    },
    "command": {
        "name": "command name",
        "args":{
            "arg name": "value"
        }
    }
}"#;

const PROMPT_START: &str = "Your decisions must always be made independently without seeking user assistance. Play to your strengths as an LLM and pursue simple strategies with no legal complications.";

const CONSTRAINTS: &[&str] = &[
    "~4000 word limit for memory. Your memory is short, so immediately save important information to long term memory and files.",
    "No user assistance",
    "Exclusively use the commands listed in double quotes e.g. \"command name\"",
    "Issue exactly one command per response.",
];

const RESOURCES: &[&str] = &[
    "Internet access for searches and information gathering.",
    "Long Term memory management.",
    "GPT-3.5 powered Agents for delegation of simple tasks.",
    "File output.",
];

const PERFORMANCE_EVALUATION: &[&str] = &[
    "Continuously review and analyze your actions to ensure you are performing to the best of your abilities.",
    "Constructively self-criticize your big-picture behavior constantly.",
    "Reflect on past decisions and strategies to refine your approach.",
    "Every command has a cost, so be smart and efficient. Aim to complete tasks in the least number of steps.",
];

/// Who the agent is and what it is trying to achieve.
#[derive(Debug, Clone, PartialEq)]
pub struct AiConfig {
    pub name: String,
    pub role: String,
    pub goals: Vec<String>,
}

impl AiConfig {
    pub fn new(name: impl Into<String>, role: impl Into<String>, goals: Vec<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            goals,
        }
    }

    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self::new(&settings.name, &settings.role, settings.goals.clone())
    }

    /// Full preamble: identity, goals, constraints, the numbered command
    /// list from the registry, resources, evaluation and response format.
    pub fn construct_prompt(&self, commands: &str) -> String {
        let mut prompt = format!("You are {}, {}\n{PROMPT_START}\n\nGOALS:\n\n", self.name, self.role);
        push_numbered(&mut prompt, self.goals.iter().map(String::as_str));

        prompt.push_str("\nCONSTRAINTS:\n\n");
        push_numbered(&mut prompt, CONSTRAINTS.iter().copied());

        prompt.push_str("\nCOMMANDS:\n\n");
        prompt.push_str(commands);

        prompt.push_str("\nRESOURCES:\n\n");
        push_numbered(&mut prompt, RESOURCES.iter().copied());

        prompt.push_str("\nPERFORMANCE EVALUATION:\n\n");
        push_numbered(&mut prompt, PERFORMANCE_EVALUATION.iter().copied());

        prompt.push_str(
            "\nYou should only respond in JSON format as described below\n\nRESPONSE FORMAT:\n",
        );
        prompt.push_str(RESPONSE_SCHEMA);
        prompt.push_str("\n\nEnsure the response can be parsed by a strict JSON parser.\n");
        prompt
    }
}

fn push_numbered<'a>(out: &mut String, items: impl Iterator<Item = &'a str>) {
    for (i, item) in items.enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, item));
    }
}

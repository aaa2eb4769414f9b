// crates/opsgate-mcp/src/prompts.rs
// ============================================================================
// Module: Prompt Registry
// Description: Parameterized prompt templates served over prompts/get.
// Purpose: Hand clients ready-made analysis prompts over the gateway's tools.
// Dependencies: opsgate-store, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Prompts are static templates rendered with the caller's arguments; they
//! read nothing from the store. Each render names the gateway tools the
//! client should call, so a model following the prompt stays inside the tool
//! surface instead of inventing queries.

use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use opsgate_store::Record;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Prompt resolution errors.
#[derive(Debug, Error)]
pub enum PromptError {
    /// No prompt is registered under the requested name.
    #[error("unknown prompt: {0}")]
    UnknownPrompt(String),
    /// A required argument was not supplied.
    #[error("missing required argument: {0}")]
    MissingArgument(String),
}

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// One declared prompt argument.
#[derive(Debug, Clone)]
pub struct PromptArgument {
    /// Argument name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Whether the argument must be supplied.
    pub required: bool,
}

/// One registered prompt.
pub struct PromptDefinition {
    /// Prompt name, unique within the registry.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Declared arguments.
    pub arguments: Vec<PromptArgument>,
    /// Renders the prompt text from the supplied arguments.
    render: fn(&Record) -> Result<String, PromptError>,
}

impl PromptDefinition {
    /// Returns the `prompts/list` descriptor for this prompt.
    #[must_use]
    pub fn descriptor(&self) -> Value {
        let arguments: Vec<Value> = self
            .arguments
            .iter()
            .map(|arg| {
                json!({
                    "name": arg.name,
                    "description": arg.description,
                    "required": arg.required,
                })
            })
            .collect();
        json!({
            "name": self.name,
            "description": self.description,
            "arguments": arguments,
        })
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// The immutable prompt catalogue.
pub struct PromptRegistry {
    /// Registered prompts in listing order.
    prompts: Vec<PromptDefinition>,
}

impl PromptRegistry {
    /// Builds the gateway's prompt catalogue.
    #[must_use]
    pub fn build() -> Self {
        Self {
            prompts: vec![weekly_standup(), project_health(), invoice_chase()],
        }
    }

    /// Returns the `prompts/list` descriptor array.
    #[must_use]
    pub fn descriptors(&self) -> Vec<Value> {
        self.prompts.iter().map(PromptDefinition::descriptor).collect()
    }

    /// Returns the number of registered prompts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    /// Returns true when no prompts are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Resolves one prompt with the supplied arguments.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::UnknownPrompt`] for unregistered names and
    /// [`PromptError::MissingArgument`] when a required argument is absent.
    pub fn get(&self, name: &str, arguments: &Record) -> Result<Value, PromptError> {
        let prompt = self
            .prompts
            .iter()
            .find(|prompt| prompt.name == name)
            .ok_or_else(|| PromptError::UnknownPrompt(name.to_string()))?;
        for declared in &prompt.arguments {
            if declared.required && string_arg(arguments, declared.name).is_none() {
                return Err(PromptError::MissingArgument(declared.name.to_string()));
            }
        }
        let text = (prompt.render)(arguments)?;
        Ok(json!({
            "description": prompt.description,
            "messages": [{
                "role": "user",
                "content": {"type": "text", "text": text},
            }],
        }))
    }
}

// ============================================================================
// SECTION: Prompts
// ============================================================================

fn weekly_standup() -> PromptDefinition {
    PromptDefinition {
        name: "weekly_standup",
        description: "Prepare a weekly standup summary from logged hours, \
                      completed tasks, and open blockers.",
        arguments: vec![
            PromptArgument {
                name: "period_start",
                description: "Week start date, YYYY-MM-DD.",
                required: true,
            },
            PromptArgument {
                name: "team_member_id",
                description: "Restrict the summary to one team member.",
                required: false,
            },
        ],
        render: |args| {
            let period_start = required(args, "period_start")?;
            let mut text = format!(
                "Prepare a standup summary for the week starting {period_start}. \
                 Use team_utilization for logged hours, calculate_kpi with slug \
                 'tasks_completed' for throughput, and filter_tasks with \
                 {{\"status\": \"blocked\"}} for open blockers. Close with one \
                 risk worth raising."
            );
            if let Some(member) = string_arg(args, "team_member_id") {
                text.push_str(&format!(
                    " Scope everything to team member {member} by passing \
                     team_member_id where the tool accepts it."
                ));
            }
            Ok(text)
        },
    }
}

fn project_health() -> PromptDefinition {
    PromptDefinition {
        name: "project_health",
        description: "Assess one project's delivery health: budget burn, \
                      milestone status, and open work.",
        arguments: vec![PromptArgument {
            name: "project_id",
            description: "Project to assess.",
            required: true,
        }],
        render: |args| {
            let project_id = required(args, "project_id")?;
            Ok(format!(
                "Assess the health of project {project_id}. Call get_projects \
                 for the project record, project_hours_report with this \
                 project_id for budget burn, filter_milestones and filter_tasks \
                 on the project for outstanding work, and summarize status as \
                 green, amber, or red with the two most important follow-ups."
            ))
        },
    }
}

fn invoice_chase() -> PromptDefinition {
    PromptDefinition {
        name: "invoice_chase",
        description: "Draft follow-up notes for outstanding invoices.",
        arguments: vec![PromptArgument {
            name: "as_of",
            description: "Reference date, YYYY-MM-DD; defaults to today.",
            required: false,
        }],
        render: |args| {
            let mut text = "List outstanding invoices with filter_invoices and \
                            {\"status\": \"sent\"}, join each to its account via \
                            get_accounts, and draft a short, firm follow-up note \
                            per invoice that names the amount and issue date."
                .to_string();
            if let Some(as_of) = string_arg(args, "as_of") {
                text.push_str(&format!(
                    " Treat {as_of} as today when judging how overdue each \
                     invoice is."
                ));
            }
            Ok(text)
        },
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a non-empty string argument.
fn string_arg(args: &Record, name: &str) -> Option<String> {
    args.get(name)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Reads a required string argument.
fn required(args: &Record, name: &str) -> Result<String, PromptError> {
    string_arg(args, name).ok_or_else(|| PromptError::MissingArgument(name.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

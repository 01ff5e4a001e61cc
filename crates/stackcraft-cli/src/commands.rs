//! Command registry and built-in commands.

use anyhow::Result;
use stackcraft_core::Error;
use stackcraft_core::provider::{StackOutput, TransientStatus};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::info;

use crate::session::Session;

/// A command handler.
pub type Handler = fn(&mut Session<'_>) -> Result<()>;

/// A named command a stack binary can run.
#[derive(Clone, Copy)]
pub struct Command {
    pub name: &'static str,
    pub about: &'static str,
    pub handler: Handler,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("about", &self.about)
            .finish()
    }
}

/// Ordered set of commands. Drives both argument parsing and dispatch.
#[derive(Debug, Clone)]
pub struct CommandSet {
    commands: Vec<Command>,
}

impl Default for CommandSet {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CommandSet {
    /// No commands at all.
    pub fn empty() -> Self {
        Self { commands: vec![] }
    }

    /// The standard lifecycle commands.
    pub fn builtin() -> Self {
        Self::empty()
            .with("print", "Print the generated template", print)
            .with("validate", "Validate the template against the provider", validate)
            .with("create", "Create the stack", create)
            .with("update", "Update the stack", update)
            .with("delete", "Delete the stack and its resources", delete)
            .with("outputs", "Print the stack outputs", outputs)
            .with("apply", "Create the stack if missing, otherwise update it", apply)
    }

    /// Add a command. A command with the same name is replaced in place.
    pub fn with(mut self, name: &'static str, about: &'static str, handler: Handler) -> Self {
        let command = Command {
            name,
            about,
            handler,
        };
        match self.commands.iter_mut().find(|c| c.name == name) {
            Some(existing) => *existing = command,
            None => self.commands.push(command),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.commands.iter().map(|c| c.name)
    }
}

/// Print the generated template.
pub fn print(session: &mut Session<'_>) -> Result<()> {
    let body = session.template_body()?;
    write!(session.out, "{}", body)?;
    Ok(())
}

/// Validate the template against the provider.
pub fn validate(session: &mut Session<'_>) -> Result<()> {
    let body = session.template_body()?;
    let response = session
        .provider
        .validate_template(&body)
        .map_err(Error::from)?;

    if !response.is_success() {
        return Err(Error::ProviderResponse {
            operation: "Validation",
            response,
        }
        .into());
    }
    session.println("Validation OK")?;
    Ok(())
}

/// Create the stack and follow its events until creation settles.
pub fn create(session: &mut Session<'_>) -> Result<()> {
    let request = session.request()?;
    info!(stack = %request.stack_name, "Submitting create request");
    let response = session.provider.create_stack(&request).map_err(Error::from)?;

    if !response.is_success() {
        return Err(Error::ProviderResponse {
            operation: "Creation",
            response,
        }
        .into());
    }
    let id = response.stack_id().unwrap_or(request.stack_name.as_str()).to_string();
    session.println(format!("Stack creation initiated for: {}", id))?;
    session.watch(TransientStatus::CreateInProgress)?;
    Ok(())
}

/// Update the stack. Refusing a no-op update is an error.
pub fn update(session: &mut Session<'_>) -> Result<()> {
    update_stack(session, false)
}

/// Update an existing stack and follow its events.
///
/// With `tolerate_noop`, the provider refusing an update that changes nothing
/// is reported and treated as success.
pub fn update_stack(session: &mut Session<'_>, tolerate_noop: bool) -> Result<()> {
    session.describe()?;
    let request = session.request()?;
    info!(stack = %request.stack_name, "Submitting update request");

    let response = match session.provider.update_stack(&request) {
        Ok(response) => response,
        Err(err) if tolerate_noop && err.is_noop_update() => {
            session.println(format!(
                "No updates to be performed for: {}",
                request.stack_name
            ))?;
            return Ok(());
        }
        Err(err) => return Err(Error::from(err).into()),
    };

    if !response.is_success() {
        return Err(Error::ProviderResponse {
            operation: "Update",
            response,
        }
        .into());
    }
    let id = response.stack_id().unwrap_or(request.stack_name.as_str()).to_string();
    session.println(format!("Stack update initiated for: {}", id))?;
    session.watch(TransientStatus::UpdateInProgress)?;
    Ok(())
}

/// Delete the stack and follow its events until it is gone.
pub fn delete(session: &mut Session<'_>) -> Result<()> {
    let description = session.describe()?;
    let name = description.stack_name;
    info!(stack = %name, "Submitting delete request");
    let response = session.provider.delete_stack(&name).map_err(Error::from)?;

    if !response.is_success() {
        return Err(Error::ProviderResponse {
            operation: "Delete",
            response,
        }
        .into());
    }
    session.println(format!("Destroy initiated for stack: {}", name))?;
    session.watch(TransientStatus::DeleteInProgress)?;
    Ok(())
}

#[derive(Tabled)]
struct OutputRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Description")]
    description: String,
    #[tabled(rename = "ExportName")]
    export_name: String,
}

impl From<StackOutput> for OutputRow {
    fn from(output: StackOutput) -> Self {
        Self {
            key: output.output_key,
            value: output.output_value,
            description: output.description.unwrap_or_default(),
            export_name: output.export_name.unwrap_or_default(),
        }
    }
}

/// Print the stack status and its outputs.
pub fn outputs(session: &mut Session<'_>) -> Result<()> {
    let description = session.describe()?;
    session.println(format!("Stack is in status: {}", description.stack_status))?;

    if description.outputs.is_empty() {
        session.println("No outputs")?;
        return Ok(());
    }

    let rows: Vec<OutputRow> = description.outputs.into_iter().map(OutputRow::from).collect();
    let mut table = Table::new(rows);
    table.with(Style::ascii());
    session.println(table)?;
    Ok(())
}

/// Create the stack if it does not exist, otherwise update it.
pub fn apply(session: &mut Session<'_>) -> Result<()> {
    match session.find()? {
        Some(_) => update_stack(session, true),
        None => create(session),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut Session<'_>) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_builtin_order() {
        let names: Vec<_> = CommandSet::builtin().names().collect();
        assert_eq!(
            names,
            vec!["print", "validate", "create", "update", "delete", "outputs", "apply"]
        );
    }

    #[test]
    fn test_custom_commands() {
        let commands = CommandSet::builtin()
            .with("purge", "Empty the bucket", noop)
            .with("print", "Print it differently", noop);

        let names: Vec<_> = commands.names().collect();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "print");
        assert_eq!(names[7], "purge");
        assert_eq!(commands.get("print").unwrap().about, "Print it differently");
        assert!(commands.get("missing").is_none());
    }
}

use std::collections::BTreeMap;

use parking_lot::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandSpec {
    pub options: Vec<String>,
    /// The command completes its own arguments; hosts route completion to it instead.
    pub intercepts_completion: bool,
}

impl CommandSpec {
    pub fn new<S: Into<String>>(options: impl IntoIterator<Item = S>) -> Self {
        Self { options: options.into_iter().map(Into::into).collect(), intercepts_completion: false }
    }

    pub fn intercepting(mut self) -> Self {
        self.intercepts_completion = true;
        self
    }
}

/// Player-facing commands by name. Shared between the script API that registers commands and
/// the console that completes them.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: RwLock<BTreeMap<String, CommandSpec>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a command, returning the previous definition.
    pub fn register(&self, name: impl Into<String>, spec: CommandSpec) -> Option<CommandSpec> {
        self.commands.write().insert(name.into(), spec)
    }

    pub fn unregister(&self, name: &str) -> Option<CommandSpec> {
        self.commands.write().remove(name)
    }

    pub fn get(&self, name: &str) -> Option<CommandSpec> {
        self.commands.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.commands.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }

    pub fn complete<S: AsRef<str>>(&self, args: &[S]) -> Vec<String> {
        complete_command(self, args)
    }
}

/// Completes `args` against the registry: options of an exactly named command, otherwise
/// command names.
pub fn complete_command<S: AsRef<str>>(registry: &CommandRegistry, args: &[S]) -> Vec<String> {
    let commands = registry.commands.read();
    let Some(first) = args.first().map(AsRef::as_ref) else {
        return commands.keys().cloned().collect();
    };
    if let Some(command) = commands.get(first) {
        return match args.get(1).map(AsRef::as_ref) {
            None => command.options.clone(),
            Some(partial) => command.options.iter().filter(|opt| opt.starts_with(partial)).cloned().collect(),
        };
    }
    commands.keys().filter(|name| name.starts_with(first)).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> CommandRegistry {
        let registry = CommandRegistry::new();
        registry.register("heal", CommandSpec::new(["all", "self"]));
        registry.register("home", CommandSpec::new(["set", "delete", "list"]));
        registry.register("alias", CommandSpec::new(Vec::<String>::new()).intercepting());
        registry
    }

    #[test]
    fn exact_command_lists_or_filters_options() {
        let registry = registry();
        assert_eq!(registry.complete(&["heal"]), vec!["all", "self"]);
        assert_eq!(registry.complete(&["heal", "a"]), vec!["all"]);
        assert_eq!(registry.complete(&["home", ""]), vec!["set", "delete", "list"]);
        assert!(registry.complete(&["heal", "x"]).is_empty());
    }

    #[test]
    fn partial_names_complete_command_names() {
        let registry = registry();
        assert_eq!(registry.complete(&["he"]), vec!["heal"]);
        assert_eq!(registry.complete(&["h"]), vec!["heal", "home"]);
        assert_eq!(registry.complete::<&str>(&[]), vec!["alias", "heal", "home"]);
        assert!(registry.complete(&["zz", "a"]).is_empty());
    }

    #[test]
    fn register_replaces_and_reports_previous() {
        let registry = registry();
        let previous = registry.register("heal", CommandSpec::new(["others"]));
        assert_eq!(previous, Some(CommandSpec::new(["all", "self"])));
        assert!(registry.get("alias").expect("alias").intercepts_completion);
        assert_eq!(registry.unregister("alias").map(|spec| spec.options.len()), Some(0));
        assert_eq!(registry.len(), 2);
    }
}

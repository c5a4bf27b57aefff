//! Console command table.
//!
//! The parser and the `help` command read the same entries, so keywords,
//! argument shapes, and usage text cannot drift apart.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Start,
    Stop,
    EmergencyStop,
    Toggle,
    Status,
    Help,
}

/// Shape of the tokens following a command keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    End,
    /// One solenoid code (`a`, `b`, `c`).
    Actuator { next: &'static Node },
    /// Optional command name to describe.
    Topic { next: &'static Node },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub grammar: &'static Node,
    pub usage: &'static str,
    pub summary: &'static str,
}

const END: Node = Node::End;
const TOGGLE_GRAMMAR: Node = Node::Actuator { next: &END };
const HELP_GRAMMAR: Node = Node::Topic { next: &END };

const COMMANDS: [CommandSpec; 6] = [
    CommandSpec {
        name: "start",
        tag: CommandTag::Start,
        grammar: &END,
        usage: "start",
        summary: "begin a run; sends `start` and rearms zone edges",
    },
    CommandSpec {
        name: "stop",
        tag: CommandTag::Stop,
        grammar: &END,
        usage: "stop",
        summary: "end the run; sends `stop` and clears cycle progress",
    },
    CommandSpec {
        name: "estop",
        tag: CommandTag::EmergencyStop,
        grammar: &END,
        usage: "estop",
        summary: "emergency stop; sends `stopE` and halts transmission",
    },
    CommandSpec {
        name: "toggle",
        tag: CommandTag::Toggle,
        grammar: &TOGGLE_GRAMMAR,
        usage: "toggle <a|b|c>",
        summary: "flip a solenoid and command the controller",
    },
    CommandSpec {
        name: "status",
        tag: CommandTag::Status,
        grammar: &END,
        usage: "status",
        summary: "show zones, solenoids, cycle progress, and link state",
    },
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        grammar: &HELP_GRAMMAR,
        usage: "help [command]",
        summary: "list commands or describe one",
    },
];

/// Returns the full command catalog.
#[must_use]
pub const fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

/// Looks up a command by its tag.
#[must_use]
pub const fn command(tag: CommandTag) -> &'static CommandSpec {
    match tag {
        CommandTag::Start => &COMMANDS[0],
        CommandTag::Stop => &COMMANDS[1],
        CommandTag::EmergencyStop => &COMMANDS[2],
        CommandTag::Toggle => &COMMANDS[3],
        CommandTag::Status => &COMMANDS[4],
        CommandTag::Help => &COMMANDS[5],
    }
}

/// Finds a command by name (case insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

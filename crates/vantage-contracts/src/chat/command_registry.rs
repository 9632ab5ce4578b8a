#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "export",
        action: "export",
    },
    CommandSpec {
        command: "reset",
        action: "reset",
    },
    CommandSpec {
        command: "retry",
        action: "retry",
    },
    CommandSpec {
        command: "dismiss",
        action: "dismiss_error",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "report",
        action: "report",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub(crate) const MARKER_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "hover",
        action: "hover",
    },
    CommandSpec {
        command: "select",
        action: "select",
    },
];

pub(crate) const ZOOM_COMMAND: CommandSpec = CommandSpec {
    command: "zoom",
    action: "zoom",
};

pub const CONSOLE_HELP_COMMANDS: &[&str] = &[
    "<address>",
    "/zoom +N|-N|in|out",
    "/hover N|off",
    "/select N",
    "/export",
    "/report",
    "/status",
    "/dismiss",
    "/retry",
    "/reset",
    "/help",
    "/quit",
];

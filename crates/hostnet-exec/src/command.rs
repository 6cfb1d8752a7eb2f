//! Command and plan types.
//!
//! A [`CommandSpec`] is one external invocation as an argv vector. It is
//! never passed through a shell; [`shellquote`] only exists to render
//! readable command lines for logs and error reports.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Characters that need escaping inside shell double-quotes.
/// Matches: $, `, ", \, and newline
static SHELL_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"([$`"\\\n])"#).expect("Invalid regex pattern"));

/// Arguments made only of these characters are rendered unquoted.
static SHELL_SAFE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_@%+=:,./-]+$").expect("Invalid regex pattern"));

/// Quotes a string for display as a shell word.
///
/// The string is wrapped in double quotes and `$`, `` ` ``, `"`, `\` and
/// newline are backslash-escaped.
///
/// ```
/// use hostnet_exec::command::shellquote;
///
/// assert_eq!(shellquote("simple"), "\"simple\"");
/// assert_eq!(shellquote("with$var"), "\"with\\$var\"");
/// ```
pub fn shellquote(s: &str) -> String {
    let escaped = SHELL_ESCAPE_RE.replace_all(s, r"\$1");
    format!("\"{}\"", escaped)
}

fn render_word(word: &str) -> String {
    if SHELL_SAFE_RE.is_match(word) {
        word.to_string()
    } else {
        shellquote(word)
    }
}

/// One external command invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    argv: Vec<String>,
    elevated: bool,
    tag: Option<String>,
    /// argv index rendered as `***` in command lines
    secret: Option<usize>,
}

impl CommandSpec {
    /// Creates a command from a program and its arguments.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = vec![program.into()];
        argv.extend(args.into_iter().map(Into::into));
        Self {
            argv,
            elevated: false,
            tag: None,
            secret: None,
        }
    }

    /// Marks the command as requiring superuser privileges.
    pub fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }

    /// Attaches a correlation tag, matched by pipeline ignore predicates.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn requires_elevation(&self) -> bool {
        self.elevated
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Hides the last argument (a password) from rendered command lines.
    pub fn redact_last_arg(mut self) -> Self {
        self.secret = Some(self.argv.len() - 1);
        self
    }

    /// Renders the command as a single shell-like line.
    pub fn command_line(&self) -> String {
        self.argv
            .iter()
            .enumerate()
            .map(|(i, w)| {
                if self.secret == Some(i) {
                    "***".to_string()
                } else {
                    render_word(w)
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("command", &self.command_line())
            .field("elevated", &self.elevated)
            .field("tag", &self.tag)
            .finish()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// One step of a [`ConfigurationPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanStep {
    /// Run a command.
    Run(CommandSpec),
    /// Run `primary`; if it fails, run `alternate` once instead.
    WithFallback {
        primary: CommandSpec,
        alternate: CommandSpec,
    },
    /// Commit point before a destructive action. Issues no command.
    Barrier,
}

impl PlanStep {
    /// The command this step issues first, if any.
    pub fn command(&self) -> Option<&CommandSpec> {
        match self {
            PlanStep::Run(cmd) => Some(cmd),
            PlanStep::WithFallback { primary, .. } => Some(primary),
            PlanStep::Barrier => None,
        }
    }
}

impl From<CommandSpec> for PlanStep {
    fn from(cmd: CommandSpec) -> Self {
        PlanStep::Run(cmd)
    }
}

/// Ordered, strictly sequential list of plan steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationPlan {
    steps: Vec<PlanStep>,
}

impl ConfigurationPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, step: impl Into<PlanStep>) {
        self.steps.push(step.into());
    }

    /// Appends a step, builder style.
    pub fn then(mut self, step: impl Into<PlanStep>) -> Self {
        self.push(step);
        self
    }

    /// Appends every step of `other` after the steps of `self`.
    pub fn append(&mut self, other: ConfigurationPlan) {
        self.steps.extend(other.steps);
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Primary commands of all steps, in order. Barriers are skipped.
    pub fn commands(&self) -> impl Iterator<Item = &CommandSpec> {
        self.steps.iter().filter_map(PlanStep::command)
    }
}

impl FromIterator<PlanStep> for ConfigurationPlan {
    fn from_iter<T: IntoIterator<Item = PlanStep>>(iter: T) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

/// Password used to elevate commands. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

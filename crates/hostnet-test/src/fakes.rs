//! Scripted fakes for external collaborators

use async_trait::async_trait;
use hostnet_discovery::{
    ArpTableReader, DiscoveryError, InterfaceEnumerator, LocalInterface, Prober, RawArpTable,
};
use hostnet_exec::{CommandRunner, CommandSpec, Credential, ExecError, ExecResult, ExitState};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One command executed by a [`ScriptedRunner`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommand {
    /// Rendered command line
    pub line: String,
    pub elevated: bool,
    pub tag: Option<String>,
    /// Whether a credential was supplied
    pub with_credential: bool,
}

enum Rule {
    Answer { line: String, stdout: String },
    Fail { needle: String, code: i32, stderr: String },
}

/// Command runner answering from a script
///
/// Rules are checked in insertion order: exact-line answers and substring
/// failures. Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<Rule>,
    calls: Mutex<Vec<RecordedCommand>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `line` with `stdout`
    pub fn answer(mut self, line: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.rules.push(Rule::Answer {
            line: line.into(),
            stdout: stdout.into(),
        });
        self
    }

    /// Fail every command whose line contains `needle`
    pub fn fail_matching(self, needle: impl Into<String>) -> Self {
        self.fail_with(needle, 1, "Error: scripted failure")
    }

    /// Fail matching commands with a specific exit code and stderr
    pub fn fail_with(
        mut self,
        needle: impl Into<String>,
        code: i32,
        stderr: impl Into<String>,
    ) -> Self {
        self.rules.push(Rule::Fail {
            needle: needle.into(),
            code,
            stderr: stderr.into(),
        });
        self
    }

    pub fn calls(&self) -> Vec<RecordedCommand> {
        self.calls.lock().clone()
    }

    /// Rendered lines of every executed command
    pub fn lines(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.line.clone()).collect()
    }

    /// Executed commands that were elevated (plan steps, not queries)
    pub fn elevated_lines(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.elevated)
            .map(|c| c.line.clone())
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, cmd: &CommandSpec, credential: Option<&Credential>) -> ExecResult<String> {
        let line = cmd.command_line();
        self.calls.lock().push(RecordedCommand {
            line: line.clone(),
            elevated: cmd.requires_elevation(),
            tag: cmd.tag().map(str::to_string),
            with_credential: credential.is_some(),
        });

        for rule in &self.rules {
            match rule {
                Rule::Answer { line: l, stdout } if *l == line => return Ok(stdout.clone()),
                Rule::Fail {
                    needle,
                    code,
                    stderr,
                } if line.contains(needle.as_str()) => {
                    return Err(ExecError::CommandFailed {
                        command: line,
                        status: ExitState::Code(*code),
                        stderr: stderr.clone(),
                    })
                }
                _ => {}
            }
        }
        Ok(String::new())
    }
}

/// ARP reader serving scripted results, then repeating the last table
pub struct StaticArpReader {
    script: Mutex<VecDeque<Result<RawArpTable, String>>>,
    last: Mutex<RawArpTable>,
    reads: AtomicUsize,
}

impl StaticArpReader {
    /// Always returns `table`
    pub fn new(table: RawArpTable) -> Self {
        Self::scripted(vec![Ok(table)])
    }

    /// `Err(reason)` entries fail that read with a sample error
    pub fn scripted(script: Vec<Result<RawArpTable, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(RawArpTable::new()),
            reads: AtomicUsize::new(0),
        }
    }

    /// Queue another result
    pub fn push(&self, next: Result<RawArpTable, String>) {
        self.script.lock().push_back(next);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArpTableReader for StaticArpReader {
    async fn read(&self) -> hostnet_discovery::Result<RawArpTable> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().pop_front();
        match next {
            Some(Ok(table)) => {
                *self.last.lock() = table.clone();
                Ok(table)
            }
            Some(Err(reason)) => Err(DiscoveryError::Sample(reason)),
            None => Ok(self.last.lock().clone()),
        }
    }
}

/// Fixed local interface list
#[derive(Debug, Clone, Default)]
pub struct StaticInterfaces(pub Vec<LocalInterface>);

impl InterfaceEnumerator for StaticInterfaces {
    fn interfaces(&self) -> hostnet_discovery::Result<Vec<LocalInterface>> {
        Ok(self.0.clone())
    }
}

/// How a [`RecordingProber`] answers
#[derive(Debug, Clone)]
pub enum ProbeBehavior {
    Reachable,
    Unreachable,
    /// The probe cannot be sent
    Fail(String),
    /// Never completes within any timeout
    Hang,
}

/// Prober that records every target
pub struct RecordingProber {
    behavior: ProbeBehavior,
    probes: Mutex<Vec<(String, Ipv4Addr)>>,
    /// Raw table pushed to this reader on each probe, to simulate an ARP reply
    reply: Option<(Arc<StaticArpReader>, RawArpTable)>,
}

impl RecordingProber {
    pub fn new(behavior: ProbeBehavior) -> Self {
        Self {
            behavior,
            probes: Mutex::new(Vec::new()),
            reply: None,
        }
    }

    /// Make each probe populate `reader` with `table`
    pub fn replying(mut self, reader: Arc<StaticArpReader>, table: RawArpTable) -> Self {
        self.reply = Some((reader, table));
        self
    }

    pub fn probes(&self) -> Vec<(String, Ipv4Addr)> {
        self.probes.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.probes.lock().len()
    }
}

#[async_trait]
impl Prober for RecordingProber {
    async fn probe(
        &self,
        network: &str,
        ip: Ipv4Addr,
        _timeout: Duration,
    ) -> hostnet_discovery::Result<bool> {
        self.probes.lock().push((network.to_string(), ip));
        if let Some((reader, table)) = &self.reply {
            reader.push(Ok(table.clone()));
        }
        match &self.behavior {
            ProbeBehavior::Reachable => Ok(true),
            ProbeBehavior::Unreachable => Ok(false),
            ProbeBehavior::Fail(reason) => Err(DiscoveryError::Probe {
                network: network.to_string(),
                ip,
                reason: reason.clone(),
            }),
            ProbeBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(false)
            }
        }
    }
}

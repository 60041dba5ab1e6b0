//! Command input plugin
//!
//! Runs each configured shell command as a long-lived child. Every line
//! it prints becomes the section value; actions on the section are
//! written to its stdin, one per line.

use crate::insert_section;
use anyhow::Result;
use log::{debug, info, warn};
use rg_status_core::{plugin_config, Core, InputPlugin, SectionBuilder, SectionHandle};
use rg_status_types::{CommandSourceConfig, State};
use serde_json::Value;
use std::cell::RefCell;
use std::process::Stdio;
use std::rc::{Rc, Weak};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

struct Job {
    key: String,
    shell: String,
    command: String,
    section: RefCell<Option<SectionHandle>>,
    /// Feeds actions to the running child
    actions: RefCell<Option<mpsc::UnboundedSender<String>>>,
    task: RefCell<Option<JoinHandle<()>>>,
}

impl Job {
    fn show(&self, line: String) {
        if let Some(section) = self.section.borrow().as_ref() {
            section.set_value(line);
            section.set_state(State::NoState, false);
        }
    }

    fn unavailable(&self) {
        if let Some(section) = self.section.borrow().as_ref() {
            section.set_state(State::Unavailable, false);
        }
    }

    fn send_action(&self, event: &str) {
        match self.actions.borrow().as_ref() {
            Some(actions) => {
                let _ = actions.send(event.to_string());
            }
            None => debug!("Command {} is not running, dropping {}", self.key, event),
        }
    }

    fn start(self: &Rc<Self>) {
        if self.task.borrow().is_some() {
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.actions.borrow_mut() = Some(tx);
        let task = tokio::task::spawn_local(run_job(Rc::clone(self), rx));
        *self.task.borrow_mut() = Some(task);
    }

    fn stop(&self) {
        self.actions.borrow_mut().take();
        if let Some(task) = self.task.borrow_mut().take() {
            // Dropping the child kills it
            task.abort();
        }
    }
}

async fn run_job(job: Rc<Job>, mut actions: mpsc::UnboundedReceiver<String>) {
    let spawned = Command::new(&job.shell)
        .arg("-c")
        .arg(&job.command)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            warn!("Command {} failed to start: {}", job.key, e);
            job.unavailable();
            return;
        }
    };
    let Some(stdout) = child.stdout.take() else {
        job.unavailable();
        return;
    };
    let mut stdin = child.stdin.take();
    let mut lines = BufReader::new(stdout).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => job.show(line),
                Ok(None) => break,
                Err(e) => {
                    warn!("Command {} output unreadable: {}", job.key, e);
                    break;
                }
            },
            Some(event) = actions.recv() => {
                let Some(writer) = stdin.as_mut() else {
                    continue;
                };
                let line = format!("{}\n", event);
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    debug!("Command {} stopped reading input: {}", job.key, e);
                    stdin = None;
                } else {
                    let _ = writer.flush().await;
                }
            }
        }
    }

    job.unavailable();
    match child.wait().await {
        Ok(status) => info!("Command {} exited: {}", job.key, status),
        Err(e) => warn!("Command {} could not be reaped: {}", job.key, e),
    }
    job.task.borrow_mut().take();
    job.actions.borrow_mut().take();
}

pub struct CommandSource {
    jobs: Vec<Rc<Job>>,
}

pub(crate) fn create(core: &Core, config: &Value) -> Result<Box<dyn InputPlugin>> {
    let config: CommandSourceConfig = plugin_config(config)?;
    Ok(Box::new(CommandSource::new(core, config)))
}

impl CommandSource {
    pub fn new(core: &Core, config: CommandSourceConfig) -> Self {
        let mut jobs = Vec::new();
        for (key, command) in config.commands {
            let job = Rc::new(Job {
                key: key.clone(),
                shell: config.shell.clone(),
                command,
                section: RefCell::new(None),
                actions: RefCell::new(None),
                task: RefCell::new(None),
            });
            let weak: Weak<Job> = Rc::downgrade(&job);
            let builder = SectionBuilder::new("command")
                .instance(key.as_str())
                .action(move |event| {
                    if let Some(job) = weak.upgrade() {
                        job.send_action(event);
                    }
                });
            let Some(section) = insert_section(core, builder) else {
                continue;
            };
            *job.section.borrow_mut() = Some(section);
            jobs.push(job);
        }
        Self { jobs }
    }
}

impl InputPlugin for CommandSource {
    fn name(&self) -> &str {
        "command"
    }

    fn start(&mut self) {
        for job in &self.jobs {
            job.start();
        }
    }

    fn stop(&mut self) {
        for job in &self.jobs {
            job.stop();
        }
    }

    fn uninit(&mut self) {
        for job in &self.jobs {
            job.stop();
            job.section.borrow_mut().take();
        }
    }
}

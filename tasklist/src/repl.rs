//! Line commands understood by the demo binary and their rendering.

use std::fmt::Write as _;

use tasklist_proto::task::TaskStatus;

use tasklist::app::Snapshot;
use tasklist::tasks::{StoreEvent, SyncState};

pub const HELP: &str = "\
commands:
  signin <email> <password>   sign in
  signout                     sign out
  add <title>                 add a task
  toggle <n>                  flip task n between TODO and DONE
  edit <n>                    start editing task n
  set-title <text>            change the title being edited
  set-desc <text>             change the description being edited
  save                        commit the edit
  cancel                      discard the edit
  rm <n>                      remove task n
  ls                          list tasks
  json                        print the snapshot as JSON
  retry                       retry failed writes now
  help                        show this text
  quit                        exit
";

/// One parsed input line. Task positions are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SignIn { email: String, password: String },
    SignOut,
    Add(String),
    Toggle(usize),
    Edit(usize),
    SetTitle(String),
    SetDescription(String),
    Save,
    Cancel,
    Remove(usize),
    List,
    Json,
    Retry,
    Help,
    Quit,
}

impl Command {
    /// Parses a line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(w, r)| (w, r.trim()));

        let command = match word {
            "signin" => {
                let mut args = rest.split_whitespace();
                match (args.next(), args.next(), args.next()) {
                    (Some(email), Some(password), None) => Self::SignIn {
                        email: email.to_string(),
                        password: password.to_string(),
                    },
                    _ => return Err("usage: signin <email> <password>".to_string()),
                }
            }
            "signout" => Self::SignOut,
            "add" => Self::Add(rest.to_string()),
            "toggle" => Self::Toggle(position(rest)?),
            "edit" => Self::Edit(position(rest)?),
            "set-title" => Self::SetTitle(rest.to_string()),
            "set-desc" => Self::SetDescription(rest.to_string()),
            "save" => Self::Save,
            "cancel" => Self::Cancel,
            "rm" => Self::Remove(position(rest)?),
            "ls" => Self::List,
            "json" => Self::Json,
            "retry" => Self::Retry,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(format!("unknown command: {other} (try `help`)")),
        };
        Ok(Some(command))
    }
}

fn position(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(format!("expected a task number, got {arg:?}")),
    }
}

/// Renders the session line and the numbered task list.
pub fn render_list(snapshot: &Snapshot) -> String {
    let mut out = format!("session: {}\n", snapshot.session);
    if snapshot.tasks.is_empty() {
        out.push_str("  (no tasks)\n");
    }
    for (i, view) in snapshot.tasks.iter().enumerate() {
        let check = match view.task.status {
            TaskStatus::Todo => ' ',
            TaskStatus::Done => 'x',
        };
        let cursor = if snapshot.edit_selection.as_ref() == Some(&view.task.id) {
            '>'
        } else {
            ' '
        };
        let _ = write!(out, "{cursor}{:>3}. [{check}] {}", i + 1, view.task.title);
        match &view.sync {
            SyncState::Clean => {}
            SyncState::Pending => out.push_str("  (saving)"),
            SyncState::Failed(reason) => {
                let _ = write!(out, "  (not saved: {reason})");
            }
        }
        out.push('\n');
        if !view.task.description.is_empty() {
            let _ = writeln!(out, "        {}", view.task.description);
        }
    }
    out
}

/// One line describing a store event.
pub fn render_event(event: &StoreEvent) -> String {
    match event {
        StoreEvent::PersistenceFailed { task_id, op, reason } => {
            format!("! {op} of task {task_id} failed: {reason} (will retry)")
        }
        StoreEvent::RemoteMerged(summary) => format!(
            "~ synced: {} added, {} updated, {} removed",
            summary.added, summary.updated, summary.removed
        ),
    }
}

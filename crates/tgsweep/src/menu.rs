use std::io::{self, BufRead, Write};

use tokio::task::block_in_place;

use tgsweep_core::{
    catalog::{InactiveGroups, ScannedGroup, SessionStore},
    domain::{GroupHandle, GroupId},
    engine::Engine,
    lifecycle::{Intent, Outcome, Prompt},
    primitives::Progress,
    Result,
};

const PREVIEW_MESSAGES: usize = 5;
const PREVIEW_CHARS: usize = 60;

const HELP: &str = "\
commands:
  list          groups where you have messages
  inactive      groups and channels without your messages
  delete <n>    delete your messages in entry n of `list`, then maybe leave
  leave <n>     leave entry n of `inactive`
  role <n>      show your role in entry n of the last list
  reload        rescan dialogs (forgets what was handled)
  quit";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    List,
    Inactive,
    Delete(usize),
    Leave(usize),
    Role(usize),
    Reload,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> std::result::Result<Command, String> {
    let mut parts = line.trim().splitn(2, char::is_whitespace);
    let cmd = parts.next().unwrap_or("").to_lowercase();
    let arg = parts.next().unwrap_or("").trim();

    let index = || -> std::result::Result<usize, String> {
        match arg.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(format!("`{cmd}` needs an entry number, e.g. `{cmd} 1`")),
        }
    };

    match cmd.as_str() {
        "list" | "l" => Ok(Command::List),
        "inactive" | "i" => Ok(Command::Inactive),
        "delete" | "d" => index().map(Command::Delete),
        "leave" => index().map(Command::Leave),
        "role" | "r" => index().map(Command::Role),
        "reload" => Ok(Command::Reload),
        "help" | "?" | "" => Ok(Command::Help),
        "quit" | "q" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command `{other}`, try `help`")),
    }
}

pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut out: String = flat.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

fn prompt_text(p: Prompt, handle: &GroupHandle) -> String {
    match p {
        Prompt::DeleteMessages => format!("Delete your messages in \"{}\"?", handle.title),
        Prompt::Leave => format!("Leave \"{}\"?", handle.title),
        Prompt::DeleteGroup => format!(
            "Going ahead DELETES the {kind} \"{}\": every member's messages are \
             deleted, every member is removed, then the {kind} itself is deleted. \
             This cannot be undone. Continue?",
            handle.title,
            kind = handle.kind.label(),
        ),
        Prompt::AdminLeave => format!(
            "You are an admin of \"{}\". Continue anyway?",
            handle.title
        ),
    }
}

fn progress_line(p: &Progress) -> Option<String> {
    match p {
        Progress::StepStarted(step) => Some(format!("  {}...", step.label())),
        Progress::PageDeleted { page, total, .. } => {
            Some(format!("  page {page}: {total} deleted so far"))
        }
        Progress::PageFailed { page, .. } => Some(format!("  page {page}: delete failed")),
        Progress::MemberRemoved { removed, of } => Some(format!("  removed {removed}/{of}")),
        Progress::MemberFailed { .. } => None,
    }
}

fn outcome_line(o: &Outcome) -> String {
    let r = o.report();
    match o {
        Outcome::Left { via, .. } => format!("left ({})", via.name()),
        Outcome::Deleted { .. } => format!(
            "deleted: {} messages, {} members removed",
            r.messages_drained, r.members_removed
        ),
        Outcome::Aborted { .. } if r.own_messages_deleted > 0 => {
            format!("deleted {} of your messages, stayed", r.own_messages_deleted)
        }
        Outcome::Aborted { .. } => "nothing done".to_string(),
        Outcome::PartialFailure(f) => format!("FAILED: {f}"),
    }
}

/// Blocking line read from stdin. `None` on EOF.
fn read_line() -> Option<String> {
    block_in_place(|| {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    })
}

fn ask(question: &str) -> bool {
    print!("{question} [y/N] ");
    let _ = io::stdout().flush();
    read_line().is_some_and(|l| matches!(l.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// The menu's view of the last listings; entry numbers refer to these.
#[derive(Default)]
struct Listings {
    with_messages: Vec<ScannedGroup>,
    inactive: Vec<GroupHandle>,
    last: Vec<GroupHandle>,
}

impl Listings {
    /// `cap` is the probe limit; counts at the cap are lower bounds.
    fn show_with_messages(&mut self, groups: Vec<ScannedGroup>, cap: usize) {
        if groups.is_empty() {
            println!("no groups with your messages");
        }
        for (i, g) in groups.iter().enumerate() {
            let count = if g.own_messages >= cap {
                format!("{}+", g.own_messages)
            } else {
                g.own_messages.to_string()
            };
            println!(
                "{:>3}. [{}] {} ({count} messages)",
                i + 1,
                g.handle.kind.label(),
                g.handle.title
            );
        }
        self.last = groups.iter().map(|g| g.handle.clone()).collect();
        self.with_messages = groups;
    }

    fn show_inactive(&mut self, view: InactiveGroups) {
        if view.is_empty() {
            println!("no inactive groups or channels");
        }
        let all: Vec<GroupHandle> = view.groups.into_iter().chain(view.channels).collect();
        for (i, h) in all.iter().enumerate() {
            println!("{:>3}. [{}] {}", i + 1, h.kind.label(), h.title);
        }
        self.last = all.clone();
        self.inactive = all;
    }

    /// Drop a handled group so its entry number can't run it again.
    fn forget(&mut self, id: GroupId) {
        self.with_messages.retain(|g| g.handle.id != id);
        self.inactive.retain(|h| h.id != id);
        self.last.retain(|h| h.id != id);
    }
}

fn pick<T: Clone>(items: &[T], n: usize) -> Option<T> {
    let item = items.get(n - 1).cloned();
    if item.is_none() {
        println!("no entry {n}; list first");
    }
    item
}

async fn run_flow(engine: &Engine, store: &mut SessionStore, handle: &GroupHandle, intent: Intent) {
    let outcome = engine
        .run_leave_or_delete_flow(
            store,
            handle,
            intent,
            &mut |p| ask(&prompt_text(p, handle)),
            &mut |p| {
                if let Some(line) = progress_line(&p) {
                    println!("{line}");
                }
            },
        )
        .await;
    println!("{}: {}", handle.title, outcome_line(&outcome));
}

/// Read commands until `quit` or EOF.
pub async fn run(engine: &Engine) -> Result<()> {
    let mut store = SessionStore::new();
    let mut lists = Listings::default();
    let cap = engine.config().probe_limit;
    println!("{HELP}");

    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let Some(line) = read_line() else {
            return Ok(());
        };
        let cmd = match parse_command(&line) {
            Ok(cmd) => cmd,
            Err(msg) => {
                println!("{msg}");
                continue;
            }
        };

        match cmd {
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(()),
            Command::List | Command::Reload => {
                let force = cmd == Command::Reload;
                match engine.scan_with_messages(&mut store, force).await {
                    Ok(groups) => lists.show_with_messages(groups, cap),
                    Err(e) => println!("scan failed: {e}"),
                }
            }
            Command::Inactive => match engine.scan_inactive(&mut store, false).await {
                Ok(view) => lists.show_inactive(view),
                Err(e) => println!("scan failed: {e}"),
            },
            Command::Role(n) => {
                if let Some(h) = pick(&lists.last, n) {
                    let role = engine.resolve_role(&h).await;
                    println!("{}: {}", h.title, role.label());
                }
            }
            Command::Delete(n) => {
                let Some(g) = pick(&lists.with_messages, n) else {
                    continue;
                };
                match engine.preview_own_messages(&g.handle, PREVIEW_MESSAGES).await {
                    Ok(msgs) => {
                        for m in msgs {
                            println!("  - {}", truncate_preview(&m.text, PREVIEW_CHARS));
                        }
                    }
                    Err(e) => println!("  (preview unavailable: {e})"),
                }
                run_flow(engine, &mut store, &g.handle, Intent::DeleteMessagesThenMaybeLeave)
                    .await;
                lists.forget(g.handle.id);
            }
            Command::Leave(n) => {
                if let Some(h) = pick(&lists.inactive, n) {
                    run_flow(engine, &mut store, &h, Intent::Leave).await;
                    lists.forget(h.id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgsweep_core::domain::{EntityRef, GroupKind};

    fn group(id: i64, kind: GroupKind) -> GroupHandle {
        GroupHandle {
            id: GroupId(id),
            title: format!("group {id}"),
            kind,
            last_activity: None,
            entity: EntityRef(Default::default()),
        }
    }

    #[test]
    fn parse_command_accepts_aliases_and_numbers() {
        assert_eq!(parse_command("list\n"), Ok(Command::List));
        assert_eq!(parse_command("  I "), Ok(Command::Inactive));
        assert_eq!(parse_command("delete 3"), Ok(Command::Delete(3)));
        assert_eq!(parse_command("leave   12"), Ok(Command::Leave(12)));
        assert_eq!(parse_command("r 1"), Ok(Command::Role(1)));
        assert_eq!(parse_command(""), Ok(Command::Help));
        assert_eq!(parse_command("q"), Ok(Command::Quit));
    }

    #[test]
    fn parse_command_rejects_bad_input() {
        assert!(parse_command("delete").is_err());
        assert!(parse_command("delete 0").is_err());
        assert!(parse_command("leave x").is_err());
        assert!(parse_command("frobnicate").is_err());
    }

    #[test]
    fn truncate_preview_flattens_and_cuts() {
        assert_eq!(truncate_preview("hello\n  world", 60), "hello world");
        let long = "ж".repeat(70);
        let t = truncate_preview(&long, 60);
        assert_eq!(t.chars().count(), 63);
        assert!(t.ends_with("..."));
    }

    #[test]
    fn delete_group_prompt_spells_out_the_teardown() {
        let h = group(5, GroupKind::Channel);
        let text = prompt_text(Prompt::DeleteGroup, &h);
        assert!(text.contains("group 5"));
        assert!(text.contains("DELETES the channel"));
        assert!(text.contains("every member is removed"));
        assert_ne!(text, prompt_text(Prompt::Leave, &h));
    }

    #[test]
    fn handled_group_drops_out_of_every_listing() {
        let mut lists = Listings::default();
        lists.show_with_messages(
            vec![
                ScannedGroup {
                    handle: group(1, GroupKind::BasicGroup),
                    own_messages: 3,
                },
                ScannedGroup {
                    handle: group(2, GroupKind::Channel),
                    own_messages: 100,
                },
            ],
            100,
        );
        lists.inactive = vec![group(2, GroupKind::Channel), group(3, GroupKind::Channel)];

        lists.forget(GroupId(2));

        assert_eq!(lists.with_messages.len(), 1);
        assert_eq!(lists.with_messages[0].handle.id, GroupId(1));
        assert_eq!(lists.last, vec![group(1, GroupKind::BasicGroup)]);
        assert_eq!(lists.inactive, vec![group(3, GroupKind::Channel)]);
        assert!(pick(&lists.with_messages, 2).is_none());
    }
}

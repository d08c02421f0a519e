//! Line commands accepted by the interactive edit session

/// Which listing entry `select` refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Zero-based position in the last listing
    Index(usize),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Publish(Option<String>),
    Comment(String),
    Open(String),
    New(String),
    Rename(String),
    List,
    Select(Selection),
    History(Option<String>),
    Info,
    Help,
    Quit { force: bool },
}

pub const HELP: &str = "\
Commands:
  publish [COMMENT]   send the page to the store
  comment TEXT        set the comment sent with the next publish
  open NAME           load a page from the store
  new NAME            start a blank page
  rename NAME         publish the page under a new name
  list                show the store listing
  select N|NAME       open a listing entry and refresh the listing
  history [NAME]      show the version listing of a page
  info                show the session state
  help                show this help
  quit                leave (quit! discards unpublished changes)";

fn required(command: &str, argument: &str) -> Result<String, String> {
    if argument.is_empty() {
        Err(format!("usage: {} NAME", command))
    } else {
        Ok(argument.to_string())
    }
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    let optional = || (!rest.is_empty()).then(|| rest.to_string());

    let command = match verb {
        "publish" | "p" => ConsoleCommand::Publish(optional()),
        "comment" => ConsoleCommand::Comment(rest.to_string()),
        "open" | "o" => ConsoleCommand::Open(required(verb, rest)?),
        "new" => ConsoleCommand::New(required(verb, rest)?),
        "rename" => ConsoleCommand::Rename(required(verb, rest)?),
        "list" | "ls" => ConsoleCommand::List,
        "select" | "s" => {
            let target = required(verb, rest)?;
            match target.parse::<usize>() {
                Ok(0) => return Err("listing entries are numbered from 1".to_string()),
                Ok(number) => ConsoleCommand::Select(Selection::Index(number - 1)),
                Err(_) => ConsoleCommand::Select(Selection::Name(target)),
            }
        }
        "history" => ConsoleCommand::History(optional()),
        "info" => ConsoleCommand::Info,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "q" | "exit" => ConsoleCommand::Quit { force: false },
        "quit!" | "q!" => ConsoleCommand::Quit { force: true },
        other => return Err(format!("unknown command '{}', try 'help'", other)),
    };
    Ok(Some(command))
}

//! Command-line front end for Navi.
//!
//! # Responsibility
//! - Map flags and environment variables onto `NaviConfig`.
//! - Sign the `--user` account in, run one action and print the result.
//! - Print toasts raised by the action on stderr.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};
use log::info;
use navi_core::{
    ActiveScreen, App, AuthUser, NaviConfig, Note, NoteBody, NoteDraft, NoteKind,
    PreferencesPatch, Storage, TaskListPatch, ThemeMode,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Database file.
    #[arg(long, env = "NAVI_DB", value_hint = ValueHint::FilePath, default_value = "./navi.db")]
    db: PathBuf,

    /// Account id to act as.
    #[arg(short, long, env = "NAVI_USER", default_value = "local")]
    user: String,

    #[arg(long, env = "NAVI_EMAIL")]
    email: Option<String>,

    /// IANA zone overriding the stored preference.
    #[arg(long, env = "NAVI_TIMEZONE")]
    timezone: Option<String>,

    /// Write rolling log files here instead of stderr.
    #[arg(long, env = "NAVI_LOG_DIR", value_hint = ValueHint::DirPath)]
    log_dir: Option<PathBuf>,

    #[arg(long, env = "NAVI_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the account profile with default preferences.
    Signup,
    /// Show every list with its tasks.
    Lists,
    #[command(subcommand)]
    List(ListCommand),
    #[command(subcommand)]
    Task(TaskCommand),
    /// Start a challenge from a list.
    Activate { list_id: String },
    /// Stop the running challenge.
    Deactivate,
    /// Show the running challenge for today.
    Today,
    #[command(subcommand)]
    Note(NoteCommand),
    /// Show or change preferences.
    Prefs {
        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,
        /// Daily reset time as HH:mm.
        #[arg(long)]
        reset_time: Option<String>,
        #[arg(long)]
        timezone: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ListCommand {
    Create {
        title: String,
        /// Challenge length in days.
        #[arg(short, long, default_value_t = 7)]
        days: u32,
    },
    Edit {
        list_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        days: Option<u32>,
    },
    Delete { list_id: String },
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    Add {
        list_id: String,
        title: String,
        /// Task must be done again every day.
        #[arg(long)]
        daily: bool,
    },
    /// Mark a task of the running challenge done today.
    Done { task_id: String },
    Undo { task_id: String },
    Delete { list_id: String, task_id: String },
    /// Renumber tasks in the given order.
    Reorder {
        list_id: String,
        #[arg(required = true)]
        task_ids: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum NoteCommand {
    Add(NoteArgs),
    Edit {
        note_id: String,
        #[command(flatten)]
        note: NoteArgs,
    },
    List {
        /// Show the archive instead of active notes.
        #[arg(long)]
        archived: bool,
    },
    /// Archive a note, or restore it when already archived.
    Archive { note_id: String },
    Delete { note_id: String },
    Share { note_id: String },
    /// Renumber notes in the given order.
    Reorder {
        #[arg(required = true)]
        note_ids: Vec<String>,
    },
}

#[derive(Args, Debug, Clone)]
struct NoteArgs {
    /// text, link, book, film or quote.
    #[arg(short, long)]
    kind: NoteKind,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    content: Option<String>,
    #[arg(long)]
    url: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    image: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    year: Option<i32>,
    #[arg(long)]
    text: Option<String>,
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    annotation: Option<String>,
}

impl NoteArgs {
    fn into_draft(self) -> NoteDraft {
        let body = match self.kind {
            NoteKind::Text => NoteBody::Text {
                title: self.title.unwrap_or_default(),
                content: self.content.unwrap_or_default(),
            },
            NoteKind::Link => NoteBody::Link {
                url: self.url.unwrap_or_default(),
                title: self.title,
                description: self.description,
                image: self.image,
            },
            NoteKind::Book => NoteBody::Book {
                title: self.title.unwrap_or_default(),
                author: self.author.unwrap_or_default(),
            },
            NoteKind::Film => NoteBody::Film {
                title: self.title.unwrap_or_default(),
                year: self.year,
            },
            NoteKind::Quote => NoteBody::Quote {
                text: self.text.unwrap_or_default(),
                author: self.author,
                source: self.source,
            },
        };
        NoteDraft {
            body,
            annotation: self.annotation,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ThemeArg {
    Light,
    Dark,
    System,
}

impl From<ThemeArg> for ThemeMode {
    fn from(value: ThemeArg) -> Self {
        match value {
            ThemeArg::Light => ThemeMode::Light,
            ThemeArg::Dark => ThemeMode::Dark,
            ThemeArg::System => ThemeMode::System,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    // The core only accepts absolute log directories.
    let log_dir = match &cli.log_dir {
        Some(dir) if dir.is_relative() => Some(std::env::current_dir()?.join(dir)),
        other => other.clone(),
    };
    let config = NaviConfig::new(Storage::File(cli.db.clone()))
        .with_log_level(&cli.log_level)?
        .with_log_dir(log_dir)
        .with_timezone(cli.timezone.as_deref())?;
    config.init_logging()?;
    let app = config.build_app()?;

    let result = run(&app, &cli);
    for toast in app.notifications().drain() {
        eprintln!("[{}] {}", toast.kind, toast.message);
    }
    result
}

fn run(app: &App, cli: &Cli) -> Result<()> {
    let email = cli.email.clone().unwrap_or_default();
    let user = AuthUser::new(cli.user.as_str(), email.as_str());
    if let Command::Signup = cli.command {
        if email.trim().is_empty() {
            bail!("--email is required to sign up");
        }
        let profile = app.sign_up(user)?;
        println!("signed up {} <{}>", profile.id, profile.email);
        return Ok(());
    }
    app.sign_in(user)
        .with_context(|| format!("signing in as {}", cli.user))?;
    info!(
        "event=cli_command module=cli status=start user_id={} command={:?}",
        cli.user, cli.command
    );

    match &cli.command {
        Command::Signup => {}
        Command::Lists => print_lists(app),
        Command::List(command) => run_list(app, command)?,
        Command::Task(command) => run_task(app, command)?,
        Command::Activate { list_id } => app.activate_list(list_id)?,
        Command::Deactivate => app.deactivate_list()?,
        Command::Today => print_today(app)?,
        Command::Note(command) => run_note(app, command)?,
        Command::Prefs {
            theme,
            reset_time,
            timezone,
        } => {
            let patch = PreferencesPatch {
                theme: theme.map(ThemeMode::from),
                reset_time: reset_time.clone(),
                timezone: timezone.clone(),
            };
            let preferences = if patch.is_empty() {
                app.session().preferences()
            } else {
                app.update_preferences(patch)?
            };
            println!(
                "theme={:?} reset_time={} timezone={}",
                preferences.theme, preferences.reset_time, preferences.timezone
            );
        }
    }
    Ok(())
}

fn run_list(app: &App, command: &ListCommand) -> Result<()> {
    match command {
        ListCommand::Create { title, days } => {
            let id = app.create_list(title, *days)?;
            println!("{id}");
        }
        ListCommand::Edit {
            list_id,
            title,
            days,
        } => app.update_list(
            list_id,
            TaskListPatch {
                title: title.clone(),
                duration: *days,
            },
        )?,
        ListCommand::Delete { list_id } => app.delete_list(list_id)?,
    }
    Ok(())
}

fn run_task(app: &App, command: &TaskCommand) -> Result<()> {
    match command {
        TaskCommand::Add {
            list_id,
            title,
            daily,
        } => {
            let task = app.add_task(list_id, title, *daily)?;
            println!("{}", task.id);
        }
        TaskCommand::Done { task_id } => {
            app.set_task_done(task_id, true)?;
        }
        TaskCommand::Undo { task_id } => {
            app.set_task_done(task_id, false)?;
        }
        TaskCommand::Delete { list_id, task_id } => app.delete_task(list_id, task_id)?,
        TaskCommand::Reorder { list_id, task_ids } => app.reorder_tasks(list_id, task_ids)?,
    }
    Ok(())
}

fn run_note(app: &App, command: &NoteCommand) -> Result<()> {
    match command {
        NoteCommand::Add(args) => {
            let id = app.create_note(&args.clone().into_draft())?;
            println!("{id}");
        }
        NoteCommand::Edit { note_id, note } => {
            app.update_note(note_id, &note.clone().into_draft())?
        }
        NoteCommand::List { archived } => {
            app.set_show_archived(*archived);
            for note in app.session().notes().visible_notes() {
                print_note(&note);
            }
        }
        NoteCommand::Archive { note_id } => {
            app.toggle_archive(note_id)?;
        }
        NoteCommand::Delete { note_id } => app.delete_note(note_id)?,
        NoteCommand::Share { note_id } => {
            let shared = app.share_note(note_id)?;
            println!("{}", shared.text);
            if let Some(url) = shared.url {
                println!("{url}");
            }
        }
        NoteCommand::Reorder { note_ids } => app.reorder_notes(note_ids)?,
    }
    Ok(())
}

fn print_lists(app: &App) {
    for list in app.session().lists().lists() {
        println!("{}  {} ({} days)", list.id, list.title, list.duration);
        let mut tasks = list.tasks;
        tasks.sort_by_key(|task| task.order);
        for task in tasks {
            let cadence = if task.reset_daily { "daily" } else { "once" };
            println!("    {}  {} [{cadence}]", task.id, task.title);
        }
    }
}

fn print_today(app: &App) -> Result<()> {
    match app.active_view()? {
        ActiveScreen::Idle => println!("no active list"),
        ActiveScreen::SourceMissing { list_title } => {
            println!("\"{list_title}\" was deleted; deactivate it to start another list")
        }
        ActiveScreen::Challenge(view) => {
            let status = if view.day.expired { " (finished)" } else { "" };
            println!(
                "{}: day {} of {}{status}",
                view.list_title, view.day.current_day, view.day.total_days
            );
            println!(
                "{}/{} done ({}%) on {}",
                view.progress.completed, view.progress.total, view.progress.percentage, view.today
            );
            for row in view.tasks {
                let mark = if row.done { "x" } else { " " };
                println!("  [{mark}] {}  {}", row.task.id, row.task.title);
            }
        }
    }
    Ok(())
}

fn print_note(note: &Note) {
    let annotation = note
        .annotation
        .as_deref()
        .map(|text| format!("  ({text})"))
        .unwrap_or_default();
    println!(
        "{}  [{}] {}{annotation}",
        note.id,
        note.kind(),
        note.body.headline()
    );
}

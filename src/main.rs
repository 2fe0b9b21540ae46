use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};
use tracing::error;

use taskdash::{
    admin::{load_admin_stats, AdminView},
    auth::{self, LoginForm, RegisterForm},
    config::Config,
    logging::init_logging,
    render::{render_html, render_text},
    session::{FileStorage, Session, SessionError},
    ui::{run_board, BoardExit},
    ApiClient, ApiError, Flow, SessionStore, TaskForm, TaskListController, TaskPriority,
    TaskStatus,
};

const SIGNED_OUT: &str = "Signed out. Run `taskdash login <username>` to sign in.";

fn cli() -> Command {
    let task_fields = |cmd: Command, required: bool| {
        cmd.arg(
            Arg::new("title")
                .long("title")
                .required(required)
                .help("Task title"),
        )
        .arg(
            Arg::new("description")
                .long("description")
                .help("Task description"),
        )
        .arg(
            Arg::new("priority")
                .long("priority")
                .value_parser(["low", "medium", "high"])
                .help("Task priority"),
        )
        .arg(
            Arg::new("status")
                .long("status")
                .value_parser(["pending", "in_progress", "completed"])
                .help("Task status"),
        )
    };

    Command::new("taskdash")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Command-line dashboard for a task-tracking server")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .env("TASKDASH_CONFIG")
                .help("Config file"),
        )
        .arg(
            Arg::new("api-url")
                .long("api-url")
                .global(true)
                .env("TASKDASH_API_URL")
                .help("Base URL of the task API"),
        )
        .arg(
            Arg::new("session-file")
                .long("session-file")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .env("TASKDASH_SESSION_FILE")
                .help("Where the sign-in session is kept"),
        )
        .subcommand_required(true)
        .subcommand(Command::new("init").about("Write a default config file"))
        .subcommand(
            Command::new("login")
                .about("Sign in")
                .arg(Arg::new("username").required(true))
                .arg(
                    Arg::new("password")
                        .long("password")
                        .env("TASKDASH_PASSWORD")
                        .hide_env_values(true),
                ),
        )
        .subcommand(
            Command::new("register")
                .about("Create an account")
                .arg(Arg::new("username").required(true))
                .arg(Arg::new("email").required(true))
                .arg(
                    Arg::new("password")
                        .long("password")
                        .env("TASKDASH_PASSWORD")
                        .hide_env_values(true),
                ),
        )
        .subcommand(Command::new("logout").about("Sign out"))
        .subcommand(Command::new("whoami").about("Show the signed-in user"))
        .subcommand(
            Command::new("list")
                .about("List a page of tasks")
                .arg(
                    Arg::new("page")
                        .long("page")
                        .default_value("0")
                        .value_parser(value_parser!(usize)),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .action(ArgAction::SetTrue)
                        .help("Print an HTML fragment instead of text"),
                ),
        )
        .subcommand(task_fields(Command::new("add").about("Create a task"), true))
        .subcommand(task_fields(
            Command::new("edit")
                .about("Replace a task's fields; omitted fields keep their value")
                .arg(Arg::new("id").required(true).value_parser(value_parser!(i64))),
            false,
        ))
        .subcommand(
            Command::new("delete")
                .about("Delete a task")
                .arg(Arg::new("id").required(true).value_parser(value_parser!(i64)))
                .arg(
                    Arg::new("yes")
                        .long("yes")
                        .short('y')
                        .action(ArgAction::SetTrue)
                        .help("Don't ask for confirmation"),
                ),
        )
        .subcommand(Command::new("stats").about("Show system statistics (admin only)"))
        .subcommand(Command::new("board").about("Open the interactive board"))
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] taskdash::config::ConfigError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Failed to delete task: {0}")]
    Delete(ApiError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("{0}")]
    SignedOut(&'static str),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_logging();
    let matches = cli().get_matches();
    match run(&matches).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(matches: &ArgMatches) -> Result<(), CliError> {
    let config_path = match matches.get_one::<PathBuf>("config") {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };

    if let Some(("init", _)) = matches.subcommand() {
        if Config::init(&config_path)? {
            println!("Config written to {}", config_path.display());
        } else {
            println!("Config already exists at {}", config_path.display());
        }
        return Ok(());
    }

    let mut config = Config::load(&config_path)?;
    if let Some(url) = matches.get_one::<String>("api-url") {
        config.api_url = url.clone();
    }
    if let Some(path) = matches.get_one::<PathBuf>("session-file") {
        config.session_file = Some(path.clone());
    }
    let session = SessionStore::new(FileStorage::new(config.session_path()?));
    let api = ApiClient::new(&config.api_url, session);

    match matches.subcommand() {
        Some(("login", sub)) => {
            let form = LoginForm {
                username: required(sub, "username"),
                password: password(sub)?,
            };
            let session = auth::login(&api, &form).await?;
            println!("Welcome, {}!", session.username);
        }
        Some(("register", sub)) => {
            let form = RegisterForm {
                username: required(sub, "username"),
                email: required(sub, "email"),
                password: password(sub)?,
            };
            auth::register(&api, &form).await?;
            println!("Account created successfully! Please login.");
        }
        Some(("logout", _)) => {
            api.logout().await?;
            println!("Signed out.");
        }
        Some((command, sub)) => {
            // Everything below needs a session.
            let session = match api.session().require_session() {
                Ok(session) => session,
                Err(SessionError::NotSignedIn) => return Err(CliError::SignedOut(SIGNED_OUT)),
                Err(err) => return Err(err.into()),
            };
            run_authenticated(&api, &session, command, sub).await?;
        }
        None => {}
    }
    Ok(())
}

async fn run_authenticated(
    api: &ApiClient,
    session: &Session,
    command: &str,
    sub: &ArgMatches,
) -> Result<(), CliError> {
    let mut controller = TaskListController::new(api);
    let flow = match command {
        "whoami" => {
            println!("{} ({})", session.username, session.role.as_str());
            Flow::Done
        }
        "list" => {
            let page = sub.get_one::<usize>("page").copied().unwrap_or(0);
            let flow = controller.load_page(page).await?;
            if let Some(view) = controller.view() {
                if sub.get_flag("html") {
                    print!("{}", render_html(view));
                } else {
                    print!("{}", render_text(view));
                }
            }
            flow
        }
        "add" => {
            let mut form = TaskForm::default();
            apply_fields(sub, &mut form);
            let flow = controller.create_task(&mut form).await?;
            if flow == Flow::Done {
                println!("Task created.");
            }
            flow
        }
        "edit" => {
            let id = sub.get_one::<i64>("id").copied().unwrap_or_default();
            match controller.fetch_task(id).await? {
                Some(task) => {
                    let mut form = TaskForm::from_task(&task);
                    apply_fields(sub, &mut form);
                    let flow = controller.update_task(id, &form).await?;
                    if flow == Flow::Done {
                        println!("Task {id} updated.");
                    }
                    flow
                }
                None => Flow::SignedOut,
            }
        }
        "delete" => {
            let id = sub.get_one::<i64>("id").copied().unwrap_or_default();
            let skip_prompt = sub.get_flag("yes");
            let flow = controller
                .delete_task(id, &mut |message: &str| skip_prompt || ask(message))
                .await
                .map_err(CliError::Delete)?;
            match flow {
                Flow::Done => println!("Task {id} deleted."),
                Flow::Cancelled => println!("Nothing deleted."),
                Flow::SignedOut => {}
            }
            flow
        }
        "stats" => match load_admin_stats(api).await? {
            Some(AdminView::Stats(stats)) => {
                println!("Admin: {}", session.username);
                println!("Total users:     {}", stats.total_users);
                println!("Total tasks:     {}", stats.total_tasks);
                println!("Completed tasks: {}", stats.completed_tasks);
                println!("Completion rate: {}%", stats.completion_rate());
                Flow::Done
            }
            Some(AdminView::AccessDenied) => {
                println!("Access denied: administrator privileges are required.");
                Flow::Done
            }
            None => Flow::SignedOut,
        },
        "board" => board(&mut controller).await?,
        _ => Flow::Done,
    };

    if flow == Flow::SignedOut {
        return Err(CliError::SignedOut(SIGNED_OUT));
    }
    Ok(())
}

async fn board(controller: &mut TaskListController<'_>) -> Result<Flow, CliError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_board(&mut terminal, controller).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    Ok(match result? {
        BoardExit::Quit => Flow::Done,
        BoardExit::SignedOut => Flow::SignedOut,
    })
}

fn apply_fields(sub: &ArgMatches, form: &mut TaskForm) {
    if let Some(title) = sub.get_one::<String>("title") {
        form.title = title.clone();
    }
    if let Some(description) = sub.get_one::<String>("description") {
        form.description = description.clone();
    }
    if let Some(priority) = sub
        .get_one::<String>("priority")
        .and_then(|p| p.parse::<TaskPriority>().ok())
    {
        form.priority = priority;
    }
    if let Some(status) = sub
        .get_one::<String>("status")
        .and_then(|s| s.parse::<TaskStatus>().ok())
    {
        form.status = status;
    }
}

fn required(sub: &ArgMatches, name: &str) -> String {
    sub.get_one::<String>(name).cloned().unwrap_or_default()
}

fn password(sub: &ArgMatches) -> io::Result<String> {
    match sub.get_one::<String>("password") {
        Some(password) => Ok(password.clone()),
        None => prompt("Password: "),
    }
}

fn ask(message: &str) -> bool {
    prompt(&format!("{message} [y/N] "))
        .map(|answer| answer.trim().eq_ignore_ascii_case("y"))
        .unwrap_or(false)
}

fn prompt(message: &str) -> io::Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

use clap::{Parser, Subcommand};
use quire::build::{self, BuildMode};
use quire::cancel::CancelToken;
use quire::events::BuildEvent;
use quire::project::Project;
use quire::serve::{self, DEFAULT_PORT, ServeOptions};
use quire::{output, resources};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Static site generator for documentation")]
#[command(long_about = "\
Static site generator for documentation

A project is a directory of Markdown pages, YAML menus and a theme. Quire
renders it into build/, ready to publish, and can serve it with automatic
rebuild and browser refresh while you write.

Project structure:

  my-docs/
  ├── project.yml                  # Name, description, languages, flags
  ├── menu.yml                     # Menu for the default language
  ├── menu_fr.yml                  # Menu for another language (language: fr)
  ├── content/
  │   ├── index.md                 # → build/index.html
  │   ├── guide/intro.md           # → build/guide/intro.html
  │   ├── fr/intro.md              # language: fr → build/fr/intro.html
  │   └── images/logo.png          # Copied as-is → build/images/logo.png
  └── theme/
      ├── page.html                # Page skeleton
      └── assets/                  # Stylesheets and scripts → build/assets/

Pages may start with a YAML header between `---` lines (title, language,
and any other keys, available to templates as page.header).

Run 'quire new my-docs' to create a starter project.")]
#[command(version = quire::version_string())]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a starter project
    New {
        /// Project directory (created if missing)
        #[arg(default_value = ".")]
        directory: PathBuf,
    },
    /// Build the project into its build/ directory
    Build {
        /// Project directory
        #[arg(default_value = ".")]
        directory: PathBuf,
        /// Skip minification of pages and theme assets
        #[arg(long)]
        dev: bool,
    },
    /// Build, serve and rebuild on change
    Serve {
        /// Project directory
        #[arg(default_value = ".")]
        directory: PathBuf,
        /// Port to listen on
        #[arg(default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Rebuild only when Enter is pressed (true/false)
        #[arg(value_parser = clap::builder::BoolishValueParser::new())]
        manual_rebuild: Option<bool>,
        /// Do not open a browser
        #[arg(long)]
        no_open: bool,
        /// Rebuild plain edits without reloading the project
        #[arg(long)]
        render_only_edits: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quire=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let started = Instant::now();

    match cli.command {
        Command::New { directory } => {
            let written = resources::create_project(&directory)?;
            output::print_new_project(&directory, &written);
        }
        Command::Build { directory, dev } => {
            let directory = directory.canonicalize().unwrap_or(directory);
            let project = Project::load(&directory)?;
            let mode = if dev {
                BuildMode::Preview
            } else {
                BuildMode::Production
            };
            let (tx, printer) = spawn_printer(project.root());
            let result = build::build(&project, mode, &CancelToken::new(), Some(&tx));
            drop(tx);
            join_printer(printer);
            output::print_build_summary(&result?);
        }
        Command::Serve {
            directory,
            port,
            manual_rebuild,
            no_open,
            render_only_edits,
        } => {
            let options = ServeOptions {
                port,
                manual_rebuild: manual_rebuild.unwrap_or(false),
                open_browser: !no_open,
                render_only_edits,
            };
            let (tx, printer) = spawn_printer(&directory);
            let result = serve::serve(&directory, &options, Some(tx));
            join_printer(printer);
            result?;
        }
    }

    output::print_done(started.elapsed());
    Ok(())
}

/// Print build events as they arrive. The thread ends once every sender is
/// dropped.
fn spawn_printer(root: &Path) -> (Sender<BuildEvent>, JoinHandle<()>) {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let (tx, rx) = mpsc::channel::<BuildEvent>();
    let printer = thread::spawn(move || {
        for event in rx {
            for line in output::format_build_event(&event, &root) {
                println!("{}", line);
            }
        }
    });
    (tx, printer)
}

fn join_printer(printer: JoinHandle<()>) {
    if printer.join().is_err() {
        eprintln!("output printer panicked");
    }
}

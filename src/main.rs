use clap::{CommandFactory, Parser, error::ErrorKind};
use directories::ProjectDirs;
use htmldeck::{
    Config, ConfigLoadError, Deck, ExportScope, LogTarget, Location, Presenter, export_headless, init_logging,
};
use std::{
    env, io,
    path::{Path, PathBuf},
};

/// Present HTML slide decks from your terminal.
#[derive(Parser)]
#[command(author, version, about, arg_required_else_help = true)]
struct Cli {
    /// The path to the deck, optionally followed by a `#slide-N` fragment.
    location: Option<String>,

    /// Export every slide as a PDF rather than presenting the deck.
    #[clap(short, long, conflicts_with = "export_slide")]
    export_pdf: bool,

    /// Export a single slide as a PDF rather than presenting the deck.
    #[clap(long, value_name = "SLIDE")]
    export_slide: Option<usize>,

    /// The path the exported PDF is written to.
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Print the slides in the deck as JSON.
    #[clap(long)]
    list_slides: bool,

    /// Write logs into this file.
    #[clap(long)]
    log_file: Option<PathBuf>,

    /// Generate a JSON schema for the configuration file.
    #[clap(long)]
    generate_config_file_schema: bool,

    /// The path to the configuration file.
    #[clap(short, long)]
    config_file: Option<PathBuf>,
}

impl Cli {
    fn export_scope(&self) -> Option<ExportScope> {
        match (self.export_pdf, self.export_slide) {
            (_, Some(slide)) => Some(ExportScope::Slide(slide)),
            (true, None) => Some(ExportScope::All),
            (false, None) => None,
        }
    }
}

fn load_config(config_file_path: Option<PathBuf>) -> Result<Config, Box<dyn std::error::Error>> {
    let explicit = config_file_path.is_some();
    let config_file_path = match config_file_path {
        Some(path) => path,
        None => {
            let configs_path: PathBuf = match env::var("XDG_CONFIG_HOME") {
                Ok(path) => Path::new(&path).join("htmldeck"),
                Err(_) => {
                    let Some(project_dirs) = ProjectDirs::from("", "", "htmldeck") else {
                        return Ok(Config::default());
                    };
                    project_dirs.config_dir().into()
                }
            };
            configs_path.join("config.yaml")
        }
    };
    match Config::load(&config_file_path) {
        Ok(config) => Ok(config),
        Err(ConfigLoadError::NotFound) if !explicit => Ok(Config::default()),
        Err(ConfigLoadError::NotFound) => Err(format!("config file not found: {}", config_file_path.display()).into()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(feature = "json-schema")]
fn print_config_schema() -> Result<(), Box<dyn std::error::Error>> {
    let schema = schemars::schema_for!(Config);
    serde_json::to_writer_pretty(io::stdout(), &schema).map_err(|e| format!("failed to write schema: {e}"))?;
    Ok(())
}

#[cfg(not(feature = "json-schema"))]
fn print_config_schema() -> Result<(), Box<dyn std::error::Error>> {
    Err("htmldeck was built without the json-schema feature".into())
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.generate_config_file_schema {
        return print_config_schema();
    }

    let Some(location) = cli.location.as_deref() else {
        Cli::command().error(ErrorKind::MissingRequiredArgument, "no deck specified").exit();
    };
    let location = Location::parse(location);
    let config = load_config(cli.config_file.clone())?;
    let export_scope = cli.export_scope();
    let headless = export_scope.is_some() || cli.list_slides;
    init_logging(LogTarget::select(headless, cli.log_file.as_deref(), config.defaults.log_file.as_deref()))?;

    let deck = Deck::load(location.path())?;
    if cli.list_slides {
        serde_json::to_writer_pretty(io::stdout(), &deck.metadata())?;
        println!();
    } else if let Some(scope) = export_scope {
        let path = export_headless(deck, location, &config, scope, cli.output)?;
        println!("{}", path.display());
    } else {
        let presenter = Presenter::new(deck, location, &config, cli.output)?;
        let location = presenter.present()?;
        println!("{location}");
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

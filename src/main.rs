//! Basketball total-points prediction CLI
//!
//! Ensemble of Poisson, random forest and ridge estimators over stored game
//! history.

use clap::{Parser, Subcommand};
use hoops::{Config, Result};

#[derive(Parser)]
#[command(name = "hoops")]
#[command(about = "Basketball total-points prediction", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// List known teams
    Teams,
    /// Predict the total points of a game
    Predict {
        /// Home team name or abbreviation
        home: String,
        /// Away team name or abbreviation
        away: String,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
        /// Store the prediction in the database
        #[arg(long)]
        save: bool,
    },
    /// List stored predictions
    History {
        /// Number of predictions to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Record the final total of a stored prediction
    Record {
        /// Prediction id (see `history`)
        id: i64,
        /// Final total points
        total: u32,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Import games from a JSON file
    Import {
        /// Path to a JSON array of games
        file: String,
    },
    /// Show database status
    Status,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use table or json.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Run command
    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::Import { file } => commands::data_import(&config, &file),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Teams => commands::teams(&config),
        Commands::Predict {
            home,
            away,
            format,
            save,
        } => commands::predict(&config, &home, &away, format, save),
        Commands::History { limit } => commands::history(&config, limit),
        Commands::Record { id, total } => commands::record(&config, id, total),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use hoops::data::{import, Database};
    use hoops::predict::{format_prediction, Predictor};
    use hoops::HoopsError;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        // Create data directory
        if let Some(dir) = std::path::Path::new(&config.data.database_path).parent() {
            std::fs::create_dir_all(dir)?;
            println!("Created {}/ directory", dir.display());
        }

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'hoops data import games.json' to load game history");
        println!("  3. Run 'hoops predict \"Team A\" \"Team B\"' to make predictions");

        Ok(())
    }

    pub fn data_import(config: &Config, file: &str) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;

        println!("Importing games from {}...", file);
        let count = import::import_file(&db, file)?;
        println!("Stored {} games in database", count);

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:        {}", config.data.database_path);
        println!("  Teams:       {}", stats.team_count);
        println!("  Games:       {}", stats.game_count);
        println!("  Predictions: {}", stats.prediction_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_game, stats.latest_game) {
            println!("  Range:       {} to {}", earliest, latest);
        }

        Ok(())
    }

    pub fn teams(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let teams = db.get_all_teams()?;

        if teams.is_empty() {
            println!("No teams yet. Run 'hoops data import <file>' first.");
            return Ok(());
        }

        for team in teams {
            println!("{:>4}  {:<5} {}", team.id.0, team.abbreviation, team.name);
        }

        Ok(())
    }

    pub fn predict(
        config: &Config,
        home: &str,
        away: &str,
        format: OutputFormat,
        save: bool,
    ) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let predictor = Predictor::new(db, config.clone());

        let (home_team, away_team, prediction) = predictor.predict_by_name(home, away)?;

        match format {
            OutputFormat::Table => {
                print!(
                    "{}",
                    format_prediction(&prediction, &home_team.name, &away_team.name)
                );
            }
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&prediction)
                    .map_err(|e| HoopsError::Parse(e.to_string()))?;
                println!("{}", json);
            }
        }

        if save {
            let id = predictor.database().save_prediction(&prediction)?;
            println!("Saved prediction #{}", id);
        }

        Ok(())
    }

    pub fn history(config: &Config, limit: usize) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let predictions = db.recent_predictions(limit)?;

        if predictions.is_empty() {
            println!("No stored predictions. Use 'hoops predict --save'.");
            return Ok(());
        }

        println!(
            "{:>5}  {:<19}  {:<24}  {:>7}  {:>5}  {:>6}",
            "ID", "Created", "Matchup", "Total", "Conf", "Actual"
        );
        for p in predictions {
            let matchup = format!(
                "{} @ {}",
                team_label(&db, p.away_team)?,
                team_label(&db, p.home_team)?
            );
            let actual = p
                .actual_total
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "{:>5}  {:<19}  {:<24}  {:>7.1}  {:>4.0}%  {:>6}",
                p.id,
                p.created_at.format("%Y-%m-%d %H:%M:%S"),
                matchup,
                p.predicted_total,
                p.confidence * 100.0,
                actual
            );
        }

        Ok(())
    }

    pub fn record(config: &Config, id: i64, total: u32) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        db.record_actual_total(id, total)?;
        println!("Recorded final total {} for prediction #{}", total, id);
        Ok(())
    }

    fn team_label(db: &Database, id: hoops::TeamId) -> Result<String> {
        match db.get_team(id) {
            Ok(team) => Ok(team.abbreviation),
            Err(HoopsError::TeamNotFound(_)) => Ok(id.to_string()),
            Err(e) => Err(e),
        }
    }
}

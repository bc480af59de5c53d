use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;
use structopt::StructOpt;

use infra::persistence::Storage;
use rustbucks::config::{load_toml, EnvLogger, EnvOverrides};
use rustbucks::menu::DrinkRepository;

#[derive(Debug, StructOpt)]
#[structopt(name = "rb", about = "Rustbucks CLI")]
struct Opt {
    /// Input file
    #[structopt(parse(from_os_str))]
    config: PathBuf,
    #[structopt(subcommand)]
    command: Commands,
}

#[derive(Debug, StructOpt)]
enum Commands {
    #[structopt(name = "setup", about = "Create the schema if it is missing")]
    Setup,
    #[structopt(name = "reset", about = "Drop everything and seed the menu")]
    Reset,
    #[structopt(name = "show-menu", about = "Show menu")]
    ShowMenu,
}

#[derive(Deserialize, Debug)]
struct Config {
    #[serde(flatten)]
    rustbucks: rustbucks::config::Config,
    #[serde(default)]
    env_logger: EnvLogger,
}

fn main() -> Result<()> {
    let opt = Opt::from_args();

    let mut config: Config = load_toml(&opt.config)?;
    config.env_logger.builder().init();
    EnvOverrides::from_env()?.apply(&mut config.rustbucks);

    let db = config.rustbucks.postgres.build()?;
    let mut docs = db.get()?;

    match opt.command {
        Commands::Setup => docs.setup()?,
        Commands::Reset => {
            let water = docs.reset_menu()?;
            println!("Seeded {}: {}", water.id(), water.title());
        }
        Commands::ShowMenu => {
            for drink in docs.list_all()? {
                let recipe = drink
                    .recipe()
                    .iter()
                    .map(|i| format!("{} x {} ({})", i.parts, i.name, i.color))
                    .collect::<Vec<_>>();
                println!("{}: {} [{}]", drink.id(), drink.title(), recipe.join(", "));
            }
        }
    }

    Ok(())
}

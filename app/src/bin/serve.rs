use std::net::SocketAddr;
use std::path::PathBuf;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use log::*;
use serde::Deserialize;
use structopt::StructOpt;

use rustbucks::config::{load_toml, EnvLogger, EnvOverrides};

#[derive(Debug, StructOpt)]
#[structopt(name = "serve", about = "Serve Rustbucks.")]
struct Opt {
    /// Input file
    #[structopt(parse(from_os_str))]
    config: PathBuf,
}

#[derive(Deserialize, Debug)]
struct Config {
    #[serde(flatten)]
    rustbucks: rustbucks::config::Config,
    listener: Listener,
    #[serde(default)]
    env_logger: EnvLogger,
}

#[derive(Deserialize, Debug)]
struct Listener {
    addr: SocketAddr,
}

#[actix_web::main]
async fn main() -> Result<()> {
    let opt = Opt::from_args();

    let mut config: Config = load_toml(&opt.config)?;
    config.env_logger.builder().init();
    debug!("Options: {:?}", opt);

    let env = EnvOverrides::from_env()?;
    env.apply(&mut config.rustbucks);
    let addr = env.listen_addr()?.unwrap_or(config.listener.addr);

    let app = rustbucks::RustBucks::new(&config.rustbucks)?;
    match app.prefetch_keys().await {
        Ok(n) => info!("Loaded {} signing keys", n),
        Err(e) => warn!("Could not prefetch signing keys, will retry on demand: {:#}", e),
    }

    let srv = HttpServer::new(move || {
        App::new()
            .wrap(rustbucks::cors())
            .wrap(Logger::default())
            .configure(|cfg| app.configure(cfg))
            .default_service(web::route().to(rustbucks::error::not_found))
    })
    .bind(addr)
    .with_context(|| format!("bind {}", addr))?;
    info!("Listening on: {:?}", srv.addrs());

    srv.run().await?;
    Ok(())
}

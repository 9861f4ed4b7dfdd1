use std::io;
use std::str::FromStr;

mod app;
mod commands;
mod config;
mod db;
mod error;
mod feed;
mod models;
mod notifier;
mod platform;
mod poller;
mod templates;

use app::App;
use commands::respond;
use config::Config;
use error::{AppError, Result};
use feed::FeedSource;

const USAGE: &str = "usage:
  amelia                                   run the poller until Ctrl-C
  amelia --refresh                         poll once and exit
  amelia --subscribe <author|series> <id> <channel> <server> <name>
  amelia --unsubscribe <server> <unique>
  amelia --list <server>
  amelia --mention <server> <unique> <role>
  amelia --unmention <server> <unique> <role>
  amelia --forget-channel <channel>";

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration; the log file location lives in it
    let config = Config::load()?;

    init_logging(config.log_file.as_deref());
    if let Some(path) = &config.created_file {
        tracing::info!("Wrote default config to {}", path.display());
    }

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();
    let flag = args.get(1).map(String::as_str);

    if matches!(flag, Some("--help") | Some("-h")) {
        println!("{USAGE}");
        return Ok(());
    }

    let app = App::new(&config).await?;

    match flag {
        None => {
            tracing::info!(
                "Polling every {}s, press Ctrl-C to stop",
                config.poll_interval_secs
            );
            app.poller
                .run(config.poll_interval(), async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Unable to listen for Ctrl-C: {}", e);
                    }
                })
                .await;
        }
        Some("--refresh") => {
            let report = app.poller.poll_once().await?;
            println!(
                "Delivered {} updates ({} skipped, {} feeds failed, {} subscriptions paused)",
                report.delivered, report.skipped, report.failed_feeds, report.paused
            );
        }
        Some("--subscribe") => {
            let kind: String = arg(&args, 2, "kind")?;
            let id: String = arg(&args, 3, "id")?;
            let source = FeedSource::from_parts(&kind, &id)?;
            let channel = arg(&args, 4, "channel")?;
            let server = arg(&args, 5, "server")?;
            let name = args.get(6..).map(|rest| rest.join(" ")).unwrap_or_default();
            if name.is_empty() {
                return Err(usage_error("name"));
            }

            println!("{}", templates::NEUTRAL_LOADING);
            let result = app
                .commands
                .register(&App::operator(server), source, channel, &name)
                .await;
            println!("{}", respond(result));
        }
        Some("--unsubscribe") => {
            let server = arg(&args, 2, "server")?;
            let unique = arg(&args, 3, "unique")?;
            let result = app.commands.unregister(&App::operator(server), unique).await;
            println!("{}", respond(result));
        }
        Some("--list") => {
            let server = arg(&args, 2, "server")?;
            println!("{}", respond(app.commands.list(&App::operator(server)).await));
        }
        Some(flag @ ("--mention" | "--unmention")) => {
            let invoker = App::operator(arg(&args, 2, "server")?);
            let unique = arg(&args, 3, "unique")?;
            let role = arg(&args, 4, "role")?;
            let result = if flag == "--mention" {
                app.commands.add_mention(&invoker, unique, role).await
            } else {
                app.commands.remove_mention(&invoker, unique, role).await
            };
            println!("{}", respond(result));
        }
        Some("--forget-channel") => {
            let channel = arg(&args, 2, "channel")?;
            let removed = app.commands.forget_channel(channel).await?;
            println!("Removed {removed} subscriptions");
        }
        Some(other) => {
            eprintln!("unknown flag {other}\n{USAGE}");
        }
    }

    Ok(())
}

fn usage_error(what: &str) -> AppError {
    AppError::Other(anyhow::anyhow!("missing or invalid <{what}>\n{USAGE}"))
}

fn arg<T: FromStr>(args: &[String], index: usize, what: &str) -> Result<T> {
    args.get(index)
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| usage_error(what))
}

/// Logs to stderr and, when configured, appends to a log file as well.
fn init_logging(log_file: Option<&str>) {
    use std::fs::OpenOptions;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    let file = log_file.and_then(|path| {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(Arc::new(Mutex::new(file))),
            Err(err) => {
                eprintln!("Warning: unable to open {path}: {err}");
                None
            }
        }
    });

    struct DualWriter {
        file: Option<Arc<Mutex<std::fs::File>>>,
    }

    impl Write for DualWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(file) = &self.file {
                if let Ok(mut file) = file.lock() {
                    let _ = file.write_all(buf);
                }
            }
            std::io::stderr().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            if let Some(file) = &self.file {
                if let Ok(mut file) = file.lock() {
                    let _ = file.flush();
                }
            }
            std::io::stderr().flush()
        }
    }

    impl<'a> MakeWriter<'a> for DualWriter {
        type Writer = DualWriter;

        fn make_writer(&'a self) -> Self::Writer {
            DualWriter {
                file: self.file.clone(),
            }
        }
    }

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        if let Ok(directive) = "amelia=info".parse() {
            env_filter = env_filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(DualWriter { file })
        .init();
}

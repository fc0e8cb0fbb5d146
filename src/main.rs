//! Backtest Client - terminal front end.
//!
//! Submits a backtest to the remote service, waits for the task to finish
//! and prints the performance summary.

use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{Local, Months, NaiveDate};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{error, info};

use backtest_client::platform::SettingValue;
use backtest_client::{
    format_report, init_logger, ApiConfig, BacktestRequest, BacktestRestClient, PollOutcome,
    PollerConfig, TaskPoller, SETTINGS,
};

#[derive(Parser)]
#[command(name = "backtest_client", version, about = "Run strategy backtests on a remote backtest service")]
struct Cli {
    /// Service root, overrides the `api.base_url` setting
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the strategies the service can run
    Strategies,
    /// Submit a backtest and wait for its result
    Run(RunArgs),
    /// Show or change the saved settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print every setting
    Show,
    /// Change one setting and save it to the setting file
    Set {
        key: String,
        #[arg(value_parser = parse_setting_value)]
        value: SettingValue,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Strategy name (defaults to the first strategy the service lists)
    #[arg(long)]
    strategy: Option<String>,

    /// Instrument symbol
    #[arg(long, default_value = "EURUSD")]
    symbol: String,

    /// First day of the backtest, YYYY-MM-DD (defaults to one month before --end)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day of the backtest, YYYY-MM-DD (defaults to today)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Initial cash
    #[arg(long, default_value_t = 10000.0)]
    cash: f64,

    /// Strategy parameter as key=value, repeatable (defaults to pfast=10 pslow=30)
    #[arg(long = "param", value_parser = parse_param)]
    params: Vec<(String, Value)>,
}

/// Parse `key=value`; the value is read as JSON when possible, else kept as a string
fn parse_param(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {:?}", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing parameter name in {:?}", s));
    }
    let value = serde_json::from_str(value.trim()).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Read a setting value as JSON (number, bool, quoted string), else keep the raw text
fn parse_setting_value(s: &str) -> Result<SettingValue, String> {
    Ok(serde_json::from_str(s.trim()).unwrap_or_else(|_| SettingValue::String(s.to_string())))
}

fn default_params() -> Vec<(String, Value)> {
    vec![
        ("pfast".to_string(), Value::from(10)),
        ("pslow".to_string(), Value::from(30)),
    ]
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logger();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    match cli.command {
        Command::Strategies => {
            let poller = connect(cli.base_url)?;
            for name in poller.strategies().await? {
                println!("{}", name);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(args) => run_backtest(connect(cli.base_url)?, args).await,
        Command::Config(command) => run_config(command),
    }
}

/// Build a poller talking to the configured service
fn connect(base_url: Option<String>) -> Result<Arc<TaskPoller<BacktestRestClient>>, Box<dyn Error>> {
    let mut api_config = ApiConfig::from_settings(&SETTINGS);
    if let Some(base_url) = base_url {
        api_config.base_url = base_url;
    }
    let api = Arc::new(BacktestRestClient::new(&api_config)?);
    info!("Using backtest service at {}", api.base_url());

    Ok(Arc::new(TaskPoller::new(api, PollerConfig::from_settings(&SETTINGS))))
}

fn run_config(command: ConfigCommand) -> Result<ExitCode, Box<dyn Error>> {
    match command {
        ConfigCommand::Show => {
            let mut settings: Vec<_> = SETTINGS.get_all().into_iter().collect();
            settings.sort_by(|a, b| a.0.cmp(&b.0));
            for (key, value) in settings {
                println!("{} = {}", key, serde_json::to_string(&value)?);
            }
        }
        ConfigCommand::Set { key, value } => {
            if SETTINGS.get(&key).is_none() {
                return Err(format!("unknown setting {:?}", key).into());
            }
            SETTINGS.set(key.clone(), value);
            SETTINGS.save()?;
            info!("Saved setting {}", key);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_backtest(
    poller: Arc<TaskPoller<BacktestRestClient>>,
    args: RunArgs,
) -> Result<ExitCode, Box<dyn Error>> {
    let strategy = match args.strategy {
        Some(strategy) => strategy,
        None => poller
            .strategies()
            .await?
            .into_iter()
            .next()
            .ok_or("the backtest service offers no strategies")?,
    };

    let end = args.end.unwrap_or_else(|| Local::now().date_naive());
    let start = match args.start {
        Some(start) => start,
        None => end
            .checked_sub_months(Months::new(1))
            .ok_or("cannot compute a start date one month before --end")?,
    };

    let params = if args.params.is_empty() {
        default_params()
    } else {
        args.params
    };

    let request = params.into_iter().fold(
        BacktestRequest::new(strategy, args.symbol, start, end, args.cash)?,
        |req, (key, value)| req.with_param(key, value),
    );

    // Ctrl-C drops the running task; the wait below then ends without an outcome
    let interrupt = {
        let poller = Arc::clone(&poller);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                poller.cancel();
            }
        })
    };

    let outcome = poller.submit_and_wait(request).await;
    interrupt.abort();

    match outcome? {
        Some(PollOutcome::Resolved(result)) => {
            println!("backtest finished");
            print!("{}", format_report(&result));
            Ok(ExitCode::SUCCESS)
        }
        Some(PollOutcome::Failed(failure)) => {
            eprintln!("backtest failed ({}): {}", failure.kind, failure.message);
            Ok(ExitCode::FAILURE)
        }
        None => {
            eprintln!("backtest cancelled");
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("pfast=10").unwrap(), ("pfast".to_string(), Value::from(10)));
        assert_eq!(parse_param("ratio=0.5").unwrap(), ("ratio".to_string(), Value::from(0.5)));
        assert_eq!(parse_param("trend=true").unwrap(), ("trend".to_string(), Value::Bool(true)));
        assert_eq!(
            parse_param("mode=fast").unwrap(),
            ("mode".to_string(), Value::String("fast".to_string()))
        );
        assert!(parse_param("pfast").is_err());
        assert!(parse_param("=10").is_err());
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "backtest_client",
            "run",
            "--strategy",
            "SmaCross",
            "--start",
            "2024-01-01",
            "--end",
            "2024-02-01",
            "--param",
            "pfast=5",
        ])
        .unwrap();

        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.strategy.as_deref(), Some("SmaCross"));
                assert_eq!(args.symbol, "EURUSD");
                assert_eq!(args.cash, 10000.0);
                assert_eq!(args.start, NaiveDate::from_ymd_opt(2024, 1, 1));
                assert_eq!(args.params, vec![("pfast".to_string(), Value::from(5))]);
            }
            _ => panic!("expected run"),
        }

        assert!(Cli::try_parse_from(["backtest_client", "run", "--start", "01/01/2024"]).is_err());
    }

    #[test]
    fn test_config_set_parsing() {
        let cli = Cli::try_parse_from(["backtest_client", "config", "set", "poll.max_failures", "5"]).unwrap();
        match cli.command {
            Command::Config(ConfigCommand::Set { key, value }) => {
                assert_eq!(key, "poll.max_failures");
                assert_eq!(value, SettingValue::Int(5));
            }
            _ => panic!("expected config set"),
        }

        assert_eq!(parse_setting_value("1.5").unwrap(), SettingValue::Float(1.5));
        assert_eq!(parse_setting_value("false").unwrap(), SettingValue::Bool(false));
        assert_eq!(
            parse_setting_value("http://10.0.0.5:8000").unwrap(),
            SettingValue::String("http://10.0.0.5:8000".to_string())
        );
    }
}

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use fisc_agents::TaxConcierge;
use fisc_core::{
    calculate, validate_fiscal_id, validate_personal_id, CalculationRequest, ExtractedEntities,
    IdentifierError, IntentClassification, IntentLabel, RoutingTable, RuleTable, RulesHandle,
};
use fisc_gateways::MockGateways;
use fisc_observability::{init_tracing, AppMetrics};
use serde_json::json;

#[derive(Debug, Parser)]
#[command(name = "fisc")]
#[command(about = "Fisc Concierge CLI")]
struct Cli {
    /// Rule table JSON; built-in 2024 defaults when omitted.
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Routing table JSON; built-in intent mapping when omitted.
    #[arg(long)]
    routes: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Feed classification JSON lines interactively.
    Chat,
    /// Route a single classification and run its handler.
    Route {
        #[arg(long)]
        label: String,
        #[arg(long)]
        confidence: f64,
        /// Extracted entities as JSON, e.g. '{"annual_income": 39600}'.
        #[arg(long)]
        entities: Option<String>,
    },
    Calc {
        #[command(subcommand)]
        command: CalcCommand,
    },
    Validate {
        #[command(subcommand)]
        command: ValidateCommand,
    },
    Pay {
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value = "tax_payment")]
        payment_type: String,
        #[arg(long)]
        reference: Option<String>,
    },
    /// Print the rule table currently in effect.
    Rules,
}

#[derive(Debug, Subcommand)]
enum CalcCommand {
    Pfa {
        #[arg(long)]
        annual_income: f64,
    },
    PropertySale {
        #[arg(long)]
        sale_price: f64,
        #[arg(long)]
        ownership_years: u32,
    },
    Rental {
        #[arg(long)]
        annual_income: Option<f64>,
        #[arg(long)]
        monthly_rent: Option<f64>,
    },
}

#[derive(Debug, Subcommand)]
enum ValidateCommand {
    Cnp { value: String },
    Cui { value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("fisc_cli");
    let cli = Cli::parse();

    let rules = load_rules(cli.rules.as_deref())?;
    let routing = load_routing(cli.routes.as_deref())?;
    let concierge = TaxConcierge::new(
        routing,
        rules,
        Arc::new(MockGateways::new()),
        AppMetrics::shared(),
    );

    match cli.command {
        Command::Chat => run_chat(concierge).await?,
        Command::Route {
            label,
            confidence,
            entities,
        } => {
            let label = IntentLabel::parse(&label)
                .with_context(|| format!("unknown intent label `{label}`"))?;
            let entities = match entities {
                Some(raw) => serde_json::from_str::<ExtractedEntities>(&raw)
                    .context("invalid --entities JSON")?,
                None => ExtractedEntities::default(),
            };

            let outcome = concierge
                .handle_classification(
                    IntentClassification::new(label, confidence).with_entities(entities),
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Calc { command } => {
            let request = match command {
                CalcCommand::Pfa { annual_income } => {
                    CalculationRequest::pfa_contributions(annual_income)
                }
                CalcCommand::PropertySale {
                    sale_price,
                    ownership_years,
                } => CalculationRequest::property_sale_tax(sale_price, ownership_years),
                CalcCommand::Rental {
                    annual_income,
                    monthly_rent,
                } => {
                    let annual = match (annual_income, monthly_rent) {
                        (Some(annual), _) => annual,
                        (None, Some(monthly)) => monthly * 12.0,
                        (None, None) => bail!("pass --annual-income or --monthly-rent"),
                    };
                    CalculationRequest::rental_income_tax(annual)
                }
            };

            let result = calculate(&request, &concierge.rules().current())?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Validate { command } => {
            let report = match command {
                ValidateCommand::Cnp { value } => match validate_personal_id(&value) {
                    Ok(id) => json!({ "valid": true, "kind": "personal", "canonical": id.as_str() }),
                    Err(error) => json!({ "valid": false, "error": error_code(error) }),
                },
                ValidateCommand::Cui { value } => match validate_fiscal_id(&value) {
                    Ok(id) => json!({ "valid": true, "kind": "fiscal", "canonical": id.as_str() }),
                    Err(error) => json!({ "valid": false, "error": error_code(error) }),
                },
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Pay {
            amount,
            payment_type,
            reference,
        } => {
            let ticket = concierge
                .initiate_payment(amount, &payment_type, reference)
                .await?;
            println!("{}", serde_json::to_string_pretty(&ticket)?);
        }
        Command::Rules => {
            println!(
                "{}",
                serde_json::to_string_pretty(concierge.rules().current().as_ref())?
            );
        }
    }

    Ok(())
}

async fn run_chat(concierge: TaxConcierge<MockGateways>) -> Result<()> {
    println!("Fisc Concierge chat mode. paste one classification JSON per line, 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }
        if message.is_empty() {
            continue;
        }

        let classification: IntentClassification = match serde_json::from_str(message) {
            Ok(parsed) => parsed,
            Err(error) => {
                println!("could not parse classification: {error}");
                continue;
            }
        };

        match concierge.handle_classification(classification).await {
            Ok(outcome) => println!("{}\n", serde_json::to_string_pretty(&outcome)?),
            Err(error) => println!("request rejected: {error}\n"),
        }
    }

    Ok(())
}

fn load_rules(path: Option<&std::path::Path>) -> Result<RulesHandle> {
    let table = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed reading rule table from {}", path.display()))?;
            RuleTable::from_json_str(&raw)?
        }
        None => RuleTable::default(),
    };

    Ok(RulesHandle::new(table))
}

fn load_routing(path: Option<&std::path::Path>) -> Result<RoutingTable> {
    match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed reading routing table from {}", path.display()))?;
            RoutingTable::from_json_str(&raw).context("invalid routing table JSON")
        }
        None => Ok(RoutingTable::default()),
    }
}

fn error_code(error: IdentifierError) -> &'static str {
    match error {
        IdentifierError::InvalidFormat => "invalid_format",
        IdentifierError::InvalidChecksum => "invalid_checksum",
    }
}

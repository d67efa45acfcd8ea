// crates/pollen-cli/src/commands/simulate.rs
//
// `pollen simulate`: replay a scenario file through the protocol engine.
//
// A scenario is a JSON document:
//
//   {
//     "admin": "admin",
//     "start": 1700000000,
//     "prices": [0, 2000000000000000000000, ...],
//     "genesis": [{"account": "alice", "amount": ...}],
//     "steps": [
//       {"caller": "alice", "now": 1700000000, "op": {"lock": {...}}},
//       {"caller": "admin", "now": 1700086400, "prices": [...]}
//     ]
//   }
//
// Accounts are labels or 0x-prefixed hex ids. Amounts and prices are base
// units. Every step refreshes the price feed at its own timestamp, applies
// any new prices, then executes its operation. A rejected operation is
// reported and leaves the state untouched.

use clap::Args;
use serde::{Deserialize, Serialize};
use tabled::Tabled;

use crate::output::{format_json, format_table, format_time, format_units, OutputFormat};
use pollen_core::config::ProtocolConfig;
use pollen_core::events::EventRecord;
use pollen_core::identity::{AccountId, CallContext, TokenKind};
use pollen_core::traits::TokenLedger;
use pollen_economics::oracle::StaticPriceFeed;
use pollen_engine::{Operation, Protocol, ProtocolState, ProtocolSummary, SingleAdmin, TracingSink};

/// Arguments for the simulate command.
#[derive(Debug, Args)]
pub struct SimulateCmd {
    /// Path to the JSON scenario.
    #[arg(long)]
    scenario: String,

    /// Stop at the first rejected operation.
    #[arg(long)]
    strict: bool,

    /// Print the full event log after the step table.
    #[arg(long)]
    events: bool,
}

#[derive(Debug, Deserialize)]
struct Scenario {
    admin: AccountId,
    start: u64,
    #[serde(default)]
    prices: Vec<u128>,
    #[serde(default)]
    genesis: Vec<Grant>,
    steps: Vec<Step>,
}

/// Tokens minted before the first step.
#[derive(Debug, Deserialize)]
struct Grant {
    account: AccountId,
    amount: u128,
    #[serde(default = "pollen_kind")]
    kind: TokenKind,
}

fn pollen_kind() -> TokenKind {
    TokenKind::Pollen
}

#[derive(Debug, Deserialize)]
struct Step {
    caller: AccountId,
    now: u64,
    #[serde(default)]
    prices: Option<Vec<u128>>,
    #[serde(default)]
    op: Option<Operation>,
}

#[derive(Debug, Serialize, Tabled)]
struct StepRow {
    #[tabled(rename = "#")]
    step: usize,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Caller")]
    caller: String,
    #[tabled(rename = "Operation")]
    operation: String,
    #[tabled(rename = "Result")]
    result: String,
}

#[derive(Debug, Serialize, Tabled)]
struct BalanceRow {
    #[tabled(rename = "Account")]
    account: String,
    #[tabled(rename = "PLN")]
    pollen: String,
    #[tabled(rename = "vePLN")]
    ve_pollen: String,
}

#[derive(Serialize)]
struct Report<'a> {
    steps: &'a [StepRow],
    summary: &'a ProtocolSummary,
    events: &'a [EventRecord],
}

fn set_prices(feed: &mut StaticPriceFeed, prices: &[u128], now: u64) {
    // Index 0 is the cash leg and is never quoted.
    for (asset, &price) in prices.iter().enumerate().skip(1) {
        feed.set_price(asset, price, now);
    }
}

/// Run the simulate command.
pub async fn run(
    cmd: &SimulateCmd,
    config: ProtocolConfig,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let contents = tokio::fs::read_to_string(&cmd.scenario).await?;
    let scenario: Scenario = serde_json::from_str(&contents)?;
    tracing::info!(
        "Loaded scenario {} with {} steps",
        cmd.scenario,
        scenario.steps.len()
    );

    let mut feed = StaticPriceFeed::new();
    set_prices(&mut feed, &scenario.prices, scenario.start);

    let state = ProtocolState::new(config, scenario.start)?;
    let mut protocol = Protocol::new(state, feed, SingleAdmin(scenario.admin));
    protocol.add_sink(Box::new(TracingSink));

    let mut accounts = vec![scenario.admin];
    for grant in &scenario.genesis {
        protocol
            .ledger_mut()
            .mint(grant.kind, &grant.account, grant.amount)?;
        if !accounts.contains(&grant.account) {
            accounts.push(grant.account);
        }
    }

    let mut rows = Vec::with_capacity(scenario.steps.len());
    for (i, step) in scenario.steps.into_iter().enumerate() {
        if let Some(prices) = &step.prices {
            set_prices(protocol.prices_mut(), prices, step.now);
        }
        protocol.prices_mut().touch_all(step.now);
        if !accounts.contains(&step.caller) {
            accounts.push(step.caller);
        }

        let Some(op) = step.op else {
            rows.push(StepRow {
                step: i,
                time: format_time(step.now),
                caller: step.caller.to_string(),
                operation: "prices".to_string(),
                result: "updated".to_string(),
            });
            continue;
        };

        let operation = op.name().to_string();
        let ctx = CallContext::new(step.caller, step.now);
        let result = match protocol.execute(&ctx, op) {
            Ok(events) => {
                let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
                if names.is_empty() {
                    "ok".to_string()
                } else {
                    names.join(", ")
                }
            }
            Err(e) if cmd.strict => {
                return Err(format!("step {} ({}) rejected: {}", i, operation, e).into());
            }
            Err(e) => format!("rejected: {}", e),
        };
        rows.push(StepRow {
            step: i,
            time: format_time(step.now),
            caller: step.caller.to_string(),
            operation,
            result,
        });
    }

    let summary = protocol.state().summary();
    match format {
        OutputFormat::Json => {
            let report = Report {
                steps: &rows,
                summary: &summary,
                events: protocol.events().records(),
            };
            println!("{}", format_json(&report));
        }
        OutputFormat::Table => {
            println!("{}", format_table(&rows));
            println!();

            let balances: Vec<BalanceRow> = accounts
                .iter()
                .map(|account| BalanceRow {
                    account: account.to_string(),
                    pollen: format_units(protocol.ledger().balance_of(TokenKind::Pollen, account)),
                    ve_pollen: format_units(
                        protocol.ledger().balance_of(TokenKind::VePollen, account),
                    ),
                })
                .collect();
            println!("{}", format_table(&balances));
            println!();

            println!("Protocol Summary");
            println!("----------------");
            println!("  PLN supply:       {}", format_units(summary.pollen_supply));
            println!("  vePLN supply:     {}", format_units(summary.ve_pollen_supply));
            println!("  Locked:           {} in {} locks", format_units(summary.total_locked), summary.locks);
            println!("  Issued:           {}", format_units(summary.issued));
            println!("  Delegated:        {}", format_units(summary.total_delegated));
            println!(
                "  Portfolios:       {} ({} open)",
                summary.portfolios, summary.open_portfolios
            );

            if cmd.events {
                println!();
                for record in protocol.events().records() {
                    println!(
                        "#{:<4} {}  {}",
                        record.sequence,
                        format_time(record.timestamp),
                        serde_json::to_string(&record.event)?
                    );
                }
            }
        }
    }

    Ok(())
}
